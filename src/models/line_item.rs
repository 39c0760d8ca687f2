use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// The billable item a subscription re-orders each cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct LineItem {
    pub id: Uuid,
    pub subscribable_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    /// `None` means the subscription renews until it is canceled.
    pub max_installments: Option<u32>,
}

impl LineItem {
    pub fn new(subscribable_id: Uuid, quantity: u32, max_installments: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscribable_id,
            quantity,
            max_installments,
        }
    }

    pub fn installments_exhausted(&self, installment_count: usize) -> bool {
        match self.max_installments {
            Some(max) => installment_count >= max as usize,
            None => false,
        }
    }
}

/// One processing record against a subscription. Never edited once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Installment {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Installment {
    pub fn new(subscription_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscription_id,
            created_at,
        }
    }
}
