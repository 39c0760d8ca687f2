use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::subscription::{Subscription, SubscriptionState};

/// Durable home for subscription records.
///
/// `save` is a compare-and-swap on [`Subscription::version`]: it only
/// succeeds when the stored copy still has the version the caller loaded, and
/// returns the saved record with the version bumped. This is what keeps two
/// workers from interleaving transitions on the same subscription.
pub trait SubscriptionStore: Send + Sync {
    fn insert(&self, subscription: &Subscription) -> impl Future<Output = Result<Subscription, StoreError>> + Send;

    fn find(&self, id: Uuid) -> impl Future<Output = Result<Option<Subscription>, StoreError>> + Send;

    fn save(&self, subscription: &Subscription) -> impl Future<Output = Result<Subscription, StoreError>> + Send;

    /// Active subscriptions with an actionable date on or before `as_of`,
    /// oldest date first.
    fn actionable(&self, as_of: NaiveDate) -> impl Future<Output = Result<Vec<Subscription>, StoreError>> + Send;

    fn pending_cancellations(&self) -> impl Future<Output = Result<Vec<Subscription>, StoreError>> + Send;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    subscriptions: Arc<RwLock<HashMap<Uuid, Subscription>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut subscriptions: Vec<Subscription>) -> Vec<Subscription> {
        subscriptions.sort_by(|a, b| {
            a.actionable_date
                .cmp(&b.actionable_date)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        subscriptions
    }
}

impl SubscriptionStore for MemoryStore {
    async fn insert(&self, subscription: &Subscription) -> Result<Subscription, StoreError> {
        let mut subscriptions = self.subscriptions.write().await;

        if subscriptions.contains_key(&subscription.id) {
            return Err(StoreError::AlreadyExists(subscription.id));
        }

        subscriptions.insert(subscription.id, subscription.clone());
        Ok(subscription.clone())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Subscription>, StoreError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.get(&id).cloned())
    }

    async fn save(&self, subscription: &Subscription) -> Result<Subscription, StoreError> {
        let mut subscriptions = self.subscriptions.write().await;

        let stored = subscriptions
            .get_mut(&subscription.id)
            .ok_or(StoreError::NotFound(subscription.id))?;

        if stored.version != subscription.version {
            return Err(StoreError::Conflict {
                id: subscription.id,
                expected: subscription.version,
            });
        }

        let mut saved = subscription.clone();
        saved.version += 1;
        *stored = saved.clone();
        Ok(saved)
    }

    async fn actionable(&self, as_of: NaiveDate) -> Result<Vec<Subscription>, StoreError> {
        let subscriptions = self.subscriptions.read().await;
        let due = subscriptions
            .values()
            .filter(|s| s.is_actionable(as_of))
            .cloned()
            .collect();
        Ok(Self::sorted(due))
    }

    async fn pending_cancellations(&self) -> Result<Vec<Subscription>, StoreError> {
        let subscriptions = self.subscriptions.read().await;
        let pending = subscriptions
            .values()
            .filter(|s| s.state == SubscriptionState::PendingCancellation)
            .cloned()
            .collect();
        Ok(Self::sorted(pending))
    }
}
