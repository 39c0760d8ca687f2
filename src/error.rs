use thiserror::Error;
use uuid::Uuid;

use crate::models::subscription::SubscriptionState;

/// Failures raised by a [`crate::services::store::SubscriptionStore`].
///
/// These pass through the service layer unchanged; retrying is left to
/// whoever drives the processing cycle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("subscription {0} not found")]
    NotFound(Uuid),

    #[error("subscription {0} already exists")]
    AlreadyExists(Uuid),

    #[error("subscription {id} was modified concurrently (expected version {expected})")]
    Conflict { id: Uuid, expected: u64 },

    #[error("unsupported database URL: {0}")]
    UnsupportedUrl(String),

    #[error(transparent)]
    Database(#[from] surrealdb::Error),
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("cannot {action} a subscription that is {state}")]
    InvalidTransition {
        state: SubscriptionState,
        action: &'static str,
    },

    #[error("subscription {0} has no actionable date")]
    MissingActionableDate(Uuid),

    #[error("subscription {0} has no billing interval")]
    MissingInterval(Uuid),

    #[error("invalid subscription: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SubscriptionError {
    /// True for errors caused by the record's own state rather than the store.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            SubscriptionError::InvalidTransition { .. }
                | SubscriptionError::MissingActionableDate(_)
                | SubscriptionError::MissingInterval(_)
        )
    }
}

pub type Result<T, E = SubscriptionError> = std::result::Result<T, E>;
