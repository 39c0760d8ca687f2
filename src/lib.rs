pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod tasks;

pub use error::{Result, StoreError, SubscriptionError};
pub use models::interval::{next_actionable_date, Interval, IntervalUnit};
pub use models::line_item::{Installment, LineItem};
pub use models::subscription::{CreateSubscriptionRequest, Subscription, SubscriptionState};
pub use services::database::SurrealStore;
pub use services::store::{MemoryStore, SubscriptionStore};
pub use services::subscription::SubscriptionService;
