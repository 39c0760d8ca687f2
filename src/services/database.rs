use surrealdb::{Surreal, engine::local::{Db, Mem, SurrealKv}};
use serde::{Deserialize, Serialize};
use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::subscription::{Subscription, SubscriptionState};
use crate::services::store::SubscriptionStore;

const TABLE: &str = "subscriptions";

/// Row layout: the selector columns live at the top level so they can be
/// indexed, the full aggregate is nested under `subscription`.
///
/// `actionable_day` is the actionable date as days since 0001-01-01 so the
/// range filter compares integers rather than formatted strings.
#[derive(Debug, Serialize, Deserialize)]
struct SubscriptionRecord {
    state: SubscriptionState,
    actionable_day: Option<i32>,
    version: u64,
    subscription: Subscription,
}

impl From<Subscription> for SubscriptionRecord {
    fn from(subscription: Subscription) -> Self {
        Self {
            state: subscription.state,
            actionable_day: subscription.actionable_date.map(|d| d.num_days_from_ce()),
            version: subscription.version,
            subscription,
        }
    }
}

#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Db>,
}

impl SurrealStore {
    /// Opens an embedded database. Accepts `memory://` or `file://<path>`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let db = if database_url.starts_with("memory://") {
            Surreal::new::<Mem>(()).await?
        } else if let Some(path) = database_url.strip_prefix("file://") {
            Surreal::new::<SurrealKv>(path).await?
        } else {
            return Err(StoreError::UnsupportedUrl(database_url.to_string()));
        };

        db.use_ns("subscription_scheduler").use_db("main").await?;

        let store = Self { db };
        store.initialize_schema().await?;

        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<(), StoreError> {
        self.db
            .query(
                "
            DEFINE TABLE IF NOT EXISTS subscriptions SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS subscriptions_actionable ON subscriptions FIELDS state, actionable_day;
        ",
            )
            .await?
            .check()?;

        log::info!("Subscription schema initialized");
        Ok(())
    }

    async fn select(&self, id: Uuid) -> Result<Option<SubscriptionRecord>, StoreError> {
        let record: Option<SubscriptionRecord> = self.db.select((TABLE, id.to_string())).await?;
        Ok(record)
    }
}

impl SubscriptionStore for SurrealStore {
    async fn insert(&self, subscription: &Subscription) -> Result<Subscription, StoreError> {
        if self.select(subscription.id).await?.is_some() {
            return Err(StoreError::AlreadyExists(subscription.id));
        }

        let created: Option<SubscriptionRecord> = self
            .db
            .create((TABLE, subscription.id.to_string()))
            .content(SubscriptionRecord::from(subscription.clone()))
            .await?;

        created
            .map(|record| record.subscription)
            .ok_or(StoreError::NotFound(subscription.id))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Subscription>, StoreError> {
        Ok(self.select(id).await?.map(|record| record.subscription))
    }

    async fn save(&self, subscription: &Subscription) -> Result<Subscription, StoreError> {
        let mut next = subscription.clone();
        next.version += 1;

        let updated: Vec<SubscriptionRecord> = self
            .db
            .query("UPDATE type::thing($table, $id) CONTENT $record WHERE version = $expected RETURN AFTER")
            .bind(("table", TABLE))
            .bind(("id", subscription.id.to_string()))
            .bind(("record", SubscriptionRecord::from(next)))
            .bind(("expected", subscription.version))
            .await?
            .take(0)?;

        if let Some(record) = updated.into_iter().next() {
            return Ok(record.subscription);
        }

        // Nothing matched: either the record is gone or its version moved on.
        match self.select(subscription.id).await? {
            None => Err(StoreError::NotFound(subscription.id)),
            Some(_) => Err(StoreError::Conflict {
                id: subscription.id,
                expected: subscription.version,
            }),
        }
    }

    async fn actionable(&self, as_of: NaiveDate) -> Result<Vec<Subscription>, StoreError> {
        let records: Vec<SubscriptionRecord> = self
            .db
            .query(
                "SELECT * FROM subscriptions \
                 WHERE state = 'active' AND actionable_day != NONE AND actionable_day != NULL \
                 AND actionable_day <= $as_of \
                 ORDER BY actionable_day ASC",
            )
            .bind(("as_of", as_of.num_days_from_ce()))
            .await?
            .take(0)?;

        Ok(records.into_iter().map(|record| record.subscription).collect())
    }

    async fn pending_cancellations(&self) -> Result<Vec<Subscription>, StoreError> {
        let records: Vec<SubscriptionRecord> = self
            .db
            .query("SELECT * FROM subscriptions WHERE state = 'pending_cancellation' ORDER BY actionable_day ASC")
            .await?
            .take(0)?;

        Ok(records.into_iter().map(|record| record.subscription).collect())
    }
}
