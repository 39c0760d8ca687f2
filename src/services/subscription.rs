use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::{Result, StoreError};
use crate::models::line_item::Installment;
use crate::models::subscription::{CreateSubscriptionRequest, CycleOutcome, Subscription};
use crate::services::store::SubscriptionStore;

/// Runs lifecycle operations against stored subscriptions.
///
/// Each operation loads the record, applies one transition to the in-memory
/// copy and writes it back with a versioned save, so a concurrent writer
/// surfaces as [`StoreError::Conflict`] instead of a torn record.
#[derive(Clone)]
pub struct SubscriptionService<S> {
    store: S,
    config: SchedulerConfig,
}

impl<S: SubscriptionStore> SubscriptionService<S> {
    pub fn new(store: S, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn create(&self, request: CreateSubscriptionRequest, today: NaiveDate) -> Result<Subscription> {
        let subscription = Subscription::new(request, today, Utc::now())?;
        let created = self.store.insert(&subscription).await?;

        log::info!(
            "Created subscription {} for user {} (actionable {:?})",
            created.id,
            created.user_id,
            created.actionable_date
        );
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<Subscription> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id).into())
    }

    /// Returns the record as stored afterwards. A cancellation that could not
    /// happen yet comes back in `pending_cancellation`, so check the state.
    pub async fn cancel(&self, id: Uuid, today: NaiveDate) -> Result<Subscription> {
        let mut subscription = self.get(id).await?;
        let previous = subscription.state;

        let state = subscription.cancel(today, self.config.minimum_cancellation_notice_days)?;
        if state == previous {
            return Ok(subscription);
        }

        let saved = self.persist(subscription).await?;
        log::info!("Subscription {}: {} -> {}", id, previous, state);
        Ok(saved)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<bool> {
        let mut subscription = self.get(id).await?;

        if !subscription.deactivate() {
            log::debug!("Subscription {} still has installments remaining", id);
            return Ok(false);
        }

        self.persist(subscription).await?;
        log::info!("Subscription {} deactivated", id);
        Ok(true)
    }

    pub async fn activate(&self, id: Uuid) -> Result<Subscription> {
        let mut subscription = self.get(id).await?;
        let previous = subscription.state;

        if subscription.activate()? == previous {
            return Ok(subscription);
        }

        let saved = self.persist(subscription).await?;
        log::info!("Subscription {}: {} -> active", id, previous);
        Ok(saved)
    }

    pub async fn resolve_pending_cancellation(&self, id: Uuid, today: NaiveDate) -> Result<Subscription> {
        let mut subscription = self.get(id).await?;
        let previous = subscription.state;

        let state = subscription
            .resolve_pending_cancellation(today, self.config.minimum_cancellation_notice_days)?;
        if state == previous {
            log::debug!("Subscription {} cancellation still deferred", id);
            return Ok(subscription);
        }

        let saved = self.persist(subscription).await?;
        log::info!("Subscription {}: {} -> {}", id, previous, state);
        Ok(saved)
    }

    pub async fn mark_past_due(&self, id: Uuid) -> Result<Subscription> {
        let mut subscription = self.get(id).await?;
        subscription.mark_past_due()?;

        let saved = self.persist(subscription).await?;
        log::warn!("Subscription {} marked past due", id);
        Ok(saved)
    }

    /// Preview only; nothing is written.
    pub async fn next_actionable_date(&self, id: Uuid) -> Result<NaiveDate> {
        self.get(id).await?.next_actionable_date()
    }

    pub async fn advance_actionable_date(&self, id: Uuid) -> Result<NaiveDate> {
        let mut subscription = self.get(id).await?;
        let next = subscription.advance_actionable_date()?;

        self.persist(subscription).await?;
        log::info!("Subscription {} next actionable on {}", id, next);
        Ok(next)
    }

    pub async fn unset_actionable_date(&self, id: Uuid) -> Result<Subscription> {
        let mut subscription = self.get(id).await?;
        if subscription.actionable_date.is_none() {
            return Ok(subscription);
        }

        subscription.unset_actionable_date();
        let saved = self.persist(subscription).await?;
        log::info!("Subscription {} removed from the actionable pool", id);
        Ok(saved)
    }

    pub async fn record_installment(&self, id: Uuid) -> Result<Installment> {
        let mut subscription = self.get(id).await?;
        let installment = subscription.record_installment(Utc::now());

        self.persist(subscription).await?;
        log::debug!("Recorded installment {} for subscription {}", installment.id, id);
        Ok(installment)
    }

    /// Bills one cycle and moves the subscription on, in a single save.
    /// On any error the stored record is left as it was.
    pub async fn process(&self, id: Uuid) -> Result<CycleOutcome> {
        let mut subscription = self.get(id).await?;
        let outcome = subscription.process_cycle(Utc::now())?;

        self.persist(subscription).await?;
        match outcome {
            CycleOutcome::Advanced(next) => log::info!("Subscription {} processed, next due {}", id, next),
            CycleOutcome::Deactivated { billed } => {
                log::info!("Subscription {} deactivated (billed this cycle: {})", id, billed)
            }
        }
        Ok(outcome)
    }

    pub async fn actionable(&self, as_of: NaiveDate) -> Result<Vec<Subscription>> {
        Ok(self.store.actionable(as_of).await?)
    }

    pub async fn pending_cancellations(&self) -> Result<Vec<Subscription>> {
        Ok(self.store.pending_cancellations().await?)
    }

    async fn persist(&self, mut subscription: Subscription) -> Result<Subscription> {
        subscription.updated_at = Utc::now();
        Ok(self.store.save(&subscription).await?)
    }
}
