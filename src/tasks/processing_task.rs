use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::models::subscription::{CycleOutcome, SubscriptionState};
use crate::services::store::SubscriptionStore;
use crate::services::subscription::SubscriptionService;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CycleReport {
    pub processing_date: NaiveDate,
    pub processed: usize,
    pub advanced: usize,
    pub deactivated: usize,
    pub cancellations_resolved: usize,
    pub cancellations_deferred: usize,
    pub failed: Vec<Uuid>,
}

impl CycleReport {
    fn new(processing_date: NaiveDate) -> Self {
        Self {
            processing_date,
            processed: 0,
            advanced: 0,
            deactivated: 0,
            cancellations_resolved: 0,
            cancellations_deferred: 0,
            failed: Vec::new(),
        }
    }
}

/// One pass over everything due on `today`.
///
/// Deferred cancellations are retried first so a subscription that can now
/// be canceled is not billed again. Each actionable subscription is then
/// processed with a single save: an exhausted one leaves the pool unbilled,
/// any other gets one installment and either deactivates (last one) or moves
/// to its next actionable date. A failure on one subscription is logged and
/// counted; only failing to load the work lists aborts the run.
pub async fn run_processing_cycle<S: SubscriptionStore>(
    service: &SubscriptionService<S>,
    today: NaiveDate,
) -> Result<CycleReport> {
    log::info!("Running processing cycle for {}", today);
    let mut report = CycleReport::new(today);

    let pending = service
        .pending_cancellations()
        .await
        .context("failed to load pending cancellations")?;

    for subscription in pending {
        match service.resolve_pending_cancellation(subscription.id, today).await {
            Ok(resolved) if resolved.state == SubscriptionState::Canceled => {
                report.cancellations_resolved += 1;
            }
            Ok(_) => report.cancellations_deferred += 1,
            Err(e) => {
                log::error!("Failed to resolve cancellation for {}: {}", subscription.id, e);
                report.failed.push(subscription.id);
            }
        }
    }

    let due = service
        .actionable(today)
        .await
        .with_context(|| format!("failed to load subscriptions actionable on {}", today))?;

    log::info!("{} subscription(s) actionable", due.len());

    for subscription in due {
        match service.process(subscription.id).await {
            Ok(CycleOutcome::Advanced(next)) => {
                report.processed += 1;
                report.advanced += 1;
                log::debug!("Subscription {} next due {}", subscription.id, next);
            }
            Ok(CycleOutcome::Deactivated { .. }) => {
                report.processed += 1;
                report.deactivated += 1;
            }
            Err(e) => {
                log::error!("Failed to process subscription {}: {}", subscription.id, e);
                report.failed.push(subscription.id);
            }
        }
    }

    log::info!(
        "Cycle {} done: {} processed, {} deactivated, {} failed",
        today,
        report.processed,
        report.deactivated,
        report.failed.len()
    );
    Ok(report)
}
