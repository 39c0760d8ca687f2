use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Result, SubscriptionError};
use crate::models::interval::{self, Interval};
use crate::models::line_item::{Installment, LineItem};
use crate::models::state_machine;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Active,
    PendingCancellation,
    Canceled,
    Inactive,
    PastDue,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Active => "active",
            SubscriptionState::PendingCancellation => "pending_cancellation",
            SubscriptionState::Canceled => "canceled",
            SubscriptionState::Inactive => "inactive",
            SubscriptionState::PastDue => "past_due",
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub state: SubscriptionState,
    pub actionable_date: Option<NaiveDate>,
    pub interval: Option<Interval>,
    pub line_item: LineItem,
    pub installments: Vec<Installment>,
    /// Bumped by the store on every successful save.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    #[validate(required(message = "Subscription must belong to a user"))]
    pub user_id: Option<Uuid>,

    #[validate]
    pub line_item: LineItem,

    #[validate]
    pub interval: Option<Interval>,

    pub actionable_date: Option<NaiveDate>,
}

impl Subscription {
    /// Builds a new active subscription.
    ///
    /// Without an explicit `actionable_date` the first cycle falls one
    /// interval after `today`.
    pub fn new(request: CreateSubscriptionRequest, today: NaiveDate, now: DateTime<Utc>) -> Result<Self> {
        request.validate()?;

        let user_id = request.user_id.ok_or_else(missing_user)?;
        let actionable_date = request
            .actionable_date
            .or_else(|| request.interval.map(|every| interval::next_actionable_date(today, every)));

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            state: SubscriptionState::Active,
            actionable_date,
            interval: request.interval,
            line_item: request.line_item,
            installments: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the selector should hand this subscription out on `as_of`.
    pub fn is_actionable(&self, as_of: NaiveDate) -> bool {
        self.state == SubscriptionState::Active
            && self.actionable_date.map_or(false, |date| date <= as_of)
    }

    pub fn can_be_canceled(&self, today: NaiveDate, notice_days: u32) -> bool {
        state_machine::can_be_canceled(self, today, notice_days)
    }

    pub fn can_be_deactivated(&self) -> bool {
        state_machine::can_be_deactivated(self)
    }

    /// Cancels now if nothing is about to be processed, otherwise parks the
    /// subscription in `pending_cancellation`. Returns the resulting state.
    pub fn cancel(&mut self, today: NaiveDate, notice_days: u32) -> Result<SubscriptionState> {
        self.state = state_machine::cancel(self, today, notice_days)?;
        Ok(self.state)
    }

    /// Moves a finished subscription to `inactive`. Returns false, leaving the
    /// record alone, when the line item still has installments to go.
    pub fn deactivate(&mut self) -> bool {
        match state_machine::deactivate(self) {
            Some(state) => {
                self.state = state;
                true
            }
            None => false,
        }
    }

    pub fn activate(&mut self) -> Result<SubscriptionState> {
        self.state = state_machine::activate(self)?;
        Ok(self.state)
    }

    pub fn resolve_pending_cancellation(&mut self, today: NaiveDate, notice_days: u32) -> Result<SubscriptionState> {
        self.state = state_machine::resolve_pending_cancellation(self, today, notice_days)?;
        Ok(self.state)
    }

    pub fn mark_past_due(&mut self) -> Result<SubscriptionState> {
        self.state = state_machine::mark_past_due(self)?;
        Ok(self.state)
    }

    /// Date of the cycle after the current one. Does not modify the record.
    pub fn next_actionable_date(&self) -> Result<NaiveDate> {
        let current = self
            .actionable_date
            .ok_or(SubscriptionError::MissingActionableDate(self.id))?;
        let every = self.interval.ok_or(SubscriptionError::MissingInterval(self.id))?;

        Ok(interval::next_actionable_date(current, every))
    }

    pub fn advance_actionable_date(&mut self) -> Result<NaiveDate> {
        let next = self.next_actionable_date()?;
        self.actionable_date = Some(next);
        Ok(next)
    }

    pub fn unset_actionable_date(&mut self) {
        self.actionable_date = None;
    }

    pub fn record_installment(&mut self, now: DateTime<Utc>) -> Installment {
        let installment = Installment::new(self.id, now);
        self.installments.push(installment.clone());
        installment
    }

    /// Runs one billing cycle on this copy.
    ///
    /// An exhausted subscription leaves the pool without being billed.
    /// Otherwise one installment is recorded, then the subscription either
    /// deactivates (that was the last one) or moves to its next date. Nothing
    /// is changed when the date could not be advanced.
    pub fn process_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        if self.deactivate() {
            return Ok(CycleOutcome::Deactivated { billed: false });
        }

        let installments_after = self.installments.len() + 1;
        if !self.line_item.installments_exhausted(installments_after) {
            self.next_actionable_date()?;
        }

        self.record_installment(now);

        if self.deactivate() {
            return Ok(CycleOutcome::Deactivated { billed: true });
        }

        Ok(CycleOutcome::Advanced(self.advance_actionable_date()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Advanced(NaiveDate),
    Deactivated { billed: bool },
}

fn missing_user() -> SubscriptionError {
    let mut errors = validator::ValidationErrors::new();
    errors.add("user_id", validator::ValidationError::new("required"));
    SubscriptionError::Validation(errors)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn request(max_installments: Option<u32>, actionable_date: Option<NaiveDate>) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            user_id: Some(Uuid::new_v4()),
            line_item: LineItem::new(Uuid::new_v4(), 1, max_installments),
            interval: Some(Interval::months(1)),
            actionable_date,
        }
    }

    pub(crate) fn subscription(actionable_date: Option<NaiveDate>) -> Subscription {
        Subscription::new(request(None, actionable_date), date(2024, 1, 1), Utc::now()).unwrap()
    }

    #[test]
    fn test_new_subscription_is_active() {
        let subscription = subscription(Some(date(2024, 1, 10)));
        assert_eq!(subscription.state, SubscriptionState::Active);
        assert_eq!(subscription.actionable_date, Some(date(2024, 1, 10)));
        assert!(subscription.installments.is_empty());
        assert_eq!(subscription.version, 0);
    }

    #[test]
    fn test_new_subscription_defaults_actionable_date_from_interval() {
        let today = date(2024, 1, 31);
        let subscription = Subscription::new(request(None, None), today, Utc::now()).unwrap();
        assert_eq!(subscription.actionable_date, Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_new_subscription_requires_user() {
        let mut req = request(None, None);
        req.user_id = None;

        let result = Subscription::new(req, date(2024, 1, 1), Utc::now());
        assert!(matches!(result, Err(SubscriptionError::Validation(_))));
    }

    #[test]
    fn test_new_subscription_rejects_zero_length_interval() {
        let mut req = request(None, None);
        req.interval = Some(Interval::days(0));

        let result = Subscription::new(req, date(2024, 1, 1), Utc::now());
        assert!(matches!(result, Err(SubscriptionError::Validation(_))));
    }

    #[test]
    fn test_next_actionable_date_does_not_mutate() {
        let today = date(2024, 3, 15);
        let subscription = subscription(Some(today));

        let first = subscription.next_actionable_date().unwrap();
        let second = subscription.next_actionable_date().unwrap();

        assert_eq!(first, date(2024, 4, 15));
        assert_eq!(first, second);
        assert_eq!(subscription.actionable_date, Some(today));
    }

    #[test]
    fn test_advance_actionable_date() {
        let mut subscription = subscription(Some(date(2024, 3, 15)));

        let next = subscription.advance_actionable_date().unwrap();
        assert_eq!(next, date(2024, 4, 15));
        assert_eq!(subscription.actionable_date, Some(next));
    }

    #[test]
    fn test_advance_without_actionable_date_fails() {
        let mut subscription = subscription(None);
        subscription.unset_actionable_date();

        let err = subscription.advance_actionable_date().unwrap_err();
        assert!(matches!(err, SubscriptionError::MissingActionableDate(id) if id == subscription.id));
        assert!(err.is_invalid_transition());
        assert_eq!(subscription.actionable_date, None);
    }

    #[test]
    fn test_advance_without_interval_fails() {
        let mut subscription = subscription(Some(date(2024, 3, 15)));
        subscription.interval = None;

        let err = subscription.advance_actionable_date().unwrap_err();
        assert!(matches!(err, SubscriptionError::MissingInterval(_)));
        assert_eq!(subscription.actionable_date, Some(date(2024, 3, 15)));
    }

    #[test]
    fn test_unset_actionable_date_is_idempotent() {
        let mut subscription = subscription(Some(date(2024, 3, 15)));

        subscription.unset_actionable_date();
        assert_eq!(subscription.actionable_date, None);
        subscription.unset_actionable_date();
        assert_eq!(subscription.actionable_date, None);
        assert_eq!(subscription.state, SubscriptionState::Active);
    }

    #[test]
    fn test_is_actionable() {
        let today = date(2024, 3, 15);
        let mut subscription = subscription(Some(today));
        assert!(subscription.is_actionable(today));
        assert!(!subscription.is_actionable(date(2024, 3, 14)));

        subscription.unset_actionable_date();
        assert!(!subscription.is_actionable(today));
    }

    #[test]
    fn test_record_installment_appends() {
        let mut subscription = subscription(Some(date(2024, 3, 15)));
        let first = subscription.record_installment(Utc::now()).id;
        subscription.record_installment(Utc::now());

        assert_eq!(subscription.installments.len(), 2);
        assert_eq!(subscription.installments[0].id, first);
        assert!(subscription.installments.iter().all(|i| i.subscription_id == subscription.id));
    }

    #[test]
    fn test_process_cycle_skips_exhausted_allowance() {
        let mut sub = Subscription::new(request(Some(0), Some(date(2024, 3, 1))), date(2024, 2, 1), Utc::now()).unwrap();

        assert_eq!(sub.process_cycle(Utc::now()).unwrap(), CycleOutcome::Deactivated { billed: false });
        assert!(sub.installments.is_empty());
        assert_eq!(sub.state, SubscriptionState::Inactive);
    }

    #[test]
    fn test_process_cycle_bills_last_installment_then_deactivates() {
        let mut sub = Subscription::new(request(Some(1), Some(date(2024, 3, 1))), date(2024, 2, 1), Utc::now()).unwrap();

        assert_eq!(sub.process_cycle(Utc::now()).unwrap(), CycleOutcome::Deactivated { billed: true });
        assert_eq!(sub.installments.len(), 1);
        assert_eq!(sub.state, SubscriptionState::Inactive);
    }

    #[test]
    fn test_process_cycle_advances() {
        let mut sub = subscription(Some(date(2024, 3, 1)));

        assert_eq!(sub.process_cycle(Utc::now()).unwrap(), CycleOutcome::Advanced(date(2024, 4, 1)));
        assert_eq!(sub.installments.len(), 1);
        assert_eq!(sub.actionable_date, Some(date(2024, 4, 1)));
    }

    #[test]
    fn test_process_cycle_without_interval_changes_nothing() {
        let mut sub = subscription(Some(date(2024, 3, 1)));
        sub.interval = None;
        let before = sub.clone();

        assert!(matches!(sub.process_cycle(Utc::now()), Err(SubscriptionError::MissingInterval(_))));
        assert_eq!(sub, before);
    }

    #[test]
    fn test_state_serializes_as_snake_case() {
        let json = serde_json::to_string(&SubscriptionState::PendingCancellation).unwrap();
        assert_eq!(json, "\"pending_cancellation\"");
    }
}
