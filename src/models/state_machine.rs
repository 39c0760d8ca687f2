//! Guards and transitions for the subscription lifecycle.
//!
//! Every function here reads an immutable snapshot and returns the state the
//! subscription should move to; applying it is the caller's job.

use chrono::{Days, NaiveDate};

use crate::error::{Result, SubscriptionError};
use crate::models::subscription::{Subscription, SubscriptionState};

/// Validates a state change against the lifecycle table.
///
/// | From                 | To                                | Allowed |
/// |----------------------|-----------------------------------|---------|
/// | active               | pending_cancellation, canceled    | Yes     |
/// | active               | inactive, past_due                | Yes     |
/// | pending_cancellation | canceled, active                  | Yes     |
/// | past_due             | pending_cancellation, canceled    | Yes     |
/// | canceled, inactive   | *any*                             | No      |
/// | *any*                | same state                        | Yes     |
pub fn validate_state_transition(from: SubscriptionState, to: SubscriptionState) -> Result<()> {
    if from == to || allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(SubscriptionError::InvalidTransition {
            state: from,
            action: action_for(to),
        })
    }
}

pub fn allowed_transitions(state: SubscriptionState) -> &'static [SubscriptionState] {
    use SubscriptionState::*;

    match state {
        Active => &[PendingCancellation, Canceled, Inactive, PastDue],
        PendingCancellation => &[Canceled, Active],
        PastDue => &[PendingCancellation, Canceled],
        Canceled | Inactive => &[],
    }
}

fn action_for(to: SubscriptionState) -> &'static str {
    match to {
        SubscriptionState::Active => "activate",
        SubscriptionState::PendingCancellation | SubscriptionState::Canceled => "cancel",
        SubscriptionState::Inactive => "deactivate",
        SubscriptionState::PastDue => "mark past due",
    }
}

/// A subscription can be canceled outright unless its next cycle falls
/// within the cancellation notice window.
pub fn can_be_canceled(subscription: &Subscription, today: NaiveDate, notice_days: u32) -> bool {
    match subscription.actionable_date {
        None => true,
        Some(date) => date
            .checked_sub_days(Days::new(u64::from(notice_days)))
            .map_or(false, |cutoff| cutoff > today),
    }
}

pub fn can_be_deactivated(subscription: &Subscription) -> bool {
    subscription.state == SubscriptionState::Active
        && subscription
            .line_item
            .installments_exhausted(subscription.installments.len())
}

pub fn cancel(subscription: &Subscription, today: NaiveDate, notice_days: u32) -> Result<SubscriptionState> {
    if subscription.state == SubscriptionState::Canceled {
        return Ok(SubscriptionState::Canceled);
    }

    let target = if can_be_canceled(subscription, today, notice_days) {
        SubscriptionState::Canceled
    } else {
        SubscriptionState::PendingCancellation
    };

    validate_state_transition(subscription.state, target)?;
    Ok(target)
}

/// `None` when the guard does not hold; that is an answer, not an error.
pub fn deactivate(subscription: &Subscription) -> Option<SubscriptionState> {
    can_be_deactivated(subscription).then_some(SubscriptionState::Inactive)
}

pub fn activate(subscription: &Subscription) -> Result<SubscriptionState> {
    match subscription.state {
        SubscriptionState::Active | SubscriptionState::PendingCancellation => Ok(SubscriptionState::Active),
        state => Err(SubscriptionError::InvalidTransition {
            state,
            action: "activate",
        }),
    }
}

pub fn resolve_pending_cancellation(
    subscription: &Subscription,
    today: NaiveDate,
    notice_days: u32,
) -> Result<SubscriptionState> {
    if subscription.state != SubscriptionState::PendingCancellation {
        return Err(SubscriptionError::InvalidTransition {
            state: subscription.state,
            action: "resolve a pending cancellation on",
        });
    }

    cancel(subscription, today, notice_days)
}

pub fn mark_past_due(subscription: &Subscription) -> Result<SubscriptionState> {
    if subscription.state != SubscriptionState::Active {
        return Err(SubscriptionError::InvalidTransition {
            state: subscription.state,
            action: "mark past due",
        });
    }

    Ok(SubscriptionState::PastDue)
}
