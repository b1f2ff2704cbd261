//! The transition table.
//!
//! Legality of every action against the current status lives here, in one
//! place, instead of being scattered across the operation bodies. A
//! disallowed pair is a STATE_CONFLICT: under concurrent actions only the
//! writer that observes the expected pre-state succeeds.

use strum_macros::Display;

use crate::error::{EngineError, EngineResult};
use crate::model::{LeaveRequest, LeaveStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Forward,
    Approve,
    Reject,
    Return,
    Resubmit,
    Cancel,
    RequestCancellation,
    Shorten,
    Recall,
    ConfirmDutyReturn,
    FlagOverstay,
}

/// Statuses from which `action` may be applied.
pub fn permitted_states(action: Action) -> &'static [LeaveStatus] {
    use LeaveStatus::*;
    match action {
        Action::Forward | Action::Return => &[Submitted, Pending],
        Action::Approve | Action::Reject => &[Submitted, Pending, CancellationRequested],
        Action::Resubmit => &[Returned],
        Action::Cancel => &[Submitted, Pending],
        Action::RequestCancellation | Action::Shorten | Action::Recall => &[Approved],
        Action::ConfirmDutyReturn => &[Approved, OverstayPending],
        Action::FlagOverstay => &[Approved],
    }
}

/// Precondition check run inside every transition's transaction.
pub fn check(req: &LeaveRequest, action: Action) -> EngineResult<()> {
    let allowed = permitted_states(action);
    if allowed.contains(&req.status) {
        Ok(())
    } else {
        Err(EngineError::StateConflict {
            leave_id: req.id,
            expected: allowed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("|"),
            found: req.status,
        })
    }
}
