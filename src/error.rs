//! Error types for the leave engine.
//!
//! Every failure carries a stable machine-readable [`ErrorKind`] plus
//! contextual fields so callers can drive UI messaging and retries.

use chrono::NaiveDate;
use strum_macros::Display;
use thiserror::Error;

use crate::model::{LeaveStatus, LeaveType};

/// Stable error taxonomy surfaced alongside every [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    PolicyViolation,
    Authorization,
    StateConflict,
    InsufficientBalance,
    Internal,
}

/// The engine's error type. No transition partially commits: any of these
/// aborts the enclosing store transaction with zero side effects.
#[derive(Debug, Error)]
pub enum EngineError {
    /// End date precedes start date.
    #[error("invalid date range: end {end} is before start {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Malformed or out-of-range input; caller can correct and retry.
    #[error("invalid input: {message}")]
    Validation { message: String },

    /// Referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// A hard policy rule was broken (cap exceeded, missing certificate,
    /// backdate limit, ...). Blocks the mutation entirely.
    #[error("policy violation [{rule}]: {message}")]
    PolicyViolation { rule: &'static str, message: String },

    /// Wrong role, wrong ownership, or self-approval.
    #[error("not authorized: {message}")]
    Authorization { message: String },

    /// Stale status precondition, typically a lost race between two
    /// concurrent actions. Caller should re-fetch and retry.
    #[error("state conflict on leave {leave_id}: expected {expected}, found {found}")]
    StateConflict {
        leave_id: u64,
        expected: String,
        found: LeaveStatus,
    },

    /// The ledger cannot satisfy a debit even after conversion.
    #[error(
        "insufficient {leave_type} balance for employee {employee_id}: \
         requested {requested}, available {available}"
    )]
    InsufficientBalance {
        employee_id: u64,
        leave_type: LeaveType,
        requested: u32,
        available: i32,
    },

    /// Unexpected store or collaborator failure; fully rolled back.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidRange { .. }
            | EngineError::Validation { .. }
            | EngineError::NotFound { .. } => ErrorKind::Validation,
            EngineError::PolicyViolation { .. } => ErrorKind::PolicyViolation,
            EngineError::Authorization { .. } => ErrorKind::Authorization,
            EngineError::StateConflict { .. } => ErrorKind::StateConflict,
            EngineError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            EngineError::Internal { .. } => ErrorKind::Internal,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_and_screaming_snake() {
        let err = EngineError::StateConflict {
            leave_id: 3,
            expected: "SUBMITTED|PENDING".into(),
            found: LeaveStatus::Approved,
        };
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(err.kind().to_string(), "STATE_CONFLICT");
    }

    #[test]
    fn messages_carry_context() {
        let err = EngineError::InsufficientBalance {
            employee_id: 7,
            leave_type: LeaveType::Casual,
            requested: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "insufficient CASUAL balance for employee 7: requested 5, available 3"
        );
    }

    #[test]
    fn invalid_range_is_a_validation_error() {
        let err = EngineError::InvalidRange {
            start: NaiveDate::from_ymd_opt(2026, 5, 10).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
