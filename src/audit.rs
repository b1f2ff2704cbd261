//! Audit records.
//!
//! Every consequential action appends one immutable record. The store keeps
//! them in an append-only log; sweeps also use the log as their idempotence
//! check (has this (user, period) already been processed).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Submitted,
    Forwarded,
    Approved,
    Rejected,
    Returned,
    Resubmitted,
    Cancelled,
    CancellationRequested,
    CancellationApproved,
    CancellationRejected,
    Shortened,
    Recalled,
    OverstayFlagged,
    DutyReturnConfirmed,
    EarnedAccrual,
    CasualLapse,
    BalanceOverflow,
}

/// One immutable audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    /// Acting user id; 0 for system sweeps.
    pub actor_id: u64,
    pub action: AuditAction,
    /// e.g. "leave:42" or "balance:7:EARNED:2026".
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

/// Actor id used by background sweeps.
pub const SYSTEM_ACTOR: u64 = 0;

impl AuditRecord {
    pub fn new(
        actor_id: u64,
        action: AuditAction,
        target: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        AuditRecord {
            id: Uuid::new_v4(),
            actor_id,
            action,
            target: target.into(),
            timestamp: Utc::now(),
            details,
        }
    }
}

pub fn leave_target(leave_id: u64) -> String {
    format!("leave:{}", leave_id)
}

pub fn balance_target(employee_id: u64, leave_type: crate::model::LeaveType, year: i32) -> String {
    format!("balance:{}:{}:{}", employee_id, leave_type, year)
}
