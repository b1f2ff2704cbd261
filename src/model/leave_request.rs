use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::conversion::AllocationPart;
use crate::model::leave_type::LeaveType;

/// Lifecycle states of a leave request.
///
/// `Approved`, `Rejected` and `Cancelled` are terminal; `Approved` can be
/// re-entered through the cancel/shorten/recall sub-flows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Submitted,
    Pending,
    Returned,
    Approved,
    Rejected,
    Cancelled,
    CancellationRequested,
    Recalled,
    OverstayPending,
}

/// A leave request. Owned by the requester, mutated only by the engine,
/// never deleted — only transitioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Inclusive business-day count for [start_date, end_date].
    pub working_days: u32,
    pub status: LeaveStatus,
    /// Opaque reference to a medical certificate; content is never inspected.
    pub certificate_url: Option<String>,
    /// Opaque reference to the duty-return fitness certificate.
    pub fitness_certificate_url: Option<String>,
    /// End date before a shorten or an approved partial cancellation.
    pub original_end_date: Option<NaiveDate>,
    /// New end date proposed by a pending partial cancellation.
    pub proposed_end_date: Option<NaiveDate>,
    pub cancellation_reason: Option<String>,
    pub partial_cancellation: bool,
    /// Set once the employee confirms duty return after the leave.
    pub return_confirmed: bool,
    /// (type, days) breakdown actually debited at final approval.
    /// Empty until the request is approved.
    pub allocation: Vec<AllocationPart>,
    /// Policy snapshot version active when this request was validated.
    pub policy_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            LeaveStatus::Approved | LeaveStatus::Rejected | LeaveStatus::Cancelled
        )
    }
}
