use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::model::role::Role;

/// Decision recorded on a single chain step. Forwarding appends a new
/// row for the next step rather than mutating the prior one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Pending,
    Approved,
    Rejected,
    Forwarded,
}

/// One resolved step of an approval chain.
///
/// Invariants (upheld by the store): step numbers strictly increase per
/// leave_id from 1 with no gaps; at most one PENDING row per leave_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: u64,
    pub leave_id: u64,
    pub step: u32,
    /// Role this step is addressed to.
    pub approver_role: Role,
    /// Concrete user who decided the step; None while pending.
    pub approver_id: Option<u64>,
    pub decision: ApprovalDecision,
    pub decided_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    /// Role the request was forwarded to, when decision is FORWARDED.
    pub forwarded_to: Option<Role>,
}

impl Approval {
    pub fn is_pending(&self) -> bool {
        self.decision == ApprovalDecision::Pending
    }
}
