//! Approval-chain resolver.
//!
//! Maps (leave type, requester role) to the ordered approver-role sequence
//! and answers the position queries the state machine needs: who is final,
//! who may only forward, who may reject. The match is exhaustive over both
//! enums so an unhandled combination is a compile error.

use crate::model::{ApprovalDecision, LeaveStatus, LeaveType, Role};

/// Ordered approver roles for a fresh request. The requester's own role
/// never appears in their chain (no self-approval, and a DEPT_HEAD's own
/// request skips the DEPT_HEAD step).
pub fn resolve_chain(leave_type: LeaveType, requester_role: Role) -> Vec<Role> {
    match leave_type {
        // short chain: casual leave stops at the department head
        LeaveType::Casual => match requester_role {
            Role::Employee => vec![Role::DeptHead],
            Role::DeptHead => vec![Role::HrAdmin],
            Role::HrAdmin => vec![Role::HrHead],
            Role::HrHead => vec![Role::Ceo],
            Role::Ceo => vec![Role::HrHead],
        },
        // the long chain for everything else
        LeaveType::Earned | LeaveType::Medical | LeaveType::Special | LeaveType::Extraordinary => {
            match requester_role {
                Role::Employee => vec![Role::DeptHead, Role::HrAdmin, Role::HrHead, Role::Ceo],
                Role::DeptHead => vec![Role::HrAdmin, Role::HrHead, Role::Ceo],
                Role::HrAdmin => vec![Role::HrHead, Role::Ceo],
                Role::HrHead => vec![Role::Ceo],
                Role::Ceo => vec![Role::HrHead],
            }
        }
    }
}

/// Cancellation sub-requests always open a fresh chain at HR_ADMIN.
pub fn cancellation_chain() -> Vec<Role> {
    vec![Role::HrAdmin]
}

/// Whether `step` (1-based) is the terminal position of `chain`.
pub fn is_final_approver(chain: &[Role], step: u32) -> bool {
    step as usize == chain.len()
}

/// Role of the step after `step`, if any.
pub fn next_role(chain: &[Role], step: u32) -> Option<Role> {
    chain.get(step as usize).copied()
}

/// An intermediate approver may only forward; the terminal approver
/// decides. HR_ADMIN additionally holds a cross-cutting REJECT privilege
/// from any chain position.
pub fn may_reject(actor_role: Role, chain: &[Role], step: u32) -> bool {
    actor_role == Role::HrAdmin || is_final_approver(chain, step)
}

/// Request status resulting from deciding `step` of `chain`, or None when
/// the position does not admit the decision: only an intermediate step may
/// FORWARD, only the terminal step may APPROVE. A rejection terminates from
/// any position (the role privilege is [`may_reject`]'s concern).
pub fn status_after_action(
    decision: ApprovalDecision,
    chain: &[Role],
    step: u32,
) -> Option<LeaveStatus> {
    match decision {
        ApprovalDecision::Forwarded => {
            (!is_final_approver(chain, step)).then_some(LeaveStatus::Pending)
        }
        ApprovalDecision::Approved => {
            is_final_approver(chain, step).then_some(LeaveStatus::Approved)
        }
        ApprovalDecision::Rejected => Some(LeaveStatus::Rejected),
        ApprovalDecision::Pending => None,
    }
}
