//! Leave-request state machine.
//!
//! Owns every status transition. Each operation executes as one store
//! transaction (validate → mutate request/approvals/balances → append
//! audit); on any error the transaction is discarded whole. Notification
//! intents are handed to the notifier only after the commit, so delivery
//! failure can never roll back a transition.

mod transition;
pub mod sweeps;

pub use transition::{Action, permitted_states};

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use serde_json::json;
use tracing::info;

use crate::audit::{AuditAction, AuditRecord, leave_target};
use crate::chain;
use crate::config::PolicyConfig;
use crate::conversion::{AllocationPart, AllocationPlan, plan_allocation};
use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::model::{ApprovalDecision, LeaveRequest, LeaveStatus, LeaveType, Role};
use crate::notify::{NotificationIntent, Notifier, Recipient, TemplateKind};
use crate::policy::{self, PolicyWarning};
use crate::store::{MemoryStore, StoreState};
use crate::workdays;

/// Submission payload.
#[derive(Debug, Clone)]
pub struct SubmitLeave {
    pub employee_id: u64,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub certificate_url: Option<String>,
}

/// What a successful submission hands back: the created request, the
/// non-fatal policy warnings, and the allocation the request would debit
/// if approved today.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub leave: LeaveRequest,
    pub warnings: Vec<PolicyWarning>,
    pub plan: AllocationPlan,
}

pub struct LeaveEngine {
    store: Arc<MemoryStore>,
    config: PolicyConfig,
    notifier: Arc<dyn Notifier>,
}

impl LeaveEngine {
    pub fn new(store: Arc<MemoryStore>, config: PolicyConfig, notifier: Arc<dyn Notifier>) -> Self {
        LeaveEngine {
            store,
            config,
            notifier,
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /* =========================
    Submission
    ========================= */

    /// Creates the request in SUBMITTED together with its step-1 PENDING
    /// approval. The allocation plan is computed here so an infeasible
    /// request fails before anything is written.
    pub fn submit(&self, input: SubmitLeave, today: NaiveDate) -> EngineResult<SubmitOutcome> {
        let (outcome, first_role) = self.store.transaction(|state| {
            let user = state.user(input.employee_id)?.clone();
            if !user.active {
                return Err(EngineError::Validation {
                    message: format!("user {} is inactive", user.id),
                });
            }

            let holidays = state.holiday_set();
            let working_days =
                workdays::count_working_days(input.start_date, input.end_date, &holidays)?;
            let warnings = policy::validate_submission(
                &self.config,
                input.leave_type,
                today,
                input.start_date,
                working_days,
                input.certificate_url.as_deref(),
            )?;

            let year = input.start_date.year();
            let plan = plan_allocation(
                &self.config,
                user.id,
                input.leave_type,
                working_days,
                |t| ledger::available(state, &self.config, user.id, t, year),
            )?;

            let roles = chain::resolve_chain(input.leave_type, user.role);
            let first_role = roles.first().copied().ok_or_else(|| EngineError::Internal {
                message: "resolved an empty approval chain".into(),
            })?;

            let now = Utc::now();
            let leave_id = state.insert_request(LeaveRequest {
                id: 0,
                employee_id: user.id,
                leave_type: input.leave_type,
                start_date: input.start_date,
                end_date: input.end_date,
                working_days,
                status: LeaveStatus::Submitted,
                certificate_url: input.certificate_url.clone(),
                fitness_certificate_url: None,
                original_end_date: None,
                proposed_end_date: None,
                cancellation_reason: None,
                partial_cancellation: false,
                return_confirmed: false,
                allocation: Vec::new(),
                policy_version: self.config.version,
                created_at: now,
                updated_at: now,
            });
            state.push_approval(leave_id, first_role)?;
            state.push_audit(AuditRecord::new(
                user.id,
                AuditAction::Submitted,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": serde_json::Value::Null,
                    "afterState": LeaveStatus::Submitted,
                    "workingDays": working_days,
                    "plan": plan.clone(),
                }),
            ));

            info!(leave_id, employee_id = user.id, %input.leave_type, working_days, "leave submitted");
            let leave = state.request(leave_id)?.clone();
            Ok((
                SubmitOutcome {
                    leave,
                    warnings,
                    plan,
                },
                first_role,
            ))
        })?;

        self.notifier.notify(NotificationIntent {
            recipient: Recipient::Role(first_role),
            template: TemplateKind::ApprovalRequested,
            leave_id: outcome.leave.id,
        });
        Ok(outcome)
    }

    /* =========================
    Chain actions
    ========================= */

    /// Non-final approver passes the request one step up the chain.
    pub fn forward(
        &self,
        leave_id: u64,
        actor_id: u64,
        comment: Option<String>,
    ) -> EngineResult<LeaveRequest> {
        let (leave, next) = self.store.transaction(|state| {
            let actor = state.user(actor_id)?.clone();
            let req = state.request(leave_id)?.clone();
            transition::check(&req, Action::Forward)?;
            Self::forbid_self_action(&req, actor_id)?;

            let requester = state.user(req.employee_id)?.clone();
            let roles = chain::resolve_chain(req.leave_type, requester.role);
            let pending = Self::pending_row(state, leave_id)?;
            Self::check_turn(&req, &roles, &pending, actor.role)?;
            let status = chain::status_after_action(ApprovalDecision::Forwarded, &roles, pending.step)
                .ok_or_else(|| EngineError::Authorization {
                    message: "the final approver must approve or reject, not forward".into(),
                })?;
            let next = chain::next_role(&roles, pending.step).ok_or_else(|| EngineError::Internal {
                message: "non-final step without a next role".into(),
            })?;

            let now = Utc::now();
            if let Some(row) = state.current_pending_mut(leave_id) {
                row.decision = ApprovalDecision::Forwarded;
                row.approver_id = Some(actor.id);
                row.decided_at = Some(now);
                row.comment = comment.clone();
                row.forwarded_to = Some(next);
            }
            state.push_approval(leave_id, next)?;

            let before = req.status;
            let req_mut = state.request_mut(leave_id)?;
            req_mut.status = status;
            req_mut.updated_at = now;
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                actor.id,
                AuditAction::Forwarded,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": before,
                    "afterState": status,
                    "step": pending.step,
                    "forwardedTo": next,
                }),
            ));
            Ok((leave, next))
        })?;

        self.notifier.notify(NotificationIntent {
            recipient: Recipient::Role(next),
            template: TemplateKind::ApprovalRequested,
            leave_id,
        });
        Ok(leave)
    }

    /// Terminal approval. On a live request this debits the ledger per the
    /// conversion plan (recomputed from live balances inside this
    /// transaction); on a CANCELLATION_REQUESTED request it executes the
    /// cancellation instead.
    pub fn approve(
        &self,
        leave_id: u64,
        actor_id: u64,
        comment: Option<String>,
    ) -> EngineResult<LeaveRequest> {
        let (leave, intent) = self.store.transaction(|state| {
            let actor = state.user(actor_id)?.clone();
            let req = state.request(leave_id)?.clone();
            transition::check(&req, Action::Approve)?;
            Self::forbid_self_action(&req, actor_id)?;

            let pending = Self::pending_row(state, leave_id)?;

            if req.status == LeaveStatus::CancellationRequested {
                if pending.approver_role != actor.role {
                    return Err(EngineError::Authorization {
                        message: format!(
                            "cancellation review awaits {}, not {}",
                            pending.approver_role, actor.role
                        ),
                    });
                }
                return self.approve_cancellation(state, req, actor.id, pending.step, comment);
            }

            let requester = state.user(req.employee_id)?.clone();
            let roles = chain::resolve_chain(req.leave_type, requester.role);
            Self::check_turn(&req, &roles, &pending, actor.role)?;
            let status = chain::status_after_action(ApprovalDecision::Approved, &roles, pending.step)
                .ok_or_else(|| EngineError::Authorization {
                    message: format!(
                        "{} at step {} may only forward; approval rests with {:?}",
                        actor.role,
                        pending.step,
                        roles.last()
                    ),
                })?;

            let now = Utc::now();
            Self::decide_pending(state, leave_id, ApprovalDecision::Approved, actor.id, comment);

            let year = req.start_date.year();
            let plan = plan_allocation(
                &self.config,
                req.employee_id,
                req.leave_type,
                req.working_days,
                |t| ledger::available(state, &self.config, req.employee_id, t, year),
            )?;
            for part in &plan.parts {
                ledger::debit(
                    state,
                    &self.config,
                    req.employee_id,
                    part.leave_type,
                    year,
                    part.days,
                )?;
            }

            let before = req.status;
            let req_mut = state.request_mut(leave_id)?;
            req_mut.status = status;
            req_mut.allocation = plan.parts.clone();
            req_mut.updated_at = now;
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                actor.id,
                AuditAction::Approved,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": before,
                    "afterState": status,
                    "debited": plan.parts,
                }),
            ));
            info!(leave_id, actor_id, "leave approved");

            Ok((
                leave,
                NotificationIntent {
                    recipient: Recipient::Employee(req.employee_id),
                    template: TemplateKind::Approved,
                    leave_id,
                },
            ))
        })?;

        self.notifier.notify(intent);
        Ok(leave)
    }

    /// Terminal rejection, or the cross-cutting HR_ADMIN rejection from any
    /// chain position. On a CANCELLATION_REQUESTED request this denies the
    /// cancellation: the request reverts to APPROVED with its original
    /// dates and no balance movement.
    pub fn reject(
        &self,
        leave_id: u64,
        actor_id: u64,
        comment: Option<String>,
    ) -> EngineResult<LeaveRequest> {
        let (leave, intent) = self.store.transaction(|state| {
            let actor = state.user(actor_id)?.clone();
            let req = state.request(leave_id)?.clone();
            transition::check(&req, Action::Reject)?;
            Self::forbid_self_action(&req, actor_id)?;

            let pending = Self::pending_row(state, leave_id)?;
            let now = Utc::now();

            if req.status == LeaveStatus::CancellationRequested {
                if pending.approver_role != actor.role {
                    return Err(EngineError::Authorization {
                        message: format!(
                            "cancellation review awaits {}, not {}",
                            pending.approver_role, actor.role
                        ),
                    });
                }
                Self::decide_pending(state, leave_id, ApprovalDecision::Rejected, actor.id, comment);
                let req_mut = state.request_mut(leave_id)?;
                req_mut.status = LeaveStatus::Approved;
                req_mut.proposed_end_date = None;
                req_mut.partial_cancellation = false;
                req_mut.cancellation_reason = None;
                req_mut.updated_at = now;
                let leave = req_mut.clone();
                state.push_audit(AuditRecord::new(
                    actor.id,
                    AuditAction::CancellationRejected,
                    leave_target(leave_id),
                    json!({
                        "leaveId": leave_id,
                        "beforeState": LeaveStatus::CancellationRequested,
                        "afterState": LeaveStatus::Approved,
                    }),
                ));
                return Ok((
                    leave,
                    NotificationIntent {
                        recipient: Recipient::Employee(req.employee_id),
                        template: TemplateKind::CancellationDecided,
                        leave_id,
                    },
                ));
            }

            let requester = state.user(req.employee_id)?.clone();
            let roles = chain::resolve_chain(req.leave_type, requester.role);
            // HR_ADMIN may reject from any position; everyone else must
            // hold the currently pending step
            if actor.role != Role::HrAdmin {
                Self::check_turn(&req, &roles, &pending, actor.role)?;
            }
            if !chain::may_reject(actor.role, &roles, pending.step) {
                return Err(EngineError::Authorization {
                    message: format!(
                        "{} at step {} may only forward or return",
                        actor.role, pending.step
                    ),
                });
            }

            Self::decide_pending(state, leave_id, ApprovalDecision::Rejected, actor.id, comment);
            let before = req.status;
            let req_mut = state.request_mut(leave_id)?;
            req_mut.status = LeaveStatus::Rejected;
            req_mut.updated_at = now;
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                actor.id,
                AuditAction::Rejected,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": before,
                    "afterState": LeaveStatus::Rejected,
                    "step": pending.step,
                }),
            ));
            Ok((
                leave,
                NotificationIntent {
                    recipient: Recipient::Employee(req.employee_id),
                    template: TemplateKind::Rejected,
                    leave_id,
                },
            ))
        })?;

        self.notifier.notify(intent);
        Ok(leave)
    }

    /// Sends the request back to the requester for edits. Resubmission
    /// restarts the chain at step 1.
    pub fn return_request(
        &self,
        leave_id: u64,
        actor_id: u64,
        comment: Option<String>,
    ) -> EngineResult<LeaveRequest> {
        let (leave, intent) = self.store.transaction(|state| {
            let actor = state.user(actor_id)?.clone();
            let req = state.request(leave_id)?.clone();
            transition::check(&req, Action::Return)?;
            Self::forbid_self_action(&req, actor_id)?;

            let pending = Self::pending_row(state, leave_id)?;
            if pending.approver_role != actor.role {
                return Err(EngineError::Authorization {
                    message: format!(
                        "step {} awaits {}, not {}",
                        pending.step, pending.approver_role, actor.role
                    ),
                });
            }

            // the pending row is dropped; the return itself lives in the
            // audit log and the chain restarts fresh on resubmission
            if let Some(rows) = state.approvals.get_mut(&leave_id) {
                rows.retain(|a| !a.is_pending());
            }
            let before = req.status;
            let req_mut = state.request_mut(leave_id)?;
            req_mut.status = LeaveStatus::Returned;
            req_mut.updated_at = Utc::now();
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                actor.id,
                AuditAction::Returned,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": before,
                    "afterState": LeaveStatus::Returned,
                    "comment": comment,
                }),
            ));
            Ok((
                leave,
                NotificationIntent {
                    recipient: Recipient::Employee(req.employee_id),
                    template: TemplateKind::Returned,
                    leave_id,
                },
            ))
        })?;

        self.notifier.notify(intent);
        Ok(leave)
    }

    /// Requester fixes a RETURNED request; the chain restarts at step 1
    /// and the request is re-validated and re-stamped in full.
    pub fn resubmit(
        &self,
        leave_id: u64,
        employee_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        certificate_url: Option<String>,
        today: NaiveDate,
    ) -> EngineResult<SubmitOutcome> {
        let (outcome, first_role) = self.store.transaction(|state| {
            let req = state.request(leave_id)?.clone();
            transition::check(&req, Action::Resubmit)?;
            Self::require_requester(&req, employee_id)?;
            let user = state.user(employee_id)?.clone();

            let holidays = state.holiday_set();
            let working_days = workdays::count_working_days(start_date, end_date, &holidays)?;
            let warnings = policy::validate_submission(
                &self.config,
                req.leave_type,
                today,
                start_date,
                working_days,
                certificate_url.as_deref(),
            )?;
            let year = start_date.year();
            let plan = plan_allocation(
                &self.config,
                employee_id,
                req.leave_type,
                working_days,
                |t| ledger::available(state, &self.config, employee_id, t, year),
            )?;

            let roles = chain::resolve_chain(req.leave_type, user.role);
            let first_role = roles.first().copied().ok_or_else(|| EngineError::Internal {
                message: "resolved an empty approval chain".into(),
            })?;
            state.reset_chain(leave_id, first_role)?;

            let req_mut = state.request_mut(leave_id)?;
            req_mut.start_date = start_date;
            req_mut.end_date = end_date;
            req_mut.working_days = working_days;
            req_mut.certificate_url = certificate_url.clone();
            req_mut.status = LeaveStatus::Submitted;
            req_mut.policy_version = self.config.version;
            req_mut.updated_at = Utc::now();
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                employee_id,
                AuditAction::Resubmitted,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": LeaveStatus::Returned,
                    "afterState": LeaveStatus::Submitted,
                    "workingDays": working_days,
                }),
            ));
            Ok((
                SubmitOutcome {
                    leave,
                    warnings,
                    plan,
                },
                first_role,
            ))
        })?;

        self.notifier.notify(NotificationIntent {
            recipient: Recipient::Role(first_role),
            template: TemplateKind::ApprovalRequested,
            leave_id,
        });
        Ok(outcome)
    }

    /* =========================
    Requester sub-flows
    ========================= */

    /// Requester withdraws a not-yet-approved request. Immediate, no chain.
    pub fn cancel(&self, leave_id: u64, employee_id: u64) -> EngineResult<LeaveRequest> {
        self.store.transaction(|state| {
            let req = state.request(leave_id)?.clone();
            transition::check(&req, Action::Cancel)?;
            Self::require_requester(&req, employee_id)?;

            if let Some(rows) = state.approvals.get_mut(&leave_id) {
                rows.retain(|a| !a.is_pending());
            }
            let before = req.status;
            let req_mut = state.request_mut(leave_id)?;
            req_mut.status = LeaveStatus::Cancelled;
            req_mut.updated_at = Utc::now();
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                employee_id,
                AuditAction::Cancelled,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": before,
                    "afterState": LeaveStatus::Cancelled,
                }),
            ));
            Ok(leave)
        })
    }

    /// Requester asks to cancel APPROVED leave, fully or partially.
    /// Partial cancellation locks past days: the proposed end cannot
    /// predate today. Opens a fresh HR_ADMIN review chain.
    pub fn request_cancellation(
        &self,
        leave_id: u64,
        employee_id: u64,
        new_end_date: Option<NaiveDate>,
        reason: String,
        today: NaiveDate,
    ) -> EngineResult<LeaveRequest> {
        let leave = self.store.transaction(|state| {
            let req = state.request(leave_id)?.clone();
            transition::check(&req, Action::RequestCancellation)?;
            Self::require_requester(&req, employee_id)?;

            if req.end_date < today {
                return Err(EngineError::PolicyViolation {
                    rule: "LEAVE_COMPLETED",
                    message: "completed leave cannot be cancelled".into(),
                });
            }
            match new_end_date {
                None => {
                    if req.start_date <= today {
                        return Err(EngineError::PolicyViolation {
                            rule: "LEAVE_STARTED",
                            message: "started leave can only be cancelled partially".into(),
                        });
                    }
                }
                Some(new_end) => {
                    if new_end >= req.end_date {
                        return Err(EngineError::Validation {
                            message: "proposed end date must shorten the leave".into(),
                        });
                    }
                    if new_end < today {
                        return Err(EngineError::Validation {
                            message: "past days are locked; proposed end cannot predate today"
                                .into(),
                        });
                    }
                    if new_end < req.start_date {
                        return Err(EngineError::Validation {
                            message: "proposed end precedes the start; cancel fully instead".into(),
                        });
                    }
                }
            }

            let first_role = chain::cancellation_chain()
                .first()
                .copied()
                .ok_or_else(|| EngineError::Internal {
                    message: "empty cancellation chain".into(),
                })?;
            state.reset_chain(leave_id, first_role)?;

            let req_mut = state.request_mut(leave_id)?;
            req_mut.status = LeaveStatus::CancellationRequested;
            req_mut.proposed_end_date = new_end_date;
            req_mut.partial_cancellation = new_end_date.is_some();
            req_mut.cancellation_reason = Some(reason.clone());
            req_mut.updated_at = Utc::now();
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                employee_id,
                AuditAction::CancellationRequested,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": LeaveStatus::Approved,
                    "afterState": LeaveStatus::CancellationRequested,
                    "partial": new_end_date.is_some(),
                    "proposedEndDate": new_end_date,
                    "reason": reason,
                }),
            ));
            Ok(leave)
        })?;

        self.notifier.notify(NotificationIntent {
            recipient: Recipient::Role(Role::HrAdmin),
            template: TemplateKind::CancellationRequested,
            leave_id,
        });
        Ok(leave)
    }

    /// Requester trims the tail of APPROVED leave that has already started
    /// but not ended: `today <= new_end < current end`. The working-day
    /// delta is restored immediately, no review chain.
    pub fn shorten(
        &self,
        leave_id: u64,
        employee_id: u64,
        new_end_date: NaiveDate,
        today: NaiveDate,
    ) -> EngineResult<LeaveRequest> {
        self.store.transaction(|state| {
            let req = state.request(leave_id)?.clone();
            transition::check(&req, Action::Shorten)?;
            Self::require_requester(&req, employee_id)?;

            if req.start_date > today {
                return Err(EngineError::Validation {
                    message: "leave has not started; request cancellation instead".into(),
                });
            }
            if req.end_date < today {
                return Err(EngineError::Validation {
                    message: "leave already ended".into(),
                });
            }
            if new_end_date < today || new_end_date >= req.end_date {
                return Err(EngineError::Validation {
                    message: "new end date must satisfy today <= new end < current end".into(),
                });
            }

            let holidays = state.holiday_set();
            let new_working_days =
                workdays::count_working_days(req.start_date, new_end_date, &holidays)?;
            let delta = req.working_days - new_working_days;

            let year = req.start_date.year();
            let mut allocation = req.allocation.clone();
            let restored = restore_tail(
                state,
                &self.config,
                req.employee_id,
                year,
                &mut allocation,
                delta,
            )?;

            let old_end = req.end_date;
            let req_mut = state.request_mut(leave_id)?;
            req_mut.original_end_date = Some(old_end);
            req_mut.end_date = new_end_date;
            req_mut.working_days = new_working_days;
            req_mut.allocation = allocation;
            req_mut.updated_at = Utc::now();
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                employee_id,
                AuditAction::Shortened,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": LeaveStatus::Approved,
                    "afterState": LeaveStatus::Approved,
                    "originalEndDate": old_end,
                    "newEndDate": new_end_date,
                    "restored": restored.clone(),
                }),
            ));

            if restored.iter().any(|p| p.leave_type == LeaveType::Earned) {
                self.overflow_with_audit(state, employee_id, req.employee_id, year)?;
            }
            Ok(leave)
        })
    }

    /// Management pulls an employee back from future-dated APPROVED leave.
    /// The whole debit is restored; nothing was consumed yet.
    pub fn recall(
        &self,
        leave_id: u64,
        actor_id: u64,
        today: NaiveDate,
    ) -> EngineResult<LeaveRequest> {
        let (leave, intent) = self.store.transaction(|state| {
            let actor = state.user(actor_id)?.clone();
            let req = state.request(leave_id)?.clone();
            transition::check(&req, Action::Recall)?;
            Self::forbid_self_action(&req, actor_id)?;
            if !matches!(actor.role, Role::DeptHead | Role::HrAdmin) {
                return Err(EngineError::Authorization {
                    message: format!("{} cannot recall leave", actor.role),
                });
            }
            if req.start_date <= today {
                return Err(EngineError::Validation {
                    message: "only future-dated leave can be recalled".into(),
                });
            }

            let year = req.start_date.year();
            let mut allocation = req.allocation.clone();
            let total: u32 = allocation.iter().map(|p| p.days).sum();
            let restored = restore_tail(
                state,
                &self.config,
                req.employee_id,
                year,
                &mut allocation,
                total,
            )?;

            let req_mut = state.request_mut(leave_id)?;
            req_mut.status = LeaveStatus::Recalled;
            req_mut.allocation = Vec::new();
            req_mut.updated_at = Utc::now();
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                actor.id,
                AuditAction::Recalled,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": LeaveStatus::Approved,
                    "afterState": LeaveStatus::Recalled,
                    "restored": restored.clone(),
                }),
            ));

            if restored.iter().any(|p| p.leave_type == LeaveType::Earned) {
                self.overflow_with_audit(state, actor.id, req.employee_id, year)?;
            }
            Ok((
                leave,
                NotificationIntent {
                    recipient: Recipient::Employee(req.employee_id),
                    template: TemplateKind::Recalled,
                    leave_id,
                },
            ))
        })?;

        self.notifier.notify(intent);
        Ok(leave)
    }

    /// Employee confirms they are back on duty. MEDICAL leave past the
    /// fitness threshold is gated on a fitness-certificate reference being
    /// present; the reference is never content-validated. Clears an
    /// OVERSTAY_PENDING flag back to APPROVED.
    pub fn confirm_duty_return(
        &self,
        leave_id: u64,
        employee_id: u64,
        fitness_certificate_url: Option<String>,
        today: NaiveDate,
    ) -> EngineResult<LeaveRequest> {
        self.store.transaction(|state| {
            let req = state.request(leave_id)?.clone();
            transition::check(&req, Action::ConfirmDutyReturn)?;
            Self::require_requester(&req, employee_id)?;

            if req.end_date >= today {
                return Err(EngineError::Validation {
                    message: "leave has not ended yet".into(),
                });
            }
            if policy::needs_fitness_certificate(&self.config, req.leave_type, req.working_days)
                && fitness_certificate_url.is_none()
                && req.fitness_certificate_url.is_none()
            {
                return Err(EngineError::PolicyViolation {
                    rule: "FITNESS_CERTIFICATE_REQUIRED",
                    message: format!(
                        "medical leave over {} days requires a fitness certificate reference",
                        self.config.fitness_certificate_after_days
                    ),
                });
            }

            let before = req.status;
            let req_mut = state.request_mut(leave_id)?;
            req_mut.return_confirmed = true;
            if fitness_certificate_url.is_some() {
                req_mut.fitness_certificate_url = fitness_certificate_url.clone();
            }
            if req_mut.status == LeaveStatus::OverstayPending {
                req_mut.status = LeaveStatus::Approved;
            }
            req_mut.updated_at = Utc::now();
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                employee_id,
                AuditAction::DutyReturnConfirmed,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": before,
                    "afterState": leave.status,
                }),
            ));
            Ok(leave)
        })
    }

    /* =========================
    Internal helpers
    ========================= */

    fn approve_cancellation(
        &self,
        state: &mut StoreState,
        req: LeaveRequest,
        actor_id: u64,
        step: u32,
        comment: Option<String>,
    ) -> EngineResult<(LeaveRequest, NotificationIntent)> {
        let leave_id = req.id;
        let roles = chain::cancellation_chain();
        if !chain::is_final_approver(&roles, step) {
            return Err(EngineError::Authorization {
                message: "only the final cancellation reviewer can approve".into(),
            });
        }
        let now = Utc::now();
        Self::decide_pending(state, leave_id, ApprovalDecision::Approved, actor_id, comment);

        let year = req.start_date.year();
        let mut allocation = req.allocation.clone();

        let leave = if let Some(new_end) = req.proposed_end_date {
            // partial: trim to the proposed end, restore the delta
            let holidays = state.holiday_set();
            let new_working_days =
                workdays::count_working_days(req.start_date, new_end, &holidays)?;
            let delta = req.working_days - new_working_days;
            let restored = restore_tail(
                state,
                &self.config,
                req.employee_id,
                year,
                &mut allocation,
                delta,
            )?;

            let req_mut = state.request_mut(leave_id)?;
            req_mut.status = LeaveStatus::Approved;
            req_mut.original_end_date = Some(req.end_date);
            req_mut.end_date = new_end;
            req_mut.working_days = new_working_days;
            req_mut.allocation = allocation;
            req_mut.proposed_end_date = None;
            req_mut.updated_at = now;
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                actor_id,
                AuditAction::CancellationApproved,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": LeaveStatus::CancellationRequested,
                    "afterState": LeaveStatus::Approved,
                    "partial": true,
                    "newEndDate": new_end,
                    "restored": restored.clone(),
                }),
            ));
            if restored.iter().any(|p| p.leave_type == LeaveType::Earned) {
                self.overflow_with_audit(state, actor_id, req.employee_id, year)?;
            }
            leave
        } else {
            // full: restore everything and close the request
            let total: u32 = allocation.iter().map(|p| p.days).sum();
            let restored = restore_tail(
                state,
                &self.config,
                req.employee_id,
                year,
                &mut allocation,
                total,
            )?;

            let req_mut = state.request_mut(leave_id)?;
            req_mut.status = LeaveStatus::Cancelled;
            req_mut.allocation = Vec::new();
            req_mut.proposed_end_date = None;
            req_mut.updated_at = now;
            let leave = req_mut.clone();

            state.push_audit(AuditRecord::new(
                actor_id,
                AuditAction::CancellationApproved,
                leave_target(leave_id),
                json!({
                    "leaveId": leave_id,
                    "beforeState": LeaveStatus::CancellationRequested,
                    "afterState": LeaveStatus::Cancelled,
                    "partial": false,
                    "restored": restored.clone(),
                }),
            ));
            if restored.iter().any(|p| p.leave_type == LeaveType::Earned) {
                self.overflow_with_audit(state, actor_id, req.employee_id, year)?;
            }
            leave
        };

        Ok((
            leave,
            NotificationIntent {
                recipient: Recipient::Employee(req.employee_id),
                template: TemplateKind::CancellationDecided,
                leave_id,
            },
        ))
    }

    /// Runs the EARNED overflow check and appends the audit record when a
    /// cap breach was observed.
    fn overflow_with_audit(
        &self,
        state: &mut StoreState,
        actor_id: u64,
        employee_id: u64,
        year: i32,
    ) -> EngineResult<()> {
        if let Some(outcome) =
            ledger::apply_earned_overflow(state, &self.config, employee_id, year)?
        {
            state.push_audit(AuditRecord::new(
                actor_id,
                AuditAction::BalanceOverflow,
                crate::audit::balance_target(employee_id, LeaveType::Earned, year),
                json!({
                    "overflowApplied": outcome.overflow_applied,
                    "movedDays": outcome.moved_days,
                    "specialHeadroom": outcome.special_headroom,
                    "before": {
                        "earned": outcome.earned_before,
                        "special": outcome.special_before,
                    },
                    "after": {
                        "earned": outcome.earned_after,
                        "special": outcome.special_after,
                    },
                }),
            ));
        }
        Ok(())
    }

    fn pending_row(
        state: &StoreState,
        leave_id: u64,
    ) -> EngineResult<crate::model::Approval> {
        state
            .current_pending(leave_id)
            .cloned()
            .ok_or_else(|| EngineError::Internal {
                message: format!("leave {} has no pending approval", leave_id),
            })
    }

    fn decide_pending(
        state: &mut StoreState,
        leave_id: u64,
        decision: ApprovalDecision,
        actor_id: u64,
        comment: Option<String>,
    ) {
        if let Some(row) = state.current_pending_mut(leave_id) {
            row.decision = decision;
            row.approver_id = Some(actor_id);
            row.decided_at = Some(Utc::now());
            row.comment = comment;
        }
    }

    /// The actor must hold the currently pending step. A role that sits
    /// earlier in the chain than the pending step already had its turn —
    /// under concurrent actions that is the lost race, surfaced as
    /// STATE_CONFLICT so the caller re-fetches; any other mismatch is an
    /// authorization failure.
    fn check_turn(
        req: &LeaveRequest,
        roles: &[Role],
        pending: &crate::model::Approval,
        actor_role: Role,
    ) -> EngineResult<()> {
        if pending.approver_role == actor_role {
            return Ok(());
        }
        let already_decided = roles
            .iter()
            .take(pending.step.saturating_sub(1) as usize)
            .any(|r| *r == actor_role);
        if already_decided {
            return Err(EngineError::StateConflict {
                leave_id: req.id,
                expected: format!("PENDING approval for {}", actor_role),
                found: req.status,
            });
        }
        Err(EngineError::Authorization {
            message: format!(
                "step {} awaits {}, not {}",
                pending.step, pending.approver_role, actor_role
            ),
        })
    }

    fn forbid_self_action(req: &LeaveRequest, actor_id: u64) -> EngineResult<()> {
        if req.employee_id == actor_id {
            return Err(EngineError::Authorization {
                message: "requesters cannot act on their own approval chain".into(),
            });
        }
        Ok(())
    }

    fn require_requester(req: &LeaveRequest, employee_id: u64) -> EngineResult<()> {
        if req.employee_id != employee_id {
            return Err(EngineError::Authorization {
                message: format!("leave {} belongs to another employee", req.id),
            });
        }
        Ok(())
    }
}

/// Restores `delta` days against the recorded allocation, lowest-priority
/// bucket first (the reverse of the debit order). Returns the restored
/// breakdown; the allocation is trimmed in place.
fn restore_tail(
    state: &mut StoreState,
    cfg: &PolicyConfig,
    employee_id: u64,
    year: i32,
    allocation: &mut Vec<AllocationPart>,
    mut delta: u32,
) -> EngineResult<Vec<AllocationPart>> {
    let mut restored = Vec::new();
    for part in allocation.iter_mut().rev() {
        if delta == 0 {
            break;
        }
        let take = part.days.min(delta);
        if take == 0 {
            continue;
        }
        ledger::restore(state, cfg, employee_id, part.leave_type, year, take)?;
        part.days -= take;
        delta -= take;
        restored.push(AllocationPart {
            leave_type: part.leave_type,
            days: take,
        });
    }
    if delta > 0 {
        return Err(EngineError::Internal {
            message: format!("restore exceeds recorded allocation by {} days", delta),
        });
    }
    allocation.retain(|p| p.days > 0);
    Ok(restored)
}
