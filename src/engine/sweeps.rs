//! Background sweeps.
//!
//! Periodic actors that reuse the ledger and state-machine primitives:
//! monthly EARNED accrual, CASUAL year-end lapse, and overstay detection.
//! Each is idempotent — re-running for an already-processed period is a
//! no-op, enforced by probing the audit trail for an existing event on the
//! same (user, period) pair.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, warn};

use crate::audit::{AuditAction, AuditRecord, SYSTEM_ACTOR, balance_target, leave_target};
use crate::engine::transition::{self, Action};
use crate::engine::LeaveEngine;
use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::model::{LeaveStatus, LeaveType};
use crate::notify::{NotificationIntent, Recipient, TemplateKind};
use crate::workdays;

impl LeaveEngine {
    /// Credits the monthly EARNED accrual to every active user, with the
    /// overflow check after each credit. Returns how many users were
    /// credited this run (already-processed users are skipped).
    pub fn accrue_earned_monthly(&self, year: i32, month: u32) -> EngineResult<u32> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::Validation {
                message: format!("month {} out of range", month),
            });
        }
        let period = format!("{:04}-{:02}", year, month);
        let days = self.config().earned_monthly_accrual;

        let credited = self.store().transaction(|state| {
            let user_ids: Vec<u64> = state
                .users
                .values()
                .filter(|u| u.active)
                .map(|u| u.id)
                .collect();
            let mut credited = 0;
            for employee_id in user_ids {
                let target = balance_target(employee_id, LeaveType::Earned, year);
                if state.audit_exists(AuditAction::EarnedAccrual, &target, Some(&period)) {
                    continue;
                }
                ledger::accrue(state, self.config(), employee_id, LeaveType::Earned, year, days)?;
                state.push_audit(AuditRecord::new(
                    SYSTEM_ACTOR,
                    AuditAction::EarnedAccrual,
                    target,
                    json!({ "period": period.clone(), "days": days }),
                ));
                self.overflow_with_audit(state, SYSTEM_ACTOR, employee_id, year)?;
                credited += 1;
            }
            Ok(credited)
        })?;

        info!(year, month, credited, "earned accrual sweep");
        Ok(credited)
    }

    /// Zeroes out unspent CASUAL balance at year end (no carry-forward).
    /// Returns how many balances lapsed this run.
    pub fn lapse_casual_year_end(&self, year: i32) -> EngineResult<u32> {
        let period = year.to_string();
        let lapsed_count = self.store().transaction(|state| {
            let targets: Vec<(u64, String)> = state
                .balances
                .values()
                .filter(|b| b.leave_type == LeaveType::Casual && b.year == year && b.closing > 0)
                .map(|b| {
                    (
                        b.employee_id,
                        balance_target(b.employee_id, LeaveType::Casual, year),
                    )
                })
                .collect();
            let mut count = 0;
            for (employee_id, target) in targets {
                if state.audit_exists(AuditAction::CasualLapse, &target, Some(&period)) {
                    continue;
                }
                let lapsed =
                    ledger::lapse(state, self.config(), employee_id, LeaveType::Casual, year)?;
                if lapsed == 0 {
                    continue;
                }
                state.push_audit(AuditRecord::new(
                    SYSTEM_ACTOR,
                    AuditAction::CasualLapse,
                    target,
                    json!({ "period": period.clone(), "lapsedDays": lapsed }),
                ));
                count += 1;
            }
            Ok(count)
        })?;

        info!(year, lapsed_count, "casual lapse sweep");
        Ok(lapsed_count)
    }

    /// Flags APPROVED leave whose holder has missed at least one working
    /// day past the end date without a duty-return confirmation (a leave
    /// ending on a Friday is not overstayed until Monday has gone by).
    /// Returns the flagged leave ids. Naturally idempotent: a flagged
    /// request is no longer APPROVED.
    pub fn detect_overstays(&self, today: NaiveDate) -> EngineResult<Vec<u64>> {
        let flagged = self.store().transaction(|state| {
            let holidays = state.holiday_set();
            let ids: Vec<u64> = state
                .requests
                .values()
                .filter(|r| {
                    r.status == LeaveStatus::Approved
                        && !r.return_confirmed
                        && missed_working_day(r.end_date, today, &holidays)
                })
                .map(|r| r.id)
                .collect();
            let mut flagged = Vec::new();
            for leave_id in ids {
                let req = state.request(leave_id)?.clone();
                transition::check(&req, Action::FlagOverstay)?;
                let req_mut = state.request_mut(leave_id)?;
                req_mut.status = LeaveStatus::OverstayPending;
                state.push_audit(AuditRecord::new(
                    SYSTEM_ACTOR,
                    AuditAction::OverstayFlagged,
                    leave_target(leave_id),
                    json!({
                        "leaveId": leave_id,
                        "beforeState": LeaveStatus::Approved,
                        "afterState": LeaveStatus::OverstayPending,
                        "endDate": req.end_date,
                    }),
                ));
                flagged.push(leave_id);
            }
            Ok(flagged)
        })?;

        if !flagged.is_empty() {
            warn!(count = flagged.len(), "overstays flagged");
        }
        for &leave_id in &flagged {
            let employee_id = self
                .store()
                .read(|s| s.requests.get(&leave_id).map(|r| r.employee_id))?;
            if let Some(employee_id) = employee_id {
                self.notifier.notify(NotificationIntent {
                    recipient: Recipient::Employee(employee_id),
                    template: TemplateKind::OverstayFlagged,
                    leave_id,
                });
            }
        }
        Ok(flagged)
    }
}

/// At least one working day lies strictly between `end` and `today`: the
/// employee had a duty day and has not confirmed being back.
fn missed_working_day(end: NaiveDate, today: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> bool {
    let mut day = end.succ_opt();
    while let Some(d) = day {
        if d >= today {
            return false;
        }
        if workdays::is_working_day(d, holidays) {
            return true;
        }
        day = d.succ_opt();
    }
    false
}
