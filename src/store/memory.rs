//! In-process transactional store.
//!
//! Stands in for the persistent store the engine is specified against:
//! serializable transactions (one writer at a time, mutate a draft, commit
//! on Ok, discard on Err — zero partial effects), uniqueness on
//! (employee, type, year) balances and (leave, step) approvals via the map
//! keys and step assignment, and an append-only audit log.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::audit::{AuditAction, AuditRecord};
use crate::config::PolicyConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    Approval, ApprovalDecision, Balance, BalanceKey, Holiday, LeaveRequest, LeaveType, Role, User,
};

/// Full store contents. Cloned per transaction; cheap enough at the scale
/// a single engine instance handles.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    next_leave_id: u64,
    next_approval_id: u64,
    next_balance_id: u64,
    pub requests: HashMap<u64, LeaveRequest>,
    /// Chain rows per leave id, ordered by step.
    pub approvals: HashMap<u64, Vec<Approval>>,
    pub balances: HashMap<BalanceKey, Balance>,
    pub holidays: BTreeMap<NaiveDate, Holiday>,
    pub users: HashMap<u64, User>,
    pub audit_log: Vec<AuditRecord>,
}

impl StoreState {
    pub fn user(&self, id: u64) -> EngineResult<&User> {
        self.users.get(&id).ok_or(EngineError::NotFound {
            entity: "user",
            id,
        })
    }

    pub fn request(&self, id: u64) -> EngineResult<&LeaveRequest> {
        self.requests.get(&id).ok_or(EngineError::NotFound {
            entity: "leave request",
            id,
        })
    }

    pub fn request_mut(&mut self, id: u64) -> EngineResult<&mut LeaveRequest> {
        self.requests.get_mut(&id).ok_or(EngineError::NotFound {
            entity: "leave request",
            id,
        })
    }

    pub fn insert_request(&mut self, mut req: LeaveRequest) -> u64 {
        self.next_leave_id += 1;
        req.id = self.next_leave_id;
        let id = req.id;
        self.requests.insert(id, req);
        id
    }

    pub fn approvals_for(&self, leave_id: u64) -> &[Approval] {
        self.approvals.get(&leave_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn current_pending(&self, leave_id: u64) -> Option<&Approval> {
        self.approvals_for(leave_id).iter().find(|a| a.is_pending())
    }

    pub fn current_pending_mut(&mut self, leave_id: u64) -> Option<&mut Approval> {
        self.approvals
            .get_mut(&leave_id)
            .and_then(|rows| rows.iter_mut().find(|a| a.is_pending()))
    }

    /// Appends the next chain step as PENDING. The single-PENDING and
    /// strictly-increasing-step invariants are enforced here.
    pub fn push_approval(&mut self, leave_id: u64, role: Role) -> EngineResult<u32> {
        if self.current_pending(leave_id).is_some() {
            return Err(EngineError::Internal {
                message: format!("leave {} already has a pending approval", leave_id),
            });
        }
        let step = self
            .approvals_for(leave_id)
            .last()
            .map(|a| a.step + 1)
            .unwrap_or(1);
        self.next_approval_id += 1;
        let row = Approval {
            id: self.next_approval_id,
            leave_id,
            step,
            approver_role: role,
            approver_id: None,
            decision: ApprovalDecision::Pending,
            decided_at: None,
            comment: None,
            forwarded_to: None,
        };
        self.approvals.entry(leave_id).or_default().push(row);
        Ok(step)
    }

    /// Replaces the chain with a fresh one starting at step 1. Used on
    /// resubmission and when a cancellation sub-flow opens; superseded rows
    /// survive in the audit log.
    pub fn reset_chain(&mut self, leave_id: u64, first_role: Role) -> EngineResult<u32> {
        self.approvals.remove(&leave_id);
        self.push_approval(leave_id, first_role)
    }

    /// Lazily creates the (employee, type, year) row: opening is the
    /// prior-year carry, and non-accruing paid types start with the full
    /// annual entitlement accrued; EARNED fills via the monthly sweep and
    /// SPECIAL only via overflow.
    pub fn ensure_balance(
        &mut self,
        cfg: &PolicyConfig,
        employee_id: u64,
        leave_type: LeaveType,
        year: i32,
    ) -> &mut Balance {
        let key: BalanceKey = (employee_id, leave_type, year);
        let opening = self.carried_opening(cfg, employee_id, leave_type, year);
        let next_id = &mut self.next_balance_id;
        self.balances.entry(key).or_insert_with(|| {
            *next_id += 1;
            let accrued = match leave_type {
                LeaveType::Casual | LeaveType::Medical => {
                    cfg.policy(leave_type).annual_entitlement as i32
                }
                LeaveType::Earned | LeaveType::Special | LeaveType::Extraordinary => 0,
            };
            let mut b = Balance {
                id: *next_id,
                employee_id,
                leave_type,
                year,
                opening,
                accrued,
                used: 0,
                closing: 0,
            };
            b.recompute();
            b
        })
    }

    /// Opening for a fresh (employee, type, year) row: the prior year's
    /// closing, floored at 0 and clamped to the type's carry-forward cap.
    /// 0 when no prior-year row exists.
    pub fn carried_opening(
        &self,
        cfg: &PolicyConfig,
        employee_id: u64,
        leave_type: LeaveType,
        year: i32,
    ) -> i32 {
        let carry = self
            .balances
            .get(&(employee_id, leave_type, year - 1))
            .map(|prev| prev.closing.max(0))
            .unwrap_or(0);
        match cfg.policy(leave_type).carry_forward_cap {
            Some(cap) => carry.min(cap as i32),
            None => carry,
        }
    }

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn insert_holiday(&mut self, holiday: Holiday) {
        self.holidays.insert(holiday.date, holiday);
    }

    /// Mandatory holiday dates, the calculator's exclusion set.
    pub fn holiday_set(&self) -> BTreeSet<NaiveDate> {
        self.holidays
            .values()
            .filter(|h| h.mandatory)
            .map(|h| h.date)
            .collect()
    }

    pub fn push_audit(&mut self, record: AuditRecord) {
        self.audit_log.push(record);
    }

    /// Idempotence probe for sweeps: has `action` on `target` already been
    /// recorded, optionally for a specific `period` detail.
    pub fn audit_exists(&self, action: AuditAction, target: &str, period: Option<&str>) -> bool {
        self.audit_log.iter().any(|r| {
            r.action == action
                && r.target == target
                && period.is_none_or(|p| r.details.get("period").and_then(|v| v.as_str()) == Some(p))
        })
    }
}

/// Mutex-guarded store. Every transition runs as one serializable unit.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against a draft of the state; commits only on Ok. A failed
    /// transition therefore has zero side effects.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut guard = self.inner.lock().map_err(|_| EngineError::Internal {
            message: "store lock poisoned".into(),
        })?;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }

    /// Read-only access.
    pub fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> EngineResult<T> {
        let guard = self.inner.lock().map_err(|_| EngineError::Internal {
            message: "store lock poisoned".into(),
        })?;
        Ok(f(&guard))
    }
}
