use serde::{Deserialize, Serialize};

use crate::model::leave_type::LeaveType;

/// Uniqueness key for a balance row: (employee, type, year).
pub type BalanceKey = (u64, LeaveType, i32);

/// Per-(employee, type, year) leave balance.
///
/// Invariant: `closing == opening + accrued - used`, recomputed after every
/// mutation and never trusted as stale state. `used` is only adjusted via
/// ledger debit/restore. Unpaid types may close negative; `used >= 0` always.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type: LeaveType,
    pub year: i32,
    pub opening: i32,
    pub accrued: i32,
    pub used: i32,
    pub closing: i32,
}

impl Balance {
    pub fn key(&self) -> BalanceKey {
        (self.employee_id, self.leave_type, self.year)
    }

    /// Days still debitable: opening + accrued - used, floored at 0.
    pub fn available(&self) -> i32 {
        (self.opening + self.accrued - self.used).max(0)
    }

    pub fn recompute(&mut self) {
        self.closing = self.opening + self.accrued - self.used;
    }
}
