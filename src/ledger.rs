//! Balance ledger.
//!
//! Debit, restore and accrual against the per-(employee, type, year) rows,
//! plus the EARNED carry-forward overflow into SPECIAL. `closing` is
//! recomputed unconditionally after every mutation; `used` is only ever
//! adjusted here.

use serde::Serialize;
use tracing::info;

use crate::config::PolicyConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{Balance, LeaveType};
use crate::store::StoreState;

/// Result of an EARNED overflow check, with the before/after snapshots the
/// audit record wants.
#[derive(Debug, Clone, Serialize)]
pub struct OverflowOutcome {
    pub employee_id: u64,
    pub year: i32,
    /// False when SPECIAL had no headroom and the excess stayed in EARNED.
    pub overflow_applied: bool,
    pub moved_days: u32,
    pub special_headroom: u32,
    pub earned_before: Balance,
    pub earned_after: Balance,
    pub special_before: Balance,
    pub special_after: Balance,
}

/// Days currently debitable from a bucket, accounting for the lazy
/// creation defaults (prior-year carry plus entitlement accrual) when no
/// row exists yet. Read-only: never inserts a row.
pub fn available(
    state: &StoreState,
    cfg: &PolicyConfig,
    employee_id: u64,
    leave_type: LeaveType,
    year: i32,
) -> u32 {
    match state.balances.get(&(employee_id, leave_type, year)) {
        Some(b) => b.available() as u32,
        None => {
            let carried = state.carried_opening(cfg, employee_id, leave_type, year);
            let accrued = match leave_type {
                LeaveType::Casual | LeaveType::Medical => {
                    cfg.policy(leave_type).annual_entitlement as i32
                }
                LeaveType::Earned | LeaveType::Special | LeaveType::Extraordinary => 0,
            };
            (carried + accrued).max(0) as u32
        }
    }
}

/// Debits `days` from the bucket. Paid buckets fail with
/// `INSUFFICIENT_BALANCE` when used + days would exceed opening + accrued;
/// the unpaid bucket takes any amount.
pub fn debit(
    state: &mut StoreState,
    cfg: &PolicyConfig,
    employee_id: u64,
    leave_type: LeaveType,
    year: i32,
    days: u32,
) -> EngineResult<()> {
    let unpaid = cfg.policy(leave_type).unpaid;
    let balance = state.ensure_balance(cfg, employee_id, leave_type, year);
    let days_i = days as i32;
    if !unpaid && balance.used + days_i > balance.opening + balance.accrued {
        return Err(EngineError::InsufficientBalance {
            employee_id,
            leave_type,
            requested: days,
            available: balance.available(),
        });
    }
    balance.used += days_i;
    balance.recompute();
    info!(employee_id, %leave_type, year, days, closing = balance.closing, "ledger debit");
    Ok(())
}

/// Returns `days` to the bucket, flooring `used` at 0.
pub fn restore(
    state: &mut StoreState,
    cfg: &PolicyConfig,
    employee_id: u64,
    leave_type: LeaveType,
    year: i32,
    days: u32,
) -> EngineResult<()> {
    let balance = state.ensure_balance(cfg, employee_id, leave_type, year);
    balance.used = (balance.used - days as i32).max(0);
    balance.recompute();
    info!(employee_id, %leave_type, year, days, closing = balance.closing, "ledger restore");
    Ok(())
}

/// Credits accrual days.
pub fn accrue(
    state: &mut StoreState,
    cfg: &PolicyConfig,
    employee_id: u64,
    leave_type: LeaveType,
    year: i32,
    days: u32,
) -> EngineResult<()> {
    let balance = state.ensure_balance(cfg, employee_id, leave_type, year);
    balance.accrued += days as i32;
    balance.recompute();
    Ok(())
}

/// Year-end lapse for non-carrying types: drops a positive closing to 0 by
/// reversing the unconsumed accrual. Returns the lapsed day count.
pub fn lapse(
    state: &mut StoreState,
    cfg: &PolicyConfig,
    employee_id: u64,
    leave_type: LeaveType,
    year: i32,
) -> EngineResult<u32> {
    let balance = state.ensure_balance(cfg, employee_id, leave_type, year);
    let lapsed = balance.closing.max(0);
    if lapsed > 0 {
        balance.accrued -= lapsed;
        balance.recompute();
        info!(employee_id, %leave_type, year, lapsed, "year-end lapse");
    }
    Ok(lapsed as u32)
}

/// After any EARNED mutation that can raise its closing: moves the excess
/// over the carry-forward cap into SPECIAL.accrued, up to SPECIAL's
/// remaining headroom. Whatever SPECIAL cannot take stays in EARNED — no
/// silent loss. Returns None when EARNED is within its cap.
pub fn apply_earned_overflow(
    state: &mut StoreState,
    cfg: &PolicyConfig,
    employee_id: u64,
    year: i32,
) -> EngineResult<Option<OverflowOutcome>> {
    let earned_cap = match cfg.earned.carry_forward_cap {
        Some(cap) => cap as i32,
        None => return Ok(None),
    };
    let special_cap = cfg.special.carry_forward_cap.unwrap_or(0) as i32;

    let earned_before = state
        .ensure_balance(cfg, employee_id, LeaveType::Earned, year)
        .clone();
    if earned_before.closing <= earned_cap {
        return Ok(None);
    }
    let excess = earned_before.closing - earned_cap;

    let special_before = state
        .ensure_balance(cfg, employee_id, LeaveType::Special, year)
        .clone();
    let headroom = (special_cap - special_before.closing).max(0);
    let moved = excess.min(headroom);

    if moved > 0 {
        let special = state.ensure_balance(cfg, employee_id, LeaveType::Special, year);
        special.accrued += moved;
        special.recompute();
        let earned = state.ensure_balance(cfg, employee_id, LeaveType::Earned, year);
        earned.accrued -= moved;
        earned.recompute();
    }

    let earned_after = state
        .ensure_balance(cfg, employee_id, LeaveType::Earned, year)
        .clone();
    let special_after = state
        .ensure_balance(cfg, employee_id, LeaveType::Special, year)
        .clone();

    info!(
        employee_id,
        year,
        excess,
        moved,
        headroom,
        "earned overflow check"
    );

    Ok(Some(OverflowOutcome {
        employee_id,
        year,
        overflow_applied: moved > 0,
        moved_days: moved as u32,
        special_headroom: headroom as u32,
        earned_before,
        earned_after,
        special_before,
        special_after,
    }))
}
