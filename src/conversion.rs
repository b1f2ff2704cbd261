//! Leave-type conversion engine.
//!
//! Splits an over-threshold request across balance buckets by fixed
//! priority. Pure: computes a plan, never touches balances. The plan is
//! executed (or recomputed and executed) by the ledger inside the approval
//! transaction.

use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::LeaveType;

/// One slice of the allocation: debit `days` from `leave_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPart {
    pub leave_type: LeaveType,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Ordered by priority; the order is also the debit order.
    pub parts: Vec<AllocationPart>,
    /// True when the request spills outside its own bucket.
    pub converted: bool,
}

impl AllocationPlan {
    pub fn total_days(&self) -> u32 {
        self.parts.iter().map(|p| p.days).sum()
    }
}

/// Bucket priority per requested type, and whether an unpaid
/// EXTRAORDINARY fallback absorbs any shortfall.
fn priority(leave_type: LeaveType) -> (&'static [LeaveType], bool) {
    match leave_type {
        LeaveType::Medical => (
            &[LeaveType::Medical, LeaveType::Earned, LeaveType::Special],
            true,
        ),
        LeaveType::Casual => (&[LeaveType::Casual, LeaveType::Earned], false),
        LeaveType::Earned => (&[LeaveType::Earned], false),
        LeaveType::Special => (&[LeaveType::Special], false),
        // straight to the unpaid bucket
        LeaveType::Extraordinary => (&[], true),
    }
}

/// Greedy allocation of `days` across the priority buckets.
///
/// The requested type's own bucket is capped by its conversion cap; each
/// bucket fills to the lesser of its available balance and the remaining
/// days. A shortfall past the last bucket goes unpaid for types with the
/// EXTRAORDINARY fallback and is `INSUFFICIENT_BALANCE` otherwise.
pub fn plan_allocation(
    cfg: &PolicyConfig,
    employee_id: u64,
    leave_type: LeaveType,
    days: u32,
    available: impl Fn(LeaveType) -> u32,
) -> EngineResult<AllocationPlan> {
    let (buckets, unpaid_fallback) = priority(leave_type);
    let mut remaining = days;
    let mut parts: Vec<AllocationPart> = Vec::new();

    for &bucket in buckets {
        if remaining == 0 {
            break;
        }
        let mut room = available(bucket);
        if bucket == leave_type {
            if let Some(cap) = cfg.policy(leave_type).conversion_cap {
                room = room.min(cap);
            }
        }
        let take = remaining.min(room);
        if take > 0 {
            parts.push(AllocationPart {
                leave_type: bucket,
                days: take,
            });
            remaining -= take;
        }
    }

    if remaining > 0 {
        if unpaid_fallback {
            parts.push(AllocationPart {
                leave_type: LeaveType::Extraordinary,
                days: remaining,
            });
        } else {
            return Err(EngineError::InsufficientBalance {
                employee_id,
                leave_type,
                requested: days,
                available: (days - remaining) as i32,
            });
        }
    }

    let converted = parts.len() > 1 || parts.iter().any(|p| p.leave_type != leave_type);
    Ok(AllocationPlan { parts, converted })
}
