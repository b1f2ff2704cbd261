//! Policy configuration.
//!
//! One immutable, versioned snapshot of every threshold the policy and
//! conversion engines read. The snapshot is injected into each call (no
//! ambient singleton), and every leave request is stamped with the version
//! active at validation time so later policy changes never reinterpret
//! historical requests.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::model::LeaveType;

/// Per-type thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeavePolicy {
    /// Days credited per year (EARNED accrues monthly instead).
    pub annual_entitlement: u32,
    /// Minimum notice in days; shorter notice is a WARN, never a block.
    pub min_notice_days: u32,
    /// Per-request ceiling of this type's own bucket; beyond it the
    /// conversion engine splits into other buckets.
    pub conversion_cap: Option<u32>,
    /// Hard per-request limit; exceeding it is a REJECT.
    pub max_consecutive_days: Option<u32>,
    /// A certificate reference is required when the request exceeds this
    /// many working days.
    pub certificate_after_days: Option<u32>,
    /// How many days in the past the start date may lie.
    pub backdate_limit_days: u32,
    /// Maximum closing retained across a year boundary; excess overflows.
    pub carry_forward_cap: Option<u32>,
    /// Unpaid buckets admit unlimited debit.
    pub unpaid: bool,
}

/// Immutable policy snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub version: u32,
    pub earned: LeavePolicy,
    pub casual: LeavePolicy,
    pub medical: LeavePolicy,
    pub special: LeavePolicy,
    pub extraordinary: LeavePolicy,
    /// EARNED days credited by the monthly accrual sweep.
    pub earned_monthly_accrual: u32,
    /// Duty-return fitness certificate required for MEDICAL requests
    /// longer than this many working days.
    pub fitness_certificate_after_days: u32,
}

impl PolicyConfig {
    pub fn policy(&self, leave_type: LeaveType) -> &LeavePolicy {
        match leave_type {
            LeaveType::Earned => &self.earned,
            LeaveType::Casual => &self.casual,
            LeaveType::Medical => &self.medical,
            LeaveType::Special => &self.special,
            LeaveType::Extraordinary => &self.extraordinary,
        }
    }

    /// The v1 defaults.
    pub fn v1() -> Self {
        PolicyConfig {
            version: 1,
            earned: LeavePolicy {
                annual_entitlement: 24,
                min_notice_days: 7,
                conversion_cap: None,
                max_consecutive_days: Some(30),
                certificate_after_days: None,
                backdate_limit_days: 0,
                carry_forward_cap: Some(60),
                unpaid: false,
            },
            casual: LeavePolicy {
                annual_entitlement: 10,
                min_notice_days: 1,
                conversion_cap: Some(3),
                max_consecutive_days: Some(10),
                certificate_after_days: None,
                backdate_limit_days: 3,
                // lapses at year end, nothing carries
                carry_forward_cap: Some(0),
                unpaid: false,
            },
            medical: LeavePolicy {
                annual_entitlement: 14,
                min_notice_days: 0,
                conversion_cap: Some(14),
                max_consecutive_days: Some(60),
                certificate_after_days: Some(3),
                backdate_limit_days: 7,
                carry_forward_cap: Some(0),
                unpaid: false,
            },
            special: LeavePolicy {
                // funded only by EARNED overflow
                annual_entitlement: 0,
                min_notice_days: 7,
                conversion_cap: None,
                max_consecutive_days: Some(30),
                certificate_after_days: None,
                backdate_limit_days: 0,
                carry_forward_cap: Some(120),
                unpaid: false,
            },
            extraordinary: LeavePolicy {
                annual_entitlement: 0,
                min_notice_days: 0,
                conversion_cap: None,
                max_consecutive_days: Some(90),
                certificate_after_days: None,
                backdate_limit_days: 7,
                carry_forward_cap: None,
                unpaid: true,
            },
            earned_monthly_accrual: 2,
            fitness_certificate_after_days: 7,
        }
    }
}

/// Shared default snapshot.
pub static POLICY_V1: Lazy<PolicyConfig> = Lazy::new(PolicyConfig::v1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_caps_match_the_ledger_rules() {
        let cfg = PolicyConfig::v1();
        assert_eq!(cfg.earned.carry_forward_cap, Some(60));
        assert_eq!(cfg.special.carry_forward_cap, Some(120));
        assert_eq!(cfg.medical.conversion_cap, Some(14));
        assert_eq!(cfg.casual.conversion_cap, Some(3));
        assert!(cfg.extraordinary.unpaid);
    }

    #[test]
    fn policy_lookup_is_exhaustive() {
        let cfg = &*POLICY_V1;
        assert_eq!(cfg.policy(LeaveType::Medical).annual_entitlement, 14);
        assert_eq!(cfg.policy(LeaveType::Special).annual_entitlement, 0);
    }
}
