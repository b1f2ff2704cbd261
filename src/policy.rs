//! Policy engine.
//!
//! Stateless validators over one immutable [`PolicyConfig`]. A WARN is
//! surfaced to the caller but never blocks; a REJECT aborts the mutation
//! with zero side effects. Every mutating operation validates first.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::config::PolicyConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::LeaveType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    ShortNotice,
}

/// Non-fatal finding surfaced alongside a successful validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyWarning {
    pub kind: WarningKind,
    pub message: String,
}

/// Whether a request of `days` working days needs a certificate reference.
pub fn needs_certificate(cfg: &PolicyConfig, leave_type: LeaveType, days: u32) -> bool {
    match cfg.policy(leave_type).certificate_after_days {
        Some(threshold) => days > threshold,
        None => false,
    }
}

/// Whether the duty-return confirmation needs a fitness certificate.
pub fn needs_fitness_certificate(cfg: &PolicyConfig, leave_type: LeaveType, days: u32) -> bool {
    leave_type == LeaveType::Medical && days > cfg.fitness_certificate_after_days
}

/// A start date may lie at most `backdate_limit_days` in the past.
pub fn within_backdate_limit(
    cfg: &PolicyConfig,
    leave_type: LeaveType,
    today: NaiveDate,
    start: NaiveDate,
) -> bool {
    if start >= today {
        return true;
    }
    let behind = (today - start).num_days();
    behind <= i64::from(cfg.policy(leave_type).backdate_limit_days)
}

/// WARN when the request was lodged with less notice than the type asks for.
/// Backdated starts are handled by the backdate limit, not here.
pub fn notice_warning(
    cfg: &PolicyConfig,
    leave_type: LeaveType,
    apply_date: NaiveDate,
    start: NaiveDate,
) -> Option<PolicyWarning> {
    let min_notice = i64::from(cfg.policy(leave_type).min_notice_days);
    if min_notice == 0 || start < apply_date {
        return None;
    }
    let notice = (start - apply_date).num_days();
    if notice < min_notice {
        Some(PolicyWarning {
            kind: WarningKind::ShortNotice,
            message: format!(
                "{} leave asks for {} days notice, got {}",
                leave_type, min_notice, notice
            ),
        })
    } else {
        None
    }
}

/// Hard per-request limit.
pub fn exceeds_consecutive_cap(cfg: &PolicyConfig, leave_type: LeaveType, days: u32) -> bool {
    match cfg.policy(leave_type).max_consecutive_days {
        Some(cap) => days > cap,
        None => false,
    }
}

/// Full submission gate: REJECT on a broken hard rule, otherwise the list
/// of warnings to surface.
pub fn validate_submission(
    cfg: &PolicyConfig,
    leave_type: LeaveType,
    today: NaiveDate,
    start: NaiveDate,
    working_days: u32,
    certificate_url: Option<&str>,
) -> EngineResult<Vec<PolicyWarning>> {
    if working_days == 0 {
        return Err(EngineError::Validation {
            message: "requested range contains no working days".into(),
        });
    }
    if !within_backdate_limit(cfg, leave_type, today, start) {
        return Err(EngineError::PolicyViolation {
            rule: "BACKDATE_LIMIT",
            message: format!(
                "{} leave may start at most {} days in the past",
                leave_type,
                cfg.policy(leave_type).backdate_limit_days
            ),
        });
    }
    if exceeds_consecutive_cap(cfg, leave_type, working_days) {
        return Err(EngineError::PolicyViolation {
            rule: "CONSECUTIVE_CAP",
            message: format!(
                "{} working days exceeds the {} cap of {} consecutive days",
                working_days,
                leave_type,
                cfg.policy(leave_type)
                    .max_consecutive_days
                    .unwrap_or_default()
            ),
        });
    }
    if needs_certificate(cfg, leave_type, working_days) && certificate_url.is_none() {
        return Err(EngineError::PolicyViolation {
            rule: "CERTIFICATE_REQUIRED",
            message: format!(
                "{} leave over {} days requires a certificate reference",
                leave_type,
                cfg.policy(leave_type)
                    .certificate_after_days
                    .unwrap_or_default()
            ),
        });
    }

    let mut warnings = Vec::new();
    if let Some(w) = notice_warning(cfg, leave_type, today, start) {
        warnings.push(w);
    }
    Ok(warnings)
}
