//! Working-days calculator.
//!
//! Inclusive business-day count between two dates. Saturday and Sunday are
//! fixed non-working days; a day also fails to count when it is in the
//! holiday set. All dates in the engine are `NaiveDate` (day precision), so
//! there is no timezone drift to normalize away.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::{EngineError, EngineResult};

/// A day that is neither a weekend day nor a holiday.
pub fn is_working_day(date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !holidays.contains(&date)
}

/// Inclusive count of working days in [start, end].
///
/// Fails with `InvalidRange` when end < start. A range that covers only
/// weekends/holidays yields 0.
pub fn count_working_days(
    start: NaiveDate,
    end: NaiveDate,
    holidays: &BTreeSet<NaiveDate>,
) -> EngineResult<u32> {
    if end < start {
        return Err(EngineError::InvalidRange { start, end });
    }
    let mut count = 0;
    let mut day = start;
    while day <= end {
        if is_working_day(day, holidays) {
            count += 1;
        }
        day = day.succ_opt().ok_or_else(|| EngineError::Internal {
            message: format!("date overflow past {}", day),
        })?;
    }
    Ok(count)
}
