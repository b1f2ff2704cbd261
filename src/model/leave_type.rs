use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Closed set of absence categories. Every policy/chain/conversion match
/// over this enum is exhaustive so an unhandled type is a compile error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    Earned,
    Casual,
    Medical,
    Special,
    Extraordinary,
}

impl LeaveType {
    /// Unpaid buckets admit unlimited debit; their closing may go negative
    /// (days taken without pay).
    pub fn is_unpaid(self) -> bool {
        matches!(self, LeaveType::Extraordinary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn display_and_parse_round_trip() {
        assert_eq!(LeaveType::Earned.to_string(), "EARNED");
        assert_eq!(LeaveType::from_str("MEDICAL").unwrap(), LeaveType::Medical);
    }

    #[test]
    fn only_extraordinary_is_unpaid() {
        assert!(LeaveType::Extraordinary.is_unpaid());
        assert!(!LeaveType::Earned.is_unpaid());
        assert!(!LeaveType::Casual.is_unpaid());
    }
}
