use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Actor roles. The requester's role selects the approval-chain variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    DeptHead,
    HrAdmin,
    HrHead,
    Ceo,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Employee),
            2 => Some(Role::DeptHead),
            3 => Some(Role::HrAdmin),
            4 => Some(Role::HrHead),
            5 => Some(Role::Ceo),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_id_maps_known_roles() {
        assert_eq!(Role::from_id(1), Some(Role::Employee));
        assert_eq!(Role::from_id(5), Some(Role::Ceo));
        assert_eq!(Role::from_id(9), None);
    }

    #[test]
    fn serializes_screaming_snake() {
        assert_eq!(Role::DeptHead.to_string(), "DEPT_HEAD");
        assert_eq!(Role::HrAdmin.to_string(), "HR_ADMIN");
    }
}
