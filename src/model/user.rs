use serde::{Deserialize, Serialize};

use crate::model::role::Role;

/// Minimal actor record the engine reads: identity, role, active flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub role: Role,
    pub department_id: Option<u64>,
    pub active: bool,
}
