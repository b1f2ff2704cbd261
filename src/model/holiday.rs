use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Calendar holiday, read-only input to the working-days calculator.
/// Only mandatory holidays exclude a day from the working count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    pub mandatory: bool,
}
