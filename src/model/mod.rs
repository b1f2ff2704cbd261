pub mod approval;
pub mod balance;
pub mod holiday;
pub mod leave_request;
pub mod leave_type;
pub mod role;
pub mod user;

pub use approval::{Approval, ApprovalDecision};
pub use balance::{Balance, BalanceKey};
pub use holiday::Holiday;
pub use leave_request::{LeaveRequest, LeaveStatus};
pub use leave_type::LeaveType;
pub use role::Role;
pub use user::User;
