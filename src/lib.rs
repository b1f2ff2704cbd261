//! Leave-request lifecycle and approval-workflow engine.
//!
//! The core of an HRM leave module: a state machine governing a request
//! from submission to terminal disposition, a role/type-dependent
//! approval-chain resolver, a per-(employee, type, year) balance ledger
//! with carry-forward overflow and cross-type conversion, and a policy
//! layer gating every mutation. Web routing, auth, notification delivery
//! and real persistence live outside this crate; the engine talks to an
//! in-process transactional store and emits audit records and
//! notification intents at the seams.

pub mod audit;
pub mod chain;
pub mod config;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod policy;
pub mod store;
pub mod workdays;

pub use config::{PolicyConfig, POLICY_V1};
pub use engine::{Action, LeaveEngine, SubmitLeave, SubmitOutcome};
pub use error::{EngineError, EngineResult, ErrorKind};
