//! Notification intents.
//!
//! The engine emits `{recipient, template, leave_id}` intents on the
//! actor-facing transitions; delivery is someone else's job and its failure
//! is invisible to the engine (intents are handed off only after the store
//! transaction has committed).

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::model::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateKind {
    ApprovalRequested,
    Approved,
    Rejected,
    Returned,
    Recalled,
    CancellationRequested,
    CancellationDecided,
    OverstayFlagged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// A specific user.
    Employee(u64),
    /// Whoever holds the role (the next pending approver).
    Role(Role),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub recipient: Recipient,
    pub template: TemplateKind,
    pub leave_id: u64,
}

/// Fire-and-forget delivery seam.
pub trait Notifier: Send + Sync {
    fn notify(&self, intent: NotificationIntent);
}

/// Drops every intent.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _intent: NotificationIntent) {}
}

/// Collects intents for inspection in tests.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationIntent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<NotificationIntent> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, intent: NotificationIntent) {
        match self.sent.lock() {
            Ok(mut guard) => guard.push(intent),
            Err(poisoned) => poisoned.into_inner().push(intent),
        }
    }
}
