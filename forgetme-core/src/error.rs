use thiserror::Error;

use crate::task::TriggerId;

/// Failures reported by the external notification scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("notification permission not granted")]
    PermissionDenied,
    #[error("scheduler rejected trigger: {0}")]
    Rejected(String),
    #[error("unknown or already delivered trigger: {0}")]
    UnknownTrigger(TriggerId),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(#[from] anyhow::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("migration: {0}")]
    Migration(String),
}

pub type ReminderResult<T> = core::result::Result<T, ReminderError>;

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("task {0} has no reminder")]
    NoReminder(String),
    #[error("reminders require premium")]
    PremiumRequired,
    #[error("snooze must be 1..={max} minutes, got {minutes}")]
    InvalidSnooze { minutes: i64, max: i64 },
    #[error("invalid task name: {0}")]
    InvalidTaskName(String),
    #[error("entitlement: {0}")]
    Entitlement(#[source] anyhow::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}
