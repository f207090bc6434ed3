//! Boundary with the external notification scheduler.
//!
//! The scheduler fires callbacks at given instants and supports cancellation
//! by opaque id. Inbound events (fired while foregrounded, user interacted)
//! are delivered through a `Subscription`; dropping it unsubscribes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::error::SchedulerError;
use crate::task::{ReminderMode, Task, TriggerId, TriggerMetadata};

/// Category every reminder trigger is filed under; owns the quick actions.
pub const REMINDER_CATEGORY: &str = "task-reminder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// What the user sees when a trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContent {
    pub title: String,
    pub body: String,
    pub sound: bool,
    pub category: String,
}

impl TriggerContent {
    pub fn for_task(task: &Task, mode: ReminderMode) -> Self {
        Self {
            title: "Reminder".to_string(),
            body: task.name.clone(),
            sound: mode == ReminderMode::Alarm,
            category: REMINDER_CATEGORY.to_string(),
        }
    }
}

/// Interaction identifiers carried by "user interacted" events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuickAction {
    DefaultTap,
    Snooze5,
    Snooze15,
    StopToday,
    Unrecognized(String),
}

impl QuickAction {
    pub fn id(&self) -> &str {
        match self {
            QuickAction::DefaultTap => "default-tap",
            QuickAction::Snooze5 => "snooze-5",
            QuickAction::Snooze15 => "snooze-15",
            QuickAction::StopToday => "stop-today",
            QuickAction::Unrecognized(raw) => raw,
        }
    }

    pub fn snooze_minutes(&self) -> Option<i64> {
        match self {
            QuickAction::Snooze5 => Some(5),
            QuickAction::Snooze15 => Some(15),
            _ => None,
        }
    }
}

impl From<&str> for QuickAction {
    fn from(s: &str) -> Self {
        match s.trim() {
            "default-tap" => QuickAction::DefaultTap,
            "snooze-5" => QuickAction::Snooze5,
            "snooze-15" => QuickAction::Snooze15,
            "stop-today" => QuickAction::StopToday,
            other => QuickAction::Unrecognized(other.to_string()),
        }
    }
}

impl FromStr for QuickAction {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(QuickAction::from(s))
    }
}

impl fmt::Display for QuickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// An interactive action button registered with the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub id: String,
    pub title: String,
}

/// Buttons offered on every reminder.
pub fn reminder_actions() -> Vec<ActionSpec> {
    [
        (QuickAction::Snooze5, "Snooze 5 min"),
        (QuickAction::Snooze15, "Snooze 15 min"),
        (QuickAction::StopToday, "Stop for today"),
    ]
    .into_iter()
    .map(|(action, title)| ActionSpec {
        id: action.id().to_string(),
        title: title.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A trigger fired while the app was in the foreground.
    Presented { metadata: TriggerMetadata },
    /// The user interacted with a delivered notification.
    Responded {
        metadata: TriggerMetadata,
        action: QuickAction,
    },
}

impl SchedulerEvent {
    pub fn metadata(&self) -> &TriggerMetadata {
        match self {
            SchedulerEvent::Presented { metadata } | SchedulerEvent::Responded { metadata, .. } => {
                metadata
            }
        }
    }
}

/// Receiving end of inbound scheduler events. Dropping it unsubscribes.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SchedulerEvent>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<SchedulerEvent>,
        on_drop: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            on_drop: Some(Box::new(on_drop)),
        }
    }

    pub async fn recv(&mut self) -> Option<SchedulerEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SchedulerEvent> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    /// Register a trigger; fails if permission is not granted.
    async fn schedule(
        &self,
        at: DateTime<Utc>,
        content: TriggerContent,
        metadata: TriggerMetadata,
    ) -> Result<TriggerId, SchedulerError>;

    async fn cancel(&self, id: &TriggerId) -> Result<(), SchedulerError>;

    async fn permission_status(&self) -> PermissionStatus;

    async fn request_permission(&self) -> PermissionStatus;

    /// Idempotent.
    async fn register_actions(&self, category: &str, actions: &[ActionSpec]) -> Result<(), SchedulerError>;

    fn subscribe(&self) -> Subscription;
}

/// Process-wide handle on the scheduler, constructed once at startup.
#[derive(Clone)]
pub struct SchedulerSession {
    scheduler: Arc<dyn NotificationScheduler>,
    actions_registered: Arc<AtomicBool>,
}

impl SchedulerSession {
    pub fn new(scheduler: Arc<dyn NotificationScheduler>) -> Self {
        Self {
            scheduler,
            actions_registered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn scheduler(&self) -> &dyn NotificationScheduler {
        self.scheduler.as_ref()
    }

    /// Registers the quick actions once per session; later calls are no-ops.
    pub async fn ensure_actions_registered(&self) {
        if self.actions_registered.load(Ordering::Acquire) {
            return;
        }
        match self
            .scheduler
            .register_actions(REMINDER_CATEGORY, &reminder_actions())
            .await
        {
            Ok(()) => self.actions_registered.store(true, Ordering::Release),
            Err(e) => tracing::warn!(error = %e, "registering reminder actions failed"),
        }
    }

    /// Current permission, asking once if it has never been decided.
    pub async fn ensure_permission(&self) -> PermissionStatus {
        match self.scheduler.permission_status().await {
            PermissionStatus::Undetermined => self.scheduler.request_permission().await,
            status => status,
        }
    }

    pub fn subscribe(&self) -> Subscription {
        self.scheduler.subscribe()
    }
}

impl fmt::Debug for SchedulerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerSession")
            .field("actions_registered", &self.actions_registered.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
