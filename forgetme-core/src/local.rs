//! In-process notification scheduler.
//!
//! Keeps pending triggers in memory and delivers events to subscribers when
//! `fire_due` is called. The CLI persists its state between runs; tests use it
//! to count cancel calls and simulate rejections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::error::SchedulerError;
use crate::scheduler::{
    ActionSpec, NotificationScheduler, PermissionStatus, QuickAction, SchedulerEvent, Subscription,
    TriggerContent,
};
use crate::task::{TriggerId, TriggerMetadata};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTrigger {
    pub id: TriggerId,
    pub at: DateTime<Utc>,
    pub content: TriggerContent,
    pub metadata: TriggerMetadata,
}

/// Serializable part of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSchedulerState {
    pub permission: PermissionStatus,
    /// Answer given to a permission request while undetermined.
    #[serde(default = "default_grant_on_request")]
    pub grant_on_request: bool,
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub pending: Vec<PendingTrigger>,
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<ActionSpec>>,
}

fn default_grant_on_request() -> bool {
    true
}

impl Default for LocalSchedulerState {
    fn default() -> Self {
        Self {
            permission: PermissionStatus::Undetermined,
            grant_on_request: true,
            next_id: 0,
            pending: Vec::new(),
            categories: BTreeMap::new(),
        }
    }
}

#[derive(Default)]
struct Inner {
    state: LocalSchedulerState,
    cancel_calls: Vec<TriggerId>,
    register_calls: usize,
    reject_next: usize,
    subscribers: Vec<(u64, mpsc::UnboundedSender<SchedulerEvent>)>,
    next_subscriber: u64,
}

#[derive(Clone, Default)]
pub struct LocalScheduler {
    inner: Arc<Mutex<Inner>>,
}

impl LocalScheduler {
    pub fn new(permission: PermissionStatus) -> Self {
        Self::from_state(LocalSchedulerState {
            permission,
            ..LocalSchedulerState::default()
        })
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted)
    }

    pub fn from_state(state: LocalSchedulerState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                ..Inner::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> LocalSchedulerState {
        self.lock().state.clone()
    }

    pub fn pending(&self) -> Vec<PendingTrigger> {
        let mut out = self.lock().state.pending.clone();
        out.sort_by_key(|p| p.at);
        out
    }

    pub fn pending_for(&self, task_id: &str) -> Vec<PendingTrigger> {
        self.pending()
            .into_iter()
            .filter(|p| p.metadata.task_id == task_id)
            .collect()
    }

    /// Every cancel call received, including ones for unknown ids.
    pub fn cancel_calls(&self) -> Vec<TriggerId> {
        self.lock().cancel_calls.clone()
    }

    pub fn register_calls(&self) -> usize {
        self.lock().register_calls
    }

    pub fn set_permission(&self, permission: PermissionStatus) {
        self.lock().state.permission = permission;
    }

    pub fn set_grant_on_request(&self, grant: bool) {
        self.lock().state.grant_on_request = grant;
    }

    /// Reject the next `n` schedule calls with `SchedulerError::Rejected`.
    pub fn reject_next(&self, n: usize) {
        self.lock().reject_next = n;
    }

    /// Deliver an event to every live subscriber.
    pub fn emit(&self, event: SchedulerEvent) {
        let mut inner = self.lock();
        inner
            .subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    /// Remove triggers due at `now` and emit one event per trigger.
    ///
    /// With `action` set the events are interactions, otherwise they are
    /// foreground presentations.
    pub fn fire_due(&self, now: DateTime<Utc>, action: Option<QuickAction>) -> Vec<PendingTrigger> {
        let due: Vec<PendingTrigger> = {
            let mut inner = self.lock();
            let (due, keep): (Vec<_>, Vec<_>) =
                inner.state.pending.drain(..).partition(|p| p.at <= now);
            inner.state.pending = keep;
            due
        };

        for p in &due {
            let event = match &action {
                Some(a) => SchedulerEvent::Responded {
                    metadata: p.metadata.clone(),
                    action: a.clone(),
                },
                None => SchedulerEvent::Presented {
                    metadata: p.metadata.clone(),
                },
            };
            self.emit(event);
        }

        tracing::debug!(count = due.len(), "fired due triggers");
        due
    }
}

#[async_trait]
impl NotificationScheduler for LocalScheduler {
    async fn schedule(
        &self,
        at: DateTime<Utc>,
        content: TriggerContent,
        metadata: TriggerMetadata,
    ) -> Result<TriggerId, SchedulerError> {
        let mut inner = self.lock();
        if inner.state.permission != PermissionStatus::Granted {
            return Err(SchedulerError::PermissionDenied);
        }
        if inner.reject_next > 0 {
            inner.reject_next -= 1;
            return Err(SchedulerError::Rejected("simulated rejection".to_string()));
        }

        inner.state.next_id += 1;
        let id = TriggerId(format!("local-{}", inner.state.next_id));
        inner.state.pending.push(PendingTrigger {
            id: id.clone(),
            at,
            content,
            metadata,
        });
        Ok(id)
    }

    async fn cancel(&self, id: &TriggerId) -> Result<(), SchedulerError> {
        let mut inner = self.lock();
        inner.cancel_calls.push(id.clone());
        let before = inner.state.pending.len();
        inner.state.pending.retain(|p| &p.id != id);
        if inner.state.pending.len() == before {
            return Err(SchedulerError::UnknownTrigger(id.clone()));
        }
        Ok(())
    }

    async fn permission_status(&self) -> PermissionStatus {
        self.lock().state.permission
    }

    async fn request_permission(&self) -> PermissionStatus {
        let mut inner = self.lock();
        if inner.state.permission == PermissionStatus::Undetermined {
            inner.state.permission = if inner.state.grant_on_request {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
        }
        inner.state.permission
    }

    async fn register_actions(&self, category: &str, actions: &[ActionSpec]) -> Result<(), SchedulerError> {
        let mut inner = self.lock();
        inner.register_calls += 1;
        inner
            .state
            .categories
            .insert(category.to_string(), actions.to_vec());
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.lock();
            inner.next_subscriber += 1;
            let id = inner.next_subscriber;
            inner.subscribers.push((id, tx));
            id
        };

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(rx, move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                inner.subscribers.retain(|(sid, _)| *sid != id);
            }
        })
    }
}
