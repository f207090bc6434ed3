//! Notification registry: the durable per-task record of outstanding trigger
//! ids (`Reminder::notif_map`), kept in step with the external scheduler.
//!
//! Cancellation is best-effort and idempotent. A failed cancel (already
//! delivered, unknown id) is logged and swallowed.

use chrono::{DateTime, Utc};

use crate::error::SchedulerError;
use crate::reminders::ChainPlan;
use crate::scheduler::{NotificationScheduler, TriggerContent};
use crate::task::{Reminder, TriggerId, TriggerMetadata};
use crate::time::DateKey;

/// Result of registering a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainReport {
    /// Instants that were accepted by the scheduler.
    pub scheduled: Vec<DateTime<Utc>>,
    /// Individual schedule calls that failed.
    pub failed: usize,
    /// Permission was revoked mid-chain; the remainder was not attempted.
    pub aborted: bool,
}

impl ChainReport {
    pub fn is_partial(&self) -> bool {
        self.failed > 0 || self.aborted
    }
}

pub struct NotificationRegistry<'a> {
    scheduler: &'a dyn NotificationScheduler,
    ceiling: usize,
}

impl<'a> NotificationRegistry<'a> {
    pub fn new(scheduler: &'a dyn NotificationScheduler, ceiling: usize) -> Self {
        Self { scheduler, ceiling }
    }

    pub async fn schedule_at(
        &self,
        at: DateTime<Utc>,
        content: TriggerContent,
        metadata: TriggerMetadata,
    ) -> Result<TriggerId, SchedulerError> {
        let id = self.scheduler.schedule(at, content, metadata).await?;
        tracing::debug!(trigger = %id, at = %at, "scheduled trigger");
        Ok(id)
    }

    pub async fn cancel(&self, id: &TriggerId) {
        if let Err(e) = self.scheduler.cancel(id).await {
            tracing::debug!(trigger = %id, error = %e, "cancel was a no-op");
        }
    }

    /// Cancel every id the reminder holds, legacy ones included.
    /// Returns how many cancel calls were issued.
    pub async fn cancel_all_for_task(&self, reminder: &mut Reminder) -> usize {
        let mut ids: Vec<TriggerId> = std::mem::take(&mut reminder.legacy_ids);
        for (_, day_ids) in std::mem::take(&mut reminder.notif_map) {
            ids.extend(day_ids);
        }

        for id in &ids {
            self.cancel(id).await;
        }
        ids.len()
    }

    /// Cancel only the ids under `key`; other dates are untouched.
    pub async fn cancel_date(&self, reminder: &mut Reminder, key: DateKey) -> usize {
        let ids = reminder.notif_map.remove(&key).unwrap_or_default();
        for id in &ids {
            self.cancel(id).await;
        }
        ids.len()
    }

    /// Register every planned trigger, recording accepted ids in `notif_map`.
    ///
    /// A rejected trigger is skipped and the rest of the chain still goes
    /// through. Nothing already scheduled is rolled back.
    pub async fn register_chain(
        &self,
        reminder: &mut Reminder,
        plan: &ChainPlan,
        content: &TriggerContent,
    ) -> ChainReport {
        let mut report = ChainReport::default();

        for trigger in &plan.triggers {
            if reminder.outstanding() >= self.ceiling {
                tracing::warn!(ceiling = self.ceiling, "trigger ceiling reached, chain truncated");
                break;
            }

            match self
                .schedule_at(trigger.at, content.clone(), trigger.metadata.clone())
                .await
            {
                Ok(id) => {
                    reminder
                        .notif_map
                        .entry(trigger.metadata.date_key)
                        .or_default()
                        .push(id);
                    report.scheduled.push(trigger.at);
                }
                Err(SchedulerError::PermissionDenied) => {
                    tracing::warn!(task = %trigger.metadata.task_id, "permission lost mid-chain");
                    report.failed += 1;
                    report.aborted = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        task = %trigger.metadata.task_id,
                        date = %trigger.metadata.date_key,
                        error = %e,
                        "scheduling trigger failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}
