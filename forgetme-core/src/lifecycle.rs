//! Reminder lifecycle controller.
//!
//! Per-task states: NoReminder -> Scheduled <-> PartiallyStopped -> NoReminder.
//!
//! Every transition borrows the `TaskStore` mutably for its whole duration,
//! so two transitions never interleave. Old triggers are always fully
//! cancelled before new ones are built, and the stored task is replaced only
//! after the scheduler calls have settled. Chains are rebuilt from scratch,
//! never patched.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::entitlement::Entitlement;
use crate::error::{ReminderError, ReminderResult};
use crate::registry::{ChainReport, NotificationRegistry};
use crate::reminders::{ReminderPolicy, build_chain, build_snooze_chain};
use crate::scheduler::{PermissionStatus, SchedulerSession, TriggerContent};
use crate::store::TaskStore;
use crate::task::{Reminder, ReminderDraft, Task, normalize_task_name};
use crate::time::{DateKey, Day};

/// Result of a transition that (re)arms triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled(ChainReport),
    /// Nothing was registered; the reminder stays saved but unscheduled.
    PermissionDenied,
}

impl ScheduleOutcome {
    pub fn scheduled_count(&self) -> usize {
        match self {
            ScheduleOutcome::Scheduled(report) => report.scheduled.len(),
            ScheduleOutcome::PermissionDenied => 0,
        }
    }
}

pub struct ReminderController {
    session: SchedulerSession,
    clock: Arc<dyn Clock>,
    tz: Tz,
    policy: ReminderPolicy,
}

impl ReminderController {
    pub fn new(session: SchedulerSession, clock: Arc<dyn Clock>, tz: Tz, policy: ReminderPolicy) -> Self {
        Self {
            session,
            clock,
            tz,
            policy,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> DateKey {
        DateKey::of(self.now(), self.tz)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    pub fn session(&self) -> &SchedulerSession {
        &self.session
    }

    fn registry(&self) -> NotificationRegistry<'_> {
        NotificationRegistry::new(self.session.scheduler(), self.policy.trigger_ceiling)
    }

    pub async fn add_task(
        &self,
        store: &mut TaskStore,
        name: &str,
        days: impl IntoIterator<Item = Day>,
    ) -> ReminderResult<String> {
        let name = normalize_task_name(name)?;
        let task = Task::new(Uuid::new_v4().to_string(), name).with_days(days);
        let id = task.id.clone();
        store.insert(task);
        store.save().await?;
        tracing::info!(task = %id, "task added");
        Ok(id)
    }

    /// Flip the done flag for `key`. Only today may change; any other date is
    /// a no-op and yields `None`.
    ///
    /// Marking done stops today's chain. Un-marking does not re-arm it.
    pub async fn toggle_done(
        &self,
        store: &mut TaskStore,
        task_id: &str,
        key: DateKey,
    ) -> ReminderResult<Option<bool>> {
        let mut task = find(store, task_id)?;
        let today = self.today();
        if key != today {
            tracing::debug!(task = %task_id, date = %key, "toggle ignored for non-today date");
            return Ok(None);
        }

        let done = !task.is_done_on(today);
        task.done.insert(today, done);
        if done {
            if let Some(reminder) = task.reminder.as_mut() {
                let cancelled = self.stop_day(reminder, today).await;
                tracing::info!(task = %task_id, date = %today, cancelled, "done: today's chain stopped");
            }
        }

        store.replace(task);
        store.save().await?;
        Ok(Some(done))
    }

    /// Cancel every trigger for the task, then remove it.
    pub async fn delete_task(&self, store: &mut TaskStore, task_id: &str) -> ReminderResult<usize> {
        let mut task = find(store, task_id)?;
        let cancelled = match task.reminder.as_mut() {
            Some(reminder) => self.registry().cancel_all_for_task(reminder).await,
            None => 0,
        };

        store.remove(task_id);
        store.save().await?;
        tracing::info!(task = %task_id, cancelled, "task deleted");
        Ok(cancelled)
    }

    /// Create or replace the task's reminder and arm a fresh chain.
    pub async fn set_reminder(
        &self,
        store: &mut TaskStore,
        task_id: &str,
        draft: ReminderDraft,
    ) -> ReminderResult<ScheduleOutcome> {
        if !store.is_premium() {
            return Err(ReminderError::PremiumRequired);
        }
        let mut task = find(store, task_id)?;
        let today = self.today();

        let mut prior_stopped = BTreeSet::new();
        if let Some(mut old) = task.reminder.take() {
            let cancelled = self.registry().cancel_all_for_task(&mut old).await;
            tracing::debug!(task = %task_id, cancelled, "previous chain cancelled");
            prior_stopped = old.stopped_dates;
        }

        let mut reminder = Reminder::from_draft(draft);
        reminder.stopped_dates = carried_stops(prior_stopped, &task, today);

        let outcome = self.arm(&task, &mut reminder).await;
        tracing::info!(
            task = %task_id,
            time = %reminder.time,
            repeat = ?reminder.repeat_interval(),
            scheduled = outcome.scheduled_count(),
            "reminder set"
        );

        task.reminder = Some(reminder);
        store.replace(task);
        store.save().await?;
        Ok(outcome)
    }

    /// Cancel everything and drop the reminder.
    pub async fn remove_reminder(&self, store: &mut TaskStore, task_id: &str) -> ReminderResult<usize> {
        let mut task = find(store, task_id)?;
        let Some(mut reminder) = task.reminder.take() else {
            return Ok(0);
        };
        let cancelled = self.registry().cancel_all_for_task(&mut reminder).await;

        store.replace(task);
        store.save().await?;
        tracing::info!(task = %task_id, cancelled, "reminder removed");
        Ok(cancelled)
    }

    /// Cancel today's chain only and mark today stopped.
    pub async fn stop_today(&self, store: &mut TaskStore, task_id: &str) -> ReminderResult<usize> {
        let mut task = find(store, task_id)?;
        let today = self.today();
        let reminder = task
            .reminder
            .as_mut()
            .ok_or_else(|| ReminderError::NoReminder(task_id.to_string()))?;
        let cancelled = self.stop_day(reminder, today).await;

        store.replace(task);
        store.save().await?;
        tracing::info!(task = %task_id, date = %today, cancelled, "stopped for today");
        Ok(cancelled)
    }

    /// Replace today's chain with a fresh one starting `minutes` from now.
    /// Clears today's stop. `minutes` must be within `1..=MAX_SNOOZE_MINUTES`.
    pub async fn snooze(
        &self,
        store: &mut TaskStore,
        task_id: &str,
        minutes: i64,
    ) -> ReminderResult<ScheduleOutcome> {
        let now = self.now();
        let start = snooze_start(now, minutes)?;
        let mut task = find(store, task_id)?;
        let mut reminder = task
            .reminder
            .take()
            .ok_or_else(|| ReminderError::NoReminder(task_id.to_string()))?;
        let today = self.today();

        self.registry().cancel_date(&mut reminder, today).await;
        reminder.stopped_dates.remove(&today);

        let outcome = if self.ready_to_schedule().await {
            let budget = self.budget(&reminder);
            let plan = build_snooze_chain(&task, &reminder, start, budget, now, self.tz, &self.policy);
            let content = TriggerContent::for_task(&task, reminder.mode);
            ScheduleOutcome::Scheduled(self.registry().register_chain(&mut reminder, &plan, &content).await)
        } else {
            ScheduleOutcome::PermissionDenied
        };
        tracing::info!(task = %task_id, minutes, scheduled = outcome.scheduled_count(), "snoozed");

        task.reminder = Some(reminder);
        store.replace(task);
        store.save().await?;
        Ok(outcome)
    }

    /// Premium lost: tear down every reminder, one task at a time.
    pub async fn revoke_premium(&self, store: &mut TaskStore) -> ReminderResult<usize> {
        let ids: Vec<String> = store
            .tasks()
            .iter()
            .filter(|t| t.reminder.is_some())
            .map(|t| t.id.clone())
            .collect();

        let mut cancelled = 0;
        for id in ids {
            let Some(mut task) = store.get(&id).cloned() else {
                continue;
            };
            if let Some(mut reminder) = task.reminder.take() {
                cancelled += self.registry().cancel_all_for_task(&mut reminder).await;
            }
            store.replace(task);
        }

        store.set_premium(false).await?;
        store.save().await?;
        tracing::info!(cancelled, "premium revoked, all reminders removed");
        Ok(cancelled)
    }

    pub async fn upgrade(&self, store: &mut TaskStore, entitlement: &dyn Entitlement) -> ReminderResult<bool> {
        let granted = entitlement.upgrade().await.map_err(ReminderError::Entitlement)?;
        if granted {
            store.set_premium(true).await?;
        }
        Ok(granted)
    }

    pub async fn restore(&self, store: &mut TaskStore, entitlement: &dyn Entitlement) -> ReminderResult<bool> {
        let granted = entitlement.restore().await.map_err(ReminderError::Entitlement)?;
        if granted {
            store.set_premium(true).await?;
        }
        Ok(granted)
    }

    /// Startup reconciliation: rebuild every reminder from its definition so
    /// the bounded lookahead stays topped up. Returns tasks rebuilt.
    pub async fn refresh_all(&self, store: &mut TaskStore) -> ReminderResult<usize> {
        if !store.is_premium() {
            if store.tasks().iter().any(|t| t.reminder.is_some()) {
                self.revoke_premium(store).await?;
            }
            return Ok(0);
        }

        let today = self.today();
        let ids: Vec<String> = store
            .tasks()
            .iter()
            .filter(|t| t.reminder.is_some())
            .map(|t| t.id.clone())
            .collect();

        let mut rebuilt = 0;
        for id in ids {
            let Some(mut task) = store.get(&id).cloned() else {
                continue;
            };
            let Some(mut reminder) = task.reminder.take() else {
                continue;
            };
            self.registry().cancel_all_for_task(&mut reminder).await;
            reminder.stopped_dates.retain(|d| *d >= today);

            self.arm(&task, &mut reminder).await;
            task.reminder = Some(reminder);
            store.replace(task);
            rebuilt += 1;
        }

        store.save().await?;
        tracing::info!(rebuilt, "reminders refreshed");
        Ok(rebuilt)
    }

    /// Run `refresh_all` at most once per local day. Returns `None` when
    /// today's refresh already happened.
    pub async fn reconcile(&self, store: &mut TaskStore) -> ReminderResult<Option<usize>> {
        let today = self.today();
        if store.last_refresh() == Some(today) {
            return Ok(None);
        }
        let rebuilt = self.refresh_all(store).await?;
        store.set_last_refresh(today).await?;
        Ok(Some(rebuilt))
    }

    /// Build + register a full chain into `reminder`.
    async fn arm(&self, task: &Task, reminder: &mut Reminder) -> ScheduleOutcome {
        if !self.ready_to_schedule().await {
            return ScheduleOutcome::PermissionDenied;
        }

        let budget = self.budget(reminder);
        let plan = build_chain(task, reminder, budget, self.now(), self.tz, &self.policy);
        if plan.is_empty() {
            tracing::info!(task = %task.id, "no upcoming occurrences");
        }
        let content = TriggerContent::for_task(task, reminder.mode);
        ScheduleOutcome::Scheduled(self.registry().register_chain(reminder, &plan, &content).await)
    }

    async fn ready_to_schedule(&self) -> bool {
        match self.session.ensure_permission().await {
            PermissionStatus::Granted => {
                self.session.ensure_actions_registered().await;
                true
            }
            status => {
                tracing::warn!(?status, "notification permission not granted");
                false
            }
        }
    }

    async fn stop_day(&self, reminder: &mut Reminder, key: DateKey) -> usize {
        let cancelled = self.registry().cancel_date(reminder, key).await;
        reminder.stopped_dates.insert(key);
        cancelled
    }

    fn budget(&self, reminder: &Reminder) -> usize {
        self.policy.trigger_ceiling.saturating_sub(reminder.outstanding())
    }
}

pub const MAX_SNOOZE_MINUTES: i64 = 24 * 60;

fn snooze_start(now: DateTime<Utc>, minutes: i64) -> ReminderResult<DateTime<Utc>> {
    let invalid = || ReminderError::InvalidSnooze {
        minutes,
        max: MAX_SNOOZE_MINUTES,
    };
    if !(1..=MAX_SNOOZE_MINUTES).contains(&minutes) {
        return Err(invalid());
    }
    Duration::try_minutes(minutes)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(invalid)
}

fn find(store: &TaskStore, task_id: &str) -> ReminderResult<Task> {
    store
        .get(task_id)
        .cloned()
        .ok_or_else(|| ReminderError::TaskNotFound(task_id.to_string()))
}

/// An edit re-arms today unless the task is done today. Past stops are dropped.
fn carried_stops(prior: BTreeSet<DateKey>, task: &Task, today: DateKey) -> BTreeSet<DateKey> {
    prior
        .into_iter()
        .filter(|d| *d == today && task.is_done_on(today))
        .collect()
}
