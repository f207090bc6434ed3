//! Quick-action dispatch: the single subscriber to inbound scheduler events.
//!
//! Translates notification interactions into lifecycle transitions. Some
//! delivery paths report one interaction twice (received + responded), so
//! after any dispatched action further events are ignored until
//! `suppress_until`.

use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;

use crate::error::ReminderResult;
use crate::lifecycle::{ReminderController, ScheduleOutcome};
use crate::scheduler::{QuickAction, SchedulerEvent, Subscription};
use crate::store::TaskStore;
use crate::task::TriggerMetadata;
use crate::time::DateKey;

pub const DEFAULT_DEBOUNCE_MS: i64 = 1500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    Debounced,
    UnknownTask,
    NoReminder,
    /// The date was stopped; the trigger fired before its cancel landed.
    StoppedDate,
    /// Acted on after local midnight; stop and snooze only apply to today.
    PastDate,
    UnrecognizedAction(String),
}

/// Options offered by the interactive selector a default tap opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorChoice {
    Stop,
    Snooze5,
    Snooze15,
}

impl SelectorChoice {
    pub const ALL: [SelectorChoice; 3] = [SelectorChoice::Stop, SelectorChoice::Snooze5, SelectorChoice::Snooze15];

    pub fn label(&self) -> &'static str {
        match self {
            SelectorChoice::Stop => "Stop",
            SelectorChoice::Snooze5 => "Snooze 5",
            SelectorChoice::Snooze15 => "Snooze 15",
        }
    }

    fn action(&self) -> QuickAction {
        match self {
            SelectorChoice::Stop => QuickAction::StopToday,
            SelectorChoice::Snooze5 => QuickAction::Snooze5,
            SelectorChoice::Snooze15 => QuickAction::Snooze15,
        }
    }
}

impl FromStr for SelectorChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(SelectorChoice::Stop),
            "snooze-5" | "snooze5" => Ok(SelectorChoice::Snooze5),
            "snooze-15" | "snooze15" => Ok(SelectorChoice::Snooze15),
            other => anyhow::bail!("unknown selector choice: {other} (stop, snooze-5, snooze-15)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dropped(DropReason),
    /// The UI should offer `SelectorChoice::ALL` for this trigger.
    SelectorOpened(TriggerMetadata),
    Snoozed {
        task_id: String,
        minutes: i64,
        outcome: ScheduleOutcome,
    },
    Stopped {
        task_id: String,
        cancelled: usize,
    },
}

#[derive(Debug, Clone)]
pub struct QuickActionDispatcher {
    debounce: Duration,
    suppress_until: Option<DateTime<Utc>>,
}

impl Default for QuickActionDispatcher {
    fn default() -> Self {
        Self::new(Duration::milliseconds(DEFAULT_DEBOUNCE_MS))
    }
}

impl QuickActionDispatcher {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            suppress_until: None,
        }
    }

    pub fn suppress_until(&self) -> Option<DateTime<Utc>> {
        self.suppress_until
    }

    pub async fn dispatch(
        &mut self,
        controller: &ReminderController,
        store: &mut TaskStore,
        event: SchedulerEvent,
    ) -> ReminderResult<DispatchOutcome> {
        let now = controller.now();
        if self.suppress_until.is_some_and(|until| now < until) {
            tracing::debug!(task = %event.metadata().task_id, "event inside debounce window");
            return Ok(DispatchOutcome::Dropped(DropReason::Debounced));
        }

        let (metadata, action) = match event {
            SchedulerEvent::Presented { metadata } => (metadata, QuickAction::DefaultTap),
            SchedulerEvent::Responded { metadata, action } => (metadata, action),
        };

        if let QuickAction::Unrecognized(raw) = &action {
            tracing::debug!(action = %raw, "unrecognized quick action");
            return Ok(DispatchOutcome::Dropped(DropReason::UnrecognizedAction(raw.clone())));
        }
        if let Some(reason) = stale(store, &metadata, controller.today()) {
            tracing::debug!(task = %metadata.task_id, date = %metadata.date_key, ?reason, "stale event dropped");
            return Ok(DispatchOutcome::Dropped(reason));
        }

        self.suppress_until = Some(now + self.debounce);
        self.perform(controller, store, metadata, action).await
    }

    /// Apply the user's pick from the selector. Not debounced, since it is a
    /// deliberate in-app choice, but still refuses stale context.
    pub async fn choose(
        &mut self,
        controller: &ReminderController,
        store: &mut TaskStore,
        metadata: TriggerMetadata,
        choice: SelectorChoice,
    ) -> ReminderResult<DispatchOutcome> {
        if let Some(reason) = stale(store, &metadata, controller.today()) {
            return Ok(DispatchOutcome::Dropped(reason));
        }
        self.suppress_until = Some(controller.now() + self.debounce);
        self.perform(controller, store, metadata, choice.action()).await
    }

    /// Handle every event already queued on `subscription` without waiting.
    pub async fn drain(
        &mut self,
        controller: &ReminderController,
        store: &mut TaskStore,
        subscription: &mut Subscription,
    ) -> ReminderResult<Vec<DispatchOutcome>> {
        let mut out = Vec::new();
        while let Some(event) = subscription.try_recv() {
            out.push(self.dispatch(controller, store, event).await?);
        }
        Ok(out)
    }

    /// Handle events until the scheduler closes the subscription.
    pub async fn run(
        &mut self,
        controller: &ReminderController,
        store: &mut TaskStore,
        mut subscription: Subscription,
    ) -> ReminderResult<()> {
        while let Some(event) = subscription.recv().await {
            let outcome = self.dispatch(controller, store, event).await?;
            tracing::debug!(?outcome, "dispatched");
        }
        Ok(())
    }

    async fn perform(
        &mut self,
        controller: &ReminderController,
        store: &mut TaskStore,
        metadata: TriggerMetadata,
        action: QuickAction,
    ) -> ReminderResult<DispatchOutcome> {
        match action {
            QuickAction::DefaultTap => Ok(DispatchOutcome::SelectorOpened(metadata)),
            QuickAction::StopToday => {
                let cancelled = controller.stop_today(store, &metadata.task_id).await?;
                Ok(DispatchOutcome::Stopped {
                    task_id: metadata.task_id,
                    cancelled,
                })
            }
            QuickAction::Snooze5 | QuickAction::Snooze15 => {
                let minutes = action.snooze_minutes().unwrap_or(5);
                let outcome = controller.snooze(store, &metadata.task_id, minutes).await?;
                Ok(DispatchOutcome::Snoozed {
                    task_id: metadata.task_id,
                    minutes,
                    outcome,
                })
            }
            QuickAction::Unrecognized(raw) => Ok(DispatchOutcome::Dropped(DropReason::UnrecognizedAction(raw))),
        }
    }
}

fn stale(store: &TaskStore, metadata: &TriggerMetadata, today: DateKey) -> Option<DropReason> {
    if metadata.date_key < today {
        return Some(DropReason::PastDate);
    }
    let Some(task) = store.get(&metadata.task_id) else {
        return Some(DropReason::UnknownTask);
    };
    let Some(reminder) = task.reminder.as_ref() else {
        return Some(DropReason::NoReminder);
    };
    reminder
        .is_stopped(metadata.date_key)
        .then_some(DropReason::StoppedDate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_choices_map_to_actions() {
        let actions: Vec<_> = SelectorChoice::ALL.iter().map(|c| c.action()).collect();
        assert_eq!(
            actions,
            vec![QuickAction::StopToday, QuickAction::Snooze5, QuickAction::Snooze15]
        );
        assert_eq!(SelectorChoice::Snooze15.label(), "Snooze 15");
    }

    #[test]
    fn selector_choice_parses() {
        assert_eq!("Stop".parse::<SelectorChoice>().unwrap(), SelectorChoice::Stop);
        assert_eq!("snooze-5".parse::<SelectorChoice>().unwrap(), SelectorChoice::Snooze5);
        assert!("later".parse::<SelectorChoice>().is_err());
    }

    #[test]
    fn default_debounce_window() {
        let d = QuickActionDispatcher::default();
        assert_eq!(d.debounce, Duration::milliseconds(DEFAULT_DEBOUNCE_MS));
        assert!(d.suppress_until().is_none());
    }
}
