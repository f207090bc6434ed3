//! forgetme-core: reminder scheduling engine for the Forget Me Note task tracker.
//!
//! Turns "remind me at 09:00, every 10 minutes, on Mon/Wed" into a bounded set
//! of concrete notification triggers and keeps that set consistent as tasks
//! are completed, snoozed, stopped, edited or deleted.

pub mod clock;
pub mod dispatch;
pub mod entitlement;
pub mod error;
pub mod lifecycle;
pub mod local;
pub mod migrate;
pub mod occurrences;
pub mod registry;
pub mod reminders;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod time;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatch::{DEFAULT_DEBOUNCE_MS, DispatchOutcome, DropReason, QuickActionDispatcher, SelectorChoice};
pub use entitlement::{Entitlement, StaticEntitlement};
pub use error::{ReminderError, ReminderResult, SchedulerError, StoreError};
pub use lifecycle::{MAX_SNOOZE_MINUTES, ReminderController, ScheduleOutcome};
pub use local::{LocalScheduler, LocalSchedulerState, PendingTrigger};
pub use occurrences::{MAX_LOOKAHEAD_DAYS, OccurrenceQuery, generate};
pub use registry::{ChainReport, NotificationRegistry};
pub use reminders::{ChainPlan, ReminderPolicy, build_chain, build_snooze_chain, per_day_limit};
pub use scheduler::{
    ActionSpec, NotificationScheduler, PermissionStatus, QuickAction, REMINDER_CATEGORY, SchedulerEvent,
    SchedulerSession, Subscription, TriggerContent,
};
pub use store::{KeyValueStore, MemoryStore, TaskStore};
pub use task::{
    PlannedTrigger, Reminder, ReminderDraft, ReminderMode, ReminderState, ReminderTime, Task,
    TriggerId, TriggerMetadata,
};
pub use time::{DateKey, Day, parse_timezone};
