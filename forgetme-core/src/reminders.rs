//! Reminder policy + chain building.
//!
//! A chain is everything one reminder definition expands to: the first
//! upcoming day gets a base trigger plus in-day repeats, every later day gets
//! exactly one base trigger. The whole chain is bounded by the per-task
//! trigger ceiling.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::occurrences::{OccurrenceQuery, generate, passes_lead};
use crate::task::{PlannedTrigger, Reminder, Task, TriggerMetadata};
use crate::time::{DateKey, end_of_day};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderPolicy {
    /// Max outstanding trigger ids per task (platform scheduling caps).
    pub trigger_ceiling: usize,
    /// Base days generated for single-shot reminders.
    pub base_occurrences_single: usize,
    /// Base days generated when an in-day repeat interval is active.
    pub base_occurrences_with_repeat: usize,
    /// Triggers on the first day of a repeating chain, base included.
    pub max_triggers_per_day: usize,
    pub min_lead_secs: i64,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            trigger_ceiling: 50,
            base_occurrences_single: 30,
            base_occurrences_with_repeat: 7,
            max_triggers_per_day: 8,
            min_lead_secs: 60,
        }
    }
}

impl ReminderPolicy {
    pub fn min_lead(&self) -> Duration {
        Duration::seconds(self.min_lead_secs.max(0))
    }

    pub fn base_occurrences(&self, repeating: bool) -> usize {
        if repeating {
            self.base_occurrences_with_repeat
        } else {
            self.base_occurrences_single
        }
    }
}

/// Triggers to register, in ascending time order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainPlan {
    pub triggers: Vec<PlannedTrigger>,
}

impl ChainPlan {
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn first_date(&self) -> Option<DateKey> {
        self.triggers.first().map(|t| t.metadata.date_key)
    }

    pub fn by_date(&self) -> BTreeMap<DateKey, Vec<DateTime<Utc>>> {
        let mut out: BTreeMap<DateKey, Vec<DateTime<Utc>>> = BTreeMap::new();
        for t in &self.triggers {
            out.entry(t.metadata.date_key).or_default().push(t.at);
        }
        out
    }
}

/// Today is skipped when the task is already done or today was stopped.
pub fn skips_today(task: &Task, reminder: &Reminder, today: DateKey) -> bool {
    task.is_done_on(today) || reminder.is_stopped(today)
}

/// Expand the full chain for `reminder` on `task`.
///
/// `budget` is how many more ids the task may hold; the controller passes the
/// ceiling minus whatever is still outstanding.
pub fn build_chain(
    task: &Task,
    reminder: &Reminder,
    budget: usize,
    now: DateTime<Utc>,
    tz: Tz,
    policy: &ReminderPolicy,
) -> ChainPlan {
    let today = DateKey::of(now, tz);
    let repeat = reminder.repeat_interval();

    let upcoming = generate(
        &OccurrenceQuery {
            time: reminder.time,
            days: &task.days,
            count: policy.base_occurrences(repeat.is_some()),
            skip_today: skips_today(task, reminder, today),
            min_lead: policy.min_lead(),
        },
        now,
        tz,
    );

    let mut plan = ChainPlan::default();

    for (i, base) in upcoming.into_iter().enumerate() {
        let key = DateKey::of(base, tz);
        let times = match repeat {
            Some(every) if i == 0 => expand_day(base, every, end_of_day(tz, key), now, policy),
            _ => vec![base],
        };
        if !push_bounded(&mut plan, task, reminder, key, times, budget) {
            break;
        }
    }

    plan
}

/// Fresh today-only chain starting at `start` (now + snooze minutes).
///
/// The base trigger keeps today's key even if `start` has crossed midnight;
/// repeats never go past the end of today.
pub fn build_snooze_chain(
    task: &Task,
    reminder: &Reminder,
    start: DateTime<Utc>,
    budget: usize,
    now: DateTime<Utc>,
    tz: Tz,
    policy: &ReminderPolicy,
) -> ChainPlan {
    let today = DateKey::of(now, tz);
    let times = match reminder.repeat_interval() {
        Some(every) => expand_day(start, every, end_of_day(tz, today), now, policy),
        None if passes_lead(start, now, policy.min_lead()) => vec![start],
        None => vec![],
    };

    let mut plan = ChainPlan::default();
    push_bounded(&mut plan, task, reminder, today, times, budget);
    plan
}

/// Most triggers one day can hold at `every`-minute spacing, base included.
pub fn per_day_limit(every: u32) -> usize {
    (MINUTES_PER_DAY / every.max(1) as usize) + 1
}

const MINUTES_PER_DAY: usize = 24 * 60;

/// Base + repeats every `every` minutes, capped at day end and the per-day cap.
fn expand_day(
    base: DateTime<Utc>,
    every: u32,
    day_end: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &ReminderPolicy,
) -> Vec<DateTime<Utc>> {
    let step = Duration::minutes(i64::from(every.max(1)));
    let cap = policy.max_triggers_per_day.clamp(1, per_day_limit(every));
    let mut out = Vec::with_capacity(cap);

    if passes_lead(base, now, policy.min_lead()) {
        out.push(base);
    }
    let mut at = base;
    for _ in 1..cap {
        at = match at.checked_add_signed(step) {
            Some(next) if next <= day_end => next,
            _ => break,
        };
        if passes_lead(at, now, policy.min_lead()) {
            out.push(at);
        }
    }

    out
}

/// Returns false once the budget is exhausted.
fn push_bounded(
    plan: &mut ChainPlan,
    task: &Task,
    reminder: &Reminder,
    key: DateKey,
    times: Vec<DateTime<Utc>>,
    budget: usize,
) -> bool {
    for at in times {
        if plan.len() >= budget {
            return false;
        }
        plan.triggers.push(PlannedTrigger {
            at,
            metadata: TriggerMetadata {
                task_id: task.id.clone(),
                date_key: key,
                repeat_every_mins: reminder.repeat_interval(),
            },
        });
    }
    plan.len() < budget
}
