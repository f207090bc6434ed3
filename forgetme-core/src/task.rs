//! Task + reminder model.
//!
//! Field names serialize in camelCase so the stored `tasks` collection keeps
//! the same shape the app has always written (`notifMap`, `stoppedDates`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ReminderError;
use crate::time::{DateKey, Day};

/// Upper bound on a task name, in characters.
pub const MAX_TASK_NAME_CHARS: usize = 120;

/// Opaque handle returned by the notification scheduler.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(pub String);

impl TriggerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time of day a reminder fires. Only hour and minute matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReminderTime {
    pub hour: u32,
    pub minute: u32,
}

impl ReminderTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }
}

impl fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ReminderTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("invalid time '{s}': expected HH:MM"))?;
        let hour: u32 = h.parse().map_err(|e| anyhow::anyhow!("invalid hour in '{s}': {e}"))?;
        let minute: u32 = m.parse().map_err(|e| anyhow::anyhow!("invalid minute in '{s}': {e}"))?;
        Self::new(hour, minute).ok_or_else(|| anyhow::anyhow!("time out of range: {s}"))
    }
}

impl Serialize for ReminderTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReminderTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Alarm reminders ring; silent ones only show a banner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMode {
    Alarm,
    #[default]
    Silent,
}

impl FromStr for ReminderMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alarm" => Ok(ReminderMode::Alarm),
            "silent" => Ok(ReminderMode::Silent),
            other => Err(anyhow::anyhow!("invalid reminder mode: {other} (alarm|silent)")),
        }
    }
}

/// What the user asks for when setting or editing a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderDraft {
    pub time: ReminderTime,
    pub repeat_every_mins: Option<u32>,
    pub mode: ReminderMode,
}

impl ReminderDraft {
    pub fn new(time: ReminderTime) -> Self {
        Self {
            time,
            repeat_every_mins: None,
            mode: ReminderMode::default(),
        }
    }

    pub fn repeating_every(mut self, minutes: u32) -> Self {
        self.repeat_every_mins = Some(minutes);
        self
    }

    pub fn with_mode(mut self, mode: ReminderMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub time: ReminderTime,

    /// Minutes between in-day repeats. `None`/0 means one trigger per day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_every_mins: Option<u32>,

    #[serde(default)]
    pub mode: ReminderMode,

    /// date key -> outstanding trigger ids for that date.
    #[serde(default)]
    pub notif_map: BTreeMap<DateKey, Vec<TriggerId>>,

    /// Dates on which the user suppressed further triggers.
    #[serde(default)]
    pub stopped_dates: BTreeSet<DateKey>,

    /// Ids carried over from older single-id / id-list shapes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legacy_ids: Vec<TriggerId>,
}

impl Reminder {
    pub fn from_draft(draft: ReminderDraft) -> Self {
        Self {
            time: draft.time,
            repeat_every_mins: draft.repeat_every_mins.filter(|m| *m > 0),
            mode: draft.mode,
            notif_map: BTreeMap::new(),
            stopped_dates: BTreeSet::new(),
            legacy_ids: Vec::new(),
        }
    }

    /// Effective in-day repeat interval, if any.
    pub fn repeat_interval(&self) -> Option<u32> {
        self.repeat_every_mins.filter(|m| *m > 0)
    }

    pub fn outstanding(&self) -> usize {
        self.notif_map.values().map(Vec::len).sum::<usize>() + self.legacy_ids.len()
    }

    pub fn ids_on(&self, key: DateKey) -> &[TriggerId] {
        self.notif_map.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_stopped(&self, key: DateKey) -> bool {
        self.stopped_dates.contains(&key)
    }
}

/// Derived per-task reminder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    NoReminder,
    Scheduled,
    PartiallyStopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,

    /// Empty means every day.
    #[serde(default)]
    pub days: BTreeSet<Day>,

    /// Absent dates are implicitly not done.
    #[serde(default)]
    pub done: BTreeMap<DateKey, bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Reminder>,
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            days: BTreeSet::new(),
            done: BTreeMap::new(),
            reminder: None,
        }
    }

    pub fn with_days(mut self, days: impl IntoIterator<Item = Day>) -> Self {
        self.days = days.into_iter().collect();
        self
    }

    pub fn with_reminder(mut self, reminder: Reminder) -> Self {
        self.reminder = Some(reminder);
        self
    }

    pub fn is_done_on(&self, key: DateKey) -> bool {
        self.done.get(&key).copied().unwrap_or(false)
    }

    pub fn applies_on(&self, key: DateKey) -> bool {
        self.days.is_empty() || self.days.contains(&key.weekday())
    }

    pub fn reminder_state(&self, today: DateKey) -> ReminderState {
        match &self.reminder {
            None => ReminderState::NoReminder,
            Some(r) if r.is_stopped(today) => ReminderState::PartiallyStopped,
            Some(_) => ReminderState::Scheduled,
        }
    }
}

/// Trim and validate a task name.
pub fn normalize_task_name(raw: &str) -> Result<String, ReminderError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReminderError::InvalidTaskName("name must be non-empty".to_string()));
    }
    if trimmed.chars().count() > MAX_TASK_NAME_CHARS {
        return Err(ReminderError::InvalidTaskName(format!(
            "name must be at most {MAX_TASK_NAME_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Context attached to every trigger so inbound events can be handled without
/// a registry lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerMetadata {
    pub task_id: String,
    pub date_key: DateKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_every_mins: Option<u32>,
}

/// One trigger the chain builder wants registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTrigger {
    pub at: DateTime<Utc>,
    pub metadata: TriggerMetadata,
}
