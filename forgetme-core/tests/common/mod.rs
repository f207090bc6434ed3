#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use forgetme_core::{
    Clock, DateKey, FixedClock, LocalScheduler, MemoryStore, ReminderController, ReminderPolicy,
    SchedulerSession, TaskStore, parse_timezone,
};
use std::sync::Arc;

pub struct Harness {
    pub controller: ReminderController,
    pub store: TaskStore,
    pub scheduler: LocalScheduler,
    pub clock: Arc<FixedClock>,
    pub tz: Tz,
}

impl Harness {
    pub fn today(&self) -> DateKey {
        self.controller.today()
    }

    pub fn key(&self, s: &str) -> DateKey {
        s.parse().unwrap()
    }

    pub fn hhmm(&self, t: DateTime<Utc>) -> String {
        t.with_timezone(&self.tz).format("%H:%M").to_string()
    }

    /// Pending instants for `task_id` on the given local date, as HH:MM.
    pub fn pending_on(&self, task_id: &str, key: &str) -> Vec<String> {
        let key = self.key(key);
        self.scheduler
            .pending_for(task_id)
            .into_iter()
            .filter(|p| p.metadata.date_key == key)
            .map(|p| self.hhmm(p.at))
            .collect()
    }

    pub fn outstanding(&self, task_id: &str) -> usize {
        self.store
            .get(task_id)
            .and_then(|t| t.reminder.as_ref())
            .map(|r| r.outstanding())
            .unwrap_or(0)
    }
}

pub fn chicago() -> Tz {
    parse_timezone("America/Chicago").unwrap()
}

/// Local Chicago time in February 2026. The 16th is a Monday.
pub fn feb(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    chicago()
        .with_ymd_and_hms(2026, 2, day, hour, minute, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub async fn harness_at(now: DateTime<Utc>) -> Harness {
    harness_with(now, LocalScheduler::granted(), ReminderPolicy::default()).await
}

pub async fn harness_with(now: DateTime<Utc>, scheduler: LocalScheduler, policy: ReminderPolicy) -> Harness {
    let tz = chicago();
    let clock = Arc::new(FixedClock::new(now));
    let session = SchedulerSession::new(Arc::new(scheduler.clone()));
    let controller = ReminderController::new(session, clock.clone(), tz, policy);

    let mut store = TaskStore::load(Box::new(MemoryStore::new()), DateKey::of(clock.now(), tz), tz)
        .await
        .unwrap();
    store.set_premium(true).await.unwrap();

    Harness {
        controller,
        store,
        scheduler,
        clock,
        tz,
    }
}
