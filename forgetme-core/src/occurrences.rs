//! Occurrence generator: turns "hh:mm on these weekdays" into concrete
//! future instants.
//!
//! Pure and deterministic given `now`. Walks forward one local day at a time
//! and never returns an instant closer to `now` than the minimum lead time.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;

use crate::task::ReminderTime;
use crate::time::{DateKey, Day, local_to_utc};

/// Hard bound on the day walk, so a filter that never matches still terminates.
pub const MAX_LOOKAHEAD_DAYS: i64 = 400;

#[derive(Debug, Clone)]
pub struct OccurrenceQuery<'a> {
    pub time: ReminderTime,
    /// Empty means every day.
    pub days: &'a BTreeSet<Day>,
    pub count: usize,
    pub skip_today: bool,
    pub min_lead: Duration,
}

pub fn passes_lead(at: DateTime<Utc>, now: DateTime<Utc>, min_lead: Duration) -> bool {
    at - now >= min_lead
}

/// Up to `query.count` instants, ascending.
pub fn generate(query: &OccurrenceQuery<'_>, now: DateTime<Utc>, tz: Tz) -> Vec<DateTime<Utc>> {
    let mut out = Vec::with_capacity(query.count);
    if query.count == 0 {
        return out;
    }

    let today = DateKey::of(now, tz).date();

    for offset in 0..MAX_LOOKAHEAD_DAYS {
        if offset == 0 && query.skip_today {
            continue;
        }
        let Some(date) = today.checked_add_signed(Duration::days(offset)) else {
            break;
        };
        let key = DateKey::new(date);
        if !query.days.is_empty() && !query.days.contains(&key.weekday()) {
            continue;
        }
        let Some(local) = date.and_hms_opt(query.time.hour, query.time.minute, 0) else {
            continue;
        };
        // A wall-clock time inside a DST gap does not exist that day.
        let Some(candidate) = local_to_utc(tz, local) else {
            continue;
        };
        if !passes_lead(candidate, now, query.min_lead) {
            continue;
        }

        out.push(candidate);
        if out.len() >= query.count {
            break;
        }
    }

    out
}
