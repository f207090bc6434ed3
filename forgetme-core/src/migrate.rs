//! One-time upgrade of older stored task shapes into the current model.
//!
//! Runs on the raw JSON before deserialization. Older app versions wrote:
//! - `done` as a single boolean instead of a per-date map
//! - `reminder.time` as a full ISO instant
//! - `reminder.notifId` (one id) or `reminder.notifIds` (flat list)
//! - `reminder.stoppedDates` as `{date: true}`

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::time::DateKey;

/// Upgrade a stored `tasks` payload in place. Returns true if anything changed.
pub fn migrate_tasks(root: &mut Value, today: DateKey, tz: Tz) -> Result<bool, StoreError> {
    let Value::Array(tasks) = root else {
        return Err(StoreError::Migration(format!(
            "tasks must be a JSON array, found {}",
            kind(root)
        )));
    };

    let mut changed = false;
    for task in tasks.iter_mut() {
        let Value::Object(obj) = task else {
            return Err(StoreError::Migration("task entry is not an object".to_string()));
        };
        changed |= migrate_task(obj, today, tz);
    }
    Ok(changed)
}

fn migrate_task(obj: &mut Map<String, Value>, today: DateKey, tz: Tz) -> bool {
    let mut changed = false;

    match obj.get("done") {
        Some(Value::Bool(done)) => {
            let mut map = Map::new();
            if *done {
                map.insert(today.to_string(), Value::Bool(true));
            }
            obj.insert("done".to_string(), Value::Object(map));
            changed = true;
        }
        Some(Value::Null) => {
            obj.insert("done".to_string(), Value::Object(Map::new()));
            changed = true;
        }
        _ => {}
    }

    if matches!(obj.get("days"), Some(Value::Null)) {
        obj.insert("days".to_string(), Value::Array(vec![]));
        changed = true;
    }

    if matches!(obj.get("reminder"), Some(Value::Null)) {
        obj.remove("reminder");
        changed = true;
    }
    if let Some(Value::Object(reminder)) = obj.get_mut("reminder") {
        changed |= migrate_reminder(reminder, tz);
    }

    changed
}

fn migrate_reminder(r: &mut Map<String, Value>, tz: Tz) -> bool {
    let mut changed = false;

    if let Some(Value::String(time)) = r.get("time") {
        if let Ok(instant) = DateTime::parse_from_rfc3339(time) {
            let local = instant.with_timezone(&Utc).with_timezone(&tz);
            let hhmm = local.format("%H:%M").to_string();
            r.insert("time".to_string(), Value::String(hhmm));
            changed = true;
        }
    }

    let mut legacy: Vec<Value> = match r.remove("legacyIds") {
        Some(Value::Array(ids)) => ids,
        _ => Vec::new(),
    };
    if let Some(id) = r.remove("notifId") {
        if id.is_string() {
            legacy.push(id);
        }
        changed = true;
    }
    if let Some(ids) = r.remove("notifIds") {
        if let Value::Array(ids) = ids {
            legacy.extend(ids.into_iter().filter(Value::is_string));
        }
        changed = true;
    }
    if !legacy.is_empty() {
        r.insert("legacyIds".to_string(), Value::Array(legacy));
    }

    if let Some(Value::Object(stopped)) = r.get("stoppedDates") {
        let dates: Vec<Value> = stopped
            .iter()
            .filter(|(_, v)| v.as_bool().unwrap_or(false))
            .map(|(k, _)| Value::String(k.clone()))
            .collect();
        r.insert("stoppedDates".to_string(), Value::Array(dates));
        changed = true;
    }

    if matches!(r.get("repeatEveryMins"), Some(Value::Number(n)) if n.as_u64() == Some(0))
        || matches!(r.get("repeatEveryMins"), Some(Value::Null))
    {
        r.remove("repeatEveryMins");
        changed = true;
    }

    changed
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
