//! TaskStore: the in-memory task collection mirrored to an opaque
//! key-value store.
//!
//! Keys: `tasks` (JSON task array), `isPremium`, `seenIntro` (JSON booleans).
//! Legacy task shapes are upgraded on load and written back once.

use async_trait::async_trait;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::migrate::migrate_tasks;
use crate::task::Task;
use crate::time::DateKey;

pub const TASKS_KEY: &str = "tasks";
pub const PREMIUM_KEY: &str = "isPremium";
pub const SEEN_INTRO_KEY: &str = "seenIntro";
pub const LAST_REFRESH_KEY: &str = "lastRefresh";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Volatile store, handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: &str) -> Self {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub struct TaskStore {
    kv: Box<dyn KeyValueStore>,
    tasks: Vec<Task>,
    is_premium: bool,
    seen_intro: bool,
    last_refresh: Option<DateKey>,
}

impl TaskStore {
    /// Read all keys, migrating legacy task shapes relative to `today`.
    pub async fn load(kv: Box<dyn KeyValueStore>, today: DateKey, tz: Tz) -> Result<Self, StoreError> {
        let mut migrated = false;
        let tasks = match kv.get(TASKS_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => {
                let mut value: serde_json::Value = serde_json::from_str(&raw)?;
                migrated = migrate_tasks(&mut value, today, tz)?;
                serde_json::from_value(value)?
            }
            _ => Vec::new(),
        };
        let is_premium = read_flag(kv.as_ref(), PREMIUM_KEY).await?;
        let seen_intro = read_flag(kv.as_ref(), SEEN_INTRO_KEY).await?;
        let last_refresh = match kv.get(LAST_REFRESH_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).ok(),
            _ => None,
        };

        let store = Self {
            kv,
            tasks,
            is_premium,
            seen_intro,
            last_refresh,
        };
        if migrated {
            tracing::info!(tasks = store.tasks.len(), "migrated legacy task records");
            store.save().await?;
        }
        Ok(store)
    }

    pub async fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.tasks)?;
        self.kv.set(TASKS_KEY, &json).await?;
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks scheduled for the given local date.
    pub fn tasks_on(&self, key: DateKey) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.applies_on(key)).collect()
    }

    pub fn insert(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Replace by id; last write wins. Returns false if the id is unknown.
    pub fn replace(&mut self, task: Task) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => {
                *slot = task;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(idx))
    }

    pub fn is_premium(&self) -> bool {
        self.is_premium
    }

    pub async fn set_premium(&mut self, premium: bool) -> Result<(), StoreError> {
        self.is_premium = premium;
        self.kv.set(PREMIUM_KEY, &serde_json::to_string(&premium)?).await?;
        Ok(())
    }

    pub fn seen_intro(&self) -> bool {
        self.seen_intro
    }

    pub async fn mark_intro_seen(&mut self) -> Result<(), StoreError> {
        self.seen_intro = true;
        self.kv.set(SEEN_INTRO_KEY, "true").await?;
        Ok(())
    }

    /// Local date of the last full chain rebuild.
    pub fn last_refresh(&self) -> Option<DateKey> {
        self.last_refresh
    }

    pub async fn set_last_refresh(&mut self, key: DateKey) -> Result<(), StoreError> {
        self.last_refresh = Some(key);
        self.kv.set(LAST_REFRESH_KEY, &serde_json::to_string(&key)?).await?;
        Ok(())
    }
}

async fn read_flag(kv: &dyn KeyValueStore, key: &str) -> Result<bool, StoreError> {
    match kv.get(key).await? {
        Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
        _ => Ok(false),
    }
}
