//! Persists the local scheduler between runs so pending triggers survive.

use anyhow::{Context, Result};
use forgetme_core::{LocalScheduler, LocalSchedulerState};
use std::fs;
use std::path::Path;

/// Load the scheduler, applying the configured permission-request answer.
pub fn load_scheduler(path: &Path, grant_on_request: bool) -> Result<LocalScheduler> {
    let state = if path.exists() {
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str::<LocalSchedulerState>(&s)
            .with_context(|| format!("parse {}", path.display()))?
    } else {
        LocalSchedulerState::default()
    };

    let scheduler = LocalScheduler::from_state(state);
    scheduler.set_grant_on_request(grant_on_request);
    Ok(scheduler)
}

pub fn save_scheduler(path: &Path, scheduler: &LocalScheduler) -> Result<()> {
    let json = serde_json::to_string_pretty(&scheduler.state())?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgetme_core::{NotificationScheduler, PermissionStatus, TriggerContent, TriggerMetadata};

    #[tokio::test]
    async fn pending_triggers_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.json");

        let scheduler = load_scheduler(&path, true).unwrap();
        assert_eq!(scheduler.request_permission().await, PermissionStatus::Granted);
        let id = scheduler
            .schedule(
                chrono::Utc::now() + chrono::Duration::hours(1),
                TriggerContent {
                    title: "Reminder".to_string(),
                    body: "Stretch".to_string(),
                    sound: false,
                    category: forgetme_core::REMINDER_CATEGORY.to_string(),
                },
                TriggerMetadata {
                    task_id: "t1".to_string(),
                    date_key: "2026-02-16".parse().unwrap(),
                    repeat_every_mins: None,
                },
            )
            .await
            .unwrap();
        save_scheduler(&path, &scheduler).unwrap();

        let reloaded = load_scheduler(&path, true).unwrap();
        let pending = reloaded.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(reloaded.permission_status().await, PermissionStatus::Granted);
    }

    #[tokio::test]
    async fn grant_on_request_comes_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = load_scheduler(&dir.path().join("scheduler.json"), false).unwrap();
        assert_eq!(scheduler.request_permission().await, PermissionStatus::Denied);
    }
}
