use anyhow::{Context, Result};
use forgetme_core::{
    Clock, DateKey, LocalScheduler, QuickActionDispatcher, ReminderController, SchedulerSession,
    SystemClock, TaskStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, load_config};
use crate::scheduler_file::{load_scheduler, save_scheduler};
use crate::state::{scheduler_path, storage_path};
use crate::storage::FileStore;

/// Everything a command needs, opened from `~/.forgetme`.
pub struct App {
    pub config: Config,
    pub controller: ReminderController,
    pub store: TaskStore,
    pub scheduler: LocalScheduler,
    scheduler_path: PathBuf,
}

impl App {
    pub async fn open() -> Result<Self> {
        let config = load_config()?;
        Self::open_at(config, &storage_path()?, &scheduler_path()?, Arc::new(SystemClock)).await
    }

    pub async fn open_at(
        config: Config,
        storage: &Path,
        scheduler_file: &Path,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let tz = config.timezone()?;
        let scheduler = load_scheduler(scheduler_file, config.notifications.grant_on_request)?;
        let session = SchedulerSession::new(Arc::new(scheduler.clone()));
        let controller = ReminderController::new(session, clock, tz, config.reminders.policy());

        let today = controller.today();
        let mut store = TaskStore::load(Box::new(FileStore::new(storage)), today, tz)
            .await
            .with_context(|| format!("load {}", storage.display()))?;

        // First open of the day rebuilds every chain so the lookahead never runs dry.
        if let Some(rebuilt) = controller.reconcile(&mut store).await? {
            tracing::info!(rebuilt, %today, "startup refresh");
        }

        tracing::debug!(storage = %storage.display(), tasks = store.tasks().len(), %today, "app opened");
        Ok(Self {
            config,
            controller,
            store,
            scheduler,
            scheduler_path: scheduler_file.to_path_buf(),
        })
    }

    pub fn today(&self) -> DateKey {
        self.controller.today()
    }

    pub fn dispatcher(&self) -> QuickActionDispatcher {
        QuickActionDispatcher::new(self.config.reminders.debounce())
    }

    /// Flush the scheduler's pending triggers. Tasks are saved by each transition.
    pub fn close(self) -> Result<()> {
        save_scheduler(&self.scheduler_path, &self.scheduler)
    }

    /// Print the welcome text once per install.
    pub async fn intro_once(&mut self) -> Result<()> {
        if self.store.seen_intro() {
            return Ok(());
        }
        println!("Welcome to Forget Me Note");
        println!("Keep track of your daily tasks, set reminders, and never forget again.");
        println!("Get started: forgetme task add \"Water the plants\" --days Mon,Thu\n");
        self.store.mark_intro_seen().await?;
        Ok(())
    }
}
