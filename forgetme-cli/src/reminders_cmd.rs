use anyhow::{Context, Result};
use clap::Subcommand;
use forgetme_core::{MAX_SNOOZE_MINUTES, ReminderDraft, ReminderMode, ReminderTime, ScheduleOutcome};

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum RemindersCommand {
    /// Create or replace a task's reminder (premium)
    Set {
        id: String,

        /// Local time of day, HH:MM
        #[arg(long)]
        at: String,

        /// Repeat every N minutes after the base time, same day only
        #[arg(long)]
        every: Option<u32>,

        /// alarm (with sound) or silent
        #[arg(long, default_value = "silent")]
        mode: String,
    },

    /// Remove a task's reminder and cancel everything it scheduled
    Remove { id: String },

    /// Restart today's chain N minutes from now
    Snooze {
        id: String,

        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(i64).range(1..=MAX_SNOOZE_MINUTES))]
        minutes: i64,
    },

    /// Stop today's notifications for a task
    Stop { id: String },

    /// Rebuild every chain from its definition (also done on the first command of each day)
    Refresh,
}

pub async fn run(app: &mut App, cmd: RemindersCommand) -> Result<()> {
    match cmd {
        RemindersCommand::Set {
            id,
            at,
            every,
            mode,
        } => set(app, &id, &at, every, &mode).await,
        RemindersCommand::Remove { id } => {
            let cancelled = app.controller.remove_reminder(&mut app.store, &id).await?;
            println!("Reminder removed ({cancelled} notifications cancelled)");
            Ok(())
        }
        RemindersCommand::Snooze { id, minutes } => {
            let outcome = app.controller.snooze(&mut app.store, &id, minutes).await?;
            report(&format!("Snoozed {minutes} minutes"), &outcome);
            Ok(())
        }
        RemindersCommand::Stop { id } => {
            let cancelled = app.controller.stop_today(&mut app.store, &id).await?;
            println!("Stopped for today ({cancelled} notifications cancelled)");
            Ok(())
        }
        RemindersCommand::Refresh => {
            let rebuilt = app.controller.refresh_all(&mut app.store).await?;
            println!("Refreshed {rebuilt} reminders");
            Ok(())
        }
    }
}

pub fn parse_draft(at: &str, every: Option<u32>, mode: &str) -> Result<ReminderDraft> {
    let time: ReminderTime = at.parse().with_context(|| format!("--at {at}"))?;
    let mode: ReminderMode = mode.parse().with_context(|| format!("--mode {mode}"))?;
    let mut draft = ReminderDraft::new(time).with_mode(mode);
    if let Some(every) = every {
        draft = draft.repeating_every(every);
    }
    Ok(draft)
}

async fn set(app: &mut App, id: &str, at: &str, every: Option<u32>, mode: &str) -> Result<()> {
    let draft = parse_draft(at, every, mode)?;
    let outcome = app.controller.set_reminder(&mut app.store, id, draft).await?;
    report("Reminder saved", &outcome);
    Ok(())
}

fn report(what: &str, outcome: &ScheduleOutcome) {
    match outcome {
        ScheduleOutcome::Scheduled(report) => {
            println!("{what}: {} notifications scheduled", report.scheduled.len());
            if report.failed > 0 {
                println!("warning: {} notifications could not be scheduled", report.failed);
            }
            if report.aborted {
                println!("warning: permission was revoked while scheduling");
            }
        }
        ScheduleOutcome::PermissionDenied => {
            println!("{what}, but notifications are not allowed.");
            println!("Run `forgetme notifications allow`, then `forgetme reminder refresh`.");
        }
    }
}
