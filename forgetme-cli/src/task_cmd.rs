use anyhow::{Context, Result};
use clap::Subcommand;
use forgetme_core::{DateKey, Day, ReminderState, Task};

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a task
    Add {
        name: String,

        /// Weekdays the task applies to, e.g. Mon,Wed. Omit for every day.
        #[arg(long, value_delimiter = ',')]
        days: Vec<String>,
    },

    /// List tasks that apply on a date (default: today)
    List {
        #[arg(long)]
        date: Option<String>,

        /// Include tasks that do not apply on the date
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Toggle today's done flag
    Done { id: String },

    /// Delete a task and cancel its notifications
    Delete { id: String },
}

pub async fn run(app: &mut App, cmd: TaskCommand) -> Result<()> {
    match cmd {
        TaskCommand::Add { name, days } => add(app, &name, &days).await,
        TaskCommand::List { date, all } => list(app, date.as_deref(), all),
        TaskCommand::Done { id } => done(app, &id).await,
        TaskCommand::Delete { id } => delete(app, &id).await,
    }
}

pub fn parse_days(raw: &[String]) -> Result<Vec<Day>> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Day>())
        .collect()
}

async fn add(app: &mut App, name: &str, days: &[String]) -> Result<()> {
    let days = parse_days(days)?;
    let id = app.controller.add_task(&mut app.store, name, days).await?;
    println!("Added task {id}");
    Ok(())
}

fn list(app: &App, date: Option<&str>, all: bool) -> Result<()> {
    let key = match date {
        Some(s) => s
            .parse::<DateKey>()
            .with_context(|| format!("invalid date {s} (expected YYYY-MM-DD)"))?,
        None => app.today(),
    };

    let tasks: Vec<&Task> = if all {
        app.store.tasks().iter().collect()
    } else {
        app.store.tasks_on(key)
    };
    if tasks.is_empty() {
        println!("No tasks for {key} ({})", key.weekday());
        return Ok(());
    }

    println!("Tasks for {key} ({})\n", key.weekday());
    for t in tasks {
        println!("{}", describe(t, key, app.today()));
    }
    Ok(())
}

pub fn describe(task: &Task, key: DateKey, today: DateKey) -> String {
    let check = if task.is_done_on(key) { "[x]" } else { "[ ]" };
    let days = if task.days.is_empty() {
        "every day".to_string()
    } else {
        task.days.iter().map(Day::label).collect::<Vec<_>>().join(",")
    };

    let mut line = format!("{check} {}  {}  ({days})", task.id, task.name);
    if let Some(r) = &task.reminder {
        line.push_str(&format!("  reminder {}", r.time));
        if let Some(every) = r.repeat_interval() {
            line.push_str(&format!(" every {every}m"));
        }
        line.push_str(&format!(" {:?}", r.mode).to_lowercase());
        line.push_str(&format!(", {} pending", r.outstanding()));
        if task.reminder_state(today) == ReminderState::PartiallyStopped {
            line.push_str(", stopped today");
        }
    }
    line
}

async fn done(app: &mut App, id: &str) -> Result<()> {
    let today = app.today();
    match app.controller.toggle_done(&mut app.store, id, today).await? {
        Some(true) => println!("Marked done for {today}"),
        Some(false) => println!("Marked not done for {today}"),
        None => println!("Only today can be toggled"),
    }
    Ok(())
}

async fn delete(app: &mut App, id: &str) -> Result<()> {
    let cancelled = app.controller.delete_task(&mut app.store, id).await?;
    println!("Deleted task {id} ({cancelled} notifications cancelled)");
    Ok(())
}
