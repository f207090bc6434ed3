use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use forgetme_core::{DispatchOutcome, PermissionStatus, QuickAction, SelectorChoice};

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum NotificationsCommand {
    /// List pending notification triggers
    Pending,

    /// Grant notification permission to the local scheduler
    Allow,

    /// Deny notification permission
    Deny,

    /// Deliver due notifications and handle the resulting interactions
    Fire {
        /// Interaction to simulate: snooze-5, snooze-15, stop-today, default-tap.
        /// Omit to simulate a foreground presentation.
        #[arg(long)]
        action: Option<String>,

        /// Fire every pending trigger, not only the due ones
        #[arg(long, default_value_t = false)]
        all: bool,

        /// Answer an opened selector with stop, snooze-5 or snooze-15
        #[arg(long)]
        choose: Option<String>,
    },
}

pub async fn run(app: &mut App, cmd: NotificationsCommand) -> Result<()> {
    match cmd {
        NotificationsCommand::Pending => pending(app),
        NotificationsCommand::Allow => {
            app.scheduler.set_permission(PermissionStatus::Granted);
            println!("Notifications allowed. Run `forgetme reminder refresh` to schedule saved reminders.");
            Ok(())
        }
        NotificationsCommand::Deny => {
            app.scheduler.set_permission(PermissionStatus::Denied);
            println!("Notifications denied.");
            Ok(())
        }
        NotificationsCommand::Fire { action, all, choose } => {
            let choose = choose.map(|c| c.parse::<SelectorChoice>()).transpose()?;
            let outcomes = fire(app, action.as_deref(), all, choose).await?;
            if outcomes.is_empty() {
                println!("Nothing due.");
            }
            for outcome in &outcomes {
                println!("{}", describe(outcome));
            }
            Ok(())
        }
    }
}

fn pending(app: &App) -> Result<()> {
    let tz = app.controller.timezone();
    let pending = app.scheduler.pending();
    println!("permission: {:?}", app.scheduler.state().permission);
    if pending.is_empty() {
        println!("No pending notifications.");
        return Ok(());
    }

    for p in pending {
        let name = app
            .store
            .get(&p.metadata.task_id)
            .map(|t| t.name.as_str())
            .unwrap_or("<deleted task>");
        let sound = if p.content.sound { "alarm" } else { "silent" };
        println!(
            "{}  {}  {}  [{}] {}",
            p.id,
            p.at.with_timezone(&tz).format("%Y-%m-%d %H:%M %a"),
            sound,
            p.metadata.date_key,
            name
        );
    }
    Ok(())
}

/// Fire triggers through the scheduler's event stream and dispatch each event.
pub async fn fire(
    app: &mut App,
    action: Option<&str>,
    all: bool,
    choose: Option<SelectorChoice>,
) -> Result<Vec<DispatchOutcome>> {
    let mut subscription = app.controller.session().subscribe();
    let mut dispatcher = app.dispatcher();

    let until = if all { DateTime::<Utc>::MAX_UTC } else { app.controller.now() };
    let fired = app.scheduler.fire_due(until, action.map(QuickAction::from));
    tracing::info!(count = fired.len(), "notifications fired");

    let mut outcomes = dispatcher
        .drain(&app.controller, &mut app.store, &mut subscription)
        .await?;

    if let Some(choice) = choose {
        let opened: Vec<_> = outcomes
            .iter()
            .filter_map(|o| match o {
                DispatchOutcome::SelectorOpened(metadata) => Some(metadata.clone()),
                _ => None,
            })
            .collect();
        for metadata in opened {
            let outcome = dispatcher
                .choose(&app.controller, &mut app.store, metadata, choice)
                .await?;
            outcomes.push(outcome);
        }
    }
    Ok(outcomes)
}

fn describe(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Dropped(reason) => format!("ignored: {reason:?}"),
        DispatchOutcome::SelectorOpened(metadata) => {
            let labels: Vec<_> = SelectorChoice::ALL.iter().map(|c| c.label()).collect();
            format!(
                "task {} ({}): choose one of {}",
                metadata.task_id,
                metadata.date_key,
                labels.join(" / ")
            )
        }
        DispatchOutcome::Snoozed {
            task_id,
            minutes,
            outcome,
        } => format!(
            "task {task_id}: snoozed {minutes} minutes, {} notifications scheduled",
            outcome.scheduled_count()
        ),
        DispatchOutcome::Stopped { task_id, cancelled } => {
            format!("task {task_id}: stopped for today, {cancelled} notifications cancelled")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use chrono::Duration;
    use forgetme_core::{ReminderDraft, ReminderTime};

    async fn armed() -> (crate::app::tests::TestApp, String) {
        let mut t = test_app().await;
        t.app.store.set_premium(true).await.unwrap();
        let id = t.app.controller.add_task(&mut t.app.store, "Meds", []).await.unwrap();
        t.app
            .controller
            .set_reminder(
                &mut t.app.store,
                &id,
                ReminderDraft::new(ReminderTime::new(9, 0).unwrap()).repeating_every(10),
            )
            .await
            .unwrap();
        (t, id)
    }

    #[tokio::test]
    async fn nothing_due_before_base_time() {
        let (mut t, _) = armed().await;
        let outcomes = fire(&mut t.app, Some("snooze-5"), false, None).await.unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn due_snooze_is_dispatched() {
        let (mut t, id) = armed().await;
        t.clock.advance(Duration::hours(1));

        let outcomes = fire(&mut t.app, Some("snooze-5"), false, None).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], DispatchOutcome::Snoozed { task_id, .. } if *task_id == id));
        assert!(describe(&outcomes[0]).contains("snoozed 5 minutes"));
    }

    #[tokio::test]
    async fn selector_choice_is_applied() {
        let (mut t, id) = armed().await;
        t.clock.advance(Duration::hours(1));

        let outcomes = fire(&mut t.app, None, false, Some(SelectorChoice::Stop)).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], DispatchOutcome::SelectorOpened(_)));
        assert!(matches!(outcomes[1], DispatchOutcome::Stopped { .. }));
        let today = t.app.today();
        assert!(t.app.store.get(&id).unwrap().reminder.as_ref().unwrap().is_stopped(today));
    }

    #[tokio::test]
    async fn allow_and_deny_flip_permission() {
        let mut t = test_app().await;
        run(&mut t.app, NotificationsCommand::Deny).await.unwrap();
        assert_eq!(t.app.scheduler.state().permission, PermissionStatus::Denied);
        run(&mut t.app, NotificationsCommand::Allow).await.unwrap();
        assert_eq!(t.app.scheduler.state().permission, PermissionStatus::Granted);
    }
}
