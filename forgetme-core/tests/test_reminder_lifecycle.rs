mod common;

use chrono::Duration;
use common::{feb, harness_at, harness_with};
use forgetme_core::{
    Day, LocalScheduler, MAX_SNOOZE_MINUTES, PermissionStatus, ReminderDraft, ReminderError, ReminderPolicy, ReminderState,
    ReminderTime, ScheduleOutcome, StaticEntitlement,
};

fn at(h: u32, m: u32) -> ReminderDraft {
    ReminderDraft::new(ReminderTime::new(h, m).unwrap())
}

/// Daily reminder, no repeat, set Monday 08:00.
#[tokio::test]
async fn daily_reminder_one_trigger_per_day() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Take vitamins", []).await.unwrap();

    let outcome = h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.unwrap();
    let policy = ReminderPolicy::default();
    assert_eq!(outcome.scheduled_count(), policy.base_occurrences_single);

    assert_eq!(h.pending_on(&id, "2026-02-16"), vec!["09:00"]);
    assert_eq!(h.pending_on(&id, "2026-02-17"), vec!["09:00"]);
    assert_eq!(h.pending_on(&id, "2026-02-18"), vec!["09:00"]);

    let reminder = h.store.get(&id).unwrap().reminder.clone().unwrap();
    assert_eq!(reminder.notif_map.len(), policy.base_occurrences_single);
    assert!(reminder.notif_map.values().all(|ids| ids.len() == 1));
}

/// Mon/Wed reminder at 09:00 repeating every 15 minutes, set Monday 08:50.
#[tokio::test]
async fn weekly_reminder_repeats_only_on_first_day() {
    let mut h = harness_at(feb(16, 8, 50)).await;
    let id = h
        .controller
        .add_task(&mut h.store, "Stretch", [Day::Mon, Day::Wed])
        .await
        .unwrap();

    h.controller
        .set_reminder(&mut h.store, &id, at(9, 0).repeating_every(15))
        .await
        .unwrap();

    assert_eq!(
        h.pending_on(&id, "2026-02-16"),
        vec!["09:00", "09:15", "09:30", "09:45", "10:00", "10:15", "10:30", "10:45"]
    );
    assert!(h.pending_on(&id, "2026-02-17").is_empty());
    assert_eq!(h.pending_on(&id, "2026-02-18"), vec!["09:00"]);
}

#[tokio::test]
async fn mark_done_suppresses_today_only() {
    let mut h = harness_at(feb(16, 8, 50)).await;
    let id = h
        .controller
        .add_task(&mut h.store, "Stretch", [Day::Mon, Day::Wed])
        .await
        .unwrap();
    h.controller
        .set_reminder(&mut h.store, &id, at(9, 0).repeating_every(15))
        .await
        .unwrap();
    let wednesday_before = h.pending_on(&id, "2026-02-18");
    let monday_ids = h.store.get(&id).unwrap().reminder.as_ref().unwrap().ids_on(h.today()).len();

    let today = h.today();
    let cancels_before = h.scheduler.cancel_calls().len();
    assert_eq!(h.controller.toggle_done(&mut h.store, &id, today).await.unwrap(), Some(true));

    assert_eq!(h.scheduler.cancel_calls().len() - cancels_before, monday_ids);
    assert!(h.pending_on(&id, "2026-02-16").is_empty());
    assert_eq!(h.pending_on(&id, "2026-02-18"), wednesday_before);

    let task = h.store.get(&id).unwrap();
    let reminder = task.reminder.as_ref().unwrap();
    assert!(reminder.is_stopped(today));
    assert!(reminder.ids_on(today).is_empty());
    assert_eq!(task.reminder_state(today), ReminderState::PartiallyStopped);
}

#[tokio::test]
async fn unmarking_done_does_not_resurrect_triggers() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Walk", []).await.unwrap();
    h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.unwrap();

    let today = h.today();
    h.controller.toggle_done(&mut h.store, &id, today).await.unwrap();
    assert_eq!(h.controller.toggle_done(&mut h.store, &id, today).await.unwrap(), Some(false));

    assert!(h.pending_on(&id, "2026-02-16").is_empty());
    assert!(h.store.get(&id).unwrap().reminder.as_ref().unwrap().is_stopped(today));
}

#[tokio::test]
async fn toggling_another_date_is_a_noop() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Walk", []).await.unwrap();
    let tomorrow = h.key("2026-02-17");

    assert_eq!(h.controller.toggle_done(&mut h.store, &id, tomorrow).await.unwrap(), None);
    assert!(h.store.get(&id).unwrap().done.is_empty());
}

#[tokio::test]
async fn stop_then_snooze_rearms_today() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Meds", []).await.unwrap();
    h.controller
        .set_reminder(&mut h.store, &id, at(9, 0).repeating_every(10))
        .await
        .unwrap();
    let today = h.today();

    h.clock.set(feb(16, 9, 3));
    h.controller.stop_today(&mut h.store, &id).await.unwrap();
    {
        let r = h.store.get(&id).unwrap().reminder.as_ref().unwrap();
        assert!(r.is_stopped(today));
        assert!(r.ids_on(today).is_empty());
    }

    let now = h.controller.now();
    let outcome = h.controller.snooze(&mut h.store, &id, 5).await.unwrap();
    assert!(matches!(outcome, ScheduleOutcome::Scheduled(_)));

    let r = h.store.get(&id).unwrap().reminder.clone().unwrap();
    assert!(!r.is_stopped(today));
    assert!(!r.ids_on(today).is_empty());

    let today_pending: Vec<_> = h
        .scheduler
        .pending_for(&id)
        .into_iter()
        .filter(|p| p.metadata.date_key == today)
        .collect();
    assert_eq!(today_pending.len(), r.ids_on(today).len());
    assert!(today_pending.iter().all(|p| p.at >= now + Duration::minutes(5) - Duration::seconds(1)));
    assert_eq!(h.hhmm(today_pending[0].at), "09:08");
    // Tomorrow's base trigger is untouched by the snooze.
    assert_eq!(h.pending_on(&id, "2026-02-17"), vec!["09:00"]);
}

#[tokio::test]
async fn delete_cancels_every_outstanding_id() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Water plants", []).await.unwrap();
    h.controller
        .set_reminder(&mut h.store, &id, at(9, 0).repeating_every(30))
        .await
        .unwrap();
    let n = h.outstanding(&id);
    assert!(n > 0);
    let cancels_before = h.scheduler.cancel_calls().len();

    let cancelled = h.controller.delete_task(&mut h.store, &id).await.unwrap();

    assert_eq!(cancelled, n);
    assert_eq!(h.scheduler.cancel_calls().len() - cancels_before, n);
    assert!(h.store.get(&id).is_none());
    assert!(h.scheduler.pending_for(&id).is_empty());
}

#[tokio::test]
async fn edit_replaces_the_chain() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Read", []).await.unwrap();
    h.controller
        .set_reminder(&mut h.store, &id, at(9, 0).repeating_every(5))
        .await
        .unwrap();

    h.controller.set_reminder(&mut h.store, &id, at(20, 30)).await.unwrap();

    let pending = h.scheduler.pending_for(&id);
    assert_eq!(pending.len(), h.outstanding(&id));
    assert!(pending.iter().all(|p| h.hhmm(p.at) == "20:30"));
    assert!(pending.iter().all(|p| p.metadata.repeat_every_mins.is_none()));
}

#[tokio::test]
async fn trigger_ceiling_holds_after_every_transition() {
    let policy = ReminderPolicy {
        trigger_ceiling: 10,
        ..ReminderPolicy::default()
    };
    let mut h = harness_with(feb(16, 8, 0), LocalScheduler::granted(), policy).await;
    let id = h.controller.add_task(&mut h.store, "Hydrate", []).await.unwrap();

    h.controller
        .set_reminder(&mut h.store, &id, at(9, 0).repeating_every(5))
        .await
        .unwrap();
    assert!(h.outstanding(&id) <= 10);

    h.controller.set_reminder(&mut h.store, &id, at(7, 0)).await.unwrap();
    assert!(h.outstanding(&id) <= 10);

    h.controller.snooze(&mut h.store, &id, 15).await.unwrap();
    assert!(h.outstanding(&id) <= 10);

    h.controller.stop_today(&mut h.store, &id).await.unwrap();
    h.controller.snooze(&mut h.store, &id, 5).await.unwrap();
    assert!(h.outstanding(&id) <= 10);
    assert_eq!(h.scheduler.pending_for(&id).len(), h.outstanding(&id));
}

#[tokio::test]
async fn reminders_require_premium() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    h.store.set_premium(false).await.unwrap();
    let id = h.controller.add_task(&mut h.store, "Journal", []).await.unwrap();

    let err = h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.unwrap_err();
    assert!(matches!(err, ReminderError::PremiumRequired));

    assert!(h.controller.upgrade(&mut h.store, &StaticEntitlement(true)).await.unwrap());
    assert!(h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.is_ok());
}

#[tokio::test]
async fn permission_denied_keeps_reminder_unscheduled() {
    let scheduler = LocalScheduler::new(PermissionStatus::Undetermined);
    scheduler.set_grant_on_request(false);
    let mut h = harness_with(feb(16, 8, 0), scheduler, ReminderPolicy::default()).await;
    let id = h.controller.add_task(&mut h.store, "Call mom", []).await.unwrap();

    let outcome = h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.unwrap();

    assert_eq!(outcome, ScheduleOutcome::PermissionDenied);
    let reminder = h.store.get(&id).unwrap().reminder.clone().unwrap();
    assert!(reminder.notif_map.is_empty());
    assert!(h.scheduler.pending().is_empty());

    // Granting permission and re-editing recovers.
    h.scheduler.set_permission(PermissionStatus::Granted);
    let outcome = h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.unwrap();
    assert!(outcome.scheduled_count() > 0);
}

#[tokio::test]
async fn partial_chain_is_kept_on_scheduling_errors() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Floss", []).await.unwrap();
    h.scheduler.reject_next(2);

    let outcome = h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.unwrap();
    let ScheduleOutcome::Scheduled(report) = outcome else {
        panic!("expected a scheduled chain");
    };
    assert_eq!(report.failed, 2);
    assert!(report.is_partial());
    assert_eq!(h.outstanding(&id), ReminderPolicy::default().base_occurrences_single - 2);
}

#[tokio::test]
async fn revoking_premium_clears_every_task() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let a = h.controller.add_task(&mut h.store, "A", []).await.unwrap();
    let b = h.controller.add_task(&mut h.store, "B", [Day::Fri]).await.unwrap();
    let c = h.controller.add_task(&mut h.store, "C", []).await.unwrap();
    h.controller.set_reminder(&mut h.store, &a, at(9, 0)).await.unwrap();
    h.controller.set_reminder(&mut h.store, &b, at(18, 0)).await.unwrap();
    let total = h.outstanding(&a) + h.outstanding(&b);

    let cancelled = h.controller.revoke_premium(&mut h.store).await.unwrap();

    assert_eq!(cancelled, total);
    assert!(h.scheduler.pending().is_empty());
    assert!(!h.store.is_premium());
    for id in [&a, &b, &c] {
        assert!(h.store.get(id).unwrap().reminder.is_none());
    }
}

#[tokio::test]
async fn editing_rearms_a_stopped_day_unless_done() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Practice", []).await.unwrap();
    h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.unwrap();
    let today = h.today();

    h.controller.stop_today(&mut h.store, &id).await.unwrap();
    h.controller.set_reminder(&mut h.store, &id, at(10, 0)).await.unwrap();
    assert_eq!(h.pending_on(&id, "2026-02-16"), vec!["10:00"]);

    h.controller.toggle_done(&mut h.store, &id, today).await.unwrap();
    h.controller.set_reminder(&mut h.store, &id, at(11, 0)).await.unwrap();
    assert!(h.pending_on(&id, "2026-02-16").is_empty());
    assert!(h.store.get(&id).unwrap().reminder.as_ref().unwrap().is_stopped(today));
}

#[tokio::test]
async fn remove_reminder_returns_to_no_reminder() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Bins", [Day::Tue]).await.unwrap();
    h.controller.set_reminder(&mut h.store, &id, at(19, 0)).await.unwrap();
    let n = h.outstanding(&id);

    assert_eq!(h.controller.remove_reminder(&mut h.store, &id).await.unwrap(), n);
    let today = h.today();
    assert_eq!(h.store.get(&id).unwrap().reminder_state(today), ReminderState::NoReminder);
    assert!(h.scheduler.pending().is_empty());
    assert_eq!(h.controller.remove_reminder(&mut h.store, &id).await.unwrap(), 0);
}

#[tokio::test]
async fn refresh_tops_up_the_lookahead() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Vitamins", []).await.unwrap();
    h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.unwrap();
    h.controller.stop_today(&mut h.store, &id).await.unwrap();

    // Three days later the first triggers have fired.
    h.clock.set(feb(19, 8, 0));
    h.scheduler.fire_due(h.controller.now(), None);

    assert_eq!(h.controller.refresh_all(&mut h.store).await.unwrap(), 1);
    let r = h.store.get(&id).unwrap().reminder.clone().unwrap();
    assert_eq!(r.outstanding(), ReminderPolicy::default().base_occurrences_single);
    assert_eq!(r.notif_map.keys().next().unwrap().to_string(), "2026-02-19");
    assert!(r.stopped_dates.is_empty(), "past stops are pruned");
    assert_eq!(h.scheduler.pending_for(&id).len(), r.outstanding());
}

#[tokio::test]
async fn reconcile_runs_once_per_local_day() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Vitamins", []).await.unwrap();
    h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.unwrap();
    assert_eq!(h.controller.reconcile(&mut h.store).await.unwrap(), Some(1));

    h.clock.set(feb(16, 9, 2));
    h.controller.snooze(&mut h.store, &id, 15).await.unwrap();
    assert_eq!(h.controller.reconcile(&mut h.store).await.unwrap(), None);
    assert_eq!(h.pending_on(&id, "2026-02-16"), vec!["09:17"]);

    h.clock.set(feb(19, 7, 0));
    h.scheduler.fire_due(h.controller.now(), None);
    assert_eq!(h.controller.reconcile(&mut h.store).await.unwrap(), Some(1));
    assert_eq!(h.store.last_refresh(), Some(h.key("2026-02-19")));
    assert_eq!(h.outstanding(&id), ReminderPolicy::default().base_occurrences_single);
}

#[tokio::test]
async fn quick_actions_are_registered_once() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Stretch", []).await.unwrap();
    h.controller.set_reminder(&mut h.store, &id, at(9, 0)).await.unwrap();
    h.controller.set_reminder(&mut h.store, &id, at(10, 0)).await.unwrap();
    h.controller.snooze(&mut h.store, &id, 5).await.unwrap();

    assert_eq!(h.scheduler.register_calls(), 1);
}

#[tokio::test]
async fn unknown_task_is_an_error() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let err = h.controller.stop_today(&mut h.store, "missing").await.unwrap_err();
    assert!(matches!(err, ReminderError::TaskNotFound(_)));

    let id = h.controller.add_task(&mut h.store, "No reminder", []).await.unwrap();
    let err = h.controller.snooze(&mut h.store, &id, 5).await.unwrap_err();
    assert!(matches!(err, ReminderError::NoReminder(_)));

    let err = h.controller.add_task(&mut h.store, "   ", []).await.unwrap_err();
    assert!(matches!(err, ReminderError::InvalidTaskName(_)));
}

#[tokio::test]
async fn out_of_range_snooze_is_rejected_without_side_effects() {
    let mut h = harness_at(feb(16, 8, 0)).await;
    let id = h.controller.add_task(&mut h.store, "Meds", []).await.unwrap();
    h.controller
        .set_reminder(&mut h.store, &id, at(9, 0).repeating_every(10))
        .await
        .unwrap();
    let before = h.pending_on(&id, "2026-02-16");
    let cancels = h.scheduler.cancel_calls().len();

    for minutes in [0, -1, MAX_SNOOZE_MINUTES + 1, i64::MAX / 2] {
        let err = h.controller.snooze(&mut h.store, &id, minutes).await.unwrap_err();
        assert!(matches!(err, ReminderError::InvalidSnooze { .. }), "{minutes}: {err:?}");
    }

    assert_eq!(h.pending_on(&id, "2026-02-16"), before);
    assert_eq!(h.scheduler.cancel_calls().len(), cancels);
}
