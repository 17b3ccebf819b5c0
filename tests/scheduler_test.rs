mod helpers;

use chrono::{Duration, Utc};
use helpers::{decay_config, insert_node, scheduler_config, t0, test_store, FailingStore};
use recollect::memory::store::MemoryStore;
use recollect::memory::types::{MemoryTier, SessionType};
use recollect::scheduler::registry::ScheduleKind;
use recollect::scheduler::{Scheduler, TickOutcome};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn scheduler(store: &Arc<dyn MemoryStore>, persist: bool, now: chrono::DateTime<Utc>) -> Scheduler {
    Scheduler::init(Arc::clone(store), decay_config(), scheduler_config(persist), now)
}

fn ran_kind(outcome: &TickOutcome) -> Option<ScheduleKind> {
    match outcome {
        TickOutcome::Ran { schedule, .. } => Some(*schedule),
        _ => None,
    }
}

#[tokio::test]
async fn tick_with_nothing_due_changes_nothing() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    let node = insert_node(&*store, "alice", MemoryTier::Working, 0.8, false, t0(), Duration::hours(7));
    let scheduler = scheduler(&store, false, t0());
    let before = scheduler.schedules();

    let outcome = scheduler.run_scheduled_tick(t0() + Duration::minutes(30)).await;

    assert!(matches!(outcome, TickOutcome::Idle));
    assert_eq!(scheduler.schedules(), before);
    assert_eq!(store.get_node(&node.id).unwrap().unwrap().memory_tier, MemoryTier::Working);
    assert!(store.list_sessions("alice", 10).unwrap().is_empty());
}

#[tokio::test]
async fn due_hourly_runs_then_waits_a_full_period() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    insert_node(&*store, "alice", MemoryTier::Working, 0.8, false, t0(), Duration::hours(7));
    // initialized an hour ago, so hourly is due exactly at t0
    let scheduler = scheduler(&store, false, t0() - Duration::hours(1));
    assert_eq!(scheduler.schedules()[0].next_run, t0());

    let outcome = scheduler.run_scheduled_tick(t0()).await;
    assert_eq!(ran_kind(&outcome), Some(ScheduleKind::Hourly));

    let hourly = scheduler.schedules()[0].clone();
    assert_eq!(hourly.kind, ScheduleKind::Hourly);
    assert_eq!(hourly.last_run, Some(t0()));
    assert_eq!(hourly.next_run, t0() + Duration::hours(1));
    assert_eq!(hourly.processing_nodes, 1);

    let sessions = store.list_sessions("alice", 10).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_type, SessionType::AutomaticHourly);

    let again = scheduler.run_scheduled_tick(t0() + Duration::minutes(30)).await;
    assert!(matches!(again, TickOutcome::Idle));
    assert_eq!(store.list_sessions("alice", 10).unwrap().len(), 1);
}

#[tokio::test]
async fn one_schedule_per_tick_in_kind_order() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    let scheduler = scheduler(&store, false, t0());
    let later = t0() + Duration::hours(25);

    let first = scheduler.run_scheduled_tick(later).await;
    let second = scheduler.run_scheduled_tick(later).await;
    let third = scheduler.run_scheduled_tick(later).await;

    assert_eq!(ran_kind(&first), Some(ScheduleKind::Hourly));
    assert_eq!(ran_kind(&second), Some(ScheduleKind::Daily));
    assert!(matches!(third, TickOutcome::Idle));
}

#[tokio::test]
async fn disabled_schedules_are_skipped() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    let scheduler = scheduler(&store, false, t0());

    assert!(!scheduler.toggle_schedule(ScheduleKind::Hourly).await);
    assert!(!scheduler.toggle_schedule(ScheduleKind::Daily).await);

    // weekly is off by default, so nothing runs even far in the future
    let outcome = scheduler.run_scheduled_tick(t0() + Duration::days(30)).await;
    assert!(matches!(outcome, TickOutcome::Idle));
}

#[tokio::test]
async fn toggle_keeps_next_run() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    let scheduler = scheduler(&store, false, t0());
    let before = scheduler.schedules()[2].next_run;

    assert!(scheduler.toggle_schedule(ScheduleKind::Weekly).await);
    let weekly = scheduler.schedules()[2].clone();
    assert!(weekly.enabled);
    assert_eq!(weekly.next_run, before);
}

#[tokio::test]
async fn scheduled_run_covers_every_owner() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    for owner in ["alice", "bob"] {
        insert_node(&*store, owner, MemoryTier::Working, 0.8, false, t0(), Duration::hours(7));
    }
    let scheduler = scheduler(&store, false, t0() - Duration::hours(1));

    let TickOutcome::Ran { schedule, reports } = scheduler.run_scheduled_tick(t0()).await else {
        panic!("expected a run");
    };
    assert_eq!(schedule, ScheduleKind::Hourly);
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.promoted_to_short_term == 1));

    for owner in ["alice", "bob"] {
        let sessions = store.list_sessions(owner, 10).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_type, SessionType::AutomaticHourly);
    }
    assert_eq!(scheduler.schedules()[0].processing_nodes, 2);
}

#[tokio::test]
async fn force_schedule_runs_disabled_weekly_and_advances_it() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    insert_node(&*store, "alice", MemoryTier::LongTerm, 0.5, false, t0(), Duration::days(3));
    let scheduler = scheduler(&store, false, t0());
    let now = t0() + Duration::hours(2);

    let outcome = scheduler.force_schedule(ScheduleKind::Weekly, now).await;
    assert_eq!(ran_kind(&outcome), Some(ScheduleKind::Weekly));

    let weekly = scheduler.schedules()[2].clone();
    assert!(!weekly.enabled);
    assert_eq!(weekly.last_run, Some(now));
    assert_eq!(weekly.next_run, now + Duration::days(7));

    let sessions = store.list_sessions("alice", 10).unwrap();
    assert_eq!(sessions[0].session_type, SessionType::AutomaticWeekly);
    assert_eq!(sessions[0].nodes_processed, 1);
}

#[tokio::test]
async fn failed_run_still_advances_schedule() {
    let failing = Arc::new(FailingStore::new());
    let store: Arc<dyn MemoryStore> = failing.clone();
    insert_node(&*store, "alice", MemoryTier::Working, 0.8, false, t0(), Duration::hours(7));
    failing.fail_list.store(true, Ordering::SeqCst);

    let scheduler = scheduler(&store, false, t0() - Duration::hours(1));
    let TickOutcome::Ran { reports, .. } = scheduler.run_scheduled_tick(t0()).await else {
        panic!("expected a run");
    };

    assert!(!reports[0].is_success());
    assert_eq!(scheduler.schedules()[0].next_run, t0() + Duration::hours(1));
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn persisted_schedules_survive_restart() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());

    let first = scheduler(&store, true, t0());
    first.toggle_schedule(ScheduleKind::Weekly).await;
    first.run_scheduled_tick(t0() + Duration::hours(1)).await;
    first.shutdown().await.unwrap();
    let saved = first.schedules();

    let second = scheduler(&store, true, t0() + Duration::minutes(90));
    assert_eq!(second.schedules(), saved);
    assert!(second.schedules()[2].enabled);
    assert_eq!(second.schedules()[0].last_run, Some(t0() + Duration::hours(1)));
}

#[tokio::test]
async fn stale_restored_schedule_runs_once() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    let first = scheduler(&store, true, t0());
    first.shutdown().await.unwrap();

    // hourly missed four periods while the process was down
    let now = t0() + Duration::hours(5);
    let second = scheduler(&store, true, now);
    assert_eq!(second.schedules()[0].next_run, t0() + Duration::hours(1));

    let outcome = second.run_scheduled_tick(now).await;
    assert_eq!(ran_kind(&outcome), Some(ScheduleKind::Hourly));
    assert_eq!(second.schedules()[0].next_run, now + Duration::hours(1));
    assert!(matches!(second.run_scheduled_tick(now).await, TickOutcome::Idle));
}

#[tokio::test]
async fn saved_schedules_ignored_without_persistence() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    let first = scheduler(&store, true, t0());
    first.toggle_schedule(ScheduleKind::Weekly).await;

    let fresh = scheduler(&store, false, t0());
    assert!(!fresh.schedules()[2].enabled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_saves_schedules_off_the_runtime_threads() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    let persisting = scheduler(&store, true, t0());
    persisting.run_scheduled_tick(t0() + Duration::hours(1)).await;
    persisting.shutdown().await.unwrap();
    assert_eq!(store.load_schedules().unwrap(), persisting.schedules());

    let other: Arc<dyn MemoryStore> = Arc::new(test_store());
    let transient = scheduler(&other, false, t0());
    transient.shutdown().await.unwrap();
    assert!(other.load_schedules().unwrap().is_empty());
}

#[tokio::test]
async fn system_status_reports_next_execution() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    let scheduler = scheduler(&store, false, t0());

    let status = scheduler.system_status();
    assert!(status.is_healthy);
    assert_eq!(status.enabled_schedules, 2);
    assert_eq!(status.total_schedules, 3);
    assert_eq!(status.next_execution, Some(t0() + Duration::hours(1)));
    assert_eq!(status.next_execution_type, Some(ScheduleKind::Hourly));
    assert!(!status.is_running);
    assert!(status.current_operation.is_none());

    scheduler.toggle_schedule(ScheduleKind::Hourly).await;
    scheduler.toggle_schedule(ScheduleKind::Daily).await;
    let status = scheduler.system_status();
    assert!(!status.is_healthy);
    assert_eq!(status.enabled_schedules, 0);
    assert!(status.next_execution.is_none());
}

#[tokio::test]
async fn background_ticker_runs_due_schedule_and_stops() {
    let store: Arc<dyn MemoryStore> = Arc::new(test_store());
    let now = Utc::now();
    insert_node(&*store, "alice", MemoryTier::Working, 0.8, false, now, Duration::hours(7));

    let mut config = scheduler_config(false);
    config.tick_interval_secs = 1;
    // hourly came due an hour before startup
    let scheduler = Arc::new(Scheduler::init(
        Arc::clone(&store),
        decay_config(),
        config,
        now - Duration::hours(2),
    ));
    let handle = scheduler.start();

    let mut sessions = Vec::new();
    for _ in 0..50 {
        sessions = store.list_sessions("alice", 10).unwrap();
        if !sessions.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    handle.stop().await;

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_type, SessionType::AutomaticHourly);
    assert!(scheduler.schedules()[0].next_run > now);
}
