use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use learntrack::{
    CatalogSizes, Category, Completion, MemoryCache, MemoryRemote, RemoteStore, SyncSession,
};

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn catalog() -> CatalogSizes {
    CatalogSizes::new(50, 25, 15)
}

fn device(remote: &MemoryRemote, user_id: &str) -> SyncSession<MemoryRemote, MemoryCache> {
    let mut session = SyncSession::new(remote.clone(), MemoryCache::new(), catalog());
    session.initialize(user_id);
    session
}

/// Feed delivery runs on emitter threads; give it a moment.
fn settle() {
    thread::sleep(Duration::from_millis(150));
}

#[test]
fn explicit_reconcile_merges_remote_and_local() {
    let remote = MemoryRemote::new();
    let today = day("2025-06-10");

    let mut device_a = device(&remote, "user-1");
    let mut device_b = device(&remote, "user-1");

    device_a
        .record_completion_on(&Completion::new("task-1", Category::Task), today)
        .unwrap();
    device_a.flush();

    // B has its own optimistic completion the remote store has not seen.
    device_b
        .record_completion_on(&Completion::new("lesson-1", Category::Lesson), today)
        .unwrap();

    device_b.reconcile().unwrap();

    let state = device_b.state_snapshot().unwrap();
    assert!(state.completed_tasks.contains("task-1"));
    assert!(state.completed_lessons.contains("lesson-1"));
    // Counters take the monotonic maximum of the two views.
    assert_eq!(state.total_xp, 100);

    // The merged surplus is queued; flushing converges the remote record.
    device_b.flush();
    let record = remote.fetch("user-1").unwrap().unwrap();
    assert_eq!(record.completed_tasks, vec!["task-1".to_string()]);
    assert_eq!(record.completed_lessons, vec!["lesson-1".to_string()]);
}

#[test]
fn feed_notification_triggers_refresh() {
    let remote = MemoryRemote::new();
    let today = day("2025-06-10");

    let mut device_a = device(&remote, "user-1");
    let mut device_b = device(&remote, "user-1");
    device_b.subscribe().unwrap();
    assert!(device_b.is_subscribed());

    device_a
        .record_completion_on(
            &Completion::new("quiz-1", Category::Quiz).with_score(92),
            today,
        )
        .unwrap();
    device_a.flush();
    settle();

    let state = device_b.state_snapshot().unwrap();
    assert!(state.completed_quizzes.contains("quiz-1"));
    assert_eq!(device_b.weekly_xp(), 100);
    assert_eq!(device_b.today_xp_on(today), 100);
}

#[test]
fn local_optimistic_completion_survives_feed_refresh() {
    let remote = MemoryRemote::new();
    let today = day("2025-06-10");

    let mut device_a = device(&remote, "user-1");
    let mut device_b = device(&remote, "user-1");
    device_b.subscribe().unwrap();

    // B's completion is applied locally but its remote write is still queued.
    device_b
        .record_completion_on(&Completion::new("lesson-1", Category::Lesson), today)
        .unwrap();
    assert_eq!(device_b.pending_upserts(), 1);

    device_a
        .record_completion_on(&Completion::new("task-1", Category::Task), today)
        .unwrap();
    device_a.flush();
    settle();

    // The refresh merged field-by-field instead of overwriting, so the
    // not-yet-acknowledged local completion is still here.
    let state = device_b.state_snapshot().unwrap();
    assert!(state.completed_lessons.contains("lesson-1"));
    assert!(state.completed_tasks.contains("task-1"));
}

#[test]
fn notifications_for_other_users_are_scoped_out() {
    let remote = MemoryRemote::new();
    let today = day("2025-06-10");

    let mut listener = device(&remote, "user-1");
    listener.subscribe().unwrap();

    let mut other = device(&remote, "user-2");
    other
        .record_completion_on(&Completion::new("lesson-1", Category::Lesson), today)
        .unwrap();
    other.flush();
    settle();

    assert_eq!(listener.weekly_xp(), 0);
    assert!(listener
        .state_snapshot()
        .unwrap()
        .completed_lessons
        .is_empty());
}

#[test]
fn unsubscribe_stops_feed_refreshes() {
    let remote = MemoryRemote::new();
    let today = day("2025-06-10");

    let mut device_a = device(&remote, "user-1");
    let mut device_b = device(&remote, "user-1");
    device_b.subscribe().unwrap();
    device_b.unsubscribe();
    assert!(!device_b.is_subscribed());

    device_a
        .record_completion_on(&Completion::new("lesson-1", Category::Lesson), today)
        .unwrap();
    device_a.flush();
    settle();

    assert!(device_b
        .state_snapshot()
        .unwrap()
        .completed_lessons
        .is_empty());

    // The record is still there for an explicit reconcile.
    device_b.reconcile().unwrap();
    assert!(device_b
        .state_snapshot()
        .unwrap()
        .completed_lessons
        .contains("lesson-1"));
}

#[test]
fn two_subscribed_sessions_converge() {
    let remote = MemoryRemote::new();
    let today = day("2025-06-10");

    let mut device_a = device(&remote, "user-1");
    let mut device_b = device(&remote, "user-1");
    device_a.subscribe().unwrap();
    device_b.subscribe().unwrap();

    device_a
        .record_completion_on(&Completion::new("task-1", Category::Task), today)
        .unwrap();
    device_a.flush();
    settle();

    device_b
        .record_completion_on(&Completion::new("lesson-1", Category::Lesson), today)
        .unwrap();
    device_b.flush();
    settle();

    let state_a = device_a.state_snapshot().unwrap();
    let state_b = device_b.state_snapshot().unwrap();

    assert_eq!(state_a.completed_tasks, state_b.completed_tasks);
    assert_eq!(state_a.completed_lessons, state_b.completed_lessons);
    assert_eq!(state_a.total_xp, state_b.total_xp);
    assert_eq!(state_a.total_xp, 150);
}
