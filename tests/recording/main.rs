use chrono::NaiveDate;
use learntrack::{
    daily_goal_id, CatalogSizes, Category, Completion, InitOutcome, MemoryCache, MemoryRemote,
    RecordOutcome, RemoteStore, SyncPhase, SyncSession,
};

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn catalog() -> CatalogSizes {
    CatalogSizes::new(50, 25, 15)
}

fn ready_session(remote: &MemoryRemote) -> SyncSession<MemoryRemote, MemoryCache> {
    let mut session = SyncSession::new(remote.clone(), MemoryCache::new(), catalog());
    session.initialize("user-1");
    session
}

#[test]
fn first_run_creates_default_record() {
    let remote = MemoryRemote::new();
    let mut session = SyncSession::new(remote.clone(), MemoryCache::new(), catalog());

    let outcome = session.initialize("user-1");
    assert_eq!(outcome, InitOutcome::DefaultCreated);
    assert_eq!(session.phase(), SyncPhase::Ready);

    let record = remote.fetch("user-1").unwrap().unwrap();
    assert_eq!(record.total_xp, 0);
    assert!(record.completed_lessons.is_empty());
}

#[test]
fn records_and_summarizes() {
    let remote = MemoryRemote::new();
    let mut session = ready_session(&remote);
    let today = day("2025-06-10");

    let outcome = session
        .record_completion_on(&Completion::new("lesson-1", Category::Lesson), today)
        .unwrap();
    assert_eq!(
        outcome,
        RecordOutcome::Recorded {
            xp_earned: 50,
            streak: 1
        }
    );

    session
        .record_completion_on(&Completion::new("task-1", Category::Task), today)
        .unwrap();
    session
        .record_completion_on(
            &Completion::new("quiz-1", Category::Quiz).with_score(95),
            today,
        )
        .unwrap();

    assert_eq!(session.weekly_xp(), 250);
    assert_eq!(session.today_xp_on(today), 250);
    assert_eq!(session.current_streak(), 1);

    let stats = session.completion_stats();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.total, 90);
    assert_eq!(stats.percentage, 3);

    let state = session.state_snapshot().unwrap();
    assert_eq!(state.total_xp, 250);
    assert!(state.completed_quizzes.contains("quiz-1"));
}

#[test]
fn duplicate_submission_is_noop() {
    let remote = MemoryRemote::new();
    let mut session = ready_session(&remote);
    let today = day("2025-06-10");
    let completion = Completion::new("lesson-1", Category::Lesson);

    session.record_completion_on(&completion, today).unwrap();
    let before = session.state_snapshot().unwrap();

    let second = session.record_completion_on(&completion, today).unwrap();
    assert_eq!(second, RecordOutcome::AlreadyCompleted);
    assert_eq!(session.state_snapshot().unwrap(), before);
}

#[test]
fn streak_follows_calendar_days() {
    let remote = MemoryRemote::new();
    let mut session = ready_session(&remote);

    session
        .record_completion_on(&Completion::new("lesson-1", Category::Lesson), day("2025-06-09"))
        .unwrap();
    assert_eq!(session.current_streak(), 1);

    session
        .record_completion_on(&Completion::new("lesson-2", Category::Lesson), day("2025-06-10"))
        .unwrap();
    assert_eq!(session.current_streak(), 2);

    // Several completions on one day move the streak once at most.
    session
        .record_completion_on(&Completion::new("lesson-3", Category::Lesson), day("2025-06-10"))
        .unwrap();
    assert_eq!(session.current_streak(), 2);

    session
        .record_completion_on(&Completion::new("lesson-4", Category::Lesson), day("2025-06-14"))
        .unwrap();
    assert_eq!(session.current_streak(), 1);
}

#[test]
fn daily_goal_awarded_once_through_session() {
    let remote = MemoryRemote::new();
    let mut session = ready_session(&remote);
    let today = day("2025-06-10");

    session
        .record_completion_on(&Completion::new("lesson-1", Category::Lesson), today)
        .unwrap();
    session
        .record_completion_on(&Completion::new("task-1", Category::Task), today)
        .unwrap();
    // lesson (1) + task (2) + task (2) crosses the 5-unit goal
    session
        .record_completion_on(&Completion::new("task-2", Category::Task), today)
        .unwrap();

    let state = session.state_snapshot().unwrap();
    assert!(state.achievements.contains(&daily_goal_id(today)));
    assert_eq!(state.total_xp, 450);

    // Further completions the same day do not grant it again.
    session
        .record_completion_on(&Completion::new("lesson-2", Category::Lesson), today)
        .unwrap();
    let state = session.state_snapshot().unwrap();
    assert_eq!(state.achievements.len(), 1);
    assert_eq!(state.total_xp, 500);
}

#[test]
fn flush_pushes_and_new_session_loads() {
    let remote = MemoryRemote::new();
    let today = day("2025-06-10");

    {
        let mut session = ready_session(&remote);
        session
            .record_completion_on(&Completion::new("lesson-1", Category::Lesson), today)
            .unwrap();
        session
            .record_completion_on(
                &Completion::new("quiz-1", Category::Quiz).with_score(85),
                today,
            )
            .unwrap();
        assert!(session.pending_upserts() > 0);

        let stats = session.flush();
        assert_eq!(stats.published, 1);
        assert_eq!(session.pending_upserts(), 0);
    }

    let mut next = SyncSession::new(remote.clone(), MemoryCache::new(), catalog());
    assert_eq!(next.initialize("user-1"), InitOutcome::RemoteLoaded);
    assert_eq!(next.weekly_xp(), 140);
    assert_eq!(next.today_xp_on(today), 140);
    assert_eq!(next.current_streak(), 1);

    let state = next.state_snapshot().unwrap();
    assert!(state.completed_lessons.contains("lesson-1"));
    assert!(state.completed_quizzes.contains("quiz-1"));
}

#[test]
fn loaded_percentage_is_recomputed_not_trusted() {
    let remote = MemoryRemote::new();
    let today = day("2025-06-10");

    {
        let mut session = ready_session(&remote);
        for i in 0..9 {
            session
                .record_completion_on(
                    &Completion::new(format!("lesson-{}", i), Category::Lesson),
                    today,
                )
                .unwrap();
        }
        session.flush();
    }

    // A session configured with a different catalog derives its own
    // percentage from the counts.
    let mut next = SyncSession::new(remote.clone(), MemoryCache::new(), CatalogSizes::new(5, 3, 1));
    next.initialize("user-1");
    assert_eq!(next.progress_percentage(), 100);
}
