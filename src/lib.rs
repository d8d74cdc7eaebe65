mod achievement;
mod catalog;
mod completion;
mod event;
mod journal;
mod state;
mod store;
mod streak;
mod tracker;
mod xp;

pub use achievement::{
    daily_goal_id, AchievementGrant, AchievementRule, DailyGoalRule, StreakMilestoneRule,
    DAILY_GOAL_BONUS_XP, DAILY_GOAL_TARGET,
};
pub use catalog::{CatalogSizes, CompletionStats};
pub use completion::{Category, Completion};
pub use event::ProgressEvent;
pub use journal::{EventRecord, Journal, PayloadError};
pub use state::ProgressState;
pub use store::{
    CacheError, CachedProgress, DrainStats, InitOutcome, LocalCache, MemoryCache, MemoryRemote,
    PendingUpsert, RecordPatch, RemoteError, RemoteRecord, RemoteStore, SubscriptionId, SyncError,
    SyncOutbox, SyncPhase, SyncSession, UpsertStatus, CACHE_KEY,
};
pub use streak::next_streak;
pub use tracker::{ProgressTracker, RecordOutcome};
pub use xp::{compute_xp, QUIZ_GOOD_SCORE, QUIZ_HIGH_SCORE};

// Re-export the EventEmitter from the event_emitter_rs crate
pub use event_emitter_rs::EventEmitter;
