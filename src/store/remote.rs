use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::NaiveDate;
use event_emitter_rs::EventEmitter;
use serde::{Deserialize, Serialize};

use crate::state::ProgressState;

/// The authoritative remote record, keyed server-side by user id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(default)]
    pub completed_lessons: Vec<String>,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    #[serde(default)]
    pub completed_quizzes: Vec<String>,
    #[serde(default)]
    pub total_xp: u64,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub last_activity_date: Option<NaiveDate>,
    #[serde(default)]
    pub weekly_xp: u64,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub daily_goal_progress: u32,
    #[serde(default)]
    pub xp_by_day: BTreeMap<NaiveDate, u64>,
}

impl RemoteRecord {
    pub fn from_state(state: &ProgressState) -> Self {
        RemoteRecord {
            completed_lessons: state.completed_lessons.iter().cloned().collect(),
            completed_tasks: state.completed_tasks.iter().cloned().collect(),
            completed_quizzes: state.completed_quizzes.iter().cloned().collect(),
            total_xp: state.total_xp,
            current_streak: state.current_streak,
            last_activity_date: state.last_activity_date,
            weekly_xp: state.weekly_xp,
            achievements: state.achievements.iter().cloned().collect(),
            daily_goal_progress: state.daily_goal_progress,
            xp_by_day: state.xp_by_day.clone(),
        }
    }

    /// Build local state from this record. The caller recomputes the derived
    /// percentage; a stored one is never trusted.
    pub fn to_state(&self, user_id: impl Into<String>) -> ProgressState {
        let mut state = ProgressState::new(user_id);
        state.completed_lessons = self.completed_lessons.iter().cloned().collect();
        state.completed_tasks = self.completed_tasks.iter().cloned().collect();
        state.completed_quizzes = self.completed_quizzes.iter().cloned().collect();
        state.total_xp = self.total_xp;
        state.current_streak = self.current_streak;
        state.last_activity_date = self.last_activity_date;
        state.weekly_xp = self.weekly_xp;
        state.achievements = self.achievements.iter().cloned().collect();
        state.daily_goal_progress = self.daily_goal_progress;
        state.xp_by_day = self.xp_by_day.clone();
        state
    }
}

/// A partial upsert: only the fields that changed since the last
/// acknowledged write. Field granularity, merge-by-field on write.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_lessons: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_tasks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_quizzes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_xp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_xp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_goal_progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp_by_day: Option<BTreeMap<NaiveDate, u64>>,
}

macro_rules! diff_field {
    ($patch:ident, $base:ident, $target:ident, $field:ident) => {
        if $base.$field != $target.$field {
            $patch.$field = Some($target.$field.clone());
        }
    };
}

macro_rules! merge_field {
    ($self:ident, $later:ident, $field:ident) => {
        if $later.$field.is_some() {
            $self.$field = $later.$field;
        }
    };
}

macro_rules! apply_field {
    ($self:ident, $record:ident, $field:ident) => {
        if let Some(value) = &$self.$field {
            $record.$field = value.clone();
        }
    };
}

impl RecordPatch {
    /// Fields in `target` that differ from `base`.
    pub fn diff(base: &RemoteRecord, target: &RemoteRecord) -> RecordPatch {
        let mut patch = RecordPatch::default();
        diff_field!(patch, base, target, completed_lessons);
        diff_field!(patch, base, target, completed_tasks);
        diff_field!(patch, base, target, completed_quizzes);
        diff_field!(patch, base, target, total_xp);
        diff_field!(patch, base, target, current_streak);
        diff_field!(patch, base, target, last_activity_date);
        diff_field!(patch, base, target, weekly_xp);
        diff_field!(patch, base, target, achievements);
        diff_field!(patch, base, target, daily_goal_progress);
        diff_field!(patch, base, target, xp_by_day);
        patch
    }

    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }

    /// Coalesce a later patch into this one. Later values win per field.
    pub fn merge(&mut self, later: RecordPatch) {
        merge_field!(self, later, completed_lessons);
        merge_field!(self, later, completed_tasks);
        merge_field!(self, later, completed_quizzes);
        merge_field!(self, later, total_xp);
        merge_field!(self, later, current_streak);
        merge_field!(self, later, last_activity_date);
        merge_field!(self, later, weekly_xp);
        merge_field!(self, later, achievements);
        merge_field!(self, later, daily_goal_progress);
        merge_field!(self, later, xp_by_day);
    }

    /// Write the present fields into a record.
    pub fn apply_to(&self, record: &mut RemoteRecord) {
        apply_field!(self, record, completed_lessons);
        apply_field!(self, record, completed_tasks);
        apply_field!(self, record, completed_quizzes);
        apply_field!(self, record, total_xp);
        apply_field!(self, record, current_streak);
        apply_field!(self, record, last_activity_date);
        apply_field!(self, record, weekly_xp);
        apply_field!(self, record, achievements);
        apply_field!(self, record, daily_goal_progress);
        apply_field!(self, record, xp_by_day);
    }
}

pub type SubscriptionId = String;

/// The authoritative store shared across sessions and devices, plus its
/// push-based change feed.
///
/// One feed subscription is scoped server-side to a single user id. The
/// notification payload is advisory only; consumers refetch rather than
/// trust it.
pub trait RemoteStore {
    type Error: fmt::Display;

    fn fetch(&self, user_id: &str) -> Result<Option<RemoteRecord>, Self::Error>;

    fn create(&self, user_id: &str, record: &RemoteRecord) -> Result<(), Self::Error>;

    /// Merge-by-field upsert of the changed fields only.
    fn upsert(&self, user_id: &str, patch: &RecordPatch) -> Result<(), Self::Error>;

    fn subscribe(
        &self,
        user_id: &str,
        listener: Box<dyn Fn(String) + Send + Sync + 'static>,
    ) -> Result<SubscriptionId, Self::Error>;

    fn unsubscribe(&self, subscription: &SubscriptionId) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    Unavailable,
    LockPoisoned(&'static str),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Unavailable => write!(f, "remote store unavailable"),
            RemoteError::LockPoisoned(operation) => {
                write!(f, "remote lock poisoned during {}", operation)
            }
        }
    }
}

impl std::error::Error for RemoteError {}

/// In-memory remote store with a per-user change feed.
///
/// Cloning creates another handle to the same records and feed, which is how
/// tests model several devices sharing one backend. `set_offline` makes every
/// call fail until cleared.
#[derive(Clone)]
pub struct MemoryRemote {
    records: Arc<RwLock<HashMap<String, RemoteRecord>>>,
    feed: Arc<Mutex<EventEmitter>>,
    offline: Arc<AtomicBool>,
}

fn channel(user_id: &str) -> String {
    format!("progress:{}", user_id)
}

impl MemoryRemote {
    pub fn new() -> Self {
        MemoryRemote {
            records: Arc::new(RwLock::new(HashMap::new())),
            feed: Arc::new(Mutex::new(EventEmitter::new())),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable)
        } else {
            Ok(())
        }
    }

    /// Notify feed subscribers for this user. Listeners run on emitter
    /// threads; the records lock is never held across this call.
    fn notify(&self, user_id: &str) {
        if let Ok(mut feed) = self.feed.lock() {
            feed.emit(&channel(user_id), user_id.to_string());
        }
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryRemote {
    type Error = RemoteError;

    fn fetch(&self, user_id: &str) -> Result<Option<RemoteRecord>, Self::Error> {
        self.check_online()?;
        let records = self
            .records
            .read()
            .map_err(|_| RemoteError::LockPoisoned("fetch"))?;
        Ok(records.get(user_id).cloned())
    }

    fn create(&self, user_id: &str, record: &RemoteRecord) -> Result<(), Self::Error> {
        self.check_online()?;
        {
            let mut records = self
                .records
                .write()
                .map_err(|_| RemoteError::LockPoisoned("create"))?;
            records.insert(user_id.to_string(), record.clone());
        }
        self.notify(user_id);
        Ok(())
    }

    fn upsert(&self, user_id: &str, patch: &RecordPatch) -> Result<(), Self::Error> {
        self.check_online()?;
        {
            let mut records = self
                .records
                .write()
                .map_err(|_| RemoteError::LockPoisoned("upsert"))?;
            let record = records.entry(user_id.to_string()).or_default();
            patch.apply_to(record);
        }
        self.notify(user_id);
        Ok(())
    }

    fn subscribe(
        &self,
        user_id: &str,
        listener: Box<dyn Fn(String) + Send + Sync + 'static>,
    ) -> Result<SubscriptionId, Self::Error> {
        self.check_online()?;
        let mut feed = self
            .feed
            .lock()
            .map_err(|_| RemoteError::LockPoisoned("subscribe"))?;
        let id = feed.on(&channel(user_id), move |payload: String| listener(payload));
        Ok(id)
    }

    fn unsubscribe(&self, subscription: &SubscriptionId) -> Result<(), Self::Error> {
        let mut feed = self
            .feed
            .lock()
            .map_err(|_| RemoteError::LockPoisoned("unsubscribe"))?;
        let _ = feed.remove_listener(subscription);
        Ok(())
    }
}
