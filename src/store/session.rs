use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogSizes, CompletionStats};
use crate::completion::Completion;
use crate::state::ProgressState;
use crate::tracker::{today, ProgressTracker, RecordOutcome};

use super::cache::{CachedProgress, LocalCache};
use super::error::SyncError;
use super::outbox::{DrainStats, SyncOutbox};
use super::remote::{RecordPatch, RemoteRecord, RemoteStore, SubscriptionId};

/// Lifecycle of a sync session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    Uninitialized,
    Initializing,
    Ready,
}

/// How `initialize` resolved the learner's record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// The remote record existed and was loaded.
    RemoteLoaded,
    /// First run: a default record was created locally and remotely.
    DefaultCreated,
    /// Remote unreachable; state restored from the local cache.
    OfflineFromCache,
    /// Remote unreachable and no usable cache; starting fresh.
    OfflineFresh,
}

struct SessionCore {
    phase: SyncPhase,
    user_id: String,
    tracker: Option<ProgressTracker>,
    outbox: SyncOutbox,
    /// Image of what the remote store is known to hold; upsert patches are
    /// diffed against this.
    last_synced: RemoteRecord,
}

fn lock_core(core: &Mutex<SessionCore>) -> MutexGuard<'_, SessionCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write the full record to the local cache and queue the changed fields for
/// the remote store. The caller is never blocked on remote delivery.
fn persist_locked<C: LocalCache>(
    core: &mut SessionCore,
    cache: &C,
    catalog: &CatalogSizes,
) -> Result<(), SyncError> {
    let Some(tracker) = core.tracker.as_mut() else {
        return Ok(());
    };

    let record = RemoteRecord::from_state(tracker.state());
    let patch = RecordPatch::diff(&core.last_synced, &record);
    core.outbox.enqueue(core.user_id.clone(), patch);

    let cached = CachedProgress {
        progress: tracker.state().clone(),
        metrics: *catalog,
        journal: tracker.journal().clone(),
        last_updated: SystemTime::now(),
    };
    cache.store(&cached)?;
    tracker.mark_persisted();
    Ok(())
}

/// Merge a freshly fetched remote record into local state, rewrite the cache,
/// and queue anything the merged view holds that the remote does not.
fn apply_remote_record<C: LocalCache>(
    core: &Mutex<SessionCore>,
    cache: &C,
    catalog: &CatalogSizes,
    record: RemoteRecord,
) {
    let mut guard = lock_core(core);
    let core = &mut *guard;
    let Some(tracker) = core.tracker.as_mut() else {
        return;
    };

    let remote_state = record.to_state(core.user_id.clone());
    tracker.merge_remote(&remote_state);

    // Pending diffs were computed against the old synced image; the fresh
    // diff against the fetched record subsumes them.
    core.outbox.clear_pending(&core.user_id);
    let merged = RemoteRecord::from_state(tracker.state());
    let patch = RecordPatch::diff(&record, &merged);
    core.outbox.enqueue(core.user_id.clone(), patch);
    core.last_synced = record;

    let cached = CachedProgress {
        progress: tracker.state().clone(),
        metrics: *catalog,
        journal: tracker.journal().clone(),
        last_updated: SystemTime::now(),
    };
    match cache.store(&cached) {
        Ok(()) => tracker.mark_persisted(),
        Err(err) => warn!(error = %err, "cache write failed during reconciliation"),
    }
    debug!(user_id = %core.user_id, "reconciled with remote record");
}

/// Per-session service object tying the tracker to a local cache, a remote
/// store, and the remote's change feed.
///
/// Mutations apply locally and synchronously; remote writes are queued and
/// delivered by `flush`. A feed notification triggers a refetch of the
/// authoritative record, which is merged field-by-field into local state, so
/// an optimistic completion that has not reached the remote store yet
/// survives reconciliation.
pub struct SyncSession<R: RemoteStore, C: LocalCache> {
    core: Arc<Mutex<SessionCore>>,
    remote: R,
    cache: C,
    catalog: CatalogSizes,
    subscription: Option<SubscriptionId>,
}

impl<R: RemoteStore, C: LocalCache> SyncSession<R, C> {
    pub fn new(remote: R, cache: C, catalog: CatalogSizes) -> Self {
        SyncSession {
            core: Arc::new(Mutex::new(SessionCore {
                phase: SyncPhase::Uninitialized,
                user_id: String::new(),
                tracker: None,
                outbox: SyncOutbox::new(),
                last_synced: RemoteRecord::default(),
            })),
            remote,
            cache,
            catalog,
            subscription: None,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        lock_core(&self.core).phase
    }

    /// Resolve the learner's record and become ready.
    ///
    /// Remote hit: adopt the record (percentage recomputed locally). Remote
    /// miss: create a default record on both sides. Remote unreachable: fall
    /// back to the local cache, or fresh state, and leave the push to the
    /// outbox; unavailability never fails initialization.
    pub fn initialize(&mut self, user_id: &str) -> InitOutcome {
        let mut guard = lock_core(&self.core);
        let core = &mut *guard;
        core.phase = SyncPhase::Initializing;
        core.user_id = user_id.to_string();

        let outcome = match self.remote.fetch(user_id) {
            Ok(Some(record)) => {
                let state = record.to_state(user_id);
                core.tracker = Some(ProgressTracker::from_state(state, self.catalog));
                core.last_synced = record;
                info!(user_id, "progress loaded from remote record");
                InitOutcome::RemoteLoaded
            }
            Ok(None) => {
                let tracker = ProgressTracker::new(user_id, self.catalog);
                let record = RemoteRecord::from_state(tracker.state());
                core.last_synced = match self.remote.create(user_id, &record) {
                    Ok(()) => record,
                    Err(err) => {
                        warn!(user_id, error = %err, "failed to create default remote record");
                        RemoteRecord::default()
                    }
                };
                core.tracker = Some(tracker);
                info!(user_id, "created default progress record");
                InitOutcome::DefaultCreated
            }
            Err(err) => {
                warn!(user_id, error = %err, "remote fetch failed, falling back to local cache");
                core.last_synced = RemoteRecord::default();
                let cached = match self.cache.load() {
                    Ok(cached) => cached,
                    Err(cache_err) => {
                        warn!(error = %cache_err, "local cache read failed");
                        None
                    }
                };
                match cached {
                    Some(cached) if cached.progress.user_id == user_id => {
                        core.tracker = Some(ProgressTracker::from_parts(
                            cached.progress,
                            cached.journal,
                            self.catalog,
                        ));
                        InitOutcome::OfflineFromCache
                    }
                    _ => {
                        core.tracker = Some(ProgressTracker::new(user_id, self.catalog));
                        InitOutcome::OfflineFresh
                    }
                }
            }
        };

        if let Err(err) = persist_locked(core, &self.cache, &self.catalog) {
            warn!(user_id, error = %err, "local cache write failed during initialization");
        }
        core.phase = SyncPhase::Ready;
        outcome
    }

    /// Record a completion dated today.
    pub fn record_completion(&mut self, completion: &Completion) -> Result<RecordOutcome, SyncError> {
        self.record_completion_on(completion, today())
    }

    /// Record a completion for an explicit calendar day.
    ///
    /// The state mutation and cache write are synchronous; the remote write
    /// is queued. Achievement rules run after the completion lands, and any
    /// grant is persisted the same way. The only error surfaced is a local
    /// cache failure, which callers should treat as a transient warning.
    pub fn record_completion_on(
        &mut self,
        completion: &Completion,
        date: NaiveDate,
    ) -> Result<RecordOutcome, SyncError> {
        let mut guard = lock_core(&self.core);
        let core = &mut *guard;
        if core.phase != SyncPhase::Ready {
            return Err(SyncError::NotInitialized);
        }
        let tracker = core.tracker.as_mut().ok_or(SyncError::NotInitialized)?;

        let outcome = tracker.record_completion_on(completion, date);
        if matches!(outcome, RecordOutcome::AlreadyCompleted) {
            return Ok(outcome);
        }

        persist_locked(core, &self.cache, &self.catalog)?;

        if let Some(tracker) = core.tracker.as_mut() {
            let unlocked = tracker.check_achievements_on(date);
            if !unlocked.is_empty() {
                debug!(user_id = %core.user_id, achievements = ?unlocked, "achievements unlocked");
                persist_locked(core, &self.cache, &self.catalog)?;
            }
        }

        Ok(outcome)
    }

    /// Deliver queued remote writes. Failed deliveries stay queued for the
    /// next call; nothing blocks on this.
    pub fn flush(&mut self) -> DrainStats {
        let mut guard = lock_core(&self.core);
        let core = &mut *guard;
        let stats = core.outbox.drain(&self.remote, &mut core.last_synced);
        if stats.published > 0 {
            debug!(user_id = %core.user_id, published = stats.published, "outbox drained");
        }
        stats
    }

    /// Refetch the authoritative record and merge it into local state.
    pub fn reconcile(&mut self) -> Result<(), SyncError> {
        let user_id = lock_core(&self.core).user_id.clone();
        match self.remote.fetch(&user_id) {
            Ok(Some(record)) => {
                apply_remote_record(&self.core, &self.cache, &self.catalog, record);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "reconciliation fetch failed");
                Err(SyncError::RemoteUnavailable(err.to_string()))
            }
        }
    }

    /// Open the change-feed subscription for this learner.
    ///
    /// Notifications carry no trusted payload; each one triggers a refetch
    /// and merge. If the feed drops, the engine does not reconnect on its
    /// own; the owner re-subscribes.
    pub fn subscribe(&mut self) -> Result<(), SyncError>
    where
        R: Clone + Send + Sync + 'static,
        C: Clone + Send + Sync + 'static,
    {
        if self.subscription.is_some() {
            return Ok(());
        }

        let user_id = {
            let guard = lock_core(&self.core);
            if guard.phase != SyncPhase::Ready {
                return Err(SyncError::NotInitialized);
            }
            guard.user_id.clone()
        };

        let core = Arc::clone(&self.core);
        let remote = self.remote.clone();
        let cache = self.cache.clone();
        let catalog = self.catalog;
        let uid = user_id.clone();
        let listener: Box<dyn Fn(String) + Send + Sync + 'static> = Box::new(move |_payload| {
            match remote.fetch(&uid) {
                Ok(Some(record)) => apply_remote_record(&core, &cache, &catalog, record),
                Ok(None) => {}
                Err(err) => warn!(user_id = %uid, error = %err, "reconciliation fetch failed"),
            }
        });

        let id = self
            .remote
            .subscribe(&user_id, listener)
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
        debug!(user_id = %user_id, subscription = %id, "change feed subscribed");
        self.subscription = Some(id);
        Ok(())
    }

    /// Tear down the feed subscription. In-flight remote writes are not
    /// cancelled; they succeed or fail on their own.
    pub fn unsubscribe(&mut self) {
        if let Some(id) = self.subscription.take() {
            if let Err(err) = self.remote.unsubscribe(&id) {
                warn!(error = %err, "failed to tear down change feed subscription");
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    // Read accessors. Safe to poll from any rendering layer; they never fail
    // and return defaults before initialization.

    fn with_tracker<T>(&self, default: T, read: impl FnOnce(&ProgressTracker) -> T) -> T {
        let guard = lock_core(&self.core);
        guard.tracker.as_ref().map(read).unwrap_or(default)
    }

    pub fn progress_percentage(&self) -> u8 {
        self.with_tracker(0, |t| t.progress_percentage())
    }

    pub fn current_streak(&self) -> u32 {
        self.with_tracker(0, |t| t.current_streak())
    }

    pub fn weekly_xp(&self) -> u64 {
        self.with_tracker(0, |t| t.weekly_xp())
    }

    pub fn completion_stats(&self) -> CompletionStats {
        let empty = CompletionStats {
            completed: 0,
            total: self.catalog.total(),
            percentage: 0,
        };
        self.with_tracker(empty, |t| t.completion_stats())
    }

    pub fn today_xp(&self) -> u64 {
        self.today_xp_on(today())
    }

    pub fn today_xp_on(&self, date: NaiveDate) -> u64 {
        self.with_tracker(0, |t| t.today_xp_on(date))
    }

    pub fn state_snapshot(&self) -> Option<ProgressState> {
        self.with_tracker(None, |t| Some(t.state().clone()))
    }

    /// Remote writes still waiting for delivery. A sustained non-zero value
    /// is the host's cue for a "progress may not be saved" indicator.
    pub fn pending_upserts(&self) -> usize {
        lock_core(&self.core).outbox.pending_len()
    }

    pub fn failed_upserts(&self) -> usize {
        lock_core(&self.core).outbox.failed_len()
    }
}

impl<R: RemoteStore, C: LocalCache> Drop for SyncSession<R, C> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
