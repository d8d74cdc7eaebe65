use tracing::{debug, warn};

use super::remote::{RecordPatch, RemoteRecord, RemoteStore};

/// Lifecycle of a queued remote write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpsertStatus {
    #[default]
    Pending,
    InFlight,
    Published,
    Failed,
}

/// A remote write waiting for delivery, with its retry bookkeeping.
#[derive(Clone, Debug)]
pub struct PendingUpsert {
    pub user_id: String,
    pub patch: RecordPatch,
    pub status: UpsertStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Result of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub published: usize,
    pub released: usize,
    pub failed: usize,
}

/// Queue of outbound remote writes.
///
/// Mutations enqueue here instead of writing to the remote store inline, so a
/// failed write is retried on the next drain rather than silently dropped.
/// Consecutive patches for the same user coalesce into one entry; after
/// `max_attempts` failed deliveries an entry is marked failed and left for
/// inspection.
pub struct SyncOutbox {
    queue: Vec<PendingUpsert>,
    max_attempts: u32,
}

impl SyncOutbox {
    pub fn new() -> Self {
        SyncOutbox {
            queue: Vec::new(),
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Queue a patch. Coalesces into the newest pending entry for the same
    /// user when one exists.
    pub fn enqueue(&mut self, user_id: impl Into<String>, patch: RecordPatch) {
        if patch.is_empty() {
            return;
        }

        let user_id = user_id.into();
        if let Some(pending) = self
            .queue
            .iter_mut()
            .rev()
            .find(|p| p.user_id == user_id && p.status == UpsertStatus::Pending)
        {
            pending.patch.merge(patch);
            return;
        }

        self.queue.push(PendingUpsert {
            user_id,
            patch,
            status: UpsertStatus::Pending,
            attempts: 0,
            last_error: None,
        });
    }

    /// Deliver every pending entry to the remote store.
    ///
    /// Published patches are also applied to `synced`, the caller's image of
    /// what the remote store now holds.
    pub fn drain<R: RemoteStore>(&mut self, remote: &R, synced: &mut RemoteRecord) -> DrainStats {
        let mut stats = DrainStats::default();

        for entry in &mut self.queue {
            if entry.status != UpsertStatus::Pending {
                continue;
            }

            entry.status = UpsertStatus::InFlight;
            entry.attempts += 1;

            match remote.upsert(&entry.user_id, &entry.patch) {
                Ok(()) => {
                    entry.status = UpsertStatus::Published;
                    entry.patch.apply_to(synced);
                    stats.published += 1;
                }
                Err(err) => {
                    let message = err.to_string();
                    if entry.attempts >= self.max_attempts {
                        warn!(
                            user_id = %entry.user_id,
                            attempts = entry.attempts,
                            error = %message,
                            "remote upsert failed permanently"
                        );
                        entry.status = UpsertStatus::Failed;
                        entry.last_error = Some(message);
                        stats.failed += 1;
                    } else {
                        debug!(
                            user_id = %entry.user_id,
                            attempts = entry.attempts,
                            error = %message,
                            "remote upsert failed, will retry"
                        );
                        entry.status = UpsertStatus::Pending;
                        entry.last_error = Some(message);
                        stats.released += 1;
                    }
                }
            }
        }

        self.queue.retain(|e| e.status != UpsertStatus::Published);
        stats
    }

    /// Drop pending entries for a user. Used when reconciliation moves the
    /// synced image forward: old diffs are stale, and the caller enqueues a
    /// fresh one computed against the new image.
    pub fn clear_pending(&mut self, user_id: &str) {
        self.queue
            .retain(|e| !(e.user_id == user_id && e.status == UpsertStatus::Pending));
    }

    pub fn pending_len(&self) -> usize {
        self.queue
            .iter()
            .filter(|e| e.status == UpsertStatus::Pending)
            .count()
    }

    pub fn failed_len(&self) -> usize {
        self.queue
            .iter()
            .filter(|e| e.status == UpsertStatus::Failed)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn entries(&self) -> &[PendingUpsert] {
        &self.queue
    }
}

impl Default for SyncOutbox {
    fn default() -> Self {
        Self::new()
    }
}
