use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::EventRecord;

/// Append-only, in-session event log for one learner.
///
/// Mutations digest typed events here before applying them, so the full
/// session history can be replayed deterministically and audited. The
/// `committed_version` watermark tracks which records have reached the local
/// cache; it is not serialized, so a freshly loaded journal reports every
/// record as new until the owner marks it committed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Journal {
    id: String,
    version: u64,
    events: Vec<EventRecord>,
    #[serde(skip, default)]
    replaying: bool,
    #[serde(skip, default)]
    committed_version: u64,
    timestamp: SystemTime,
}

impl Default for Journal {
    fn default() -> Self {
        Journal {
            id: String::new(),
            version: 0,
            events: Vec::new(),
            replaying: false,
            committed_version: 0,
            timestamp: SystemTime::now(),
        }
    }
}

struct ReplayGuard<'a> {
    replaying: &'a mut bool,
}

impl<'a> ReplayGuard<'a> {
    fn new(replaying: &'a mut bool) -> Self {
        *replaying = true;
        ReplayGuard { replaying }
    }
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        *self.replaying = false;
    }
}

impl Journal {
    pub fn new() -> Self {
        Journal::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let mut journal = Journal::default();
        journal.id = id.into();
        journal
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn committed_version(&self) -> u64 {
        self.committed_version
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Records appended since the journal last reached the cache.
    pub fn new_events(&self) -> &[EventRecord] {
        &self.events[self.committed_version as usize..]
    }

    /// Mark all current records as committed. Called after a successful cache write.
    pub fn mark_committed(&mut self) {
        self.committed_version = self.version;
    }

    /// Append an event with a serializable payload.
    /// The payload is serialized with bitcode for compact storage.
    pub fn digest<T: Serialize>(&mut self, name: impl Into<String>, payload: &T) {
        if self.replaying {
            return;
        }

        let bytes = bitcode::serialize(payload).expect("failed to serialize payload");
        let sequence = self.events.len() as u64 + 1;
        self.events.push(EventRecord::new(name, bytes, sequence));
        self.version = self.events.len() as u64;
        self.timestamp = SystemTime::now();
    }

    pub fn load_from_history(&mut self, history: Vec<EventRecord>) {
        self.events = history;
        self.version = self.events.len() as u64;
        self.committed_version = self.version;
    }

    /// Run `apply` over every record while suppressing new appends.
    pub fn rehydrate<F, E>(&mut self, mut apply: F) -> Result<(), E>
    where
        F: FnMut(&EventRecord) -> Result<(), E>,
    {
        let _guard = ReplayGuard::new(&mut self.replaying);

        for event in &self.events {
            apply(event)?;
        }

        Ok(())
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }
}
