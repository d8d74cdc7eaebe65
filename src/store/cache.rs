use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogSizes;
use crate::journal::Journal;
use crate::state::ProgressState;

use super::error::CacheError;

/// Fixed namespace key the whole record is stored under.
pub const CACHE_KEY: &str = "learntrack/progress";

/// What the local cache holds: the full state, the catalog sizes it was
/// computed against, the session journal for audit, and a write timestamp.
/// Written whole on every mutation, not as per-field deltas.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachedProgress {
    pub progress: ProgressState,
    pub metrics: CatalogSizes,
    pub journal: Journal,
    pub last_updated: SystemTime,
}

/// Synchronous local persistence for one learner's progress record.
pub trait LocalCache {
    fn load(&self) -> Result<Option<CachedProgress>, CacheError>;
    fn store(&self, record: &CachedProgress) -> Result<(), CacheError>;
}

/// In-memory cache storing the record as JSON under the fixed namespace key.
///
/// Cloning creates another handle to the same storage.
#[derive(Clone)]
pub struct MemoryCache {
    slots: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache {
            slots: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCache for MemoryCache {
    fn load(&self) -> Result<Option<CachedProgress>, CacheError> {
        let slots = self
            .slots
            .read()
            .map_err(|_| CacheError::LockPoisoned("load"))?;

        match slots.get(CACHE_KEY) {
            Some(json) => {
                let record =
                    serde_json::from_str(json).map_err(|e| CacheError::Codec(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn store(&self, record: &CachedProgress) -> Result<(), CacheError> {
        let json = serde_json::to_string(record).map_err(|e| CacheError::Codec(e.to_string()))?;

        let mut slots = self
            .slots
            .write()
            .map_err(|_| CacheError::LockPoisoned("store"))?;
        slots.insert(CACHE_KEY.to_string(), json);
        Ok(())
    }
}
