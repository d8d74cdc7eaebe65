use std::fmt;

/// Local cache failure. The cache is the synchronous half of persistence, so
/// these are the only errors mutation paths surface to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    LockPoisoned(&'static str),
    Codec(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::LockPoisoned(operation) => {
                write!(f, "cache lock poisoned during {}", operation)
            }
            CacheError::Codec(message) => write!(f, "cache codec error: {}", message),
        }
    }
}

impl std::error::Error for CacheError {}

/// Session-level sync failure.
///
/// Remote unavailability is recovered locally wherever possible: state stays
/// optimistic and writes wait in the outbox, so most operations log instead
/// of returning this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A mutation or subscription was attempted before `initialize`.
    NotInitialized,
    RemoteUnavailable(String),
    CacheFailed(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::NotInitialized => write!(f, "session not initialized"),
            SyncError::RemoteUnavailable(message) => {
                write!(f, "remote store unavailable: {}", message)
            }
            SyncError::CacheFailed(message) => write!(f, "local cache failed: {}", message),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<CacheError> for SyncError {
    fn from(err: CacheError) -> Self {
        SyncError::CacheFailed(err.to_string())
    }
}
