mod cache;
mod error;
mod outbox;
mod remote;
mod session;

pub use cache::{CachedProgress, LocalCache, MemoryCache, CACHE_KEY};
pub use error::{CacheError, SyncError};
pub use outbox::{DrainStats, PendingUpsert, SyncOutbox, UpsertStatus};
pub use remote::{
    MemoryRemote, RecordPatch, RemoteError, RemoteRecord, RemoteStore, SubscriptionId,
};
pub use session::{InitOutcome, SyncPhase, SyncSession};
