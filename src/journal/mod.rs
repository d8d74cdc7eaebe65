mod journal;
mod record;

pub use journal::Journal;
pub use record::{EventRecord, PayloadError};
