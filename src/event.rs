use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::completion::Category;
use crate::journal::EventRecord;

/// Typed events digested into the progress journal.
///
/// State is derived exclusively by applying these, both on live recording and
/// on replay, so the two paths cannot drift.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ProgressEvent {
    CompletionRecorded {
        entity_id: String,
        category: Category,
        xp_earned: u64,
        date: NaiveDate,
    },
    AchievementUnlocked {
        id: String,
        bonus_xp: u64,
        date: NaiveDate,
    },
}

impl ProgressEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ProgressEvent::CompletionRecorded { .. } => "CompletionRecorded",
            ProgressEvent::AchievementUnlocked { .. } => "AchievementUnlocked",
        }
    }
}

impl TryFrom<&EventRecord> for ProgressEvent {
    type Error = String;

    fn try_from(record: &EventRecord) -> Result<Self, Self::Error> {
        let event: ProgressEvent = record
            .decode()
            .map_err(|e| format!("{}: {}", record.event_name, e))?;

        if event.event_name() != record.event_name {
            return Err(format!(
                "unknown event: record named {} decoded as {}",
                record.event_name,
                event.event_name()
            ));
        }

        Ok(event)
    }
}
