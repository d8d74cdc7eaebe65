use serde::{Deserialize, Serialize};

/// Total item counts of the content catalog, supplied by the host as external
/// configuration. Read-only to this engine; used as the denominator for
/// completion percentages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSizes {
    pub total_lessons: u32,
    pub total_tasks: u32,
    pub total_quizzes: u32,
}

impl CatalogSizes {
    pub fn new(total_lessons: u32, total_tasks: u32, total_quizzes: u32) -> Self {
        CatalogSizes {
            total_lessons,
            total_tasks,
            total_quizzes,
        }
    }

    pub fn total(&self) -> u32 {
        self.total_lessons + self.total_tasks + self.total_quizzes
    }
}

/// Completion counts computed fresh from current state and catalog sizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStats {
    pub completed: u32,
    pub total: u32,
    pub percentage: u8,
}
