use serde::{Deserialize, Serialize};

/// The kind of content a completion refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Lesson,
    Task,
    Quiz,
}

impl Category {
    /// Base XP awarded for completing one item of this category.
    pub fn base_xp(self) -> u64 {
        match self {
            Category::Lesson => 50,
            Category::Task => 100,
            Category::Quiz => 75,
        }
    }

    /// Weight this category contributes toward the daily goal.
    /// Tasks count double.
    pub fn goal_weight(self) -> u32 {
        match self {
            Category::Lesson => 1,
            Category::Task => 2,
            Category::Quiz => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Lesson => "lesson",
            Category::Task => "task",
            Category::Quiz => "quiz",
        }
    }
}

/// A single "learner finished X" event, as raised by a host UI flow.
///
/// Transient input to the recorder; never stored in this form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub entity_id: String,
    pub category: Category,
    /// Quiz score in `0..=100`; ignored for lessons and tasks.
    pub score: Option<u8>,
    /// Replaces the computed XP entirely when set.
    pub xp_override: Option<u64>,
}

impl Completion {
    pub fn new(entity_id: impl Into<String>, category: Category) -> Self {
        Completion {
            entity_id: entity_id.into(),
            category,
            score: None,
            xp_override: None,
        }
    }

    pub fn with_score(mut self, score: u8) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_xp_override(mut self, xp: u64) -> Self {
        self.xp_override = Some(xp);
        self
    }
}
