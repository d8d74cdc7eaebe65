use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogSizes;
use crate::completion::Category;

/// Full gamification state for one learner.
///
/// Owned by the sync session and mutated only through the tracker's event
/// path. `overall_progress` is derived; every load or merge recomputes it
/// from the counts rather than trusting the stored value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub user_id: String,
    pub completed_lessons: BTreeSet<String>,
    pub completed_tasks: BTreeSet<String>,
    pub completed_quizzes: BTreeSet<String>,
    pub total_xp: u64,
    pub weekly_xp: u64,
    pub current_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub achievements: BTreeSet<String>,
    pub daily_goal_progress: u32,
    /// XP earned from completions, keyed by calendar day.
    #[serde(default)]
    pub xp_by_day: BTreeMap<NaiveDate, u64>,
    pub overall_progress: u8,
}

impl ProgressState {
    pub fn new(user_id: impl Into<String>) -> Self {
        ProgressState {
            user_id: user_id.into(),
            completed_lessons: BTreeSet::new(),
            completed_tasks: BTreeSet::new(),
            completed_quizzes: BTreeSet::new(),
            total_xp: 0,
            weekly_xp: 0,
            current_streak: 0,
            last_activity_date: None,
            achievements: BTreeSet::new(),
            daily_goal_progress: 0,
            xp_by_day: BTreeMap::new(),
            overall_progress: 0,
        }
    }

    pub fn completed_for(&self, category: Category) -> &BTreeSet<String> {
        match category {
            Category::Lesson => &self.completed_lessons,
            Category::Task => &self.completed_tasks,
            Category::Quiz => &self.completed_quizzes,
        }
    }

    pub(crate) fn completed_for_mut(&mut self, category: Category) -> &mut BTreeSet<String> {
        match category {
            Category::Lesson => &mut self.completed_lessons,
            Category::Task => &mut self.completed_tasks,
            Category::Quiz => &mut self.completed_quizzes,
        }
    }

    pub fn is_completed(&self, category: Category, entity_id: &str) -> bool {
        self.completed_for(category).contains(entity_id)
    }

    pub fn completed_count(&self) -> u32 {
        (self.completed_lessons.len() + self.completed_tasks.len() + self.completed_quizzes.len())
            as u32
    }

    /// Recompute the derived completion percentage from counts and catalog
    /// sizes. An empty catalog yields 0.
    pub fn recompute_overall(&mut self, catalog: &CatalogSizes) {
        self.overall_progress = percentage_of(self.completed_count(), catalog.total());
    }

    /// Field-level merge with another view of the same learner's state.
    ///
    /// Sets are unioned; counters, streak, and the daily-goal counter take the
    /// maximum; the activity date takes the latest; the per-day ledger takes
    /// the per-key maximum. Neither side's optimistic additions are lost.
    /// The caller recomputes `overall_progress` afterwards.
    pub fn merge_from(&mut self, other: &ProgressState) {
        self.completed_lessons
            .extend(other.completed_lessons.iter().cloned());
        self.completed_tasks
            .extend(other.completed_tasks.iter().cloned());
        self.completed_quizzes
            .extend(other.completed_quizzes.iter().cloned());
        self.achievements.extend(other.achievements.iter().cloned());

        self.total_xp = self.total_xp.max(other.total_xp);
        self.weekly_xp = self.weekly_xp.max(other.weekly_xp);
        self.current_streak = self.current_streak.max(other.current_streak);
        self.daily_goal_progress = self.daily_goal_progress.max(other.daily_goal_progress);
        self.last_activity_date = self.last_activity_date.max(other.last_activity_date);

        for (day, xp) in &other.xp_by_day {
            let entry = self.xp_by_day.entry(*day).or_insert(0);
            *entry = (*entry).max(*xp);
        }
    }
}

/// Rounded completion percentage, clamped to [0, 100]. An empty total is 0.
pub(crate) fn percentage_of(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = f64::from(completed) * 100.0 / f64::from(total);
    ratio.round().min(100.0) as u8
}
