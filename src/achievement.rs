use chrono::NaiveDate;

use crate::state::ProgressState;

/// Weighted completion units required to hit the daily goal.
pub const DAILY_GOAL_TARGET: u32 = 5;
/// Flat XP bonus for hitting the daily goal.
pub const DAILY_GOAL_BONUS_XP: u64 = 200;

/// Deterministic achievement id for a day's goal, so "already awarded" is a
/// pure set-membership check.
pub fn daily_goal_id(date: NaiveDate) -> String {
    format!("daily_goal_{}", date.format("%Y-%m-%d"))
}

/// A milestone the tracker should grant: a deterministic id plus its one-time
/// XP bonus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AchievementGrant {
    pub id: String,
    pub bonus_xp: u64,
}

/// A milestone rule evaluated after every completion.
///
/// Rules follow one shape: derive a deterministic id from current state and
/// the calendar day, return a grant when the threshold is crossed and the id
/// is not yet held. The tracker turns grants into idempotent set inserts plus
/// a flat XP bonus.
pub trait AchievementRule: Send + Sync {
    fn evaluate(&self, state: &ProgressState, today: NaiveDate) -> Option<AchievementGrant>;
}

/// Grants a one-time bonus each day the weighted completion counter reaches
/// the target.
pub struct DailyGoalRule {
    target: u32,
    bonus_xp: u64,
}

impl Default for DailyGoalRule {
    fn default() -> Self {
        DailyGoalRule {
            target: DAILY_GOAL_TARGET,
            bonus_xp: DAILY_GOAL_BONUS_XP,
        }
    }
}

impl DailyGoalRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: u32) -> Self {
        self.target = target;
        self
    }

    pub fn with_bonus(mut self, bonus_xp: u64) -> Self {
        self.bonus_xp = bonus_xp;
        self
    }
}

impl AchievementRule for DailyGoalRule {
    fn evaluate(&self, state: &ProgressState, today: NaiveDate) -> Option<AchievementGrant> {
        if state.daily_goal_progress < self.target {
            return None;
        }

        let id = daily_goal_id(today);
        if state.achievements.contains(&id) {
            return None;
        }

        Some(AchievementGrant {
            id,
            bonus_xp: self.bonus_xp,
        })
    }
}

/// Grants a one-time bonus the first time the streak reaches `days`.
pub struct StreakMilestoneRule {
    days: u32,
    bonus_xp: u64,
}

impl StreakMilestoneRule {
    pub fn new(days: u32) -> Self {
        StreakMilestoneRule {
            days,
            bonus_xp: DAILY_GOAL_BONUS_XP,
        }
    }

    pub fn with_bonus(mut self, bonus_xp: u64) -> Self {
        self.bonus_xp = bonus_xp;
        self
    }
}

impl AchievementRule for StreakMilestoneRule {
    fn evaluate(&self, state: &ProgressState, _today: NaiveDate) -> Option<AchievementGrant> {
        if state.current_streak < self.days {
            return None;
        }

        let id = format!("streak_{}", self.days);
        if state.achievements.contains(&id) {
            return None;
        }

        Some(AchievementGrant {
            id,
            bonus_xp: self.bonus_xp,
        })
    }
}
