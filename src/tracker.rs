use chrono::{Local, NaiveDate};

use crate::achievement::{AchievementRule, DailyGoalRule};
use crate::catalog::{CatalogSizes, CompletionStats};
use crate::completion::Completion;
use crate::event::ProgressEvent;
use crate::journal::Journal;
use crate::state::{percentage_of, ProgressState};
use crate::streak::next_streak;
use crate::xp::compute_xp;

/// Result of a record operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded { xp_earned: u64, streak: u32 },
    /// The entity was already in its completed set; nothing changed.
    /// Repeated submissions (retried network calls, double taps) land here.
    AlreadyCompleted,
}

/// In-memory progress engine for one learner.
///
/// All mutation flows through typed events: a completion or achievement is
/// digested into the journal and then applied to the state through a single
/// `apply` path, the same one replay uses.
pub struct ProgressTracker {
    state: ProgressState,
    catalog: CatalogSizes,
    journal: Journal,
    rules: Vec<Box<dyn AchievementRule>>,
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn apply_event(state: &mut ProgressState, catalog: &CatalogSizes, event: &ProgressEvent) {
    match event {
        ProgressEvent::CompletionRecorded {
            entity_id,
            category,
            xp_earned,
            date,
        } => {
            state.completed_for_mut(*category).insert(entity_id.clone());
            state.current_streak = next_streak(state.last_activity_date, *date, state.current_streak);
            state.last_activity_date = Some(*date);
            state.total_xp += xp_earned;
            state.weekly_xp += xp_earned;
            *state.xp_by_day.entry(*date).or_insert(0) += xp_earned;
            state.daily_goal_progress += category.goal_weight();
            state.recompute_overall(catalog);
        }
        ProgressEvent::AchievementUnlocked { id, bonus_xp, .. } => {
            if state.achievements.insert(id.clone()) {
                state.total_xp += bonus_xp;
            }
        }
    }
}

impl ProgressTracker {
    /// Fresh tracker with the default rule set (the daily goal).
    pub fn new(user_id: impl Into<String>, catalog: CatalogSizes) -> Self {
        let user_id = user_id.into();
        ProgressTracker {
            state: ProgressState::new(&user_id),
            catalog,
            journal: Journal::with_id(user_id),
            rules: vec![Box::new(DailyGoalRule::default())],
        }
    }

    /// Adopt previously stored state. The derived percentage is recomputed;
    /// the stored value is never trusted.
    pub fn from_state(mut state: ProgressState, catalog: CatalogSizes) -> Self {
        state.recompute_overall(&catalog);
        let journal = Journal::with_id(&state.user_id);
        ProgressTracker {
            state,
            catalog,
            journal,
            rules: vec![Box::new(DailyGoalRule::default())],
        }
    }

    /// Adopt stored state together with its persisted journal.
    pub fn from_parts(state: ProgressState, journal: Journal, catalog: CatalogSizes) -> Self {
        let mut tracker = Self::from_state(state, catalog);
        tracker.journal = journal;
        tracker
    }

    /// Rebuild state purely by replaying a journal through the apply path.
    pub fn replay(
        user_id: impl Into<String>,
        catalog: CatalogSizes,
        mut journal: Journal,
    ) -> Result<Self, String> {
        let mut state = ProgressState::new(user_id);
        journal.rehydrate(|record| {
            let event = ProgressEvent::try_from(record)?;
            apply_event(&mut state, &catalog, &event);
            Ok::<(), String>(())
        })?;

        Ok(ProgressTracker {
            state,
            catalog,
            journal,
            rules: vec![Box::new(DailyGoalRule::default())],
        })
    }

    /// Add an achievement rule. Rules are evaluated after every completion.
    pub fn with_rule(mut self, rule: Box<dyn AchievementRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Record a completion dated today.
    pub fn record_completion(&mut self, completion: &Completion) -> RecordOutcome {
        self.record_completion_on(completion, today())
    }

    /// Record a completion for an explicit calendar day.
    ///
    /// Idempotent: an entity already present in its category's completed set
    /// leaves every field untouched.
    pub fn record_completion_on(
        &mut self,
        completion: &Completion,
        today: NaiveDate,
    ) -> RecordOutcome {
        if let Some(score) = completion.score {
            debug_assert!(score <= 100, "quiz score out of range: {}", score);
        }

        if self
            .state
            .is_completed(completion.category, &completion.entity_id)
        {
            return RecordOutcome::AlreadyCompleted;
        }

        let xp_earned = compute_xp(completion.category, completion.score, completion.xp_override);
        let event = ProgressEvent::CompletionRecorded {
            entity_id: completion.entity_id.clone(),
            category: completion.category,
            xp_earned,
            date: today,
        };
        self.journal.digest(event.event_name(), &event);
        apply_event(&mut self.state, &self.catalog, &event);

        RecordOutcome::Recorded {
            xp_earned,
            streak: self.state.current_streak,
        }
    }

    /// Evaluate every achievement rule against today's state.
    /// Returns the ids unlocked by this call; re-running is a no-op.
    pub fn check_achievements(&mut self) -> Vec<String> {
        self.check_achievements_on(today())
    }

    pub fn check_achievements_on(&mut self, today: NaiveDate) -> Vec<String> {
        let mut unlocked = Vec::new();

        for rule in &self.rules {
            let Some(grant) = rule.evaluate(&self.state, today) else {
                continue;
            };
            if self.state.achievements.contains(&grant.id) {
                continue;
            }

            let event = ProgressEvent::AchievementUnlocked {
                id: grant.id.clone(),
                bonus_xp: grant.bonus_xp,
                date: today,
            };
            self.journal.digest(event.event_name(), &event);
            apply_event(&mut self.state, &self.catalog, &event);
            unlocked.push(grant.id);
        }

        unlocked
    }

    /// Merge another view of this learner's state (typically derived from the
    /// remote record) into the local one, then recompute derived fields.
    pub fn merge_remote(&mut self, other: &ProgressState) {
        self.state.merge_from(other);
        self.state.recompute_overall(&self.catalog);
    }

    /// Mark the journal as flushed to local storage.
    pub fn mark_persisted(&mut self) {
        self.journal.mark_committed();
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn catalog(&self) -> &CatalogSizes {
        &self.catalog
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    // Read accessors. All synchronous, none mutate.

    pub fn progress_percentage(&self) -> u8 {
        self.state.overall_progress
    }

    pub fn current_streak(&self) -> u32 {
        self.state.current_streak
    }

    pub fn weekly_xp(&self) -> u64 {
        self.state.weekly_xp
    }

    /// Computed fresh from counts and catalog sizes on every call.
    pub fn completion_stats(&self) -> CompletionStats {
        let completed = self.state.completed_count();
        let total = self.catalog.total();
        CompletionStats {
            completed,
            total,
            percentage: percentage_of(completed, total),
        }
    }

    /// Exact XP earned from completions today, read from the per-day ledger.
    pub fn today_xp(&self) -> u64 {
        self.today_xp_on(today())
    }

    pub fn today_xp_on(&self, date: NaiveDate) -> u64 {
        self.state.xp_by_day.get(&date).copied().unwrap_or(0)
    }
}
