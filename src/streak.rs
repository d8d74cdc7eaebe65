use chrono::NaiveDate;

/// Advance a streak counter for a completion happening on `today`.
///
/// The streak counts consecutive calendar days with at least one completion.
/// A second completion on the same day leaves the counter untouched, activity
/// on the day after the last one extends it, and anything else (no history,
/// or a gap of two or more days) starts a fresh streak of 1.
///
/// Every mutation path that touches the streak must go through this function.
pub fn next_streak(last_activity: Option<NaiveDate>, today: NaiveDate, current: u32) -> u32 {
    let Some(last) = last_activity else {
        return 1;
    };

    match (today - last).num_days() {
        0 => current,
        1 => current + 1,
        _ => 1,
    }
}
