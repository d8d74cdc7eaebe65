use crate::completion::Category;

/// Quiz score (inclusive) at which the larger bonus kicks in.
pub const QUIZ_HIGH_SCORE: u8 = 90;
/// Quiz score (inclusive) at which the smaller bonus kicks in.
pub const QUIZ_GOOD_SCORE: u8 = 80;

const QUIZ_HIGH_BONUS: u64 = 25;
const QUIZ_GOOD_BONUS: u64 = 15;

/// Compute the XP awarded for one completion.
///
/// Category base rates: lesson 50, task 100, quiz 75. Quizzes earn a
/// score-based bonus on top of the base: +25 at 90 and above, +15 at 80–89.
/// An explicit override replaces the computed value entirely.
///
/// Pure; idempotency of the surrounding record operation is the recorder's
/// concern, not this function's.
pub fn compute_xp(category: Category, score: Option<u8>, xp_override: Option<u64>) -> u64 {
    if let Some(xp) = xp_override {
        return xp;
    }

    let base = category.base_xp();
    match (category, score) {
        (Category::Quiz, Some(score)) if score >= QUIZ_HIGH_SCORE => base + QUIZ_HIGH_BONUS,
        (Category::Quiz, Some(score)) if score >= QUIZ_GOOD_SCORE => base + QUIZ_GOOD_BONUS,
        _ => base,
    }
}
