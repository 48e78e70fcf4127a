//! Scoring rules shared by game sessions and battles.

use serde::{Deserialize, Serialize};

/// Fixed award for a correct answer. No partial credit and no time bonus;
/// response times are recorded but never enter the score.
pub const CORRECT_ANSWER_POINTS: i32 = 10;

/// Outcome of a single answer submission, returned to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReceipt {
    pub is_correct: bool,
    pub points_awarded: i32,
    pub new_score: i32,
}

/// Correctness is an exact string match against the canonical correct
/// answer text.
pub fn is_correct(submitted: &str, correct_answer: &str) -> bool {
    submitted == correct_answer
}

/// Points awarded for a submission.
pub fn points_for(correct: bool) -> i32 {
    if correct {
        CORRECT_ANSWER_POINTS
    } else {
        0
    }
}

/// Incremental mean: average response time after one more sample.
pub fn update_average(prev_avg_ms: f64, prev_count: u32, sample_ms: u64) -> f64 {
    (prev_avg_ms * f64::from(prev_count) + sample_ms as f64) / f64::from(prev_count + 1)
}
