//! Contract types returned by the quiz store collaborator.
//!
//! The orchestration core never owns quiz content; it reads questions in
//! stable creation order and, for battles, snapshots them at creation time.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// One answer option of a quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    pub is_correct: bool,
}

/// A quiz question as served by the quiz store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: DbId,
    pub text: String,
    pub options: Vec<QuestionOption>,
}

impl QuizQuestion {
    /// The canonical correct answer: the text of the first option flagged
    /// correct. `None` for malformed questions without a correct option.
    pub fn correct_answer_text(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.is_correct)
            .map(|o| o.text.as_str())
    }

    /// Option texts in display order. The correct flag never leaves the
    /// server through this path.
    pub fn option_texts(&self) -> Vec<String> {
        self.options.iter().map(|o| o.text.clone()).collect()
    }
}
