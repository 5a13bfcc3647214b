// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// Answer choice letter for a four-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum ChoiceLetter {
    A,
    B,
    C,
    D,
}

/// Question difficulty bucket used by pool selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Content-review status. Only approved questions enter exam assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReviewStatus {
    Approved,
    Pending,
    Rejected,
}

/// Represents the 'questions' table in the database.
///
/// Owned by the content-administration side; this service only reads it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub exam_family: String,
    pub exam_level: String,
    pub section: String,
    pub difficulty: Difficulty,
    pub question_text: String,
    pub choice_a: String,
    pub choice_b: String,
    pub choice_c: String,
    pub choice_d: String,
    pub correct_answer: ChoiceLetter,
    pub explanation_correct: String,
    pub explanation_wrong: String,
    pub tip: String,
    pub status: ReviewStatus,
}

/// DTO for a question delivered during an in-progress attempt.
/// Must never carry the correct answer, explanations, or tip.
#[derive(Debug, Serialize)]
pub struct AttemptQuestion {
    pub id: i64,
    pub index: usize,
    pub section: String,
    pub question_text: String,
    pub choice_a: String,
    pub choice_b: String,
    pub choice_c: String,
    pub choice_d: String,
}

impl AttemptQuestion {
    pub fn from_question(q: &Question, index: usize) -> Self {
        Self {
            id: q.id,
            index,
            section: q.section.clone(),
            question_text: q.question_text.clone(),
            choice_a: q.choice_a.clone(),
            choice_b: q.choice_b.clone(),
            choice_c: q.choice_c.clone(),
            choice_d: q.choice_d.clone(),
        }
    }
}

/// DTO for post-submission review: full question detail plus how the user
/// answered it.
#[derive(Debug, Serialize)]
pub struct ReviewQuestion {
    pub id: i64,
    pub index: usize,
    pub section: String,
    pub question_text: String,
    pub choice_a: String,
    pub choice_b: String,
    pub choice_c: String,
    pub choice_d: String,
    pub correct_answer: ChoiceLetter,
    pub explanation_correct: String,
    pub explanation_wrong: String,
    pub tip: String,
    pub selected_answer: Option<ChoiceLetter>,
    pub is_correct: bool,
}
