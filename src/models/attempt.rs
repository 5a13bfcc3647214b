// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

use crate::models::question::{AttemptQuestion, ChoiceLetter, ReviewQuestion};

/// Attempt lifecycle status. `in_progress` is the only non-terminal state;
/// submitted and timed_out are never left again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    TimedOut,
}

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptStatus::Submitted | AttemptStatus::TimedOut)
    }
}

/// One entry of the answers array, parallel to the questions array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: i64,
    pub selected_answer: Option<ChoiceLetter>,
    pub is_correct: bool,
}

impl AnswerRecord {
    pub fn unanswered(question_id: i64) -> Self {
        Self {
            question: question_id,
            selected_answer: None,
            is_correct: false,
        }
    }
}

/// Per-section grading aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    pub section: String,
    pub total_items: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
    /// Percentage, two decimals.
    pub score: f64,
}

/// The result block. All-zero/empty while the attempt is in progress,
/// filled exactly once on submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub total_items: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
    pub percentage: f64,
    /// Set iff the reviewer configures a passing threshold.
    pub passed: Option<bool>,
    /// Threshold expressed in items, set iff a threshold is configured.
    pub passing_score: Option<u32>,
    pub section_scores: Vec<SectionScore>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub ai_summary: Option<String>,
}

/// Represents the 'attempts' table: one user's run through one reviewer.
/// Exactly one row per (user, reviewer) pair; retakes reset it in place.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub reviewer_id: i64,
    /// Ordered question ids for this attempt.
    pub questions: Json<Vec<i64>>,
    /// Parallel to `questions`, always the same length.
    pub answers: Json<Vec<AnswerRecord>>,
    pub status: AttemptStatus,
    pub current_index: i64,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    /// Client-supplied timer snapshot for resume; advisory only.
    pub remaining_seconds: Option<i64>,
    pub result: Json<AttemptResult>,
}

impl Attempt {
    /// Answered-question count, used for progress summaries.
    pub fn answered_count(&self) -> usize {
        self.answers
            .iter()
            .filter(|a| a.selected_answer.is_some())
            .count()
    }
}

/// In-progress attempt view sent to the client. Hides everything that would
/// leak the answer key before submission.
#[derive(Debug, Serialize)]
pub struct AttemptView {
    pub attempt_id: i64,
    pub reviewer_id: i64,
    pub status: AttemptStatus,
    pub current_index: i64,
    pub started_at: DateTime<Utc>,
    pub remaining_seconds: Option<i64>,
    pub total_questions: usize,
    pub questions: Vec<AttemptQuestion>,
    pub answered_indices: Vec<usize>,
    /// index -> selected letter, for restoring client state on resume.
    pub user_answers: HashMap<usize, ChoiceLetter>,
}

/// Body of PUT .../answer.
#[derive(Debug, Deserialize)]
pub struct SaveAnswerRequest {
    pub question_index: i64,
    pub selected_answer: Option<ChoiceLetter>,
}

/// Body of PUT .../pause. Both fields optional; only supplied fields are
/// persisted.
#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    pub remaining_seconds: Option<i64>,
    pub current_index: Option<i64>,
}

/// Response of POST .../submit.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub attempt_id: i64,
    pub result: AttemptResult,
}

/// Full post-submission review payload.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub attempt_id: i64,
    pub reviewer_id: i64,
    pub reviewer_title: String,
    pub reviewer_slug: String,
    pub result: AttemptResult,
    pub questions: Vec<ReviewQuestion>,
}

/// Lightweight progress block for in-progress attempts in history listings.
#[derive(Debug, Serialize)]
pub struct ProgressSnapshot {
    pub current: i64,
    pub answered_count: usize,
    pub total_questions: usize,
    pub progress_percent: u32,
}

/// One row of GET .../user/history.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub attempt_id: i64,
    pub reviewer_id: i64,
    pub reviewer_title: String,
    pub reviewer_slug: String,
    #[serde(rename = "type")]
    pub exam_type: crate::models::reviewer::ExamType,
    pub status: AttemptStatus,
    pub percentage: f64,
    pub passed: Option<bool>,
    pub correct: u32,
    pub total_items: u32,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressSnapshot>,
}

/// Summary of one completed attempt inside the progress response.
#[derive(Debug, Serialize)]
pub struct CompletedAttemptSummary {
    pub attempt_id: i64,
    pub percentage: f64,
    pub passed: bool,
    pub correct: u32,
    pub total_items: u32,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// In-progress snapshot inside the progress response.
#[derive(Debug, Serialize)]
pub struct InProgressSummary {
    pub attempt_id: i64,
    pub current_index: i64,
    pub total_questions: usize,
    pub answered_count: usize,
    pub progress_percent: u32,
    pub remaining_seconds: Option<i64>,
    pub started_at: DateTime<Utc>,
}

/// Response of GET .../user/progress/{reviewer_id}.
#[derive(Debug, Serialize)]
pub struct ReviewerProgress {
    pub in_progress: Option<InProgressSummary>,
    pub total_attempts: usize,
    pub best_score: Option<f64>,
    pub avg_score: Option<f64>,
    pub pass_count: usize,
    pub history: Vec<CompletedAttemptSummary>,
}
