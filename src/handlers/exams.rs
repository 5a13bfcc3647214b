// src/handlers/exams.rs

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    engine::{lifecycle, recommend},
    error::AppError,
    models::{
        attempt::{
            Attempt, AttemptStatus, AttemptView, CompletedAttemptSummary, HistoryEntry,
            InProgressSummary, PauseRequest, ProgressSnapshot, ReviewResponse, ReviewerProgress,
            SaveAnswerRequest, SubmitResponse,
        },
        question::{AttemptQuestion, Question, ReviewQuestion},
        reviewer::{AccessTier, Reviewer},
    },
    state::AppState,
    utils::jwt::Claims,
};

fn progress_percent(answered: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (answered as f64 / total as f64 * 100.0).round() as u32
}

/// Builds the in-progress client view. Questions go out without the answer
/// key; the key only ever appears in the review payload.
fn attempt_view(attempt: &Attempt, questions: &[Question]) -> AttemptView {
    let mut answered_indices = Vec::new();
    let mut user_answers = HashMap::new();
    for (i, answer) in attempt.answers.iter().enumerate() {
        if let Some(letter) = answer.selected_answer {
            answered_indices.push(i);
            user_answers.insert(i, letter);
        }
    }

    AttemptView {
        attempt_id: attempt.id,
        reviewer_id: attempt.reviewer_id,
        status: attempt.status,
        current_index: attempt.current_index,
        started_at: attempt.started_at,
        remaining_seconds: attempt.remaining_seconds,
        total_questions: questions.len(),
        questions: questions
            .iter()
            .enumerate()
            .map(|(i, q)| AttemptQuestion::from_question(q, i))
            .collect(),
        answered_indices,
        user_answers,
    }
}

fn history_entry(attempt: &Attempt, reviewer: &Reviewer) -> HistoryEntry {
    let total_questions = attempt.questions.len();
    let progress = (attempt.status == AttemptStatus::InProgress).then(|| ProgressSnapshot {
        current: attempt.current_index,
        answered_count: attempt.answered_count(),
        total_questions,
        progress_percent: progress_percent(attempt.answered_count(), total_questions),
    });

    HistoryEntry {
        attempt_id: attempt.id,
        reviewer_id: reviewer.id,
        reviewer_title: reviewer.title.clone(),
        reviewer_slug: reviewer.slug.clone(),
        exam_type: reviewer.exam_type,
        status: attempt.status,
        percentage: attempt.result.percentage,
        passed: attempt.result.passed,
        correct: attempt.result.correct,
        total_items: attempt.result.total_items,
        started_at: attempt.started_at,
        submitted_at: attempt.submitted_at,
        remaining_seconds: attempt.remaining_seconds,
        progress,
    }
}

/// POST /api/exams/{reviewer_id}/start
///
/// Starts, resumes, or resets the caller's unique attempt for this reviewer.
/// 201 on a fresh attempt, 200 on resume/reattempt.
pub async fn start_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reviewer_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let reviewer = lifecycle::fetch_reviewer(&state.pool, reviewer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Reviewer not found".to_string()))?;

    if reviewer.access == AccessTier::Premium && claims.plan != "premium" {
        return Err(AppError::Forbidden(
            "This reviewer requires a premium plan".to_string(),
        ));
    }

    reviewer
        .exam_config
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Reviewer has invalid exam config: {e}")))?;

    let outcome = lifecycle::start(&state.pool, user_id, &reviewer).await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(attempt_view(&outcome.attempt, &outcome.questions)),
    ))
}

/// PUT /api/exams/attempts/{attempt_id}/answer
pub async fn save_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    lifecycle::save_answer(&state.pool, attempt_id, user_id, &req).await?;
    Ok(Json(serde_json::json!({ "saved": true })))
}

/// PUT /api/exams/attempts/{attempt_id}/pause
pub async fn pause_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<PauseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    lifecycle::pause(&state.pool, attempt_id, user_id, &req).await?;
    Ok(Json(serde_json::json!({ "paused": true })))
}

/// POST /api/exams/attempts/{attempt_id}/submit
pub async fn submit_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let result = lifecycle::submit(
        &state.pool,
        state.insight.as_deref(),
        Duration::from_secs(state.config.insight_timeout_secs),
        attempt_id,
        user_id,
    )
    .await?;

    Ok(Json(SubmitResponse { attempt_id, result }))
}

/// GET /api/exams/attempts/{attempt_id}
///
/// Result summary for the results page; available in any status, without
/// the question payload.
pub async fn get_attempt_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = lifecycle::fetch_owned_attempt(&state.pool, attempt_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    let reviewer = lifecycle::fetch_reviewer(&state.pool, attempt.reviewer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Reviewer not found".to_string()))?;

    Ok(Json(history_entry(&attempt, &reviewer)))
}

/// GET /api/exams/attempts/{attempt_id}/review
///
/// Full detail including answer keys and explanations; only once the
/// attempt is terminal.
pub async fn get_attempt_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = lifecycle::fetch_owned_attempt(&state.pool, attempt_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    if !attempt.status.is_terminal() {
        return Err(AppError::InvalidState(
            "Attempt is still in progress".to_string(),
        ));
    }

    let reviewer = lifecycle::fetch_reviewer(&state.pool, attempt.reviewer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Reviewer not found".to_string()))?;

    let questions = lifecycle::fetch_questions_in_order(&state.pool, &attempt.questions).await?;

    let review_questions = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let answer = attempt.answers.get(i);
            ReviewQuestion {
                id: q.id,
                index: i,
                section: q.section.clone(),
                question_text: q.question_text.clone(),
                choice_a: q.choice_a.clone(),
                choice_b: q.choice_b.clone(),
                choice_c: q.choice_c.clone(),
                choice_d: q.choice_d.clone(),
                correct_answer: q.correct_answer,
                explanation_correct: q.explanation_correct.clone(),
                explanation_wrong: q.explanation_wrong.clone(),
                tip: q.tip.clone(),
                selected_answer: answer.and_then(|a| a.selected_answer),
                is_correct: answer.is_some_and(|a| a.is_correct),
            }
        })
        .collect();

    Ok(Json(ReviewResponse {
        attempt_id: attempt.id,
        reviewer_id: reviewer.id,
        reviewer_title: reviewer.title.clone(),
        reviewer_slug: reviewer.slug.clone(),
        result: attempt.result.0,
        questions: review_questions,
    }))
}

/// GET /api/exams/attempts/{attempt_id}/recommendations
///
/// Ordered next-step CTAs for a graded attempt.
pub async fn get_recommendations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = lifecycle::fetch_owned_attempt(&state.pool, attempt_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    if !attempt.status.is_terminal() {
        return Err(AppError::InvalidState(
            "Attempt is still in progress".to_string(),
        ));
    }

    let reviewer = lifecycle::fetch_reviewer(&state.pool, attempt.reviewer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Reviewer not found".to_string()))?;

    let catalog = lifecycle::fetch_published_reviewers(&state.pool).await?;
    let ctas = recommend::generate_recommendations(&attempt.result, &reviewer, &catalog);

    Ok(Json(serde_json::json!({ "ctas": ctas })))
}

/// GET /api/exams/attempts/user/history
pub async fn get_user_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = lifecycle::fetch_user_attempts(&state.pool, user_id).await?;

    let mut entries = Vec::with_capacity(attempts.len());
    for attempt in &attempts {
        let Some(reviewer) = lifecycle::fetch_reviewer(&state.pool, attempt.reviewer_id).await?
        else {
            continue;
        };
        entries.push(history_entry(attempt, &reviewer));
    }

    Ok(Json(entries))
}

/// GET /api/exams/attempts/user/progress/{reviewer_id}
///
/// In-progress snapshot plus completed-attempt stats for one reviewer.
pub async fn get_reviewer_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reviewer_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = lifecycle::fetch_pair_attempts(&state.pool, user_id, reviewer_id).await?;

    let in_progress = attempts
        .iter()
        .find(|a| a.status == AttemptStatus::InProgress)
        .map(|a| {
            let total_questions = a.questions.len();
            let answered_count = a.answered_count();
            InProgressSummary {
                attempt_id: a.id,
                current_index: a.current_index,
                total_questions,
                answered_count,
                progress_percent: progress_percent(answered_count, total_questions),
                remaining_seconds: a.remaining_seconds,
                started_at: a.started_at,
            }
        });

    let completed: Vec<&Attempt> = attempts
        .iter()
        .filter(|a| a.status.is_terminal())
        .collect();

    let total_attempts = completed.len();
    let best_score = completed
        .iter()
        .map(|a| a.result.percentage)
        .fold(None::<f64>, |best, p| {
            Some(best.map_or(p, |b| b.max(p)))
        });
    let avg_score = (total_attempts > 0).then(|| {
        let sum: f64 = completed.iter().map(|a| a.result.percentage).sum();
        (sum / total_attempts as f64).round()
    });
    let pass_count = completed
        .iter()
        .filter(|a| a.result.passed == Some(true))
        .count();

    let history = completed
        .iter()
        .map(|a| CompletedAttemptSummary {
            attempt_id: a.id,
            percentage: a.result.percentage,
            passed: a.result.passed.unwrap_or(false),
            correct: a.result.correct,
            total_items: a.result.total_items,
            submitted_at: a.submitted_at,
        })
        .collect();

    Ok(Json(ReviewerProgress {
        in_progress,
        total_attempts,
        best_score,
        avg_score,
        pass_count,
        history,
    }))
}
