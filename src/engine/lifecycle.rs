// src/engine/lifecycle.rs
//
// Owns the attempt state machine: start/resume/reattempt, answer saves,
// pause snapshots, and the submit transition. Mutual exclusion comes from
// the store, not from in-process locks: the unique (user_id, reviewer_id)
// index serializes creation and a conditional update on status serializes
// submission. Both races resolve by adopting the winner's row.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, types::Json};

use crate::engine::insight::{self, InsightBackend};
use crate::engine::{grading, selector};
use crate::error::AppError;
use crate::models::attempt::{
    AnswerRecord, Attempt, AttemptResult, AttemptStatus, PauseRequest, SaveAnswerRequest,
};
use crate::models::question::Question;
use crate::models::reviewer::{ExamConfig, ExamVariant, PublishStatus, Reviewer};

const QUESTION_COLUMNS: &str = "id, exam_family, exam_level, section, difficulty, question_text, \
     choice_a, choice_b, choice_c, choice_d, correct_answer, \
     explanation_correct, explanation_wrong, tip, status";

const REVIEWER_COLUMNS: &str = "id, slug, type, access, title, status, exam_config";

const ATTEMPT_COLUMNS: &str = "id, user_id, reviewer_id, questions, answers, status, \
     current_index, started_at, submitted_at, remaining_seconds, result";

/// Bounded retry around the duplicate-create race: one losing insert is
/// one extra fetch, anything beyond that is a real fault.
const CREATE_RETRIES: usize = 2;

pub async fn fetch_reviewer(pool: &SqlitePool, id: i64) -> Result<Option<Reviewer>, AppError> {
    let reviewer = sqlx::query_as::<_, Reviewer>(&format!(
        "SELECT {REVIEWER_COLUMNS} FROM reviewers WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(reviewer)
}

pub async fn fetch_published_reviewers(pool: &SqlitePool) -> Result<Vec<Reviewer>, AppError> {
    let reviewers = sqlx::query_as::<_, Reviewer>(&format!(
        "SELECT {REVIEWER_COLUMNS} FROM reviewers WHERE status = 'published' ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(reviewers)
}

/// Fetches an attempt only if the caller owns it; a foreign attempt id is
/// indistinguishable from a missing one.
pub async fn fetch_owned_attempt(
    pool: &SqlitePool,
    attempt_id: i64,
    user_id: i64,
) -> Result<Option<Attempt>, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = ? AND user_id = ?"
    ))
    .bind(attempt_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(attempt)
}

async fn fetch_attempt_for_pair(
    pool: &SqlitePool,
    user_id: i64,
    reviewer_id: i64,
) -> Result<Option<Attempt>, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE user_id = ? AND reviewer_id = ?"
    ))
    .bind(user_id)
    .bind(reviewer_id)
    .fetch_optional(pool)
    .await?;

    Ok(attempt)
}

/// All attempts for a user, newest first.
pub async fn fetch_user_attempts(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<Attempt>, AppError> {
    let attempts = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE user_id = ? ORDER BY started_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(attempts)
}

/// All attempts for a (user, reviewer) pair, newest first. The unique index
/// keeps this at most one row, but the progress view treats it as a list.
pub async fn fetch_pair_attempts(
    pool: &SqlitePool,
    user_id: i64,
    reviewer_id: i64,
) -> Result<Vec<Attempt>, AppError> {
    let attempts = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE user_id = ? AND reviewer_id = ? \
         ORDER BY started_at DESC"
    ))
    .bind(user_id)
    .bind(reviewer_id)
    .fetch_all(pool)
    .await?;

    Ok(attempts)
}

async fn fetch_attempt_by_id(pool: &SqlitePool, id: i64) -> Result<Attempt, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(attempt)
}

/// Fetches the approved question pool for one section of the assembly
/// filter. Uses a dynamic IN clause for the level list.
async fn fetch_section_pool(
    pool: &SqlitePool,
    cfg: &ExamConfig,
    section: &str,
) -> Result<Vec<Question>, AppError> {
    let mut qb = sqlx::QueryBuilder::<Sqlite>::new(format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE status = 'approved' AND exam_family = "
    ));
    qb.push_bind(&cfg.exam_family);
    qb.push(" AND section = ");
    qb.push_bind(section);

    if !cfg.exam_level.is_empty() {
        qb.push(" AND exam_level IN (");
        let mut separated = qb.separated(",");
        for level in &cfg.exam_level {
            separated.push_bind(level);
        }
        separated.push_unseparated(")");
    }

    let questions: Vec<Question> = qb.build_query_as().fetch_all(pool).await?;
    Ok(questions)
}

/// Loads questions by id, preserving the stored attempt order.
pub async fn fetch_questions_in_order(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<Vec<Question>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = sqlx::QueryBuilder::<Sqlite>::new(format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id IN ("
    ));
    let mut separated = qb.separated(",");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let fetched: Vec<Question> = qb.build_query_as().fetch_all(pool).await?;
    let mut by_id: HashMap<i64, Question> = fetched.into_iter().map(|q| (q.id, q)).collect();

    let ordered = ids.iter().filter_map(|id| by_id.remove(id)).collect();
    Ok(ordered)
}

/// Assembles a fresh question set: difficulty-weighted draw per section
/// target, then an inter-section shuffle so delivery order does not reveal
/// grouping. May return fewer than the configured total when pools run dry.
async fn assemble_questions(
    pool: &SqlitePool,
    cfg: &ExamConfig,
) -> Result<Vec<Question>, AppError> {
    let mut assembled = Vec::new();

    for target in &cfg.section_distribution {
        let section_pool = fetch_section_pool(pool, cfg, &target.section).await?;
        let selected = selector::select_with_difficulty(
            section_pool,
            target.count as usize,
            &cfg.difficulty_distribution,
        );
        if selected.len() < target.count as usize {
            tracing::warn!(
                section = %target.section,
                wanted = target.count,
                got = selected.len(),
                "question pool under-filled section"
            );
        }
        assembled.extend(selected);
    }

    selector::shuffle_questions(&mut assembled);
    Ok(assembled)
}

fn initial_remaining_seconds(cfg: &ExamConfig) -> Option<i64> {
    (cfg.time_limit_seconds > 0).then_some(cfg.time_limit_seconds as i64)
}

/// What `start` produced. `created` is true only when this call inserted the
/// row; resumes, reattempts, and lost creation races report false.
pub struct StartOutcome {
    pub attempt: Attempt,
    pub questions: Vec<Question>,
    pub created: bool,
}

/// Starts (or resumes, or resets) the unique attempt for (user, reviewer).
///
/// - an in-progress attempt is returned unchanged (resume);
/// - no attempt: assemble and insert, adopting the winner's row if a
///   concurrent creator beats us to the unique index;
/// - a terminal attempt is reset in place (reattempt), reusing the stored
///   question set for fixed-variant reviewers.
///
/// Returns the attempt plus its questions in delivery order.
pub async fn start(
    pool: &SqlitePool,
    user_id: i64,
    reviewer: &Reviewer,
) -> Result<StartOutcome, AppError> {
    if reviewer.status != PublishStatus::Published {
        return Err(AppError::NotFound("Reviewer not found".to_string()));
    }

    let cfg = &reviewer.exam_config;

    for _ in 0..CREATE_RETRIES {
        let existing = fetch_attempt_for_pair(pool, user_id, reviewer.id).await?;

        if let Some(attempt) = &existing {
            if attempt.status == AttemptStatus::InProgress {
                let questions = fetch_questions_in_order(pool, &attempt.questions).await?;
                return Ok(StartOutcome {
                    attempt: attempt.clone(),
                    questions,
                    created: false,
                });
            }
        }

        // Fixed reviewers reuse the prior set; everything else redraws.
        let questions = match &existing {
            Some(attempt)
                if cfg.variant == ExamVariant::Fixed && !attempt.questions.is_empty() =>
            {
                fetch_questions_in_order(pool, &attempt.questions).await?
            }
            _ => assemble_questions(pool, cfg).await?,
        };

        let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let answers: Vec<AnswerRecord> = question_ids
            .iter()
            .map(|&id| AnswerRecord::unanswered(id))
            .collect();
        let started_at = Utc::now();
        let remaining = initial_remaining_seconds(cfg);

        match existing {
            Some(attempt) => {
                // Reattempt: overwrite the terminal row in place.
                sqlx::query(
                    "UPDATE attempts SET questions = ?, answers = ?, status = 'in_progress', \
                     current_index = 0, started_at = ?, submitted_at = NULL, \
                     remaining_seconds = ?, result = ? WHERE id = ?",
                )
                .bind(Json(&question_ids))
                .bind(Json(&answers))
                .bind(started_at)
                .bind(remaining)
                .bind(Json(AttemptResult::default()))
                .bind(attempt.id)
                .execute(pool)
                .await?;

                let refreshed = fetch_attempt_by_id(pool, attempt.id).await?;
                return Ok(StartOutcome {
                    attempt: refreshed,
                    questions,
                    created: false,
                });
            }
            None => {
                let inserted = sqlx::query(
                    "INSERT INTO attempts (user_id, reviewer_id, questions, answers, status, \
                     current_index, started_at, submitted_at, remaining_seconds, result) \
                     VALUES (?, ?, ?, ?, 'in_progress', 0, ?, NULL, ?, ?)",
                )
                .bind(user_id)
                .bind(reviewer.id)
                .bind(Json(&question_ids))
                .bind(Json(&answers))
                .bind(started_at)
                .bind(remaining)
                .bind(Json(AttemptResult::default()))
                .execute(pool)
                .await;

                match inserted {
                    Ok(done) => {
                        let attempt = fetch_attempt_by_id(pool, done.last_insert_rowid()).await?;
                        return Ok(StartOutcome {
                            attempt,
                            questions,
                            created: true,
                        });
                    }
                    Err(e)
                        if e.as_database_error()
                            .is_some_and(|db| db.is_unique_violation()) =>
                    {
                        // Lost the creation race; loop once more and adopt
                        // the winner's row as a resume.
                        tracing::debug!(
                            user_id,
                            reviewer_id = reviewer.id,
                            "concurrent attempt creation, re-reading winner"
                        );
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    // Retries exhausted: the row must exist by now, return it as a resume.
    let attempt = fetch_attempt_for_pair(pool, user_id, reviewer.id)
        .await?
        .ok_or_else(|| {
            AppError::InternalServerError("attempt creation retries exhausted".to_string())
        })?;
    let questions = fetch_questions_in_order(pool, &attempt.questions).await?;
    Ok(StartOutcome {
        attempt,
        questions,
        created: false,
    })
}

/// Overwrites the answer at one index and moves the cursor there.
/// Idempotent: repeating the same call produces the same stored state.
pub async fn save_answer(
    pool: &SqlitePool,
    attempt_id: i64,
    user_id: i64,
    req: &SaveAnswerRequest,
) -> Result<(), AppError> {
    let mut attempt = fetch_owned_attempt(pool, attempt_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    let index = req.question_index;
    if index < 0 || index as usize >= attempt.answers.len() {
        return Err(AppError::BadRequest("Invalid question index".to_string()));
    }

    let record = &mut attempt.answers[index as usize];
    record.selected_answer = req.selected_answer;
    record.is_correct = false;

    // The status guard is the only terminal check: a save that loses a race
    // against submit fails here the same way a late save does.
    let updated = sqlx::query(
        "UPDATE attempts SET answers = ?, current_index = ? \
         WHERE id = ? AND status = 'in_progress'",
    )
    .bind(Json(&*attempt.answers))
    .bind(index)
    .bind(attempt_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::InvalidState(
            "Attempt already submitted".to_string(),
        ));
    }

    Ok(())
}

/// Persists a client-supplied timer/position snapshot.
pub async fn pause(
    pool: &SqlitePool,
    attempt_id: i64,
    user_id: i64,
    req: &PauseRequest,
) -> Result<(), AppError> {
    let attempt = fetch_owned_attempt(pool, attempt_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    let remaining = req.remaining_seconds.or(attempt.remaining_seconds);
    let current = req.current_index.unwrap_or(attempt.current_index);

    let updated = sqlx::query(
        "UPDATE attempts SET remaining_seconds = ?, current_index = ? \
         WHERE id = ? AND status = 'in_progress'",
    )
    .bind(remaining)
    .bind(current)
    .bind(attempt_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::InvalidState(
            "Attempt already submitted".to_string(),
        ));
    }

    Ok(())
}

/// Submits and grades the attempt.
///
/// The transition is a compare-and-swap on status: of N concurrent submits
/// exactly one persists the graded result; the rest re-read the winner's row
/// and return its result. Narrative augmentation runs only after the graded
/// result is durable and can only ever amend the narrative fields.
pub async fn submit(
    pool: &SqlitePool,
    insight: Option<&dyn InsightBackend>,
    insight_timeout: Duration,
    attempt_id: i64,
    user_id: i64,
) -> Result<AttemptResult, AppError> {
    let mut attempt = fetch_owned_attempt(pool, attempt_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    // Already graded (a prior submit, or a concurrent one that committed
    // before we read): hand back the stored result.
    if attempt.status.is_terminal() {
        return Ok(attempt.result.0);
    }

    let reviewer = fetch_reviewer(pool, attempt.reviewer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Reviewer not found".to_string()))?;

    let questions = fetch_questions_in_order(pool, &attempt.questions).await?;
    if questions.len() != attempt.answers.len() {
        return Err(AppError::InternalServerError(
            "attempt question/answer arrays diverged".to_string(),
        ));
    }

    let mut result = grading::grade(
        &questions,
        &mut attempt.answers,
        reviewer.exam_config.passing_threshold,
    );
    let submitted_at = Utc::now();

    let updated = sqlx::query(
        "UPDATE attempts SET status = 'submitted', submitted_at = ?, answers = ?, result = ? \
         WHERE id = ? AND user_id = ? AND status = 'in_progress'",
    )
    .bind(submitted_at)
    .bind(Json(&*attempt.answers))
    .bind(Json(&result))
    .bind(attempt_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        // Lost the submit race: a concurrent call already graded this
        // attempt. Adopt its result instead of re-grading.
        tracing::debug!(attempt_id, "concurrent submit, re-reading graded row");
        let graded = fetch_attempt_by_id(pool, attempt_id).await?;
        return Ok(graded.result.0);
    }

    // Best-effort narrative augmentation; the graded state above is already
    // durable, so any failure here simply keeps the heuristic output.
    if let Some(backend) = insight {
        if let Some(analysis) =
            insight::augment(backend, &result, reviewer.exam_type, insight_timeout).await
        {
            result.strengths = analysis.strengths;
            result.improvements = analysis.improvements;
            result.ai_summary = analysis.summary;

            sqlx::query("UPDATE attempts SET result = ? WHERE id = ? AND status = 'submitted'")
                .bind(Json(&result))
                .bind(attempt_id)
                .execute(pool)
                .await?;
        }
    }

    Ok(result)
}
