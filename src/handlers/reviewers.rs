// src/handlers/reviewers.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    engine::lifecycle,
    error::AppError,
    models::reviewer::{PublishStatus, ReviewerSummary},
};

/// Lists the published reviewer catalog.
pub async fn list_reviewers(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let reviewers = lifecycle::fetch_published_reviewers(&pool).await?;

    let summaries: Vec<ReviewerSummary> = reviewers
        .iter()
        .map(ReviewerSummary::from_reviewer)
        .collect();

    Ok(Json(summaries))
}

/// Fetches a single published reviewer.
pub async fn get_reviewer(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let reviewer = lifecycle::fetch_reviewer(&pool, id)
        .await?
        .filter(|r| r.status == PublishStatus::Published)
        .ok_or_else(|| AppError::NotFound("Reviewer not found".to_string()))?;

    Ok(Json(ReviewerSummary::from_reviewer(&reviewer)))
}
