// src/models/reviewer.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Exam product type. Drives both assembly defaults and the
/// post-result recommendation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ExamType {
    Mock,
    Practice,
    Demo,
}

/// Access tier. Premium reviewers require a premium entitlement in the
/// caller's claims; the tier itself is plain catalog data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AccessTier {
    Free,
    Premium,
}

/// Assembly variant: dynamic reviewers draw a fresh question set on every
/// attempt, fixed reviewers reuse the set from the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ExamVariant {
    Dynamic,
    Fixed,
}

/// Catalog publication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PublishStatus {
    Draft,
    Published,
    Archived,
}

/// Per-section item target for assembly, e.g. { "verbal", 45 }.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionTarget {
    pub section: String,
    pub count: u32,
}

/// Requested difficulty percentage split. Nominally sums to 100; the
/// selector tolerates drift since medium is computed as the remainder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DifficultySplit {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl Default for DifficultySplit {
    fn default() -> Self {
        Self {
            easy: 30,
            medium: 50,
            hard: 20,
        }
    }
}

/// Exam assembly configuration, stored as a JSON document on the reviewer
/// row and validated before it reaches the engine.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExamConfig {
    pub variant: ExamVariant,
    pub exam_family: String,
    pub exam_level: Vec<String>,
    #[validate(range(min = 1, message = "total_items must be at least 1"))]
    pub total_items: u32,
    /// Seconds; 0 = untimed. Advisory only, the server does not enforce it.
    #[serde(default)]
    pub time_limit_seconds: u32,
    /// Percentage; None = no pass/fail for this reviewer.
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub passing_threshold: Option<f64>,
    #[validate(length(min = 1, message = "at least one section target required"))]
    pub section_distribution: Vec<SectionTarget>,
    #[serde(default)]
    pub difficulty_distribution: DifficultySplit,
}

/// Represents the 'reviewers' table: one exam product definition.
/// Read-only to this service.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: i64,
    pub slug: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub exam_type: ExamType,
    pub access: AccessTier,
    pub title: String,
    pub status: PublishStatus,
    pub exam_config: Json<ExamConfig>,
}

/// Catalog listing DTO.
#[derive(Debug, Serialize)]
pub struct ReviewerSummary {
    pub id: i64,
    pub slug: String,
    #[serde(rename = "type")]
    pub exam_type: ExamType,
    pub access: AccessTier,
    pub title: String,
    pub total_items: u32,
    pub time_limit_seconds: u32,
    pub passing_threshold: Option<f64>,
}

impl ReviewerSummary {
    pub fn from_reviewer(r: &Reviewer) -> Self {
        Self {
            id: r.id,
            slug: r.slug.clone(),
            exam_type: r.exam_type,
            access: r.access,
            title: r.title.clone(),
            total_items: r.exam_config.total_items,
            time_limit_seconds: r.exam_config.time_limit_seconds,
            passing_threshold: r.exam_config.passing_threshold,
        }
    }
}
