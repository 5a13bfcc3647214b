// src/engine/insight.rs

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;
use crate::models::attempt::AttemptResult;
use crate::models::reviewer::ExamType;

/// Failure inside the augmentation call. Never surfaced to the caller;
/// the submit path logs it and keeps the heuristic result.
#[derive(Debug)]
pub enum InsightError {
    Transport(String),
    BadResponse(String),
    TimedOut,
}

impl fmt::Display for InsightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightError::Transport(msg) => write!(f, "transport error: {msg}"),
            InsightError::BadResponse(msg) => write!(f, "bad response: {msg}"),
            InsightError::TimedOut => write!(f, "timed out"),
        }
    }
}

/// What the collaborator is asked to produce. Parsed strictly; anything
/// structurally off is discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightAnalysis {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl InsightAnalysis {
    /// Shape check: both lists non-empty with non-blank entries, capped at
    /// 3 strengths / 4 improvements like the heuristic output.
    pub fn validated(mut self) -> Option<Self> {
        self.strengths.retain(|s| !s.trim().is_empty());
        self.improvements.retain(|s| !s.trim().is_empty());
        if self.strengths.is_empty() || self.improvements.is_empty() {
            return None;
        }
        self.strengths.truncate(3);
        self.improvements.truncate(4);
        if let Some(summary) = &self.summary {
            if summary.trim().is_empty() {
                self.summary = None;
            }
        }
        Some(self)
    }
}

/// Seam for the external text-generation collaborator, so tests can swap in
/// a canned backend.
#[async_trait]
pub trait InsightBackend: Send + Sync {
    async fn analyze(&self, prompt: &str) -> Result<InsightAnalysis, InsightError>;
}

/// Builds the analysis prompt from the graded result. For single-section
/// practice exams the summary is asked to include a pacing sentence.
pub fn build_prompt(result: &AttemptResult, exam_type: ExamType) -> String {
    let sections: Vec<_> = result
        .section_scores
        .iter()
        .map(|s| {
            json!({
                "section": s.section,
                "total_items": s.total_items,
                "correct": s.correct,
                "incorrect": s.incorrect,
                "unanswered": s.unanswered,
                "score": s.score,
            })
        })
        .collect();

    let pacing_line = if exam_type == ExamType::Practice && result.section_scores.len() == 1 {
        "- The summary must end with one short pacing insight for this section.\n"
    } else {
        ""
    };

    format!(
        "You are an exam coach. Analyze the user's test performance.\n\
         Return ONLY valid JSON with this shape:\n\
         {{\"strengths\":[string],\"improvements\":[string],\"summary\":string}}\n\
         Guidelines:\n\
         - Strengths: 2-3 short, specific skill or section names.\n\
         - Improvements: 3-4 short, specific skill or section names.\n\
         - Summary: 2-3 sentences, encouraging, actionable.\n\
         {pacing_line}\
         - No extra keys, no markdown.\n\n\
         Performance data:\n{data}",
        pacing_line = pacing_line,
        data = json!({
            "total_items": result.total_items,
            "correct": result.correct,
            "percentage": result.percentage,
            "sections": sections,
        }),
    )
}

/// Gemini-style generative-language REST client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Returns None when no API key is configured; augmentation is then
    /// skipped entirely.
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_key = config.insight_api_key.clone()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.insight_timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            http,
            api_base: config.insight_api_base.clone(),
            api_key,
            model: config.insight_model.clone(),
        })
    }
}

/// Response envelope of the generateContent endpoint, reduced to the single
/// field we read.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl InsightBackend for GeminiClient {
    async fn analyze(&self, prompt: &str) -> Result<InsightAnalysis, InsightError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InsightError::TimedOut
                } else {
                    InsightError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(InsightError::Transport(format!(
                "status {}",
                response.status()
            )));
        }

        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| InsightError::BadResponse(e.to_string()))?;

        let text = envelope
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| InsightError::BadResponse("empty candidates".to_string()))?;

        parse_analysis(text)
    }
}

/// Parses the model's JSON payload, tolerating a markdown code fence around
/// it, and applies the shape check.
pub fn parse_analysis(text: &str) -> Result<InsightAnalysis, InsightError> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();

    let parsed: InsightAnalysis = serde_json::from_str(trimmed)
        .map_err(|e| InsightError::BadResponse(e.to_string()))?;

    parsed
        .validated()
        .ok_or_else(|| InsightError::BadResponse("empty strengths/improvements".to_string()))
}

/// Best-effort augmentation. Bounded by `timeout`; every failure mode logs
/// and returns None so the caller keeps the heuristic result.
pub async fn augment(
    backend: &dyn InsightBackend,
    result: &AttemptResult,
    exam_type: ExamType,
    timeout: Duration,
) -> Option<InsightAnalysis> {
    let prompt = build_prompt(result, exam_type);

    match tokio::time::timeout(timeout, backend.analyze(&prompt)).await {
        Ok(Ok(analysis)) => Some(analysis),
        Ok(Err(e)) => {
            tracing::warn!("Insight augmentation failed: {}", e);
            None
        }
        Err(_) => {
            tracing::warn!("Insight augmentation timed out after {:?}", timeout);
            None
        }
    }
}
