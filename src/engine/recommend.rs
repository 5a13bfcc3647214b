// src/engine/recommend.rs

use std::cmp::Ordering;

use serde::Serialize;

use crate::models::attempt::AttemptResult;
use crate::models::reviewer::{ExamType, Reviewer};

/// How prominently a CTA should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CtaPriority {
    Primary,
    Secondary,
    Optional,
}

/// Recommended next-step action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CtaType {
    TakeSectionPractice,
    RetakeFullMock,
    ReviewAnswers,
    RetakeSection,
    TryFullMock,
    GoToDashboard,
    RetakeDemo,
}

/// One recommended next-step action.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub cta_type: CtaType,
    pub label: &'static str,
    pub reviewer_id: Option<i64>,
    pub is_highest_impact: bool,
    pub priority: CtaPriority,
}

/// Overall performance band for a graded result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PerformanceBand {
    Strong,
    Developing,
    NeedsImprovement,
}

impl PerformanceBand {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 85.0 {
            PerformanceBand::Strong
        } else if percentage >= 70.0 {
            PerformanceBand::Developing
        } else {
            PerformanceBand::NeedsImprovement
        }
    }
}

fn normalize_section(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Finds a practice reviewer covering the given section, honoring exam-level
/// overlap. A reviewer with an empty level list is level-unrestricted;
/// 'both' matches any level.
fn find_reviewer_for_section<'a>(
    section: &str,
    practice: &[&'a Reviewer],
    exam_levels: &[String],
) -> Option<&'a Reviewer> {
    let wanted = normalize_section(section);
    practice.iter().copied().find(|r| {
        let Some(first) = r.exam_config.section_distribution.first() else {
            return false;
        };
        if normalize_section(&first.section) != wanted {
            return false;
        }
        let levels = &r.exam_config.exam_level;
        if levels.is_empty() {
            return true;
        }
        exam_levels.iter().any(|l| {
            levels
                .iter()
                .any(|rl| rl.eq_ignore_ascii_case(l) || rl == "both")
        })
    })
}

fn recommendations_for_mock(
    result: &AttemptResult,
    current: &Reviewer,
    practice: &[&Reviewer],
) -> Vec<Recommendation> {
    let mut ctas = Vec::new();

    // Sections under 75%, weakest first.
    let mut weak: Vec<_> = result
        .section_scores
        .iter()
        .filter(|s| s.score < 75.0)
        .collect();
    weak.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));

    let exam_levels = &current.exam_config.exam_level;
    let lowest = weak.first().map(|s| s.section.clone());

    for sec in &weak {
        let target = find_reviewer_for_section(&sec.section, practice, exam_levels);
        ctas.push(Recommendation {
            cta_type: CtaType::TakeSectionPractice,
            label: "Take Practice Exam",
            reviewer_id: target.map(|r| r.id),
            is_highest_impact: lowest.as_deref() == Some(sec.section.as_str()),
            priority: if sec.score < 60.0 {
                CtaPriority::Primary
            } else {
                CtaPriority::Secondary
            },
        });
    }

    ctas.push(Recommendation {
        cta_type: CtaType::RetakeFullMock,
        label: "Retake Full Exam",
        reviewer_id: Some(current.id),
        is_highest_impact: false,
        priority: CtaPriority::Secondary,
    });

    ctas.push(Recommendation {
        cta_type: CtaType::ReviewAnswers,
        label: "Review My Answers",
        reviewer_id: None,
        is_highest_impact: false,
        priority: CtaPriority::Secondary,
    });

    ctas
}

fn recommendations_for_practice(
    result: &AttemptResult,
    current: &Reviewer,
    mocks: &[&Reviewer],
) -> Vec<Recommendation> {
    let band = PerformanceBand::from_percentage(result.percentage);
    let mut ctas = Vec::new();

    ctas.push(Recommendation {
        cta_type: CtaType::ReviewAnswers,
        label: "Review My Answers",
        reviewer_id: None,
        is_highest_impact: false,
        priority: CtaPriority::Primary,
    });

    ctas.push(Recommendation {
        cta_type: CtaType::RetakeSection,
        label: "Retake Section Practice",
        reviewer_id: Some(current.id),
        is_highest_impact: false,
        priority: if band == PerformanceBand::Strong {
            CtaPriority::Optional
        } else {
            CtaPriority::Secondary
        },
    });

    if let Some(mock) = mocks.first() {
        ctas.push(Recommendation {
            cta_type: CtaType::TryFullMock,
            label: "Try Full Mock Exam",
            reviewer_id: Some(mock.id),
            is_highest_impact: false,
            priority: if band == PerformanceBand::Strong {
                CtaPriority::Primary
            } else {
                CtaPriority::Optional
            },
        });
    }

    ctas.push(Recommendation {
        cta_type: CtaType::GoToDashboard,
        label: "Go Back to Dashboard",
        reviewer_id: None,
        is_highest_impact: false,
        priority: CtaPriority::Optional,
    });

    ctas
}

fn recommendations_for_demo(current: &Reviewer, mocks: &[&Reviewer]) -> Vec<Recommendation> {
    let mut ctas = Vec::new();

    ctas.push(Recommendation {
        cta_type: CtaType::ReviewAnswers,
        label: "Review My Answers",
        reviewer_id: None,
        is_highest_impact: false,
        priority: CtaPriority::Primary,
    });

    if let Some(mock) = mocks.first() {
        ctas.push(Recommendation {
            cta_type: CtaType::TryFullMock,
            label: "Try Full Mock Exam",
            reviewer_id: Some(mock.id),
            is_highest_impact: false,
            priority: CtaPriority::Primary,
        });
    }

    ctas.push(Recommendation {
        cta_type: CtaType::GoToDashboard,
        label: "Go Back to Dashboard",
        reviewer_id: None,
        is_highest_impact: false,
        priority: CtaPriority::Optional,
    });

    ctas.push(Recommendation {
        cta_type: CtaType::RetakeDemo,
        label: "Retake Demo",
        reviewer_id: Some(current.id),
        is_highest_impact: false,
        priority: CtaPriority::Optional,
    });

    ctas
}

/// Pure function from a graded result plus the reviewer catalog to an
/// ordered CTA list. `catalog` is the published catalog; the current
/// reviewer may or may not be part of it.
pub fn generate_recommendations(
    result: &AttemptResult,
    current: &Reviewer,
    catalog: &[Reviewer],
) -> Vec<Recommendation> {
    let practice: Vec<&Reviewer> = catalog
        .iter()
        .filter(|r| r.exam_type == ExamType::Practice)
        .collect();
    let mocks: Vec<&Reviewer> = catalog
        .iter()
        .filter(|r| r.exam_type == ExamType::Mock)
        .collect();

    match current.exam_type {
        ExamType::Mock => recommendations_for_mock(result, current, &practice),
        ExamType::Practice => recommendations_for_practice(result, current, &mocks),
        ExamType::Demo => recommendations_for_demo(current, &mocks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attempt::SectionScore;
    use crate::models::reviewer::{
        AccessTier, DifficultySplit, ExamConfig, ExamVariant, PublishStatus, SectionTarget,
    };
    use sqlx::types::Json;

    fn reviewer(id: i64, exam_type: ExamType, sections: &[(&str, u32)]) -> Reviewer {
        Reviewer {
            id,
            slug: format!("reviewer-{id}"),
            exam_type,
            access: AccessTier::Free,
            title: format!("Reviewer {id}"),
            status: PublishStatus::Published,
            exam_config: Json(ExamConfig {
                variant: ExamVariant::Dynamic,
                exam_family: "cse".to_string(),
                exam_level: vec!["professional".to_string()],
                total_items: sections.iter().map(|(_, c)| *c).sum(),
                time_limit_seconds: 0,
                passing_threshold: None,
                section_distribution: sections
                    .iter()
                    .map(|(s, c)| SectionTarget {
                        section: s.to_string(),
                        count: *c,
                    })
                    .collect(),
                difficulty_distribution: DifficultySplit::default(),
            }),
        }
    }

    fn section(name: &str, score: f64) -> SectionScore {
        SectionScore {
            section: name.to_string(),
            total_items: 20,
            correct: (score / 5.0) as u32,
            incorrect: 0,
            unanswered: 0,
            score,
        }
    }

    fn result_with_sections(percentage: f64, sections: Vec<SectionScore>) -> AttemptResult {
        AttemptResult {
            total_items: sections.iter().map(|s| s.total_items).sum(),
            percentage,
            section_scores: sections,
            ..Default::default()
        }
    }

    #[test]
    fn mock_emits_practice_cta_only_for_weak_sections() {
        let current = reviewer(1, ExamType::Mock, &[("verbal", 20), ("numerical", 20)]);
        let numerical_practice = reviewer(2, ExamType::Practice, &[("numerical", 20)]);
        let verbal_practice = reviewer(3, ExamType::Practice, &[("verbal", 20)]);
        let catalog = vec![
            numerical_practice,
            verbal_practice,
            reviewer(4, ExamType::Mock, &[("verbal", 20), ("numerical", 20)]),
        ];

        let result = result_with_sections(
            72.5,
            vec![section("verbal", 90.0), section("numerical", 55.0)],
        );

        let ctas = generate_recommendations(&result, &current, &catalog);

        let practice: Vec<_> = ctas
            .iter()
            .filter(|c| c.cta_type == CtaType::TakeSectionPractice)
            .collect();
        assert_eq!(practice.len(), 1, "only numerical is below 75%");
        let cta = practice[0];
        assert_eq!(cta.reviewer_id, Some(2));
        assert!(cta.is_highest_impact);
        assert_eq!(cta.priority, CtaPriority::Primary, "55 < 60");

        assert!(ctas.iter().any(|c| c.cta_type == CtaType::RetakeFullMock
            && c.priority == CtaPriority::Secondary));
        assert!(ctas.iter().any(|c| c.cta_type == CtaType::ReviewAnswers
            && c.priority == CtaPriority::Secondary));
    }

    #[test]
    fn mock_orders_weak_sections_weakest_first() {
        let current = reviewer(1, ExamType::Mock, &[("a", 10), ("b", 10), ("c", 10)]);
        let result = result_with_sections(
            60.0,
            vec![section("a", 70.0), section("b", 40.0), section("c", 65.0)],
        );

        let ctas = generate_recommendations(&result, &current, &[]);
        let practice: Vec<_> = ctas
            .iter()
            .filter(|c| c.cta_type == CtaType::TakeSectionPractice)
            .collect();
        assert_eq!(practice.len(), 3);
        // Weakest (b, 40) first and flagged highest impact.
        assert!(practice[0].is_highest_impact);
        assert_eq!(practice[0].priority, CtaPriority::Primary);
        assert_eq!(practice[1].priority, CtaPriority::Secondary);
        assert!(!practice[1].is_highest_impact);
        assert!(!practice[2].is_highest_impact);
    }

    #[test]
    fn section_matching_requires_level_overlap() {
        let mut unmatched = reviewer(2, ExamType::Practice, &[("numerical", 20)]);
        unmatched.exam_config.exam_level = vec!["sub-professional".to_string()];
        let catalog = vec![unmatched];
        let current = reviewer(1, ExamType::Mock, &[("numerical", 20)]);
        let result = result_with_sections(50.0, vec![section("numerical", 50.0)]);

        let ctas = generate_recommendations(&result, &current, &catalog);
        let cta = ctas
            .iter()
            .find(|c| c.cta_type == CtaType::TakeSectionPractice)
            .expect("weak section still gets a CTA");
        assert_eq!(cta.reviewer_id, None, "level mismatch leaves CTA untargeted");
    }

    #[test]
    fn both_level_matches_any() {
        let mut target = reviewer(2, ExamType::Practice, &[("numerical", 20)]);
        target.exam_config.exam_level = vec!["both".to_string()];
        let catalog = vec![target];
        let current = reviewer(1, ExamType::Mock, &[("numerical", 20)]);
        let result = result_with_sections(50.0, vec![section("numerical", 50.0)]);

        let ctas = generate_recommendations(&result, &current, &catalog);
        let cta = ctas
            .iter()
            .find(|c| c.cta_type == CtaType::TakeSectionPractice)
            .expect("cta present");
        assert_eq!(cta.reviewer_id, Some(2));
    }

    #[test]
    fn practice_strong_band_promotes_full_mock() {
        let current = reviewer(1, ExamType::Practice, &[("verbal", 20)]);
        let catalog = vec![reviewer(2, ExamType::Mock, &[("verbal", 20)])];
        let result = result_with_sections(90.0, vec![section("verbal", 90.0)]);

        let ctas = generate_recommendations(&result, &current, &catalog);

        let retake = ctas
            .iter()
            .find(|c| c.cta_type == CtaType::RetakeSection)
            .expect("retake present");
        assert_eq!(retake.priority, CtaPriority::Optional);

        let full_mock = ctas
            .iter()
            .find(|c| c.cta_type == CtaType::TryFullMock)
            .expect("full mock present");
        assert_eq!(full_mock.priority, CtaPriority::Primary);

        assert!(ctas.iter().any(
            |c| c.cta_type == CtaType::ReviewAnswers && c.priority == CtaPriority::Primary
        ));
        assert!(ctas.iter().any(|c| c.cta_type == CtaType::GoToDashboard));
    }

    #[test]
    fn practice_weak_band_downgrades_full_mock() {
        let current = reviewer(1, ExamType::Practice, &[("verbal", 20)]);
        let catalog = vec![reviewer(2, ExamType::Mock, &[("verbal", 20)])];
        let result = result_with_sections(55.0, vec![section("verbal", 55.0)]);

        let ctas = generate_recommendations(&result, &current, &catalog);
        let retake = ctas
            .iter()
            .find(|c| c.cta_type == CtaType::RetakeSection)
            .expect("retake present");
        assert_eq!(retake.priority, CtaPriority::Secondary);

        let full_mock = ctas
            .iter()
            .find(|c| c.cta_type == CtaType::TryFullMock)
            .expect("full mock present");
        assert_eq!(full_mock.priority, CtaPriority::Optional);
    }

    #[test]
    fn demo_upsells_full_mock() {
        let current = reviewer(1, ExamType::Demo, &[("verbal", 10)]);
        let catalog = vec![reviewer(2, ExamType::Mock, &[("verbal", 20)])];
        let result = result_with_sections(60.0, vec![section("verbal", 60.0)]);

        let ctas = generate_recommendations(&result, &current, &catalog);

        assert!(ctas.iter().any(
            |c| c.cta_type == CtaType::ReviewAnswers && c.priority == CtaPriority::Primary
        ));
        assert!(ctas.iter().any(
            |c| c.cta_type == CtaType::TryFullMock && c.priority == CtaPriority::Primary
        ));
        assert!(ctas.iter().any(
            |c| c.cta_type == CtaType::RetakeDemo && c.priority == CtaPriority::Optional
        ));
        assert!(ctas.iter().any(
            |c| c.cta_type == CtaType::GoToDashboard && c.priority == CtaPriority::Optional
        ));
    }

    #[test]
    fn performance_bands() {
        assert_eq!(
            PerformanceBand::from_percentage(85.0),
            PerformanceBand::Strong
        );
        assert_eq!(
            PerformanceBand::from_percentage(84.99),
            PerformanceBand::Developing
        );
        assert_eq!(
            PerformanceBand::from_percentage(70.0),
            PerformanceBand::Developing
        );
        assert_eq!(
            PerformanceBand::from_percentage(69.99),
            PerformanceBand::NeedsImprovement
        );
    }
}
