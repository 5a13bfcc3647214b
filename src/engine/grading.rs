// src/engine/grading.rs

use std::cmp::Ordering;

use crate::models::attempt::{AnswerRecord, AttemptResult, SectionScore};
use crate::models::question::Question;

/// Rounds to two decimals, matching how percentages are reported everywhere.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Grades a completed attempt.
///
/// `questions` and `answers` are the attempt's parallel arrays, in delivery
/// order. Marks `is_correct` on each answer record in place and returns the
/// full result block. An unselected answer counts as unanswered, never as
/// incorrect. Section aggregates keep first-encounter order.
pub fn grade(
    questions: &[Question],
    answers: &mut [AnswerRecord],
    passing_threshold: Option<f64>,
) -> AttemptResult {
    let mut correct = 0u32;
    let mut incorrect = 0u32;
    let mut unanswered = 0u32;
    let mut sections: Vec<SectionScore> = Vec::new();

    for (question, answer) in questions.iter().zip(answers.iter_mut()) {
        answer.is_correct = answer.selected_answer == Some(question.correct_answer);

        let idx = match sections.iter().position(|s| s.section == question.section) {
            Some(idx) => idx,
            None => {
                sections.push(SectionScore {
                    section: question.section.clone(),
                    total_items: 0,
                    correct: 0,
                    incorrect: 0,
                    unanswered: 0,
                    score: 0.0,
                });
                sections.len() - 1
            }
        };
        let entry = &mut sections[idx];
        entry.total_items += 1;

        match answer.selected_answer {
            None => {
                unanswered += 1;
                entry.unanswered += 1;
            }
            Some(_) if answer.is_correct => {
                correct += 1;
                entry.correct += 1;
            }
            Some(_) => {
                incorrect += 1;
                entry.incorrect += 1;
            }
        }
    }

    for s in &mut sections {
        s.score = if s.total_items > 0 {
            round2(s.correct as f64 / s.total_items as f64 * 100.0)
        } else {
            0.0
        };
    }

    let (strengths, improvements) = fallback_analysis(&sections);

    let total_items = questions.len() as u32;
    let percentage = if total_items > 0 {
        round2(correct as f64 / total_items as f64 * 100.0)
    } else {
        0.0
    };

    let passing_score =
        passing_threshold.map(|t| (t / 100.0 * total_items as f64).ceil() as u32);
    let passed = passing_threshold.map(|t| percentage >= t);

    AttemptResult {
        total_items,
        correct,
        incorrect,
        unanswered,
        percentage,
        passed,
        passing_score,
        section_scores: sections,
        strengths,
        improvements,
        ai_summary: None,
    }
}

/// Heuristic strengths/improvements, used whenever narrative augmentation is
/// unavailable or rejected: top three sections by score are strengths,
/// sections under 80% (weakest first, at most four) need improvement.
pub fn fallback_analysis(sections: &[SectionScore]) -> (Vec<String>, Vec<String>) {
    let mut sorted: Vec<&SectionScore> = sections.iter().collect();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let strengths = sorted
        .iter()
        .take(3)
        .map(|s| s.section.clone())
        .collect();

    let improvements = sorted
        .iter()
        .rev()
        .filter(|s| s.score < 80.0)
        .take(4)
        .map(|s| s.section.clone())
        .collect();

    (strengths, improvements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{ChoiceLetter, Difficulty, ReviewStatus};

    fn question(id: i64, section: &str, correct: ChoiceLetter) -> Question {
        Question {
            id,
            exam_family: "cse".to_string(),
            exam_level: "professional".to_string(),
            section: section.to_string(),
            difficulty: Difficulty::Medium,
            question_text: format!("Question {id}"),
            choice_a: "a".to_string(),
            choice_b: "b".to_string(),
            choice_c: "c".to_string(),
            choice_d: "d".to_string(),
            correct_answer: correct,
            explanation_correct: String::new(),
            explanation_wrong: String::new(),
            tip: String::new(),
            status: ReviewStatus::Approved,
        }
    }

    fn answer(question_id: i64, selected: Option<ChoiceLetter>) -> AnswerRecord {
        AnswerRecord {
            question: question_id,
            selected_answer: selected,
            is_correct: false,
        }
    }

    #[test]
    fn classifies_correct_incorrect_unanswered() {
        let questions = vec![
            question(1, "verbal", ChoiceLetter::A),
            question(2, "verbal", ChoiceLetter::B),
            question(3, "verbal", ChoiceLetter::C),
        ];
        let mut answers = vec![
            answer(1, Some(ChoiceLetter::A)), // correct
            answer(2, Some(ChoiceLetter::D)), // incorrect
            answer(3, None),                  // unanswered
        ];

        let result = grade(&questions, &mut answers, None);

        assert_eq!(result.correct, 1);
        assert_eq!(result.incorrect, 1);
        assert_eq!(result.unanswered, 1);
        assert!(answers[0].is_correct);
        assert!(!answers[1].is_correct);
        assert!(!answers[2].is_correct);
    }

    #[test]
    fn percentage_is_rounded_to_two_decimals() {
        // 70 correct of 100: percentage 70.00 exactly.
        let mut questions = Vec::new();
        let mut answers = Vec::new();
        for i in 0..100i64 {
            questions.push(question(i, "verbal", ChoiceLetter::A));
            let selected = if i < 70 {
                Some(ChoiceLetter::A)
            } else if i < 90 {
                Some(ChoiceLetter::B)
            } else {
                None
            };
            answers.push(answer(i, selected));
        }

        let result = grade(&questions, &mut answers, None);

        assert_eq!(result.total_items, 100);
        assert_eq!(result.correct, 70);
        assert_eq!(result.incorrect, 20);
        assert_eq!(result.unanswered, 10);
        assert_eq!(result.percentage, 70.00);
        assert_eq!(result.passed, None);
        assert_eq!(result.passing_score, None);
    }

    #[test]
    fn repeating_decimal_is_rounded() {
        let questions = vec![
            question(1, "verbal", ChoiceLetter::A),
            question(2, "verbal", ChoiceLetter::A),
            question(3, "verbal", ChoiceLetter::A),
        ];
        let mut answers = vec![
            answer(1, Some(ChoiceLetter::A)),
            answer(2, Some(ChoiceLetter::B)),
            answer(3, Some(ChoiceLetter::B)),
        ];

        let result = grade(&questions, &mut answers, None);
        assert_eq!(result.percentage, 33.33);
    }

    #[test]
    fn passing_threshold_sets_passed_and_passing_score() {
        let questions = vec![
            question(1, "verbal", ChoiceLetter::A),
            question(2, "verbal", ChoiceLetter::A),
        ];
        let mut answers = vec![
            answer(1, Some(ChoiceLetter::A)),
            answer(2, Some(ChoiceLetter::A)),
        ];

        let result = grade(&questions, &mut answers, Some(80.0));

        assert_eq!(result.percentage, 100.0);
        assert_eq!(result.passed, Some(true));
        // ceil(0.8 * 2) = 2
        assert_eq!(result.passing_score, Some(2));
    }

    #[test]
    fn failing_below_threshold() {
        let questions = vec![
            question(1, "verbal", ChoiceLetter::A),
            question(2, "verbal", ChoiceLetter::A),
        ];
        let mut answers = vec![answer(1, Some(ChoiceLetter::A)), answer(2, None)];

        let result = grade(&questions, &mut answers, Some(80.0));
        assert_eq!(result.passed, Some(false));
    }

    #[test]
    fn section_totals_sum_to_overall_total() {
        let questions = vec![
            question(1, "verbal", ChoiceLetter::A),
            question(2, "numerical", ChoiceLetter::A),
            question(3, "verbal", ChoiceLetter::A),
            question(4, "analytical", ChoiceLetter::A),
        ];
        let mut answers = vec![
            answer(1, Some(ChoiceLetter::A)),
            answer(2, None),
            answer(3, Some(ChoiceLetter::B)),
            answer(4, Some(ChoiceLetter::A)),
        ];

        let result = grade(&questions, &mut answers, None);

        let section_total: u32 = result.section_scores.iter().map(|s| s.total_items).sum();
        assert_eq!(section_total, result.total_items);
        // First-encounter ordering of sections.
        let names: Vec<&str> = result
            .section_scores
            .iter()
            .map(|s| s.section.as_str())
            .collect();
        assert_eq!(names, vec!["verbal", "numerical", "analytical"]);
    }

    #[test]
    fn empty_attempt_grades_to_zero() {
        let result = grade(&[], &mut [], Some(75.0));
        assert_eq!(result.total_items, 0);
        assert_eq!(result.percentage, 0.0);
        assert_eq!(result.passing_score, Some(0));
    }

    #[test]
    fn fallback_strengths_and_improvements() {
        let sections = vec![
            SectionScore {
                section: "verbal".into(),
                total_items: 10,
                correct: 9,
                incorrect: 1,
                unanswered: 0,
                score: 90.0,
            },
            SectionScore {
                section: "numerical".into(),
                total_items: 10,
                correct: 5,
                incorrect: 5,
                unanswered: 0,
                score: 50.0,
            },
            SectionScore {
                section: "analytical".into(),
                total_items: 10,
                correct: 7,
                incorrect: 3,
                unanswered: 0,
                score: 70.0,
            },
            SectionScore {
                section: "clerical".into(),
                total_items: 10,
                correct: 6,
                incorrect: 4,
                unanswered: 0,
                score: 60.0,
            },
        ];

        let (strengths, improvements) = fallback_analysis(&sections);

        assert_eq!(strengths, vec!["verbal", "analytical", "clerical"]);
        // Weakest first, only sections under 80.
        assert_eq!(improvements, vec!["numerical", "clerical", "analytical"]);
    }
}
