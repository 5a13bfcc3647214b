// src/engine/selector.rs

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::models::question::{Difficulty, Question};
use crate::models::reviewer::DifficultySplit;

/// Draws `count` questions from `pool`, approximately matching the requested
/// difficulty split.
///
/// Integer targets: easy and hard are rounded from their percentages, medium
/// takes the remainder so the three targets always sum to `count` exactly.
/// Each bucket is shuffled uniformly and truncated to its target; if a bucket
/// runs short, the shortfall is backfilled from the unselected remainder of
/// the pool. When the pool itself is smaller than `count` the result is
/// short; callers must not assume exact counts.
pub fn select_with_difficulty(
    pool: Vec<Question>,
    count: usize,
    split: &DifficultySplit,
) -> Vec<Question> {
    if count == 0 || pool.is_empty() {
        return Vec::new();
    }

    let easy_target = ((split.easy as f64 / 100.0) * count as f64).round() as usize;
    let hard_target = ((split.hard as f64 / 100.0) * count as f64).round() as usize;
    let med_target = count.saturating_sub(easy_target + hard_target);

    let mut easy = Vec::new();
    let mut medium = Vec::new();
    let mut hard = Vec::new();
    for q in pool {
        match q.difficulty {
            Difficulty::Easy => easy.push(q),
            Difficulty::Medium => medium.push(q),
            Difficulty::Hard => hard.push(q),
        }
    }

    let mut rng = thread_rng();
    easy.shuffle(&mut rng);
    medium.shuffle(&mut rng);
    hard.shuffle(&mut rng);

    let mut selected = Vec::with_capacity(count);
    let mut leftovers = Vec::new();

    for (mut bucket, target) in [(easy, easy_target), (medium, med_target), (hard, hard_target)] {
        if bucket.len() > target {
            leftovers.extend(bucket.split_off(target));
        }
        selected.extend(bucket);
    }

    // Backfill from whatever was not picked, in random order.
    if selected.len() < count {
        leftovers.shuffle(&mut rng);
        let shortfall = count - selected.len();
        selected.extend(leftovers.into_iter().take(shortfall));
    }

    selected.truncate(count);
    selected
}

/// Shuffles the combined multi-section selection so delivery order does not
/// reveal section grouping.
pub fn shuffle_questions(questions: &mut [Question]) {
    questions.shuffle(&mut thread_rng());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{ChoiceLetter, ReviewStatus};

    fn question(id: i64, difficulty: Difficulty) -> Question {
        Question {
            id,
            exam_family: "cse".to_string(),
            exam_level: "professional".to_string(),
            section: "verbal".to_string(),
            difficulty,
            question_text: format!("Question {id}"),
            choice_a: "a".to_string(),
            choice_b: "b".to_string(),
            choice_c: "c".to_string(),
            choice_d: "d".to_string(),
            correct_answer: ChoiceLetter::A,
            explanation_correct: String::new(),
            explanation_wrong: String::new(),
            tip: String::new(),
            status: ReviewStatus::Approved,
        }
    }

    fn pool(easy: usize, medium: usize, hard: usize) -> Vec<Question> {
        let mut id = 0;
        let mut out = Vec::new();
        for _ in 0..easy {
            id += 1;
            out.push(question(id, Difficulty::Easy));
        }
        for _ in 0..medium {
            id += 1;
            out.push(question(id, Difficulty::Medium));
        }
        for _ in 0..hard {
            id += 1;
            out.push(question(id, Difficulty::Hard));
        }
        out
    }

    fn count_by_difficulty(selected: &[Question]) -> (usize, usize, usize) {
        let easy = selected
            .iter()
            .filter(|q| q.difficulty == Difficulty::Easy)
            .count();
        let medium = selected
            .iter()
            .filter(|q| q.difficulty == Difficulty::Medium)
            .count();
        let hard = selected
            .iter()
            .filter(|q| q.difficulty == Difficulty::Hard)
            .count();
        (easy, medium, hard)
    }

    #[test]
    fn exact_split_when_pool_is_deep_enough() {
        let split = DifficultySplit {
            easy: 30,
            medium: 50,
            hard: 20,
        };
        let selected = select_with_difficulty(pool(10, 10, 10), 10, &split);

        assert_eq!(selected.len(), 10);
        assert_eq!(count_by_difficulty(&selected), (3, 5, 2));

        let mut ids: Vec<i64> = selected.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10, "selection must not contain duplicates");
    }

    #[test]
    fn backfills_from_other_buckets_when_one_is_short() {
        let split = DifficultySplit {
            easy: 30,
            medium: 50,
            hard: 20,
        };
        // Only one hard question for a target of 2.
        let selected = select_with_difficulty(pool(10, 10, 1), 10, &split);

        assert_eq!(selected.len(), 10);
        let (_, _, hard) = count_by_difficulty(&selected);
        assert_eq!(hard, 1);
    }

    #[test]
    fn underfills_when_pool_is_too_small() {
        let split = DifficultySplit::default();
        let selected = select_with_difficulty(pool(2, 2, 1), 10, &split);
        assert_eq!(selected.len(), 5);
    }

    #[test]
    fn empty_pool_yields_empty_selection() {
        let selected = select_with_difficulty(Vec::new(), 10, &DifficultySplit::default());
        assert!(selected.is_empty());
    }

    #[test]
    fn zero_count_yields_empty_selection() {
        let selected = select_with_difficulty(pool(5, 5, 5), 0, &DifficultySplit::default());
        assert!(selected.is_empty());
    }
}
