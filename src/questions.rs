//! Multiple-choice question generation for the lesson quiz

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::error::{LingoError, LingoResult};
use crate::lesson::{DailyLesson, ItemKind};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Distractors drawn per question
pub const DISTRACTOR_COUNT: usize = 3;

/// One quiz question with shuffled options
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizQuestion {
    pub step_index: usize,
    pub kind: ItemKind,
    pub prompt: String,
    pub correct_answer: String,
    pub options: Vec<String>,
}

impl QuizQuestion {
    pub fn is_correct(&self, answer: &str) -> bool {
        answer == self.correct_answer
    }

    pub fn correct_index(&self) -> Option<usize> {
        self.options.iter().position(|o| *o == self.correct_answer)
    }
}

/// Build the question for `step_index`.
///
/// The prompt is the English side of the item and the correct answer its
/// translation. Distractors are the translations of the other items of the
/// same kind; repeats and copies of the correct answer are dropped, so a
/// lesson with duplicate translations yields fewer than four options rather
/// than two identical ones.
pub fn generate_question<R: Rng + ?Sized>(
    lesson: Option<&DailyLesson>,
    step_index: usize,
    rng: &mut R,
) -> LingoResult<QuizQuestion> {
    let lesson = lesson.ok_or_else(|| {
        LingoError::InvalidLessonState("Quiz requested without a loaded lesson".to_string())
    })?;
    let target = lesson.item(step_index)?;

    let correct_answer = target.translation().to_string();

    let mut pool: Vec<&str> = Vec::new();
    for item in lesson.items_of(target.kind()) {
        let candidate = item.translation();
        if item.id() == target.id() || candidate == correct_answer || pool.contains(&candidate) {
            continue;
        }
        pool.push(candidate);
    }

    let mut options: Vec<String> = pool
        .choose_multiple(rng, DISTRACTOR_COUNT)
        .map(|s| s.to_string())
        .collect();
    options.push(correct_answer.clone());
    options.shuffle(rng);

    Ok(QuizQuestion {
        step_index,
        kind: target.kind(),
        prompt: target.source_text().to_string(),
        correct_answer,
        options,
    })
}

// ============= Python Binding =============

/// Quiz question exposed to Python
#[cfg(feature = "python")]
#[pyclass(name = "QuizQuestion")]
#[derive(Debug, Clone)]
pub struct PyQuizQuestion {
    #[pyo3(get)]
    pub step_index: usize,
    #[pyo3(get)]
    pub kind: String,
    #[pyo3(get)]
    pub prompt: String,
    #[pyo3(get)]
    pub correct_answer: String,
    #[pyo3(get)]
    pub options: Vec<String>,
}

#[cfg(feature = "python")]
#[pymethods]
impl PyQuizQuestion {
    fn __repr__(&self) -> String {
        format!(
            "QuizQuestion(step={}, prompt='{}')",
            self.step_index,
            self.prompt.chars().take(40).collect::<String>()
        )
    }
}

#[cfg(feature = "python")]
impl From<QuizQuestion> for PyQuizQuestion {
    fn from(q: QuizQuestion) -> Self {
        let kind = match q.kind {
            ItemKind::Word => "word",
            ItemKind::Sentence => "sentence",
        };
        Self {
            step_index: q.step_index,
            kind: kind.to_string(),
            prompt: q.prompt,
            correct_answer: q.correct_answer,
            options: q.options,
        }
    }
}

/// Seeded when `seed` is given, so Python callers can replay a quiz
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "generate_question", signature = (lesson_json, step_index, seed=None))]
pub fn py_generate_question(
    lesson_json: &str,
    step_index: usize,
    seed: Option<u64>,
) -> PyResult<PyQuizQuestion> {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let lesson = DailyLesson::from_json(lesson_json)?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let question = generate_question(Some(&lesson), step_index, &mut rng)?;
    Ok(PyQuizQuestion::from(question))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::tests::sample_lesson;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_every_step_has_four_distinct_options() {
        let lesson = sample_lesson();
        let mut rng = StdRng::seed_from_u64(7);

        for step in 0..10 {
            let q = generate_question(Some(&lesson), step, &mut rng).unwrap();
            let distinct: HashSet<&String> = q.options.iter().collect();
            assert_eq!(q.options.len(), 4, "step {}", step);
            assert_eq!(distinct.len(), 4, "step {}", step);
            assert!(q.options.contains(&q.correct_answer));
            assert!(q.correct_index().is_some());
        }
    }

    #[test]
    fn test_prompt_and_answer_follow_item_kind() {
        let lesson = sample_lesson();
        let mut rng = StdRng::seed_from_u64(1);

        let word_q = generate_question(Some(&lesson), 2, &mut rng).unwrap();
        assert_eq!(word_q.kind, ItemKind::Word);
        assert_eq!(word_q.prompt, "aisle seat");
        assert_eq!(word_q.correct_answer, "통로 좌석");

        let sentence_q = generate_question(Some(&lesson), 5, &mut rng).unwrap();
        assert_eq!(sentence_q.kind, ItemKind::Sentence);
        assert_eq!(sentence_q.prompt, "Where is the check-in counter?");
        assert_eq!(sentence_q.correct_answer, "체크인 카운터가 어디에 있나요?");
    }

    #[test]
    fn test_distractors_come_from_same_kind() {
        let lesson = sample_lesson();
        let meanings: HashSet<&str> = lesson.words.iter().map(|w| w.meaning.as_str()).collect();
        let koreans: HashSet<&str> = lesson.sentences.iter().map(|s| s.korean.as_str()).collect();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let word_q = generate_question(Some(&lesson), 0, &mut rng).unwrap();
            assert!(word_q.options.iter().all(|o| meanings.contains(o.as_str())));

            let sentence_q = generate_question(Some(&lesson), 9, &mut rng).unwrap();
            assert!(sentence_q.options.iter().all(|o| koreans.contains(o.as_str())));
        }
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let lesson = sample_lesson();
        let a = generate_question(Some(&lesson), 3, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = generate_question(Some(&lesson), 3, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_correct_answer_is_not_pinned_to_one_slot() {
        let lesson = sample_lesson();
        let positions: HashSet<usize> = (0..50)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let q = generate_question(Some(&lesson), 0, &mut rng).unwrap();
                q.correct_index().unwrap()
            })
            .collect();
        assert!(positions.len() > 1);
    }

    #[test]
    fn test_duplicate_translations_are_deduplicated() {
        let mut lesson = sample_lesson();
        lesson.words[1].meaning = lesson.words[2].meaning.clone();
        lesson.words[3].meaning = lesson.words[0].meaning.clone();

        let q = generate_question(Some(&lesson), 0, &mut StdRng::seed_from_u64(3)).unwrap();
        let distinct: HashSet<&String> = q.options.iter().collect();
        assert_eq!(distinct.len(), q.options.len());
        assert_eq!(q.options.len(), 3);
        assert!(q.options.contains(&q.correct_answer));
    }

    #[test]
    fn test_small_pool_takes_everything_available() {
        let mut lesson = sample_lesson();
        lesson.words.truncate(2);

        let q = generate_question(Some(&lesson), 1, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(q.options.len(), 2);
    }

    #[test]
    fn test_missing_lesson_is_invalid_state() {
        let err = generate_question(None, 0, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, LingoError::InvalidLessonState(_)));
    }

    #[test]
    fn test_out_of_range_step_is_invalid_state() {
        let lesson = sample_lesson();
        let err = generate_question(Some(&lesson), 10, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, LingoError::InvalidLessonState(_)));
    }
}
