//! Daily lesson records and step addressing

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{LingoError, LingoResult};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Vocabulary words in every lesson
pub const WORDS_PER_LESSON: usize = 5;
/// Example sentences in every lesson
pub const SENTENCES_PER_LESSON: usize = 5;
/// Discovery steps (and quiz questions) per lesson
pub const TOTAL_STEPS: usize = WORDS_PER_LESSON + SENTENCES_PER_LESSON;

/// Vocabulary entry of a lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordItem {
    pub id: String,
    pub word: String,
    pub meaning: String,
    pub phonetic: String,
    pub example: String,
}

/// Travel sentence of a lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceItem {
    pub id: String,
    pub english: String,
    pub korean: String,
    pub situation: String,
}

/// One themed lesson: five words followed by five sentences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLesson {
    pub theme: String,
    pub words: Vec<WordItem>,
    pub sentences: Vec<SentenceItem>,
}

/// Which collection a step addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Word,
    Sentence,
}

impl ItemKind {
    /// Steps 0-4 are words, 5-9 are sentences
    pub fn for_step(step_index: usize) -> Self {
        if step_index < WORDS_PER_LESSON {
            ItemKind::Word
        } else {
            ItemKind::Sentence
        }
    }
}

/// Borrowed view of the item a step points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonItem<'a> {
    Word(&'a WordItem),
    Sentence(&'a SentenceItem),
}

impl<'a> LessonItem<'a> {
    pub fn kind(&self) -> ItemKind {
        match self {
            LessonItem::Word(_) => ItemKind::Word,
            LessonItem::Sentence(_) => ItemKind::Sentence,
        }
    }

    pub fn id(&self) -> &'a str {
        match self {
            LessonItem::Word(w) => &w.id,
            LessonItem::Sentence(s) => &s.id,
        }
    }

    /// English text shown as the quiz prompt
    pub fn source_text(&self) -> &'a str {
        match self {
            LessonItem::Word(w) => &w.word,
            LessonItem::Sentence(s) => &s.english,
        }
    }

    /// Korean translation used as the correct answer
    pub fn translation(&self) -> &'a str {
        match self {
            LessonItem::Word(w) => &w.meaning,
            LessonItem::Sentence(s) => &s.korean,
        }
    }

    /// Text sent to the speech service from a learning card
    pub fn speech_text(&self) -> &'a str {
        self.source_text()
    }
}

impl DailyLesson {
    /// Parse the provider's JSON payload and validate its shape
    pub fn from_json(payload: &str) -> LingoResult<Self> {
        let lesson: DailyLesson = serde_json::from_str(payload.trim()).map_err(|e| {
            LingoError::LessonFetchFailed(format!("Malformed lesson payload: {}", e))
        })?;
        lesson.validate()?;
        Ok(lesson)
    }

    /// Check the fixed 5 + 5 layout and id uniqueness per collection
    pub fn validate(&self) -> LingoResult<()> {
        if self.words.len() != WORDS_PER_LESSON {
            return Err(LingoError::LessonFetchFailed(format!(
                "Expected {} words, got {}",
                WORDS_PER_LESSON,
                self.words.len()
            )));
        }
        if self.sentences.len() != SENTENCES_PER_LESSON {
            return Err(LingoError::LessonFetchFailed(format!(
                "Expected {} sentences, got {}",
                SENTENCES_PER_LESSON,
                self.sentences.len()
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.words.iter().map(|w| w.id.as_str()).find(|id| !seen.insert(*id)) {
            return Err(LingoError::LessonFetchFailed(format!("Duplicate word id '{}'", dup)));
        }
        seen.clear();
        if let Some(dup) = self
            .sentences
            .iter()
            .map(|s| s.id.as_str())
            .find(|id| !seen.insert(*id))
        {
            return Err(LingoError::LessonFetchFailed(format!("Duplicate sentence id '{}'", dup)));
        }

        Ok(())
    }

    /// Resolve a step index to its word or sentence
    pub fn item(&self, step_index: usize) -> LingoResult<LessonItem<'_>> {
        let item = match ItemKind::for_step(step_index) {
            ItemKind::Word => self.words.get(step_index).map(LessonItem::Word),
            ItemKind::Sentence => self
                .sentences
                .get(step_index - WORDS_PER_LESSON)
                .map(LessonItem::Sentence),
        };
        item.ok_or_else(|| {
            LingoError::InvalidLessonState(format!("No lesson item at step {}", step_index))
        })
    }

    /// Items of one kind, in lesson order
    pub fn items_of(&self, kind: ItemKind) -> Vec<LessonItem<'_>> {
        match kind {
            ItemKind::Word => self.words.iter().map(LessonItem::Word).collect(),
            ItemKind::Sentence => self.sentences.iter().map(LessonItem::Sentence).collect(),
        }
    }
}

// ============= Python Bindings =============

/// Validate a provider payload and return it normalised as JSON
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "parse_lesson")]
pub fn py_parse_lesson(payload: &str) -> PyResult<String> {
    let lesson = DailyLesson::from_json(payload)?;
    serde_json::to_string(&lesson)
        .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))
}
