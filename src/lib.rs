//! Island Lingo Core - daily travel English lessons, quiz and streak tracking
//!
//! Provides the lesson session state machine, multiple-choice question
//! generation, streak persistence in SQLite, and lesson packs loaded from
//! JSON, CSV or Excel files. Build with the `python` feature for bindings.

pub mod config;
pub mod error;
pub mod lesson;
pub mod lesson_file;
pub mod questions;
pub mod runtime;
pub mod services;
pub mod session;
pub mod streak;

pub use config::Config;
pub use error::{LingoError, LingoResult};
pub use lesson::{DailyLesson, ItemKind, LessonItem, SentenceItem, WordItem, TOTAL_STEPS};
pub use lesson_file::{load_lesson_file, FileLessonProvider};
pub use questions::{generate_question, QuizQuestion};
pub use runtime::{LessonSession, SessionSnapshot, DEFAULT_ADVANCE_DELAY};
pub use services::{ContentProvider, SilentSpeech, SpeechService, StaticLessonProvider};
pub use session::{Feedback, Phase, SessionMachine, Ticket};
pub use streak::{
    read_streak, reconcile_streak, Clock, LocalClock, MemoryStreakStore, SqliteStreakStore,
    StreakStore, StreakUpdate,
};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Island Lingo core Python module
#[cfg(feature = "python")]
#[pymodule]
fn island_lingo_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Lesson payloads and packs
    m.add_function(wrap_pyfunction!(lesson::py_parse_lesson, m)?)?;
    m.add_function(wrap_pyfunction!(lesson_file::py_load_lesson_file, m)?)?;

    // Question generation
    m.add_function(wrap_pyfunction!(questions::py_generate_question, m)?)?;

    // Streak tracking
    m.add_function(wrap_pyfunction!(streak::py_get_streak, m)?)?;
    m.add_function(wrap_pyfunction!(streak::py_record_completion, m)?)?;

    m.add_class::<questions::PyQuizQuestion>()?;

    Ok(())
}
