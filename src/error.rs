//! Error types shared across the lesson core

use thiserror::Error;

/// Errors raised by the lesson core and its collaborators
#[derive(Error, Debug)]
pub enum LingoError {
    /// Content provider rejected the request or returned unusable data
    #[error("Lesson unavailable: {0}")]
    LessonFetchFailed(String),

    /// Quiz generation or step lookup without a usable lesson
    #[error("Invalid lesson state: {0}")]
    InvalidLessonState(String),

    #[error("Speech playback failed: {0}")]
    Speech(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Config error: {0}")]
    Config(String),

    /// Timer or speech task requested outside a tokio runtime
    #[error("No async runtime: {0}")]
    Runtime(String),
}

pub type LingoResult<T> = Result<T, LingoError>;

#[cfg(feature = "python")]
impl From<LingoError> for pyo3::PyErr {
    fn from(e: LingoError) -> Self {
        pyo3::exceptions::PyRuntimeError::new_err(e.to_string())
    }
}
