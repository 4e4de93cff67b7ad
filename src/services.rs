//! External collaborators: lesson content and text-to-speech

use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;

use crate::error::LingoResult;
use crate::lesson::DailyLesson;

/// Supplies a fresh lesson on demand.
///
/// Any failure should be reported as `LingoError::LessonFetchFailed`.
pub trait ContentProvider: Send + Sync {
    fn fetch_daily_lesson(&self) -> BoxFuture<'_, LingoResult<DailyLesson>>;
}

/// Best-effort speech output
pub trait SpeechService: Send + Sync {
    fn speak(&self, text: &str) -> BoxFuture<'static, LingoResult<()>>;
}

/// Speech service for hosts without audio output
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeech;

impl SpeechService for SilentSpeech {
    fn speak(&self, text: &str) -> BoxFuture<'static, LingoResult<()>> {
        debug!("Speech disabled, skipping '{}'", text);
        async { Ok(()) }.boxed()
    }
}

/// Provider that always hands out the same lesson
#[derive(Debug, Clone)]
pub struct StaticLessonProvider {
    lesson: DailyLesson,
}

impl StaticLessonProvider {
    pub fn new(lesson: DailyLesson) -> Self {
        Self { lesson }
    }
}

impl ContentProvider for StaticLessonProvider {
    fn fetch_daily_lesson(&self) -> BoxFuture<'_, LingoResult<DailyLesson>> {
        let lesson = self.lesson.clone();
        async move {
            lesson.validate()?;
            Ok(lesson)
        }
        .boxed()
    }
}
