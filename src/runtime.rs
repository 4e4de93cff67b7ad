//! Async driver around [`SessionMachine`]
//!
//! Owns the suspension points of a session: the lesson fetch, the timed
//! auto-advance after each quiz answer, and fire-and-forget speech.

use log::{debug, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{LingoError, LingoResult};
use crate::services::{ContentProvider, SpeechService};
use crate::session::{Feedback, Phase, SessionMachine};

/// Delay between showing feedback and moving to the next question
pub const DEFAULT_ADVANCE_DELAY: Duration = Duration::from_millis(1500);

/// Copy of everything a front-end needs to render the current screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub theme: Option<String>,
    pub step_index: usize,
    pub step_label: Option<String>,
    pub prompt: Option<String>,
    pub options: Vec<String>,
    pub feedback: Option<Feedback>,
    pub score: u32,
    pub streak: u32,
    pub progress_percent: u32,
    pub mastery_percent: u32,
    pub notice: Option<String>,
}

impl SessionSnapshot {
    fn of(machine: &SessionMachine) -> Self {
        Self {
            phase: machine.phase(),
            theme: machine.lesson().map(|l| l.theme.clone()),
            step_index: machine.step_index(),
            step_label: machine.step_label(),
            prompt: machine.current_item().map(|item| item.source_text().to_string()),
            options: machine.quiz_options().to_vec(),
            feedback: machine.feedback().cloned(),
            score: machine.score(),
            streak: machine.streak(),
            progress_percent: machine.progress_percent(),
            mastery_percent: machine.mastery_percent(),
            notice: machine.notice().map(str::to_string),
        }
    }
}

pub struct LessonSession {
    machine: Arc<Mutex<SessionMachine>>,
    provider: Arc<dyn ContentProvider>,
    speech: Arc<dyn SpeechService>,
    advance_delay: Duration,
    pending_advance: Mutex<Option<JoinHandle<()>>>,
}

impl LessonSession {
    pub fn new(
        machine: SessionMachine,
        provider: Arc<dyn ContentProvider>,
        speech: Arc<dyn SpeechService>,
        advance_delay: Duration,
    ) -> Self {
        Self {
            machine: Arc::new(Mutex::new(machine)),
            provider,
            speech,
            advance_delay,
            pending_advance: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> LingoResult<SessionSnapshot> {
        Ok(SessionSnapshot::of(&*self.machine()?))
    }

    /// Run `f` against the machine under its lock
    pub fn with_machine<R>(&self, f: impl FnOnce(&mut SessionMachine) -> R) -> LingoResult<R> {
        Ok(f(&mut *self.machine()?))
    }

    /// Home -> Loading -> Learning, or back to Home if the fetch fails.
    ///
    /// The fetch error is returned after the session has recorded it.
    pub async fn start(&self) -> LingoResult<()> {
        let ticket = match self.machine()?.start() {
            Some(ticket) => ticket,
            None => return Ok(()),
        };

        let result = self.provider.fetch_daily_lesson().await;

        let mut machine = self.machine()?;
        match result {
            Ok(lesson) => {
                machine.lesson_received(ticket, lesson);
                Ok(())
            }
            Err(e) => {
                machine.fetch_failed(ticket, &e);
                Err(e)
            }
        }
    }

    pub fn advance(&self) -> LingoResult<bool> {
        self.machine()?.advance()
    }

    /// Grade an answer and schedule the auto-advance.
    ///
    /// Returns false if the answer was ignored. Outside a tokio runtime the
    /// answer is not graded and [`LingoError::Runtime`] is returned.
    pub fn submit(&self, answer: &str) -> LingoResult<bool> {
        let runtime = current_runtime("auto-advance")?;
        let ticket = match self.machine()?.submit(answer) {
            Some(ticket) => ticket,
            None => return Ok(false),
        };

        let machine = Arc::clone(&self.machine);
        let delay = self.advance_delay;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Ok(mut machine) = machine.lock() else {
                warn!("Session lock poisoned, auto-advance dropped");
                return;
            };
            if let Err(e) = machine.auto_advance(ticket) {
                warn!("Auto-advance failed: {}", e);
            }
        });

        if let Some(previous) = self.pending()?.replace(handle) {
            previous.abort();
        }
        Ok(true)
    }

    /// Wait for a scheduled auto-advance to run, if one is pending
    pub async fn wait_for_advance(&self) -> LingoResult<()> {
        let handle = self.pending()?.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    return Err(LingoError::InvalidLessonState(format!(
                        "Auto-advance task failed: {}",
                        e
                    )));
                }
            }
        }
        Ok(())
    }

    /// Back to Home, cancelling any pending auto-advance
    pub fn go_home(&self) -> LingoResult<()> {
        if let Some(handle) = self.pending()?.take() {
            debug!("Cancelling pending auto-advance");
            handle.abort();
        }
        self.machine()?.go_home();
        Ok(())
    }

    /// Speak the current card's English text without blocking the session
    pub fn speak_current(&self) -> LingoResult<bool> {
        let text = {
            let machine = self.machine()?;
            match machine.current_item() {
                Some(item) => item.speech_text().to_string(),
                None => return Ok(false),
            }
        };
        self.speak(&text)?;
        Ok(true)
    }

    /// Fire-and-forget speech; failures are only logged
    pub fn speak(&self, text: &str) -> LingoResult<JoinHandle<()>> {
        let runtime = current_runtime("speech")?;
        let request = self.speech.speak(text);
        Ok(runtime.spawn(async move {
            if let Err(e) = request.await {
                warn!("Ignoring speech failure: {}", e);
            }
        }))
    }

    fn machine(&self) -> LingoResult<MutexGuard<'_, SessionMachine>> {
        self.machine
            .lock()
            .map_err(|_| LingoError::Lock("session".to_string()))
    }

    fn pending(&self) -> LingoResult<MutexGuard<'_, Option<JoinHandle<()>>>> {
        self.pending_advance
            .lock()
            .map_err(|_| LingoError::Lock("auto-advance handle".to_string()))
    }
}

fn current_runtime(task: &str) -> LingoResult<Handle> {
    Handle::try_current().map_err(|e| LingoError::Runtime(format!("{} needs tokio: {}", task, e)))
}
