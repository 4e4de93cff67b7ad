//! Lesson session state machine
//!
//! Drives one learner through Home -> Loading -> Learning -> Quiz -> Result.
//! Every event is a plain method call; the asynchronous parts (lesson fetch,
//! auto-advance timer) live in `runtime` and talk back through [`Ticket`]s,
//! so a response that arrives after the learner went home is ignored.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{LingoError, LingoResult};
use crate::lesson::{DailyLesson, LessonItem, TOTAL_STEPS};
use crate::questions::{generate_question, QuizQuestion};
use crate::streak::{read_streak, reconcile_streak, Clock, StreakStore};

/// Notice shown after a failed lesson fetch
pub const FETCH_FAILED_NOTICE: &str = "The tide is too high! Please try again later.";

/// Top-level mode of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Home,
    Loading,
    Learning,
    Quiz,
    Result,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Home => "home",
            Phase::Loading => "loading",
            Phase::Learning => "learning",
            Phase::Quiz => "quiz",
            Phase::Result => "result",
        };
        f.write_str(name)
    }
}

/// Result of the latest answer, shown until the quiz moves on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub is_correct: bool,
    pub selected_answer: String,
    pub correct_answer: String,
}

/// Handle for a pending asynchronous continuation (fetch or auto-advance).
///
/// Only the most recently issued ticket is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

pub struct SessionMachine {
    phase: Phase,
    lesson: Option<DailyLesson>,
    step_index: usize,
    score: u32,
    question: Option<QuizQuestion>,
    feedback: Option<Feedback>,
    streak: u32,
    notice: Option<String>,
    pending: Option<Ticket>,
    next_ticket: u64,
    store: Arc<dyn StreakStore>,
    clock: Arc<dyn Clock>,
    rng: Box<dyn RngCore + Send>,
}

impl fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMachine")
            .field("phase", &self.phase)
            .field("step_index", &self.step_index)
            .field("score", &self.score)
            .field("streak", &self.streak)
            .field("feedback", &self.feedback)
            .finish_non_exhaustive()
    }
}

impl SessionMachine {
    /// New session in the Home phase with an OS-seeded random source
    pub fn new(store: Arc<dyn StreakStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(store, clock, Box::new(StdRng::from_entropy()))
    }

    pub fn with_rng(
        store: Arc<dyn StreakStore>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let mut machine = Self {
            phase: Phase::Home,
            lesson: None,
            step_index: 0,
            score: 0,
            question: None,
            feedback: None,
            streak: 0,
            notice: None,
            pending: None,
            next_ticket: 0,
            store,
            clock,
            rng,
        };
        machine.refresh_streak();
        machine
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn lesson(&self) -> Option<&DailyLesson> {
        self.lesson.as_ref()
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    pub fn question(&self) -> Option<&QuizQuestion> {
        self.question.as_ref()
    }

    /// Shuffled options of the current question; empty outside the quiz
    pub fn quiz_options(&self) -> &[String] {
        match (&self.phase, &self.question) {
            (Phase::Quiz, Some(q)) => q.options.as_slice(),
            _ => &[],
        }
    }

    /// Pending user-visible notice, if any
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Item addressed by the step cursor while learning or quizzing
    pub fn current_item(&self) -> Option<LessonItem<'_>> {
        match self.phase {
            Phase::Learning | Phase::Quiz => {
                self.lesson.as_ref().and_then(|l| l.item(self.step_index).ok())
            }
            _ => None,
        }
    }

    /// Overall progress bar value
    pub fn progress_percent(&self) -> u32 {
        match self.phase {
            Phase::Learning => self.step_index as u32 * 10,
            Phase::Quiz | Phase::Result => 100,
            Phase::Home | Phase::Loading => 0,
        }
    }

    pub fn mastery_percent(&self) -> u32 {
        self.score * 10
    }

    /// "3 / 10" style position label
    pub fn step_label(&self) -> Option<String> {
        match self.phase {
            Phase::Learning | Phase::Quiz => {
                Some(format!("{} / {}", self.step_index + 1, TOTAL_STEPS))
            }
            _ => None,
        }
    }

    /// Home -> Loading. Returns the ticket the fetch result must carry.
    pub fn start(&mut self) -> Option<Ticket> {
        if self.phase != Phase::Home {
            debug!("Ignoring start while in {}", self.phase);
            return None;
        }
        self.notice = None;
        self.enter(Phase::Loading);
        Some(self.issue_ticket())
    }

    /// Loading -> Learning with the fetched lesson.
    ///
    /// Returns false when the ticket is stale. A lesson that fails
    /// validation is handled like a failed fetch.
    pub fn lesson_received(&mut self, ticket: Ticket, lesson: DailyLesson) -> bool {
        if !self.accepts(ticket, Phase::Loading) {
            debug!("Dropping lesson '{}' for a stale request", lesson.theme);
            return false;
        }
        if let Err(e) = lesson.validate() {
            self.fetch_failed(ticket, &e);
            return false;
        }

        info!("Lesson '{}' loaded", lesson.theme);
        self.pending = None;
        self.lesson = Some(lesson);
        self.step_index = 0;
        self.enter(Phase::Learning);
        true
    }

    /// Loading -> Home with a notice for the learner
    pub fn fetch_failed(&mut self, ticket: Ticket, error: &LingoError) {
        if !self.accepts(ticket, Phase::Loading) {
            debug!("Dropping stale fetch failure: {}", error);
            return;
        }
        warn!("Lesson fetch failed: {}", error);
        self.reset();
        self.notice = Some(FETCH_FAILED_NOTICE.to_string());
        self.enter(Phase::Home);
    }

    /// Next discovery card; after the tenth card the quiz begins
    pub fn advance(&mut self) -> LingoResult<bool> {
        if self.phase != Phase::Learning {
            debug!("Ignoring advance while in {}", self.phase);
            return Ok(false);
        }

        if self.step_index + 1 < TOTAL_STEPS {
            self.step_index += 1;
            return Ok(true);
        }

        let question = generate_question(self.lesson.as_ref(), 0, &mut *self.rng)?;
        self.step_index = 0;
        self.question = Some(question);
        self.feedback = None;
        self.enter(Phase::Quiz);
        Ok(true)
    }

    /// Grade an answer for the current question.
    ///
    /// Returns the ticket for the auto-advance that must follow, or `None`
    /// when the answer was ignored (no question, or feedback already showing).
    pub fn submit(&mut self, answer: &str) -> Option<Ticket> {
        if self.phase != Phase::Quiz || self.lesson.is_none() || self.feedback.is_some() {
            return None;
        }
        let question = self.question.as_ref()?;

        let is_correct = question.is_correct(answer);
        if is_correct {
            self.score += 1;
        }
        debug!(
            "Question {} answered {}",
            self.step_index + 1,
            if is_correct { "correctly" } else { "incorrectly" }
        );
        self.feedback = Some(Feedback {
            is_correct,
            selected_answer: answer.to_string(),
            correct_answer: question.correct_answer.clone(),
        });
        Some(self.issue_ticket())
    }

    /// Timed continuation after feedback: next question, or the result screen.
    ///
    /// Returns `Ok(false)` for a stale ticket. If the streak cannot be
    /// persisted the session still reaches Result and the error is returned.
    pub fn auto_advance(&mut self, ticket: Ticket) -> LingoResult<bool> {
        if !self.accepts(ticket, Phase::Quiz) || self.feedback.is_none() {
            debug!("Dropping stale auto-advance");
            return Ok(false);
        }
        self.pending = None;

        if self.step_index + 1 < TOTAL_STEPS {
            let next = self.step_index + 1;
            let question = generate_question(self.lesson.as_ref(), next, &mut *self.rng)?;
            self.step_index = next;
            self.question = Some(question);
            self.feedback = None;
            return Ok(true);
        }

        self.question = None;
        self.feedback = None;
        let today = self.clock.today();
        let outcome = reconcile_streak(self.store.as_ref(), today);
        self.enter(Phase::Result);
        match outcome {
            Ok(update) => {
                self.streak = update.streak;
                info!("Lesson finished with score {}/{}", self.score, TOTAL_STEPS);
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Back to Home from anywhere, voiding any pending continuation
    pub fn go_home(&mut self) {
        self.reset();
        self.enter(Phase::Home);
    }

    fn reset(&mut self) {
        self.lesson = None;
        self.step_index = 0;
        self.score = 0;
        self.question = None;
        self.feedback = None;
        self.pending = None;
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.pending = Some(ticket);
        ticket
    }

    fn accepts(&self, ticket: Ticket, phase: Phase) -> bool {
        self.phase == phase && self.pending == Some(ticket)
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Phase {} -> {}", self.phase, phase);
        self.phase = phase;
        self.refresh_streak();
    }

    fn refresh_streak(&mut self) {
        match read_streak(self.store.as_ref()) {
            Ok(streak) => self.streak = streak,
            Err(e) => warn!("Could not read streak: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::tests::sample_lesson;
    use crate::streak::{MemoryStreakStore, LAST_COMPLETION_DATE_KEY, STREAK_COUNT_KEY};
    use chrono::NaiveDate;

    struct FixedClock(NaiveDate);

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            self.0
        }
    }

    fn machine() -> (SessionMachine, Arc<MemoryStreakStore>) {
        let store = Arc::new(MemoryStreakStore::new());
        let clock = Arc::new(FixedClock(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
        let rng = Box::new(StdRng::seed_from_u64(11));
        let m = SessionMachine::with_rng(store.clone(), clock, rng);
        (m, store)
    }

    fn into_quiz(m: &mut SessionMachine) {
        let ticket = m.start().unwrap();
        assert!(m.lesson_received(ticket, sample_lesson()));
        for _ in 0..10 {
            assert!(m.advance().unwrap());
        }
        assert_eq!(m.phase(), Phase::Quiz);
    }

    fn answer_current(m: &mut SessionMachine, correct: bool) -> Ticket {
        let q = m.question().unwrap().clone();
        let answer = if correct {
            q.correct_answer.clone()
        } else {
            q.options.iter().find(|o| **o != q.correct_answer).unwrap().clone()
        };
        m.submit(&answer).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let (m, _) = machine();
        assert_eq!(m.phase(), Phase::Home);
        assert_eq!(m.streak(), 0);
        assert!(m.quiz_options().is_empty());
        assert_eq!(m.progress_percent(), 0);
    }

    #[test]
    fn test_learning_walks_ten_steps() {
        let (mut m, _) = machine();
        let ticket = m.start().unwrap();
        assert_eq!(m.phase(), Phase::Loading);
        assert!(m.start().is_none());

        m.lesson_received(ticket, sample_lesson());
        assert_eq!(m.phase(), Phase::Learning);
        assert_eq!(m.step_label().as_deref(), Some("1 / 10"));

        for expected in 1..10 {
            m.advance().unwrap();
            assert_eq!(m.step_index(), expected);
            assert_eq!(m.phase(), Phase::Learning);
        }
        assert_eq!(m.progress_percent(), 90);
        assert!(matches!(m.current_item(), Some(LessonItem::Sentence(_))));

        m.advance().unwrap();
        assert_eq!(m.phase(), Phase::Quiz);
        assert_eq!(m.step_index(), 0);
        assert_eq!(m.quiz_options().len(), 4);
        assert_eq!(m.question().unwrap().prompt, "boarding pass");
    }

    #[test]
    fn test_fetch_failure_returns_home_with_notice() {
        let (mut m, _) = machine();
        let ticket = m.start().unwrap();
        m.fetch_failed(ticket, &LingoError::LessonFetchFailed("offline".to_string()));

        assert_eq!(m.phase(), Phase::Home);
        assert!(m.lesson().is_none());
        assert_eq!(m.take_notice().as_deref(), Some(FETCH_FAILED_NOTICE));
        assert!(m.notice().is_none());
    }

    #[test]
    fn test_invalid_lesson_is_treated_as_fetch_failure() {
        let (mut m, _) = machine();
        let ticket = m.start().unwrap();
        let mut lesson = sample_lesson();
        lesson.words.pop();

        assert!(!m.lesson_received(ticket, lesson));
        assert_eq!(m.phase(), Phase::Home);
        assert!(m.notice().is_some());
    }

    #[test]
    fn test_stale_lesson_after_go_home_is_dropped() {
        let (mut m, _) = machine();
        let first = m.start().unwrap();
        m.go_home();
        let second = m.start().unwrap();

        assert!(!m.lesson_received(first, sample_lesson()));
        assert_eq!(m.phase(), Phase::Loading);
        assert!(m.lesson_received(second, sample_lesson()));
    }

    #[test]
    fn test_double_submit_is_ignored() {
        let (mut m, _) = machine();
        into_quiz(&mut m);

        let correct = m.question().unwrap().correct_answer.clone();
        let wrong = m.quiz_options().iter().find(|o| **o != correct).unwrap().clone();

        assert!(m.submit(&correct).is_some());
        let feedback = m.feedback().cloned();
        assert!(m.submit(&wrong).is_none());

        assert_eq!(m.score(), 1);
        assert_eq!(m.feedback().cloned(), feedback);
    }

    #[test]
    fn test_wrong_answer_feedback() {
        let (mut m, _) = machine();
        into_quiz(&mut m);

        let ticket = answer_current(&mut m, false);
        let feedback = m.feedback().unwrap();
        assert!(!feedback.is_correct);
        assert_ne!(feedback.selected_answer, feedback.correct_answer);
        assert_eq!(m.score(), 0);

        assert!(m.auto_advance(ticket).unwrap());
        assert!(m.feedback().is_none());
        assert_eq!(m.step_index(), 1);
    }

    #[test]
    fn test_stale_advance_after_go_home_is_void() {
        let (mut m, _) = machine();
        into_quiz(&mut m);
        let ticket = answer_current(&mut m, true);

        m.go_home();
        assert!(!m.auto_advance(ticket).unwrap());
        assert_eq!(m.phase(), Phase::Home);
        assert_eq!(m.score(), 0);
        assert!(m.feedback().is_none());
    }

    #[test]
    fn test_advance_ticket_is_single_use() {
        let (mut m, _) = machine();
        into_quiz(&mut m);
        let ticket = answer_current(&mut m, true);

        assert!(m.auto_advance(ticket).unwrap());
        assert!(!m.auto_advance(ticket).unwrap());
        assert_eq!(m.step_index(), 1);
    }

    #[test]
    fn test_full_quiz_reaches_result_and_streak() {
        let (mut m, store) = machine();
        into_quiz(&mut m);

        for step in 0..10 {
            let ticket = answer_current(&mut m, step != 0);
            m.auto_advance(ticket).unwrap();
        }

        assert_eq!(m.phase(), Phase::Result);
        assert_eq!(m.score(), 9);
        assert_eq!(m.mastery_percent(), 90);
        assert_eq!(m.streak(), 1);
        assert!(m.quiz_options().is_empty());
        assert_eq!(store.get(LAST_COMPLETION_DATE_KEY).unwrap().as_deref(), Some("2025-06-01"));
    }

    #[test]
    fn test_go_home_resets_session() {
        let (mut m, _) = machine();
        into_quiz(&mut m);
        answer_current(&mut m, true);

        m.go_home();
        assert_eq!(m.phase(), Phase::Home);
        assert!(m.lesson().is_none());
        assert_eq!(m.step_index(), 0);
        assert_eq!(m.score(), 0);
        assert!(m.question().is_none());
    }

    #[test]
    fn test_events_outside_their_phase_are_ignored() {
        let (mut m, _) = machine();
        assert!(!m.advance().unwrap());
        assert!(m.submit("탑승권").is_none());
        assert_eq!(m.phase(), Phase::Home);
    }

    #[test]
    fn test_streak_is_reread_on_every_phase_change() {
        let (mut m, store) = machine();
        assert_eq!(m.streak(), 0);

        // Another session finished lessons behind this machine's back.
        store.set(STREAK_COUNT_KEY, "7").unwrap();
        assert_eq!(m.streak(), 0);
        let ticket = m.start().unwrap();
        assert_eq!(m.phase(), Phase::Loading);
        assert_eq!(m.streak(), 7);

        store.set(STREAK_COUNT_KEY, "8").unwrap();
        assert!(m.lesson_received(ticket, sample_lesson()));
        assert_eq!(m.streak(), 8);

        store.set(STREAK_COUNT_KEY, "12").unwrap();
        m.go_home();
        assert_eq!(m.phase(), Phase::Home);
        assert_eq!(m.streak(), 12);
    }

    #[test]
    fn test_unreadable_streak_counts_as_zero_on_refresh() {
        let (mut m, store) = machine();
        store.set(STREAK_COUNT_KEY, "3").unwrap();
        m.start().unwrap();
        assert_eq!(m.streak(), 3);

        store.set(STREAK_COUNT_KEY, "many").unwrap();
        m.go_home();
        assert_eq!(m.streak(), 0);
    }
}
