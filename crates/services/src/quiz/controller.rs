//! Per-quiz state machine.
//!
//! `Loading -> Presenting(0) -> ExplanationShown(0) -> Presenting(1) -> ...
//! -> Submitting -> Done`, with `Error` reachable from `Loading` and `Submitting`.
//! The controller holds no I/O; `QuizLoopService` drives it and performs the
//! counter and persistence side effects.

use quiz_core::model::{OptionReveal, Question, QuestionId, TopicId, answers_match};
use rand::seq::SliceRandom;

use super::results::{ResultsState, Route};
use crate::error::QuizError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizPhase {
    Loading,
    Presenting(usize),
    ExplanationShown(usize),
    Submitting,
    Done,
    Error {
        message: String,
        redirect: Option<Route>,
    },
}

impl QuizPhase {
    fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Presenting(_) => "presenting",
            Self::ExplanationShown(_) => "showing the explanation",
            Self::Submitting => "submitting",
            Self::Done => "done",
            Self::Error { .. } => "in error",
        }
    }
}

/// What the user sees after submitting an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub question_id: QuestionId,
    pub selected: String,
    pub correct: bool,
    pub correct_answer: String,
    pub reveal: Vec<OptionReveal>,
    pub explanation: Option<String>,
}

/// Snapshot of where the user is in the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizProgress {
    /// One-based position of the current question.
    pub position: usize,
    pub total: usize,
    pub score: u32,
}

pub struct QuizController {
    topic_id: TopicId,
    phase: QuizPhase,
    questions: Vec<Question>,
    selected: Option<String>,
    score: u32,
    last_outcome: Option<AnswerOutcome>,
}

impl QuizController {
    #[must_use]
    pub fn new(topic_id: TopicId) -> Self {
        Self {
            topic_id,
            phase: QuizPhase::Loading,
            questions: Vec::new(),
            selected: None,
            score: 0,
            last_outcome: None,
        }
    }

    #[must_use]
    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    #[must_use]
    pub fn phase(&self) -> &QuizPhase {
        &self.phase
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub fn last_outcome(&self) -> Option<&AnswerOutcome> {
        self.last_outcome.as_ref()
    }

    /// The question on screen while presenting or explaining.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            QuizPhase::Presenting(i) | QuizPhase::ExplanationShown(i) => self.questions.get(i),
            _ => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Option<QuizProgress> {
        match self.phase {
            QuizPhase::Presenting(i) | QuizPhase::ExplanationShown(i) => Some(QuizProgress {
                position: i + 1,
                total: self.total(),
                score: self.score,
            }),
            _ => None,
        }
    }

    /// True once the explanation of the final question is showing.
    #[must_use]
    pub fn is_last(&self) -> bool {
        matches!(self.phase, QuizPhase::ExplanationShown(i) if i + 1 == self.total())
    }

    /// Where the host should navigate after an error, if anywhere.
    #[must_use]
    pub fn redirect(&self) -> Option<Route> {
        match &self.phase {
            QuizPhase::Error { redirect, .. } => *redirect,
            _ => None,
        }
    }

    /// Navigation state for the results route, once done.
    #[must_use]
    pub fn results_state(&self) -> Option<ResultsState> {
        (self.phase == QuizPhase::Done).then(|| self.navigation_state())
    }

    fn navigation_state(&self) -> ResultsState {
        ResultsState {
            score: self.score,
            total: u32::try_from(self.total()).unwrap_or(u32::MAX),
            topic_id: self.topic_id.clone(),
        }
    }

    fn invalid(&self, action: &'static str) -> QuizError {
        if self.phase == QuizPhase::Submitting {
            QuizError::Busy
        } else {
            QuizError::InvalidTransition {
                action,
                phase: self.phase.name(),
            }
        }
    }

    /// `Loading -> Presenting(0)`. An empty list moves to `Error` instead.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidTransition` unless loading.
    pub fn loaded(&mut self, mut questions: Vec<Question>, shuffle: bool) -> Result<(), QuizError> {
        if self.phase != QuizPhase::Loading {
            return Err(self.invalid("load questions"));
        }
        if questions.is_empty() {
            self.load_failed("No questions available for this topic.");
            return Ok(());
        }
        if shuffle {
            questions.shuffle(&mut rand::rng());
        }
        self.questions = questions;
        self.phase = QuizPhase::Presenting(0);
        Ok(())
    }

    /// `Loading -> Error`, sending the user back to the topic list.
    pub fn load_failed(&mut self, message: impl Into<String>) {
        if self.phase == QuizPhase::Loading {
            self.phase = QuizPhase::Error {
                message: message.into(),
                redirect: Some(Route::Topics),
            };
        }
    }

    /// Pick an option. Ignored (returns `false`) while the explanation is shown.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::UnknownOption` if `option` is not listed, or
    /// `QuizError::Busy`/`InvalidTransition` outside of presenting.
    pub fn select(&mut self, option: &str) -> Result<bool, QuizError> {
        match self.phase {
            QuizPhase::ExplanationShown(_) => Ok(false),
            QuizPhase::Presenting(i) => {
                let question = &self.questions[i];
                let listed = question
                    .options()
                    .iter()
                    .find(|o| answers_match(o, option))
                    .cloned()
                    .ok_or_else(|| QuizError::UnknownOption(option.to_owned()))?;
                self.selected = Some(listed);
                Ok(true)
            }
            _ => Err(self.invalid("select an option")),
        }
    }

    /// Pick an option by zero-based position.
    ///
    /// # Errors
    ///
    /// See [`Self::select`].
    pub fn select_index(&mut self, index: usize) -> Result<bool, QuizError> {
        let option = self
            .current_question()
            .and_then(|q| q.options().get(index))
            .cloned()
            .ok_or_else(|| QuizError::UnknownOption(format!("#{}", index + 1)))?;
        self.select(&option)
    }

    /// Pick from typed input: option text first, then a one-based position.
    ///
    /// Options whose text is a number, such as `"443"`, match by text.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::UnknownOption` if the input is neither a listed
    /// option nor a position in `1..=options.len()`; otherwise see
    /// [`Self::select`].
    pub fn select_input(&mut self, input: &str) -> Result<bool, QuizError> {
        match self.select(input) {
            Err(QuizError::UnknownOption(_)) => match input.trim().parse::<usize>() {
                Ok(n) if n >= 1 => self.select_index(n - 1),
                _ => Err(QuizError::UnknownOption(input.to_owned())),
            },
            picked => picked,
        }
    }

    /// `Presenting(i) -> ExplanationShown(i)`: grade the selection.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoSelection` without a selection, or
    /// `QuizError::Busy`/`InvalidTransition` outside of presenting.
    pub fn submit(&mut self) -> Result<AnswerOutcome, QuizError> {
        let QuizPhase::Presenting(i) = self.phase else {
            return Err(self.invalid("submit an answer"));
        };
        let selected = self.selected.clone().ok_or(QuizError::NoSelection)?;
        let question = &self.questions[i];
        let correct = question.is_correct(&selected);
        if correct {
            self.score += 1;
        }
        let outcome = AnswerOutcome {
            question_id: question.id().clone(),
            reveal: question.reveal(Some(&selected)),
            selected,
            correct,
            correct_answer: question.correct_answer().to_owned(),
            explanation: question.explanation().map(str::to_owned),
        };
        self.last_outcome = Some(outcome.clone());
        self.phase = QuizPhase::ExplanationShown(i);
        Ok(outcome)
    }

    /// `ExplanationShown(i) -> Presenting(i + 1)`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidTransition` on the last question (use
    /// [`Self::begin_submit`]) or outside of the explanation.
    pub fn next(&mut self) -> Result<(), QuizError> {
        match self.phase {
            QuizPhase::ExplanationShown(i) if i + 1 < self.total() => {
                self.phase = QuizPhase::Presenting(i + 1);
                self.selected = None;
                self.last_outcome = None;
                Ok(())
            }
            _ => Err(self.invalid("move to the next question")),
        }
    }

    /// `ExplanationShown(last) -> Submitting`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Busy` if already submitting or
    /// `QuizError::InvalidTransition` before the last explanation.
    pub fn begin_submit(&mut self) -> Result<ResultsState, QuizError> {
        if !self.is_last() {
            return Err(self.invalid("finish the quiz"));
        }
        self.phase = QuizPhase::Submitting;
        Ok(self.navigation_state())
    }

    /// `Submitting -> Done`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidTransition` unless submitting.
    pub fn complete(&mut self) -> Result<ResultsState, QuizError> {
        if self.phase != QuizPhase::Submitting {
            return Err(QuizError::InvalidTransition {
                action: "complete",
                phase: self.phase.name(),
            });
        }
        self.phase = QuizPhase::Done;
        Ok(self.navigation_state())
    }

    /// `Submitting -> Error`, for hosts that treat a failed save as fatal.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidTransition` unless submitting.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), QuizError> {
        if self.phase != QuizPhase::Submitting {
            return Err(QuizError::InvalidTransition {
                action: "fail",
                phase: self.phase.name(),
            });
        }
        self.phase = QuizPhase::Error {
            message: message.into(),
            redirect: None,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionDraft;

    fn question(id: &str, options: &[&str], correct: &str) -> Question {
        QuestionDraft {
            topic_id: Some(TopicId::new("network-security")),
            prompt: format!("Question {id}"),
            options: options.iter().map(|o| (*o).to_owned()).collect(),
            correct_answer: correct.to_owned(),
            explanation: Some("because".into()),
        }
        .validate()
        .unwrap()
        .assign_id(QuestionId::new(id))
    }

    fn loaded(questions: Vec<Question>) -> QuizController {
        let mut quiz = QuizController::new(TopicId::new("network-security"));
        quiz.loaded(questions, false).unwrap();
        quiz
    }

    #[test]
    fn typed_input_prefers_option_text_over_position() {
        let mut quiz = loaded(vec![question("q1", &["21", "80", "443", "8080"], "443")]);
        quiz.select_input("443").unwrap();
        assert_eq!(quiz.selected(), Some("443"));

        quiz.select_input("2").unwrap();
        assert_eq!(quiz.selected(), Some("80"));

        assert!(matches!(
            quiz.select_input("9"),
            Err(QuizError::UnknownOption(_))
        ));
        assert!(matches!(
            quiz.select_input("0"),
            Err(QuizError::UnknownOption(_))
        ));
        assert_eq!(quiz.selected(), Some("80"));
    }

    #[test]
    fn walks_through_every_state() {
        let mut quiz = loaded(vec![
            question("q1", &["a", "b"], "a"),
            question("q2", &["a", "b"], "b"),
        ]);
        assert_eq!(quiz.phase(), &QuizPhase::Presenting(0));

        quiz.select("a").unwrap();
        assert!(quiz.submit().unwrap().correct);
        assert_eq!(quiz.phase(), &QuizPhase::ExplanationShown(0));
        assert!(!quiz.is_last());

        quiz.next().unwrap();
        assert_eq!(quiz.selected(), None);
        quiz.select("a").unwrap();
        let outcome = quiz.submit().unwrap();
        assert!(!outcome.correct);
        assert_eq!(
            outcome.reveal,
            vec![OptionReveal::Incorrect, OptionReveal::Correct]
        );
        assert!(quiz.is_last());

        let pending = quiz.begin_submit().unwrap();
        assert_eq!(pending.score, 1);
        assert_eq!(quiz.phase(), &QuizPhase::Submitting);
        let done = quiz.complete().unwrap();
        assert_eq!(done, quiz.results_state().unwrap());
        assert_eq!(done.total, 2);
    }

    #[test]
    fn empty_list_is_an_error_with_redirect() {
        let mut quiz = QuizController::new(TopicId::new("empty"));
        quiz.loaded(Vec::new(), false).unwrap();
        assert!(matches!(quiz.phase(), QuizPhase::Error { .. }));
        assert_eq!(quiz.redirect(), Some(Route::Topics));
    }

    #[test]
    fn submit_requires_selection() {
        let mut quiz = loaded(vec![question("q1", &["a"], "a")]);
        assert_eq!(quiz.submit().unwrap_err(), QuizError::NoSelection);
    }

    #[test]
    fn selection_is_ignored_after_submit() {
        let mut quiz = loaded(vec![question("q1", &["a", "b"], "a")]);
        quiz.select("b").unwrap();
        quiz.submit().unwrap();
        assert!(!quiz.select("a").unwrap());
        assert_eq!(quiz.selected(), Some("b"));
        assert_eq!(quiz.score(), 0);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let mut quiz = loaded(vec![question("q1", &["a", "b"], "a")]);
        assert!(matches!(quiz.select("z"), Err(QuizError::UnknownOption(_))));
        assert!(matches!(quiz.select_index(5), Err(QuizError::UnknownOption(_))));
        assert!(quiz.select_index(1).unwrap());
        assert_eq!(quiz.selected(), Some("b"));
    }

    #[test]
    fn selection_matches_case_and_whitespace_insensitively() {
        let mut quiz = loaded(vec![question("q1", &["Port 443", "Port 80"], "Port 443")]);
        quiz.select("  port   443 ").unwrap();
        assert_eq!(quiz.selected(), Some("Port 443"));
        assert!(quiz.submit().unwrap().correct);
    }

    #[test]
    fn every_trigger_is_rejected_while_submitting() {
        let mut quiz = loaded(vec![question("q1", &["a"], "a")]);
        quiz.select("a").unwrap();
        quiz.submit().unwrap();
        quiz.begin_submit().unwrap();

        assert_eq!(quiz.select("a").unwrap_err(), QuizError::Busy);
        assert_eq!(quiz.submit().unwrap_err(), QuizError::Busy);
        assert_eq!(quiz.next().unwrap_err(), QuizError::Busy);
        assert_eq!(quiz.begin_submit().unwrap_err(), QuizError::Busy);
    }

    #[test]
    fn next_on_last_question_is_invalid() {
        let mut quiz = loaded(vec![question("q1", &["a"], "a")]);
        quiz.select("a").unwrap();
        quiz.submit().unwrap();
        assert!(matches!(
            quiz.next(),
            Err(QuizError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn finishing_early_is_invalid() {
        let mut quiz = loaded(vec![
            question("q1", &["a"], "a"),
            question("q2", &["a"], "a"),
        ]);
        quiz.select("a").unwrap();
        quiz.submit().unwrap();
        assert!(matches!(
            quiz.begin_submit(),
            Err(QuizError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn failed_save_can_be_fatal() {
        let mut quiz = loaded(vec![question("q1", &["a"], "a")]);
        quiz.select("a").unwrap();
        quiz.submit().unwrap();
        quiz.begin_submit().unwrap();
        quiz.fail("could not save").unwrap();
        assert!(matches!(quiz.phase(), QuizPhase::Error { redirect: None, .. }));
        assert_eq!(quiz.results_state(), None);
    }

    #[test]
    fn shuffle_keeps_every_question() {
        let questions: Vec<_> = (0..20)
            .map(|i| question(&format!("q{i}"), &["a"], "a"))
            .collect();
        let mut quiz = QuizController::new(TopicId::new("network-security"));
        quiz.loaded(questions, true).unwrap();
        assert_eq!(quiz.total(), 20);
    }
}
