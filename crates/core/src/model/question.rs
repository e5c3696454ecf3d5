use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, TopicId};

//
// ─── ANSWER MATCHING ───────────────────────────────────────────────────────────
//

/// Canonical form used when comparing a selected option with the correct answer.
///
/// Collapses runs of whitespace, trims, and lowercases ASCII letters so authoring
/// drift (`"Database  Indexing "` vs `"database indexing"`) still matches.
#[must_use]
pub fn normalize_answer(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// Returns true when two answer strings are equal after normalization.
#[must_use]
pub fn answers_match(selected: &str, correct: &str) -> bool {
    normalize_answer(selected) == normalize_answer(correct)
}

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// A question row exactly as the backend hands it out.
///
/// The backend enforces no schema on these columns, so every field that the
/// quiz depends on is optional here and checked by [`Question::from_raw`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuestion {
    pub id: QuestionId,
    pub topic_id: TopicId,
    pub question: Option<String>,
    /// JSON text holding an array of option strings.
    pub options: Option<String>,
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
}

/// A question that is safe to present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    topic_id: TopicId,
    prompt: String,
    options: Vec<String>,
    correct_answer: String,
    explanation: Option<String>,
}

/// How a single option should be revealed once the answer has been submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionReveal {
    /// This option is the correct answer.
    Correct,
    /// The user picked this option and it is wrong.
    Incorrect,
    /// Neither picked nor correct.
    Neutral,
}

impl Question {
    /// Lenient read-time validation used when loading a quiz.
    ///
    /// Rejects rows without a prompt, without a correct answer, or whose options
    /// are not a non-empty JSON array of strings. A correct answer that matches
    /// none of the options is accepted; check [`Question::has_listed_answer`].
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` describing the first schema problem found.
    pub fn from_raw(raw: RawQuestion) -> Result<Self, QuestionError> {
        let prompt = raw.question.ok_or(QuestionError::MissingPrompt)?;
        let correct_answer = raw.correct_answer.ok_or(QuestionError::MissingCorrectAnswer)?;
        let options = parse_options(raw.options.as_deref().unwrap_or("[]"))?;

        Ok(Self {
            id: raw.id,
            topic_id: raw.topic_id,
            prompt,
            options,
            correct_answer,
            explanation: normalize_optional(raw.explanation),
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Whether `selected` is the correct answer.
    #[must_use]
    pub fn is_correct(&self, selected: &str) -> bool {
        answers_match(selected, &self.correct_answer)
    }

    /// Index of the option equal to the correct answer, if any.
    #[must_use]
    pub fn correct_index(&self) -> Option<usize> {
        self.options
            .iter()
            .position(|opt| answers_match(opt, &self.correct_answer))
    }

    /// False when the correct answer is not one of the options (an authoring bug).
    #[must_use]
    pub fn has_listed_answer(&self) -> bool {
        self.correct_index().is_some()
    }

    /// Correctness styling for every option, in option order.
    #[must_use]
    pub fn reveal(&self, selected: Option<&str>) -> Vec<OptionReveal> {
        self.options
            .iter()
            .map(|opt| {
                if answers_match(opt, &self.correct_answer) {
                    OptionReveal::Correct
                } else if selected.is_some_and(|sel| answers_match(sel, opt)) {
                    OptionReveal::Incorrect
                } else {
                    OptionReveal::Neutral
                }
            })
            .collect()
    }

    /// Serialize options back to the JSON text stored by the backend.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::MalformedOptions` if serialization fails.
    pub fn options_json(&self) -> Result<String, QuestionError> {
        serde_json::to_string(&self.options).map_err(|e| QuestionError::MalformedOptions(e.to_string()))
    }
}

//
// ─── AUTHORING ─────────────────────────────────────────────────────────────────
//

/// Input for creating a new question. Validation here is strict.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuestionDraft {
    pub topic_id: Option<TopicId>,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

impl QuestionDraft {
    /// Validate the draft for persistence.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the topic, prompt, or options are missing,
    /// if two options are the same answer once normalized, or if the correct
    /// answer does not match one of the options.
    pub fn validate(self) -> Result<ValidatedQuestion, QuestionError> {
        let topic_id = self.topic_id.ok_or(QuestionError::MissingTopic)?;

        let prompt = self.prompt.trim().to_owned();
        if prompt.is_empty() {
            return Err(QuestionError::MissingPrompt);
        }

        let options: Vec<String> = self
            .options
            .into_iter()
            .map(|opt| opt.trim().to_owned())
            .filter(|opt| !opt.is_empty())
            .collect();
        if options.is_empty() {
            return Err(QuestionError::NoOptions);
        }
        let mut seen = HashSet::with_capacity(options.len());
        if let Some(duplicate) = options.iter().find(|opt| !seen.insert(normalize_answer(opt))) {
            return Err(QuestionError::DuplicateOption {
                option: duplicate.clone(),
            });
        }

        let correct = self.correct_answer.trim().to_owned();
        if correct.is_empty() {
            return Err(QuestionError::MissingCorrectAnswer);
        }
        let Some(listed) = options.iter().find(|opt| answers_match(opt, &correct)) else {
            return Err(QuestionError::CorrectAnswerNotInOptions { correct });
        };
        let correct_answer = listed.clone();

        Ok(ValidatedQuestion {
            topic_id,
            prompt,
            options,
            correct_answer,
            explanation: normalize_optional(self.explanation),
        })
    }
}

/// A question that passed authoring validation but has no id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub topic_id: TopicId,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            topic_id: self.topic_id,
            prompt: self.prompt,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
        }
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question has no topic")]
    MissingTopic,

    #[error("question text is missing")]
    MissingPrompt,

    #[error("correct answer is missing")]
    MissingCorrectAnswer,

    #[error("options are not a JSON array of strings: {0}")]
    MalformedOptions(String),

    #[error("question has no options")]
    NoOptions,

    #[error("correct answer {correct:?} is not one of the options")]
    CorrectAnswerNotInOptions { correct: String },

    #[error("option {option:?} is listed more than once")]
    DuplicateOption { option: String },
}

fn parse_options(text: &str) -> Result<Vec<String>, QuestionError> {
    let options: Vec<String> =
        serde_json::from_str(text).map_err(|e| QuestionError::MalformedOptions(e.to_string()))?;
    if options.is_empty() {
        return Err(QuestionError::NoOptions);
    }
    Ok(options)
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
