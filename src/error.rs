use thiserror::Error;

use crate::engine::Phase;

/// Violations of the quiz model invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("question '{text}' has {count} options, at least 2 are required")]
    TooFewOptions { text: String, count: usize },

    #[error("question '{text}' marks option {correct} as correct but has {count} options")]
    CorrectOptionOutOfRange {
        text: String,
        correct: usize,
        count: usize,
    },

    #[error("time limit must be at least one second")]
    ZeroTimeLimit,

    #[error("unknown difficulty '{0}'")]
    UnknownDifficulty(String),
}

/// Errors raised by the quiz-play state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The current index does not point at a question.
    #[error("no question at index {0}")]
    MissingQuestion(usize),

    #[error("option {option} is out of range for a question with {count} options")]
    OptionOutOfRange { option: usize, count: usize },

    #[error("input is not accepted while {0:?}")]
    NotPresenting(Phase),

    #[error("cannot advance while {0:?}")]
    NotSubmitted(Phase),
}

/// Failures of the quiz supply.
#[derive(Debug, Error)]
pub enum SupplyError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("stored quiz is invalid: {0}")]
    Invalid(#[from] QuizError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} should be set")]
    Missing(&'static str),

    #[error("{name} can't be parsed: {reason}")]
    Invalid { name: &'static str, reason: String },
}
