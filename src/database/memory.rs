use std::collections::BTreeMap;

use tokio::sync::RwLock;

use super::{
    connection::{Connection, RetrieveQuiz},
    quiz::{Difficulty, Question, Quiz},
};
use crate::error::{QuizError, SupplyError};

/// Quizzes kept in process, keyed by title.
#[derive(Debug, Default)]
pub struct MemoryQuizzes {
    quizzes: RwLock<BTreeMap<String, Quiz>>,
}

impl MemoryQuizzes {
    pub fn with_demo() -> Result<Self, QuizError> {
        let quiz = demo_quiz()?;
        let quizzes = BTreeMap::from([(quiz.title().to_owned(), quiz)]);
        Ok(Self {
            quizzes: RwLock::new(quizzes),
        })
    }

    /// Replaces any quiz with the same title.
    pub async fn insert(&self, quiz: Quiz) {
        self.quizzes
            .write()
            .await
            .insert(quiz.title().to_owned(), quiz);
    }
}

impl RetrieveQuiz for MemoryQuizzes {
    async fn retrieve_quiz(&self, name: impl Into<String>) -> Result<Option<Quiz>, SupplyError> {
        Ok(self.quizzes.read().await.get(&name.into()).cloned())
    }

    async fn retrieve_all_quiz_names(&self) -> Result<Vec<String>, SupplyError> {
        Ok(self.quizzes.read().await.keys().cloned().collect())
    }
}

/// Where the bot takes quizzes from.
pub enum QuizSource {
    Postgres(Connection),
    Memory(MemoryQuizzes),
}

impl RetrieveQuiz for QuizSource {
    async fn retrieve_quiz(&self, name: impl Into<String>) -> Result<Option<Quiz>, SupplyError> {
        match self {
            QuizSource::Postgres(connection) => connection.retrieve_quiz(name).await,
            QuizSource::Memory(quizzes) => quizzes.retrieve_quiz(name).await,
        }
    }

    async fn retrieve_all_quiz_names(&self) -> Result<Vec<String>, SupplyError> {
        match self {
            QuizSource::Postgres(connection) => connection.retrieve_all_quiz_names().await,
            QuizSource::Memory(quizzes) => quizzes.retrieve_all_quiz_names().await,
        }
    }
}

/// Same content as the seed migration.
pub fn demo_quiz() -> Result<Quiz, QuizError> {
    let options = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    Ok(Quiz::new(
        "Rust basics",
        "A warm-up on ownership and the standard library.",
        "rustquizplay",
        20,
    )?
    .with_question(
        Question::new(
            "Which keyword makes a binding mutable?",
            options(&["mut", "var", "let!", "mutable"]),
            0,
        )?
        .with_difficulty(Difficulty::Easy)
        .with_explanation("Bindings are immutable unless declared with `let mut`."),
    )
    .with_question(
        Question::new(
            "What does `Option::take` leave behind?",
            options(&["The same value", "None", "A default value", "It panics"]),
            1,
        )?
        .with_explanation("`take` moves the value out and leaves `None` in its place."),
    )
    .with_question(
        Question::new(
            "Which trait lets a type be sent to another thread?",
            options(&["Sync", "Copy", "Send", "Unpin"]),
            2,
        )?
        .with_difficulty(Difficulty::Hard)
        .with_explanation("`Send` marks types whose ownership can move across threads."),
    ))
}
