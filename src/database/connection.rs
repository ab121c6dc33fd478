use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::quiz::{Question, Quiz};
use crate::error::SupplyError;

pub struct Connection {
    pool: PgPool,
}

impl Connection {
    pub async fn connect(connection_string: &str) -> Result<Self, SupplyError> {
        let pool = PgPool::connect(connection_string).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), SupplyError> {
        tracing::debug!("Running migrations");
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }
}

/// Read side of the quiz store.
#[allow(async_fn_in_trait)]
pub trait RetrieveQuiz {
    /// `Ok(None)` when no quiz has that name.
    async fn retrieve_quiz(&self, name: impl Into<String>) -> Result<Option<Quiz>, SupplyError>;

    async fn retrieve_all_quiz_names(&self) -> Result<Vec<String>, SupplyError>;
}

type QuizRow = (Uuid, String, String, String, i32);
type QuestionRow = (Uuid, String, Vec<String>, i32, Option<String>, String);

impl RetrieveQuiz for Connection {
    async fn retrieve_quiz(&self, name: impl Into<String>) -> Result<Option<Quiz>, SupplyError> {
        let mut tx = self.pool.begin().await?;

        let quiz_record: Option<QuizRow> = sqlx::query_as(
            "SELECT uuid, name, description, author, time_limit FROM quizes WHERE name = $1",
        )
        .bind(name.into())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((uuid, title, description, author, time_limit)) = quiz_record else {
            return Ok(None);
        };
        let time_limit = u32::try_from(time_limit).unwrap_or(0);
        let mut quiz = Quiz::retrieve(uuid, title, description, author, time_limit)?;

        let question_records: Vec<QuestionRow> = sqlx::query_as(
            "SELECT uuid, text, options, correct_option, explanation, difficulty \
             FROM questions WHERE quiz_id = $1 ORDER BY position",
        )
        .bind(uuid)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        for (uuid, text, options, correct_option, explanation, difficulty) in question_records {
            tracing::debug!("Loading question {} with uuid {}", text, uuid);
            let correct = usize::try_from(correct_option).unwrap_or(usize::MAX);

            let mut question = Question::retrieve(uuid, text, options, correct)?
                .with_difficulty(difficulty.parse()?);
            if let Some(explanation) = explanation {
                question = question.with_explanation(explanation);
            }
            quiz.add_question(question);
        }

        Ok(Some(quiz))
    }

    async fn retrieve_all_quiz_names(&self) -> Result<Vec<String>, SupplyError> {
        let names: Vec<(String,)> = sqlx::query_as("SELECT name FROM quizes ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(names.into_iter().map(|(name,)| name).collect())
    }
}
