use std::error::Error;
use std::sync::Arc;

use rustquizplay::config::Config;
use rustquizplay::database::connection::Connection;
use rustquizplay::database::memory::{MemoryQuizzes, QuizSource};
use rustquizplay::runner::PlayRegistry;
use rustquizplay::schema::schema;
use rustquizplay::state::QuizState;
use rustquizplay::telemetry;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::error_handlers::IgnoringErrorHandlerSafe;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Config::from_env()?;
    telemetry::init(&config.log_level)?;

    let source = match &config.database_url {
        Some(url) => {
            let connection = Connection::connect(url).await?;
            connection.run_migrations().await?;
            QuizSource::Postgres(connection)
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, serving the built-in demo quiz");
            QuizSource::Memory(MemoryQuizzes::with_demo()?)
        }
    };

    let bot = Bot::new(config.teloxide_token.clone());
    tracing::info!("Starting bot...");

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![
            InMemStorage::<QuizState>::new(),
            Arc::new(source),
            Arc::new(PlayRegistry::default()),
            config.play
        ])
        .enable_ctrlc_handler()
        .build();

    if let Some(webhook) = config.webhook {
        let listener = webhooks::axum(bot, Options::new(webhook.addr, webhook.url)).await?;
        dispatcher
            .dispatch_with_listener(listener, Arc::new(IgnoringErrorHandlerSafe))
            .await
    } else {
        dispatcher.dispatch().await
    }

    Ok(())
}
