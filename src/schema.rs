use std::{error::Error, sync::Arc};

use teloxide::{
    dispatching::{
        dialogue::{self, InMemStorage},
        DpHandlerDescription, UpdateFilterExt, UpdateHandler,
    },
    dptree::{self, Handler},
    payloads::SendMessageSetters,
    prelude::{DependencyMap, Requester},
    types::{Message, Update},
    Bot,
};
use tracing::instrument;

use crate::{
    commands::{cancel, help, start, Command},
    database::{connection::RetrieveQuiz, memory::QuizSource},
    keyboard::{action_keyboard, quizes_keyboard, TAKE_QUIZ},
    runner,
    state::QuizState,
    HandlerResult, UserDialogue,
};

pub fn schema() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(help))
        .branch(case![Command::Start].endpoint(start))
        .branch(case![Command::Cancel].endpoint(cancel));

    let handler = Update::filter_message()
        .branch(command_handler)
        .branch(case![QuizState::Start].endpoint(choose_what_to_do::<QuizSource>))
        .branch(running_scheme())
        .endpoint(invalid_state);

    dialogue::enter::<Update, InMemStorage<QuizState>, QuizState, _>()
        .branch(handler)
        .branch(callback_query_scheme())
}

#[instrument(level = "info", skip(bot, dialogue, source))]
async fn choose_what_to_do<Source: RetrieveQuiz>(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    source: Arc<Source>,
) -> HandlerResult {
    match msg.text() {
        Some(TAKE_QUIZ) => {
            let quizes = source.retrieve_all_quiz_names().await?;
            if quizes.is_empty() {
                bot.send_message(msg.chat.id, "No available quizes.")
                    .await?;
            } else {
                bot.send_message(msg.chat.id, "Please, choose available quiz:")
                    .reply_markup(quizes_keyboard(&quizes))
                    .await?;
                dialogue.update(QuizState::Selection).await?;
            }
        }
        other => {
            tracing::info!("Invalid message {:?} in chat {}", other, msg.chat.id.0);
            bot.send_message(msg.chat.id, "Invalid input. Please try again.")
                .reply_markup(action_keyboard())
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "debug")]
fn running_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<dyn Error + Send + Sync + 'static>>,
    DpHandlerDescription,
> {
    use dptree::case;
    tracing::debug!("Building dispatching tree for runner");
    Update::filter_message()
        .branch(case![QuizState::Selection].endpoint(runner::selection::<QuizSource>))
        .branch(case![QuizState::ReadyToRun { quiz }].endpoint(runner::running_ready))
}

#[instrument(level = "debug")]
fn callback_query_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<dyn Error + Send + Sync + 'static>>,
    DpHandlerDescription,
> {
    use dptree::case;
    tracing::debug!("Building dispatching tree for callback query");
    Update::filter_callback_query()
        .branch(case![QuizState::Running { quiz_name }].endpoint(runner::take_answer))
}

#[instrument(level = "info")]
async fn invalid_state(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Enter /help to see usages.",
    )
    .await?;
    Ok(())
}
