use std::{collections::HashMap, sync::Arc};

use teloxide::{
    dispatching::dialogue::GetChatId,
    payloads::{EditMessageReplyMarkupSetters, EditMessageTextSetters, SendMessageSetters},
    prelude::Requester,
    types::{CallbackQuery, ChatId, Message, MessageId, ReplyMarkup},
    ApiError, Bot, RequestError,
};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{instrument, Instrument};

use crate::{
    database::{connection::RetrieveQuiz, quiz::Quiz},
    engine::Summary,
    keyboard::{action_keyboard, answers_keyboard, parse_callback, yes_no_keyboard, PlayerAction},
    session::{spawn_play, PlayEvent, PlayHandle, PlaySettings},
    state::QuizState,
    HandlerResult, UserDialogue,
};

/// Running play sessions, one per chat.
#[derive(Debug, Default)]
pub struct PlayRegistry {
    plays: Mutex<HashMap<ChatId, PlayHandle>>,
}

impl PlayRegistry {
    /// Cancels whatever was running in that chat before.
    pub async fn insert(&self, chat_id: ChatId, handle: PlayHandle) {
        if let Some(previous) = self.plays.lock().await.insert(chat_id, handle) {
            previous.cancel();
        }
    }

    pub async fn remove(&self, chat_id: ChatId) -> Option<PlayHandle> {
        self.plays.lock().await.remove(&chat_id)
    }

    pub(crate) async fn act(&self, chat_id: ChatId, action: PlayerAction) -> bool {
        let plays = self.plays.lock().await;
        let Some(handle) = plays.get(&chat_id) else {
            return false;
        };
        let inputs = handle.inputs();
        match action {
            PlayerAction::Select(option) => inputs.select(option),
            PlayerAction::Submit => inputs.confirm(),
        }
    }
}

#[instrument(level = "info", skip(bot, dialogue, source))]
pub(crate) async fn selection<Source: RetrieveQuiz>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    source: Arc<Source>,
) -> HandlerResult {
    let Some(quiz_name) = msg.text() else {
        bot.send_message(msg.chat.id, "Failed to retrieve quiz: no input provided")
            .await?;
        return Ok(());
    };

    match source.retrieve_quiz(quiz_name).await {
        Ok(Some(quiz)) => {
            tracing::info!("{} selected '{}'", player_name(&msg), quiz.title());
            bot.send_message(
                msg.chat.id,
                format!("{quiz}\n\nAre you ready to begin? (Yes/No)"),
            )
            .reply_markup(yes_no_keyboard())
            .await?;
            dialogue.update(QuizState::ReadyToRun { quiz }).await?;
        }
        Ok(None) => {
            tracing::info!("quiz '{}' not found", quiz_name);
            bot.send_message(
                msg.chat.id,
                format!("Quiz with name '{}' not found.", quiz_name),
            )
            .await?;
        }
        Err(e) => {
            tracing::error!("Failed to load quiz '{}': {}", quiz_name, e);
            bot.send_message(msg.chat.id, "Sorry, the quiz couldn't be loaded.")
                .await?;
            return Err(e.into());
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue, registry, quiz))]
pub(crate) async fn running_ready(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    quiz: Quiz,
    registry: Arc<PlayRegistry>,
    settings: PlaySettings,
) -> HandlerResult {
    match msg.text() {
        Some("Yes") | Some("Yes✔️") => {
            bot.send_message(msg.chat.id, "Let's begin!")
                .reply_markup(ReplyMarkup::kb_remove())
                .await?;

            let chat_id = msg.chat.id;
            let quiz_name = quiz.title().to_owned();
            let (events_tx, events) = mpsc::unbounded_channel();
            let (done_tx, done) = oneshot::channel();

            let handle = spawn_play(
                quiz,
                player_name(&msg),
                settings,
                events_tx,
                Box::new(move |score, summary| {
                    let _ = done_tx.send((score, summary));
                }),
            );
            registry.insert(chat_id, handle).await;
            dialogue.update(QuizState::Running { quiz_name }).await?;

            let render = PlayRender {
                bot,
                chat_id,
                dialogue,
                registry,
            };
            tokio::spawn(render.run(events, done).in_current_span());
        }
        Some("No") | Some("No❌") => {
            tracing::info!("{} quits quiz '{}'", player_name(&msg), quiz.title());
            bot.send_message(msg.chat.id, "OK. Quitting quiz...").await?;
            dialogue.update(QuizState::Start).await?;
            bot.send_message(msg.chat.id, "What do you want to do now?")
                .reply_markup(action_keyboard())
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please, enter a valid answer: Yes or No.")
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, q, registry))]
pub(crate) async fn take_answer(
    bot: Bot,
    q: CallbackQuery,
    quiz_name: String,
    registry: Arc<PlayRegistry>,
) -> HandlerResult {
    bot.answer_callback_query(&q.id).await?;

    let (Some(chat_id), Some(action)) = (q.chat_id(), q.data.as_deref().and_then(parse_callback))
    else {
        tracing::debug!("Ignoring callback {:?}", q.data);
        return Ok(());
    };

    if !registry.act(chat_id, action).await {
        tracing::info!("No running session for '{}' in chat {}", quiz_name, chat_id.0);
    }

    Ok(())
}

/// Turns play events into chat messages and hands the result back to the dialogue.
struct PlayRender {
    bot: Bot,
    chat_id: ChatId,
    dialogue: UserDialogue,
    registry: Arc<PlayRegistry>,
}

struct ShownQuestion {
    message_id: MessageId,
    heading: String,
    options: Vec<String>,
    selected: Option<usize>,
}

impl PlayRender {
    /// A failed Telegram call is logged and skipped, so the session keeps being shown and
    /// the dialogue is always handed back once the play completes.
    async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<PlayEvent>,
        done: oneshot::Receiver<(u32, Summary)>,
    ) {
        let mut shown: Option<ShownQuestion> = None;

        while let Some(event) = events.recv().await {
            if let Err(e) = self.render(event, &mut shown).await {
                report(&e, self.chat_id);
            }
        }

        // The sender is dropped without a result when the session was cancelled.
        let Ok((score, summary)) = done.await else {
            return;
        };
        self.finish(score, summary).await;
    }

    async fn render(
        &self,
        event: PlayEvent,
        shown: &mut Option<ShownQuestion>,
    ) -> Result<(), RequestError> {
        match event {
            PlayEvent::QuestionPresented {
                index,
                total,
                text,
                options,
                difficulty,
                time_limit,
            } => {
                let heading =
                    format!("Question #{}/{} ({})\n{}", index + 1, total, difficulty, text);
                let message = self
                    .bot
                    .send_message(self.chat_id, format!("{heading}\n\n⏱ {time_limit}s"))
                    .reply_markup(answers_keyboard(&options, None))
                    .await?;
                *shown = Some(ShownQuestion {
                    message_id: message.id,
                    heading,
                    options,
                    selected: None,
                });
            }
            PlayEvent::Tick { remaining, .. } => {
                if let Some(question) = shown.as_ref().filter(|_| should_show(remaining)) {
                    self.bot
                        .edit_message_text(
                            self.chat_id,
                            question.message_id,
                            format!("{}\n\n⏱ {remaining}s", question.heading),
                        )
                        .reply_markup(answers_keyboard(&question.options, question.selected))
                        .await?;
                }
            }
            PlayEvent::SelectionChanged { option, .. } => {
                if let Some(question) = shown.as_mut() {
                    question.selected = Some(option);
                    self.bot
                        .edit_message_reply_markup(self.chat_id, question.message_id)
                        .reply_markup(answers_keyboard(&question.options, Some(option)))
                        .await?;
                }
            }
            PlayEvent::Revealed {
                record,
                correct_option,
                explanation,
                score,
                streak,
                ..
            } => {
                if let Some(question) = shown.take() {
                    let verdict = match record.selected() {
                        None => "Time is up.⌛".to_owned(),
                        Some(_) if record.is_correct() => "Answer is correct.✅".to_owned(),
                        Some(i) => format!(
                            "Given answer {}. Answer is incorrect.❌",
                            question.options.get(i).map(String::as_str).unwrap_or("?")
                        ),
                    };
                    let mut text = format!(
                        "{}\n\n{}\nCorrect answer: {}",
                        question.heading,
                        verdict,
                        question
                            .options
                            .get(correct_option)
                            .map(String::as_str)
                            .unwrap_or("?")
                    );
                    if let Some(explanation) = explanation {
                        text.push_str(&format!("\n{explanation}"));
                    }
                    text.push_str(&format!("\nScore: {score} | Streak: {streak}"));

                    self.bot
                        .edit_message_text(self.chat_id, question.message_id, text)
                        .await?;
                }
            }
            PlayEvent::Completed { .. } => {
                self.bot
                    .send_message(self.chat_id, "Congratulations! You completed the quiz!")
                    .await?;
            }
        }

        Ok(())
    }

    async fn finish(&self, score: u32, summary: Summary) {
        self.registry.remove(self.chat_id).await;

        let result = self
            .bot
            .send_message(
                self.chat_id,
                format!(
                    "Your result is {}/{} ({} points). Best streak: {}",
                    summary.correct_answers, summary.total_questions, score, summary.best_streak
                ),
            )
            .await;
        if let Err(e) = result {
            report(&e, self.chat_id);
        }

        if let Err(e) = self.dialogue.update(QuizState::Start).await {
            tracing::error!("Failed to reset dialogue in chat {}: {}", self.chat_id.0, e);
        }

        let prompt = self
            .bot
            .send_message(self.chat_id, "What do you want to do now?")
            .reply_markup(action_keyboard())
            .await;
        if let Err(e) = prompt {
            report(&e, self.chat_id);
        }
    }
}

/// Re-sending an unchanged text or keyboard is refused by Telegram but changes nothing.
fn is_harmless(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::MessageNotModified))
}

fn report(error: &RequestError, chat_id: ChatId) {
    if is_harmless(error) {
        tracing::debug!("Message in chat {} already up to date", chat_id.0);
    } else {
        tracing::warn!("Telegram request for chat {} failed: {}", chat_id.0, error);
    }
}

/// Refresh the timer every ten seconds and for the final countdown.
fn should_show(remaining: u32) -> bool {
    remaining <= 5 || remaining % 10 == 0
}

fn player_name(msg: &Message) -> String {
    msg.chat
        .username()
        .map(str::to_owned)
        .unwrap_or_else(|| msg.chat.id.0.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use teloxide::{dispatching::dialogue::InMemStorage, prelude::Dialogue};

    use super::*;
    use crate::database::quiz::Question;

    #[test]
    fn timer_refresh_marks() {
        let shown: Vec<u32> = (1..=30).rev().filter(|&r| should_show(r)).collect();
        assert_eq!(shown, [30, 20, 10, 5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn registry_forwards_actions_to_running_play() {
        let registry = PlayRegistry::default();
        let chat = ChatId(42);
        assert!(!registry.act(chat, PlayerAction::Submit).await);

        let quiz = crate::database::memory::demo_quiz().unwrap();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let handle = spawn_play(
            quiz,
            "bob",
            PlaySettings::default(),
            events_tx,
            Box::new(|_, _| {}),
        );
        registry.insert(chat, handle).await;

        assert!(registry.act(chat, PlayerAction::Select(0)).await);
        loop {
            match events.recv().await {
                Some(PlayEvent::SelectionChanged { index: 0, option: 0 }) => break,
                Some(_) => continue,
                None => panic!("session ended early"),
            }
        }

        registry.remove(chat).await.unwrap().cancel();
        assert!(!registry.act(chat, PlayerAction::Submit).await);
    }

    #[test]
    fn only_unmodified_message_errors_are_harmless() {
        assert!(is_harmless(&RequestError::Api(ApiError::MessageNotModified)));
        assert!(!is_harmless(&RequestError::Api(ApiError::BotBlocked)));
        assert!(!is_harmless(&RequestError::Api(ApiError::MessageToEditNotFound)));
    }

    #[tokio::test]
    async fn failing_requests_do_not_stop_the_render() {
        let chat = ChatId(7);
        // Nothing listens there, so every Telegram call fails.
        let api = url::Url::parse("http://127.0.0.1:9").unwrap();
        let bot = Bot::new("1:test").set_api_url(api);

        let storage = InMemStorage::<QuizState>::new();
        let dialogue: UserDialogue = Dialogue::new(storage, chat);
        dialogue
            .update(QuizState::Running {
                quiz_name: "Render".into(),
            })
            .await
            .unwrap();

        let quiz = Quiz::new("Render", "render tests", "tester", 5)
            .unwrap()
            .with_question(Question::new("Q1", vec!["a".into(), "b".into()], 1).unwrap());
        let settings = PlaySettings {
            reveal_delay: Duration::from_millis(10),
            completion_delay: Duration::from_millis(10),
        };
        let (events_tx, events) = mpsc::unbounded_channel();
        let (done_tx, done) = oneshot::channel();
        let handle = spawn_play(
            quiz,
            "carol",
            settings,
            events_tx,
            Box::new(move |score, summary| {
                let _ = done_tx.send((score, summary));
            }),
        );
        let inputs = handle.inputs();
        let registry = Arc::new(PlayRegistry::default());
        registry.insert(chat, handle).await;

        inputs.select(1);
        inputs.select(1);
        inputs.confirm();

        let render = PlayRender {
            bot,
            chat_id: chat,
            dialogue: dialogue.clone(),
            registry: registry.clone(),
        };
        tokio::time::timeout(Duration::from_secs(30), render.run(events, done))
            .await
            .expect("render finished");

        assert!(registry.remove(chat).await.is_none());
        assert!(matches!(
            dialogue.get().await.unwrap(),
            Some(QuizState::Start)
        ));
    }
}
