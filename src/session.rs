//! Runs one participant through a quiz on the tokio runtime.
//!
//! Player input, countdown ticks and the reveal pause all go through a single queue, so
//! the engine sees them strictly one at a time.

use std::time::Duration;

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::{JoinError, JoinHandle},
    time::sleep,
};
use tracing::{debug, error, info, info_span, Instrument};

use crate::{
    database::quiz::{Difficulty, Quiz},
    engine::{Advance, AnswerRecord, Phase, QuizEngine, Summary, Tick},
    error::EngineError,
    timer::{Countdown, TICK_PERIOD},
};

pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_millis(1000);

/// Receives the final score and summary, once.
pub type CompletionSink = Box<dyn FnOnce(u32, Summary) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaySettings {
    /// How long correctness stays on screen before the next question.
    pub reveal_delay: Duration,
    /// Pause between the final summary and the completion callback.
    pub completion_delay: Duration,
}

impl Default for PlaySettings {
    fn default() -> Self {
        Self {
            reveal_delay: DEFAULT_REVEAL_DELAY,
            completion_delay: DEFAULT_COMPLETION_DELAY,
        }
    }
}

/// Everything a front end needs to render a play session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayEvent {
    QuestionPresented {
        index: usize,
        total: usize,
        text: String,
        options: Vec<String>,
        difficulty: Difficulty,
        time_limit: u32,
    },
    Tick {
        index: usize,
        remaining: u32,
    },
    SelectionChanged {
        index: usize,
        option: usize,
    },
    Revealed {
        index: usize,
        record: AnswerRecord,
        correct_option: usize,
        explanation: Option<String>,
        score: u32,
        streak: u32,
    },
    Completed {
        score: u32,
        summary: Summary,
    },
}

#[derive(Debug, Clone)]
enum Event {
    Select(usize),
    Confidence(u8),
    Confirm,
    Tick(usize),
}

/// Cloneable input side of a running session. Sends return `false` once the session
/// is gone.
#[derive(Debug, Clone)]
pub struct PlayInputs {
    queue: UnboundedSender<Event>,
}

impl PlayInputs {
    pub fn select(&self, option: usize) -> bool {
        self.queue.send(Event::Select(option)).is_ok()
    }

    pub fn confidence(&self, level: u8) -> bool {
        self.queue.send(Event::Confidence(level)).is_ok()
    }

    pub fn confirm(&self) -> bool {
        self.queue.send(Event::Confirm).is_ok()
    }
}

#[derive(Debug)]
pub struct PlayHandle {
    inputs: PlayInputs,
    task: JoinHandle<()>,
}

impl PlayHandle {
    pub fn inputs(&self) -> PlayInputs {
        self.inputs.clone()
    }

    /// Tears the session down together with its countdown. The completion sink is
    /// dropped without being called.
    pub fn cancel(self) {
        self.task.abort();
    }

    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}

pub fn spawn_play(
    quiz: Quiz,
    player: impl Into<String>,
    settings: PlaySettings,
    events: UnboundedSender<PlayEvent>,
    on_complete: CompletionSink,
) -> PlayHandle {
    let player = player.into();
    let (tx, rx) = mpsc::unbounded_channel();
    let span = info_span!("play", player = %player, quiz = %quiz.title());

    let session = PlaySession {
        engine: QuizEngine::start(quiz),
        settings,
        events,
        queue_tx: tx.clone(),
        queue: rx,
    };
    let task = tokio::spawn(session.run(on_complete).instrument(span));

    PlayHandle {
        inputs: PlayInputs { queue: tx },
        task,
    }
}

struct PlaySession {
    engine: QuizEngine,
    settings: PlaySettings,
    events: UnboundedSender<PlayEvent>,
    queue_tx: UnboundedSender<Event>,
    queue: UnboundedReceiver<Event>,
}

impl PlaySession {
    async fn run(mut self, on_complete: CompletionSink) {
        if let Err(e) = self.play().await {
            error!(error = %e, "play session aborted");
            return;
        }
        if self.engine.phase() != Phase::Completed {
            debug!("play session stopped before completion");
            return;
        }

        let score = self.engine.state().score();
        let summary = self.engine.summary();
        info!(
            score,
            correct = summary.correct_answers,
            total = summary.total_questions,
            best_streak = summary.best_streak,
            "quiz completed"
        );
        self.emit(PlayEvent::Completed { score, summary });

        sleep(self.settings.completion_delay).await;
        on_complete(score, summary);
    }

    async fn play(&mut self) -> Result<(), EngineError> {
        while self.engine.phase() == Phase::Presenting {
            let index = self.present()?;
            let countdown =
                Countdown::start(TICK_PERIOD, self.queue_tx.clone(), Event::Tick(index));

            let record = self.await_submission(index).await?;
            countdown.cancel();

            let Some(record) = record else {
                debug!("input queue closed");
                return Ok(());
            };
            self.reveal(index, record).await?;

            match self.engine.advance()? {
                Advance::Next(next) => debug!(next, "advancing"),
                Advance::Completed(_) => break,
            }
        }

        Ok(())
    }

    fn present(&self) -> Result<usize, EngineError> {
        let question = self.engine.current_question()?;
        let index = self.engine.state().current_index();
        info!(index, question = question.text(), "presenting question");

        self.emit(PlayEvent::QuestionPresented {
            index,
            total: self.engine.quiz().questions().len(),
            text: question.text().to_owned(),
            options: question.options().to_vec(),
            difficulty: question.difficulty(),
            time_limit: self.engine.state().time_remaining(),
        });
        Ok(index)
    }

    async fn await_submission(
        &mut self,
        index: usize,
    ) -> Result<Option<AnswerRecord>, EngineError> {
        while let Some(event) = self.queue.recv().await {
            match event {
                Event::Tick(tick_index) if tick_index != index => {
                    debug!(tick_index, index, "stale tick dropped");
                }
                Event::Tick(_) => match self.engine.tick()? {
                    Tick::Running(remaining) => self.emit(PlayEvent::Tick { index, remaining }),
                    Tick::Expired(record) => {
                        info!(index, selected = ?record.selected(), "time is up");
                        return Ok(Some(record));
                    }
                    Tick::Ignored => {}
                },
                Event::Select(option) => match self.engine.select(option) {
                    Ok(true) => self.emit(PlayEvent::SelectionChanged { index, option }),
                    Ok(false) => debug!(index, option, "selection unchanged"),
                    Err(e) => debug!(error = %e, "selection ignored"),
                },
                Event::Confidence(level) => {
                    if let Err(e) = self.engine.set_confidence(level) {
                        debug!(error = %e, "confidence ignored");
                    }
                }
                Event::Confirm => match self.engine.submit()? {
                    Some(record) => {
                        info!(index, selected = ?record.selected(), "answer submitted");
                        return Ok(Some(record));
                    }
                    None => debug!(index, "duplicate submission ignored"),
                },
            }
        }

        Ok(None)
    }

    async fn reveal(&mut self, index: usize, record: AnswerRecord) -> Result<(), EngineError> {
        let question = self.engine.current_question()?;
        self.emit(PlayEvent::Revealed {
            index,
            correct_option: question.correct_option(),
            explanation: question.explanation().map(str::to_owned),
            record,
            score: self.engine.state().score(),
            streak: self.engine.state().streak(),
        });

        let pause = sleep(self.settings.reveal_delay);
        tokio::pin!(pause);
        loop {
            tokio::select! {
                _ = &mut pause => break,
                Some(event) = self.queue.recv() => self.discard(event),
            }
        }

        Ok(())
    }

    /// Routes input arriving during the reveal through the engine, which refuses it.
    fn discard(&mut self, event: Event) {
        let outcome = match event {
            Event::Select(option) => self.engine.select(option).err(),
            Event::Confidence(level) => self.engine.set_confidence(level).err(),
            Event::Confirm => match self.engine.submit() {
                Ok(_) => None,
                Err(e) => Some(e),
            },
            Event::Tick(_) => None,
        };
        debug!(event = ?event, refused = ?outcome, "input during reveal ignored");
    }

    fn emit(&self, event: PlayEvent) {
        if self.events.send(event).is_err() {
            debug!("renderer detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::quiz::Question;
    use tokio::sync::oneshot;

    fn settings() -> PlaySettings {
        PlaySettings {
            reveal_delay: Duration::from_secs(2),
            completion_delay: Duration::from_secs(1),
        }
    }

    fn quiz(time_limit: u32, correct: &[usize]) -> Quiz {
        let mut quiz = Quiz::new("Session", "session tests", "tester", time_limit).unwrap();
        for (i, &c) in correct.iter().enumerate() {
            let options = vec!["a".into(), "b".into(), "c".into()];
            let question = Question::new(format!("Q{}", i + 1), options, c)
                .unwrap()
                .with_explanation(format!("because {}", i + 1));
            quiz.add_question(question);
        }
        quiz
    }

    struct Harness {
        handle: PlayHandle,
        events: UnboundedReceiver<PlayEvent>,
        done: oneshot::Receiver<(u32, Summary)>,
    }

    fn start(quiz: Quiz) -> Harness {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (done_tx, done) = oneshot::channel();
        let handle = spawn_play(
            quiz,
            "alice",
            settings(),
            events_tx,
            Box::new(move |score, summary| {
                let _ = done_tx.send((score, summary));
            }),
        );
        Harness {
            handle,
            events,
            done,
        }
    }

    async fn next_presented(events: &mut UnboundedReceiver<PlayEvent>) -> usize {
        loop {
            match events.recv().await {
                Some(PlayEvent::QuestionPresented { index, .. }) => return index,
                Some(_) => continue,
                None => panic!("session ended before the next question"),
            }
        }
    }

    async fn next_revealed(events: &mut UnboundedReceiver<PlayEvent>) -> AnswerRecord {
        loop {
            match events.recv().await {
                Some(PlayEvent::Revealed { record, .. }) => return record,
                Some(_) => continue,
                None => panic!("session ended before the reveal"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn plays_mixed_answers_and_timeout() {
        let mut h = start(quiz(10, &[0, 1, 2]));
        let inputs = h.handle.inputs();

        assert_eq!(next_presented(&mut h.events).await, 0);
        sleep(Duration::from_millis(3500)).await;
        inputs.select(0);
        inputs.confirm();
        let first = next_revealed(&mut h.events).await;
        assert!(first.is_correct());
        assert_eq!(first.time_spent(), 3);

        assert_eq!(next_presented(&mut h.events).await, 1);
        let second = next_revealed(&mut h.events).await;
        assert_eq!(second.selected(), None);
        assert!(!second.is_correct());
        assert_eq!(second.time_spent(), 10);

        assert_eq!(next_presented(&mut h.events).await, 2);
        sleep(Duration::from_millis(5500)).await;
        inputs.select(1);
        inputs.confirm();
        let third = next_revealed(&mut h.events).await;
        assert_eq!(third.selected(), Some(1));
        assert!(!third.is_correct());
        assert_eq!(third.time_spent(), 5);

        let (score, summary) = h.done.await.unwrap();
        assert_eq!(score, 100);
        assert_eq!(
            summary,
            Summary {
                total_questions: 3,
                correct_answers: 1,
                best_streak: 1,
            }
        );
        h.handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_quiz_completes_without_presenting() {
        let mut h = start(quiz(10, &[]));

        assert_eq!(
            h.events.recv().await,
            Some(PlayEvent::Completed {
                score: 0,
                summary: Summary::default(),
            })
        );
        assert_eq!(h.done.await.unwrap(), (0, Summary::default()));
        assert_eq!(h.events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn double_confirm_records_one_answer() {
        let mut h = start(quiz(10, &[0, 0]));
        let inputs = h.handle.inputs();

        next_presented(&mut h.events).await;
        inputs.select(0);
        inputs.confirm();
        inputs.confirm();
        inputs.select(1);

        let mut reveals = 0;
        loop {
            match h.events.recv().await {
                Some(PlayEvent::Revealed { index: 0, score, .. }) => {
                    reveals += 1;
                    assert_eq!(score, 100);
                }
                Some(PlayEvent::SelectionChanged { option: 1, .. }) => {
                    panic!("selection accepted after submission")
                }
                Some(PlayEvent::QuestionPresented { index: 1, .. }) => break,
                Some(_) => continue,
                None => panic!("session ended early"),
            }
        }
        assert_eq!(reveals, 1);
        h.handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_selection_is_announced_once() {
        let mut h = start(quiz(10, &[1]));
        let inputs = h.handle.inputs();

        next_presented(&mut h.events).await;
        inputs.select(1);
        inputs.select(1);
        inputs.select(0);
        inputs.select(0);
        inputs.confirm();

        let mut changes = vec![];
        loop {
            match h.events.recv().await {
                Some(PlayEvent::SelectionChanged { option, .. }) => changes.push(option),
                Some(PlayEvent::Revealed { record, .. }) => {
                    assert_eq!(record.selected(), Some(0));
                    break;
                }
                Some(_) => continue,
                None => panic!("session ended early"),
            }
        }
        assert_eq!(changes, [1, 0]);
        h.handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_resets_for_each_question() {
        let mut h = start(quiz(4, &[0, 0]));
        let inputs = h.handle.inputs();

        next_presented(&mut h.events).await;
        sleep(Duration::from_millis(2500)).await;
        inputs.confirm();
        next_revealed(&mut h.events).await;

        let mut remaining = vec![];
        loop {
            match h.events.recv().await {
                Some(PlayEvent::Tick { index: 1, remaining: r }) => remaining.push(r),
                Some(PlayEvent::Revealed { index: 1, .. }) => break,
                Some(PlayEvent::Tick { index: 0, .. }) => panic!("stale tick rendered"),
                Some(_) => continue,
                None => panic!("session ended early"),
            }
        }
        assert_eq!(remaining, [3, 2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_tears_down_session() {
        let mut h = start(quiz(10, &[0, 0]));
        next_presented(&mut h.events).await;

        let inputs = h.handle.inputs();
        h.handle.cancel();

        while h.events.recv().await.is_some() {}
        assert!(h.done.await.is_err());
        assert!(!inputs.confirm());
    }

    #[tokio::test(start_paused = true)]
    async fn confidence_is_recorded_with_the_answer() {
        let mut h = start(quiz(10, &[2]));
        let inputs = h.handle.inputs();

        next_presented(&mut h.events).await;
        inputs.confidence(80);
        inputs.select(2);
        inputs.confirm();

        let record = next_revealed(&mut h.events).await;
        assert_eq!(record.confidence(), Some(80));
        assert!(record.is_correct());
        assert_eq!(h.done.await.unwrap().0, 100);
    }
}
