//! Timed multiple-choice play for a single participant.
//!
//! [`QuizEngine`] is a synchronous state machine. It never sleeps or spawns anything;
//! the countdown and reveal delays are driven from the outside (see [`crate::session`]),
//! one [`QuizEngine::tick`] per elapsed second.

use uuid::Uuid;

use crate::{
    database::quiz::{Question, Quiz},
    error::EngineError,
};

/// Points awarded for every correct answer.
pub const POINTS_PER_CORRECT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Question shown, answer not locked in yet.
    Presenting,
    /// Answer locked in, correctness is being revealed.
    Submitted,
    Advancing,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    question_id: Uuid,
    selected: Option<usize>,
    is_correct: bool,
    time_spent: u32,
    confidence: Option<u8>,
}

impl AnswerRecord {
    pub fn question_id(&self) -> &Uuid {
        &self.question_id
    }

    /// `None` when the question timed out without a selection.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    /// Seconds spent on the question.
    pub fn time_spent(&self) -> u32 {
        self.time_spent
    }

    pub fn confidence(&self) -> Option<u8> {
        self.confidence
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameState {
    current_idx: usize,
    time_remaining: u32,
    score: u32,
    streak: u32,
    answers: Vec<AnswerRecord>,
}

impl GameState {
    pub fn current_index(&self) -> usize {
        self.current_idx
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total_questions: usize,
    pub correct_answers: usize,
    pub best_streak: usize,
}

/// Result of one countdown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Running(u32),
    /// Time ran out and the question was submitted automatically.
    Expired(AnswerRecord),
    /// The engine isn't presenting a question.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Next(usize),
    Completed(Summary),
}

#[derive(Debug, Clone)]
pub struct QuizEngine {
    quiz: Quiz,
    state: GameState,
    phase: Phase,
    selection: Option<usize>,
    confidence: Option<u8>,
}

impl QuizEngine {
    /// Loads the first question with a full countdown. A quiz without questions is
    /// completed straight away.
    pub fn start(quiz: Quiz) -> Self {
        let phase = if quiz.questions().is_empty() {
            Phase::Completed
        } else {
            Phase::Presenting
        };
        let state = GameState {
            time_remaining: quiz.time_limit(),
            ..GameState::default()
        };

        Self {
            quiz,
            state,
            phase,
            selection: None,
            confidence: None,
        }
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn current_question(&self) -> Result<&Question, EngineError> {
        self.quiz
            .questions()
            .get(self.state.current_idx)
            .ok_or(EngineError::MissingQuestion(self.state.current_idx))
    }

    /// Provisional choice, may be replaced until the answer is submitted.
    ///
    /// Returns `false` when `option` was already the selection.
    pub fn select(&mut self, option: usize) -> Result<bool, EngineError> {
        self.ensure_presenting()?;
        let count = self.current_question()?.options().len();
        if option >= count {
            return Err(EngineError::OptionOutOfRange { option, count });
        }

        Ok(self.selection.replace(option) != Some(option))
    }

    pub fn set_confidence(&mut self, level: u8) -> Result<(), EngineError> {
        self.ensure_presenting()?;
        self.confidence = Some(level.min(100));
        Ok(())
    }

    pub fn tick(&mut self) -> Result<Tick, EngineError> {
        if self.phase != Phase::Presenting {
            return Ok(Tick::Ignored);
        }

        let next = i64::from(self.state.time_remaining) - 1;
        self.state.time_remaining = u32::try_from(next.max(0)).unwrap_or(0);

        if next > 0 {
            return Ok(Tick::Running(self.state.time_remaining));
        }

        Ok(match self.submit()? {
            Some(record) => Tick::Expired(record),
            None => Tick::Ignored,
        })
    }

    /// Locks in the current selection. Returns `None` without touching anything when
    /// the current question already has an answer.
    pub fn submit(&mut self) -> Result<Option<AnswerRecord>, EngineError> {
        if self.phase != Phase::Presenting || self.state.answers.len() > self.state.current_idx
        {
            return Ok(None);
        }

        let question = self.current_question()?;
        let question_id = *question.uuid();
        let is_correct = self.selection == Some(question.correct_option());

        if is_correct {
            self.state.score += POINTS_PER_CORRECT;
            self.state.streak += 1;
        } else {
            self.state.streak = 0;
        }

        let record = AnswerRecord {
            question_id,
            selected: self.selection,
            is_correct,
            time_spent: self
                .quiz
                .time_limit()
                .saturating_sub(self.state.time_remaining),
            confidence: self.confidence,
        };
        self.state.answers.push(record.clone());
        self.phase = Phase::Submitted;

        Ok(Some(record))
    }

    pub fn advance(&mut self) -> Result<Advance, EngineError> {
        if self.phase != Phase::Submitted {
            return Err(EngineError::NotSubmitted(self.phase));
        }

        self.phase = Phase::Advancing;
        let next = self.state.current_idx + 1;

        if next < self.quiz.questions().len() {
            self.state.current_idx = next;
            self.state.time_remaining = self.quiz.time_limit();
            self.selection = None;
            self.confidence = None;
            self.phase = Phase::Presenting;
            Ok(Advance::Next(next))
        } else {
            self.phase = Phase::Completed;
            Ok(Advance::Completed(self.summary()))
        }
    }

    pub fn summary(&self) -> Summary {
        let answers = self.state.answers();
        Summary {
            total_questions: self.quiz.questions().len(),
            correct_answers: answers.iter().filter(|a| a.is_correct()).count(),
            best_streak: best_streak(answers),
        }
    }

    fn ensure_presenting(&self) -> Result<(), EngineError> {
        match self.phase {
            Phase::Presenting => Ok(()),
            other => Err(EngineError::NotPresenting(other)),
        }
    }
}

/// Longest run of consecutive correct answers.
pub fn best_streak(answers: &[AnswerRecord]) -> usize {
    answers
        .iter()
        .fold((0, 0), |(current, best), answer| {
            if answer.is_correct() {
                (current + 1, best.max(current + 1))
            } else {
                (0, best)
            }
        })
        .1
}
