use std::{fmt, str::FromStr};

use uuid::Uuid;

use crate::error::QuizError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    uuid: Uuid,
    title: String,
    description: String,
    author: String,
    time_limit: u32,
    questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    uuid: Uuid,
    text: String,
    options: Vec<String>,
    correct_option: usize,
    explanation: Option<String>,
    difficulty: Difficulty,
}

/// Cosmetic tag, has no effect on scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Quiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{}\n\nBy @{}\nQuestions: {}\nTime per question: {}s",
            self.title(),
            self.description(),
            self.author(),
            self.questions().len(),
            self.time_limit()
        )
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        })
    }
}

impl FromStr for Difficulty {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(QuizError::UnknownDifficulty(s.to_owned())),
        }
    }
}

impl Quiz {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        author: impl Into<String>,
        time_limit: u32,
    ) -> Result<Self, QuizError> {
        Self::retrieve(Uuid::new_v4(), title, description, author, time_limit)
    }

    pub fn retrieve(
        uuid: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        author: impl Into<String>,
        time_limit: u32,
    ) -> Result<Self, QuizError> {
        if time_limit == 0 {
            return Err(QuizError::ZeroTimeLimit);
        }

        Ok(Self {
            uuid,
            title: title.into(),
            description: description.into(),
            author: author.into(),
            time_limit,
            questions: vec![],
        })
    }

    pub fn with_question(mut self, question: Question) -> Self {
        self.add_question(question);
        self
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn time_limit(&self) -> u32 {
        self.time_limit
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
    }
}

impl Question {
    pub fn new(
        text: impl Into<String>,
        options: Vec<String>,
        correct_option: usize,
    ) -> Result<Self, QuizError> {
        Self::retrieve(Uuid::new_v4(), text, options, correct_option)
    }

    pub fn retrieve(
        uuid: Uuid,
        text: impl Into<String>,
        options: Vec<String>,
        correct_option: usize,
    ) -> Result<Self, QuizError> {
        let text = text.into();

        if options.len() < 2 {
            return Err(QuizError::TooFewOptions {
                text,
                count: options.len(),
            });
        }
        if correct_option >= options.len() {
            return Err(QuizError::CorrectOptionOutOfRange {
                text,
                correct: correct_option,
                count: options.len(),
            });
        }

        Ok(Self {
            uuid,
            text,
            options,
            correct_option,
            explanation: None,
            difficulty: Difficulty::default(),
        })
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn correct_option(&self) -> usize {
        self.correct_option
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn question_needs_two_options() {
        let err = Question::new("Alone?", options(&["yes"]), 0).unwrap_err();
        assert_eq!(
            err,
            QuizError::TooFewOptions {
                text: "Alone?".into(),
                count: 1
            }
        );
    }

    #[test]
    fn correct_option_must_exist() {
        let err = Question::new("Pick", options(&["a", "b"]), 2).unwrap_err();
        assert!(matches!(
            err,
            QuizError::CorrectOptionOutOfRange { correct: 2, count: 2, .. }
        ));
    }

    #[test]
    fn quiz_rejects_zero_time_limit() {
        assert_eq!(
            Quiz::new("t", "d", "a", 0).unwrap_err(),
            QuizError::ZeroTimeLimit
        );
    }

    #[test]
    fn questions_keep_insertion_order() {
        let quiz = Quiz::new("t", "d", "a", 10)
            .unwrap()
            .with_question(Question::new("first", options(&["a", "b"]), 0).unwrap())
            .with_question(Question::new("second", options(&["a", "b"]), 1).unwrap());

        let texts: Vec<&str> = quiz.questions().iter().map(|q| q.text()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" easy ".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert!("extreme".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::Medium.to_string(), "medium");
    }
}
