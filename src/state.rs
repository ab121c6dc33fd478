use crate::database::quiz::Quiz;

#[derive(Debug, Clone, Default)]
pub enum QuizState {
    #[default]
    Start,
    Selection,
    ReadyToRun {
        quiz: Quiz,
    },
    /// The play session itself lives in the `PlayRegistry`.
    Running {
        quiz_name: String,
    },
}
