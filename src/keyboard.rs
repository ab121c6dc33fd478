use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

pub(crate) const TAKE_QUIZ: &str = "Take a quiz📝";
const SELECT_PREFIX: &str = "select:";
const SUBMIT: &str = "submit";

/// What an inline button press on a question asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlayerAction {
    Select(usize),
    Submit,
}

pub(crate) fn parse_callback(data: &str) -> Option<PlayerAction> {
    if data == SUBMIT {
        return Some(PlayerAction::Submit);
    }
    data.strip_prefix(SELECT_PREFIX)?
        .parse()
        .ok()
        .map(PlayerAction::Select)
}

pub(crate) fn yes_no_keyboard() -> KeyboardMarkup {
    let keyboard: Vec<Vec<KeyboardButton>> = vec![vec![
        KeyboardButton::new("Yes✔️"),
        KeyboardButton::new("No❌"),
    ]];

    KeyboardMarkup::new(keyboard)
}

/// One row per option, the current selection marked, and a submit row.
pub(crate) fn answers_keyboard(options: &[String], selected: Option<usize>) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let text = if selected == Some(i) {
                format!("👉 {option}")
            } else {
                option.clone()
            };
            vec![InlineKeyboardButton::callback(
                text,
                format!("{SELECT_PREFIX}{i}"),
            )]
        })
        .collect();
    keyboard.push(vec![InlineKeyboardButton::callback("Submit✔️", SUBMIT)]);

    InlineKeyboardMarkup::new(keyboard)
}

pub(crate) fn quizes_keyboard(quizes: &[String]) -> KeyboardMarkup {
    let keyboard = quizes
        .iter()
        .map(|quiz| vec![KeyboardButton::new(quiz)]);

    KeyboardMarkup::new(keyboard)
}

pub(crate) fn action_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(TAKE_QUIZ)]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn parses_callback_data() {
        assert_eq!(parse_callback("submit"), Some(PlayerAction::Submit));
        assert_eq!(parse_callback("select:3"), Some(PlayerAction::Select(3)));
        assert_eq!(parse_callback("select:x"), None);
        assert_eq!(parse_callback("Paris"), None);
    }

    #[test]
    fn answers_keyboard_marks_selection() {
        let options = vec!["Paris".to_string(), "Rome".to_string()];
        let markup = answers_keyboard(&options, Some(1));

        assert_eq!(markup.inline_keyboard.len(), 3);
        assert_eq!(markup.inline_keyboard[0][0].text, "Paris");
        assert_eq!(markup.inline_keyboard[1][0].text, "👉 Rome");

        let callbacks: Vec<Option<PlayerAction>> = markup
            .inline_keyboard
            .iter()
            .map(|row| match &row[0].kind {
                InlineKeyboardButtonKind::CallbackData(data) => parse_callback(data),
                _ => None,
            })
            .collect();
        assert_eq!(
            callbacks,
            [
                Some(PlayerAction::Select(0)),
                Some(PlayerAction::Select(1)),
                Some(PlayerAction::Submit)
            ]
        );
    }
}
