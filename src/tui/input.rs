// SPDX-License-Identifier: MIT
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    SelectUp,
    SelectDown,
    Connect,
    Prime,
    ToggleMeasuring,
    ToggleRecording,
    EnterCommand,
    CommandInput(char),
    CommandBackspace,
    SendCommand,
    LeaveCommand,
    None,
}

pub fn handle_key(key: KeyEvent, command_mode: bool) -> Action {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }
    if command_mode {
        return match key.code {
            KeyCode::Enter => Action::SendCommand,
            KeyCode::Esc => Action::LeaveCommand,
            KeyCode::Backspace => Action::CommandBackspace,
            KeyCode::Char(c) => Action::CommandInput(c),
            _ => Action::None,
        };
    }
    match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Up => Action::SelectUp,
        KeyCode::Down => Action::SelectDown,
        KeyCode::Char('c') => Action::Connect,
        KeyCode::Char('p') => Action::Prime,
        KeyCode::Char('m') => Action::ToggleMeasuring,
        KeyCode::Char('r') => Action::ToggleRecording,
        KeyCode::Char(':') => Action::EnterCommand,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn normal_mode_keys() {
        assert_eq!(handle_key(press(KeyCode::Char('m')), false), Action::ToggleMeasuring);
        assert_eq!(handle_key(press(KeyCode::Char(':')), false), Action::EnterCommand);
        assert_eq!(handle_key(press(KeyCode::Char('x')), false), Action::None);
    }

    #[test]
    fn command_mode_captures_letters() {
        assert_eq!(handle_key(press(KeyCode::Char('q')), true), Action::CommandInput('q'));
        assert_eq!(handle_key(press(KeyCode::Enter), true), Action::SendCommand);
        assert_eq!(handle_key(press(KeyCode::Esc), true), Action::LeaveCommand);
    }

    #[test]
    fn ctrl_c_always_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key(key, true), Action::Quit);
        assert_eq!(handle_key(key, false), Action::Quit);
    }
}
