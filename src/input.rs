use crossterm::event::KeyCode;

use crate::instrument::InstrumentCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Quit,
    TogglePause,
    OpenInstrumentPrompt,
}

pub fn parse_main_command(key_code: &KeyCode) -> Option<UiCommand> {
    match key_code {
        KeyCode::Esc => Some(UiCommand::Quit),
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'q' => Some(UiCommand::Quit),
            'p' => Some(UiCommand::TogglePause),
            'c' => Some(UiCommand::OpenInstrumentPrompt),
            _ => None,
        },
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Editing,
    Submitted(InstrumentCode),
    Cancelled,
}

/// Line editor for the change-instrument popup. Invalid input is rejected in place
/// and never leaves the prompt.
#[derive(Debug, Clone, Default)]
pub struct InstrumentPrompt {
    buffer: String,
    error: Option<String>,
}

const MAX_INPUT_LEN: usize = 8;

impl InstrumentPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn handle_key(&mut self, key_code: &KeyCode) -> PromptOutcome {
        match key_code {
            KeyCode::Esc => PromptOutcome::Cancelled,
            KeyCode::Enter => match InstrumentCode::parse(&self.buffer) {
                Ok(code) => PromptOutcome::Submitted(code),
                Err(_) => {
                    self.error = Some("invalid format (e.g. 3350, 5721.JNX)".to_string());
                    PromptOutcome::Editing
                }
            },
            KeyCode::Backspace => {
                self.buffer.pop();
                self.error = None;
                PromptOutcome::Editing
            }
            KeyCode::Char(c) if (c.is_ascii_alphanumeric() || *c == '.') => {
                if self.buffer.len() < MAX_INPUT_LEN {
                    self.buffer.push(c.to_ascii_uppercase());
                }
                self.error = None;
                PromptOutcome::Editing
            }
            _ => PromptOutcome::Editing,
        }
    }
}
