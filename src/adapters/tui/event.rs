use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    // Navigation
    Quit,
    ShowHelp,
    CloseModal,
    FocusSearch,
    NextItem,
    PreviousItem,
    PageUp,
    PageDown,

    // Input handling
    Character(char),
    Backspace,
    Delete,
    Enter,
    Tab,
    BackTab,
}

pub struct EventHandler {
    should_quit: bool,
}

impl EventHandler {
    pub fn new() -> Self {
        Self { should_quit: false }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Wait briefly for a key press. `None` when nothing happened.
    pub async fn next_event(&mut self) -> Result<Option<AppEvent>> {
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key_event) => Ok(self.handle_key_event(key_event)),
                _ => Ok(None),
            }
        } else {
            Ok(None)
        }
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) -> Option<AppEvent> {
        let event = match key_event {
            KeyEvent {
                code: KeyCode::Char('c'),
                modifiers: KeyModifiers::CONTROL,
                ..
            } => {
                self.should_quit = true;
                AppEvent::Quit
            }

            // Letters stay characters so text inputs receive them; the app
            // decides what they mean outside of an input.
            KeyEvent {
                code: KeyCode::Char('/'),
                modifiers: KeyModifiers::NONE,
                ..
            } => AppEvent::FocusSearch,

            KeyEvent {
                code: KeyCode::Esc, ..
            } => AppEvent::CloseModal,

            KeyEvent {
                code: KeyCode::Tab, ..
            } => AppEvent::Tab,

            KeyEvent {
                code: KeyCode::BackTab,
                ..
            } => AppEvent::BackTab,

            KeyEvent {
                code: KeyCode::Enter,
                ..
            } => AppEvent::Enter,

            KeyEvent {
                code: KeyCode::Down, ..
            } => AppEvent::NextItem,

            KeyEvent {
                code: KeyCode::Up, ..
            } => AppEvent::PreviousItem,

            KeyEvent {
                code: KeyCode::Char('u'),
                modifiers: KeyModifiers::CONTROL,
                ..
            }
            | KeyEvent {
                code: KeyCode::PageUp,
                ..
            } => AppEvent::PageUp,

            KeyEvent {
                code: KeyCode::Char('d'),
                modifiers: KeyModifiers::CONTROL,
                ..
            }
            | KeyEvent {
                code: KeyCode::PageDown,
                ..
            } => AppEvent::PageDown,

            KeyEvent {
                code: KeyCode::F(1), ..
            } => AppEvent::ShowHelp,

            KeyEvent {
                code: KeyCode::Char(c),
                modifiers: KeyModifiers::NONE,
                ..
            } => AppEvent::Character(c),

            KeyEvent {
                code: KeyCode::Char(c),
                modifiers: KeyModifiers::SHIFT,
                ..
            } => AppEvent::Character(c.to_uppercase().next().unwrap_or(c)),

            KeyEvent {
                code: KeyCode::Backspace,
                ..
            } => AppEvent::Backspace,

            KeyEvent {
                code: KeyCode::Delete,
                ..
            } => AppEvent::Delete,

            _ => return None,
        };

        Some(event)
    }
}
