use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use std::time::Duration;

/// Raw input, interpreted by the app according to its current mode.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Quit,
    Up,
    Down,
    Enter,
    Escape,
    Backspace,
    Character(char),
    Tick,
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

    pub async fn next_event(&mut self) -> Result<AppEvent> {
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key_event) => Ok(self.handle_key_event(key_event)),
                _ => Ok(AppEvent::Tick),
            }
        } else {
            Ok(AppEvent::Tick)
        }
    }

    pub fn handle_key_event(&mut self, key_event: KeyEvent) -> AppEvent {
        match key_event {
            // Global quit with Ctrl+C
            KeyEvent {
                code: KeyCode::Char('c'),
                modifiers: KeyModifiers::CONTROL,
                ..
            } => {
                self.should_quit = true;
                AppEvent::Quit
            }

            KeyEvent {
                code: KeyCode::Up, ..
            } => AppEvent::Up,

            KeyEvent {
                code: KeyCode::Down,
                ..
            } => AppEvent::Down,

            KeyEvent {
                code: KeyCode::Enter,
                ..
            } => AppEvent::Enter,

            KeyEvent {
                code: KeyCode::Esc, ..
            } => AppEvent::Escape,

            KeyEvent {
                code: KeyCode::Backspace,
                ..
            } => AppEvent::Backspace,

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

            _ => AppEvent::Tick,
        }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        let mut handler = EventHandler::new();
        let key = |code, modifiers| KeyEvent::new(code, modifiers);

        assert_eq!(
            handler.handle_key_event(key(KeyCode::Char('l'), KeyModifiers::NONE)),
            AppEvent::Character('l')
        );
        assert_eq!(
            handler.handle_key_event(key(KeyCode::Char('r'), KeyModifiers::SHIFT)),
            AppEvent::Character('R')
        );
        assert_eq!(
            handler.handle_key_event(key(KeyCode::Esc, KeyModifiers::NONE)),
            AppEvent::Escape
        );
        assert!(!handler.should_quit());

        assert_eq!(
            handler.handle_key_event(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            AppEvent::Quit
        );
        assert!(handler.should_quit());
    }
}
