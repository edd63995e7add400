//! Raw-terminal keyboard handling for run cancellation.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;

use crate::acquire::CancelPoll;

/// Puts the terminal into raw mode for its lifetime.
///
/// Dropping the guard restores the previous mode, so the terminal is
/// recovered on every exit path, including panics and early errors.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Non-blocking keyboard source: 'q' or ESC requests cancellation.
#[derive(Debug, Default)]
pub struct Keyboard;

impl Keyboard {
    pub fn new() -> Self {
        Self
    }
}

impl CancelPoll for Keyboard {
    fn cancel_requested(&mut self) -> bool {
        // Drain everything pending so the poll never lags behind the
        // keypress by more than one tick.
        while event::poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    return true;
                }
            }
        }
        false
    }

    fn wait_for_acknowledge(&mut self) {
        loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }
}
