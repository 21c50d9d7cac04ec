//! Keyboard input for the interactive loop.
//!
//! Raw terminal keys are read on a blocking thread and translated into
//! [`Signal`]s. The control loop only ever sees the signal channel, so it
//! can be driven by a script in tests.

use std::io;
use std::time::Duration;

use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long one poll waits before checking for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Append a character to the context.
    Insert(char),
    /// Append pasted text to the context.
    Paste(String),
    /// Remove the last character.
    Backspace,
    /// Enter: skip when the context is empty, otherwise commit.
    Submit,
    /// Dispatch now, whatever the context.
    Commit,
    /// Copy the payload to the clipboard.
    Copy,
    /// Abort the whole run.
    Interrupt,
}

/// Map one key press onto a signal.
pub fn signal_for_key(key: &KeyEvent) -> Option<Signal> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') if ctrl => Some(Signal::Interrupt),
        KeyCode::Char('e') | KeyCode::Char('E') if ctrl => Some(Signal::Commit),
        KeyCode::Char('y') | KeyCode::Char('Y') if ctrl => Some(Signal::Copy),
        KeyCode::Char(_) if ctrl || key.modifiers.contains(KeyModifiers::ALT) => None,
        KeyCode::Char(c) => Some(Signal::Insert(c)),
        KeyCode::Tab => Some(Signal::Insert(' ')),
        KeyCode::Backspace => Some(Signal::Backspace),
        KeyCode::Enter => Some(Signal::Submit),
        KeyCode::Esc => Some(Signal::Interrupt),
        _ => None,
    }
}

pub fn signal_for_event(event: Event) -> Option<Signal> {
    match event {
        Event::Key(key) => signal_for_key(&key),
        Event::Paste(text) => Some(Signal::Paste(text)),
        _ => None,
    }
}

/// Raw mode (with bracketed paste) for as long as the guard lives.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnableBracketedPaste) {
            debug!(error = %e, "Bracketed paste not supported");
        }
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), DisableBracketedPaste);
        let _ = disable_raw_mode();
    }
}

/// A running terminal listener feeding a signal channel.
pub struct KeyboardListener {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl KeyboardListener {
    /// Start polling the terminal on a blocking thread.
    ///
    /// The terminal must already be in raw mode for single keys to arrive.
    pub fn spawn(tx: mpsc::Sender<Signal>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::task::spawn_blocking(move || {
            while !token.is_cancelled() {
                match event::poll(POLL_INTERVAL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        warn!(error = %e, "Terminal poll failed, keyboard closed");
                        break;
                    }
                }

                let signal = match event::read() {
                    Ok(ev) => signal_for_event(ev),
                    Err(e) => {
                        warn!(error = %e, "Terminal read failed, keyboard closed");
                        break;
                    }
                };

                if let Some(signal) = signal {
                    if tx.blocking_send(signal).is_err() {
                        break;
                    }
                }
            }
            debug!("Keyboard listener stopped");
        });

        Self { cancel, handle }
    }

    /// Stop polling and wait for the thread to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Forward Ctrl-C delivered as a process signal (outside raw mode).
pub fn spawn_ctrl_c(tx: mpsc::Sender<Signal>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(Signal::Interrupt).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn printable_keys_insert() {
        assert_eq!(
            signal_for_key(&press(KeyCode::Char('a'), KeyModifiers::NONE)),
            Some(Signal::Insert('a'))
        );
        assert_eq!(
            signal_for_key(&press(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some(Signal::Insert('A'))
        );
    }

    #[test]
    fn control_chords() {
        assert_eq!(
            signal_for_key(&press(KeyCode::Char('e'), KeyModifiers::CONTROL)),
            Some(Signal::Commit)
        );
        assert_eq!(
            signal_for_key(&press(KeyCode::Char('y'), KeyModifiers::CONTROL)),
            Some(Signal::Copy)
        );
        assert_eq!(
            signal_for_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Signal::Interrupt)
        );
        assert_eq!(
            signal_for_key(&press(KeyCode::Char('x'), KeyModifiers::CONTROL)),
            None
        );
    }

    #[test]
    fn editing_keys() {
        assert_eq!(
            signal_for_key(&press(KeyCode::Enter, KeyModifiers::NONE)),
            Some(Signal::Submit)
        );
        assert_eq!(
            signal_for_key(&press(KeyCode::Backspace, KeyModifiers::NONE)),
            Some(Signal::Backspace)
        );
        assert_eq!(
            signal_for_key(&press(KeyCode::Esc, KeyModifiers::NONE)),
            Some(Signal::Interrupt)
        );
        assert_eq!(signal_for_key(&press(KeyCode::F(5), KeyModifiers::NONE)), None);
    }

    #[test]
    fn releases_are_ignored() {
        let mut key = press(KeyCode::Char('a'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(signal_for_key(&key), None);
    }

    #[test]
    fn paste_events_become_paste_signals() {
        assert_eq!(
            signal_for_event(Event::Paste("hi there".into())),
            Some(Signal::Paste("hi there".into()))
        );
        assert_eq!(signal_for_event(Event::FocusGained), None);
    }
}
