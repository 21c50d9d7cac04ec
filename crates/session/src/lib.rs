//! # timegap Session
//!
//! The interactive half of a run: one gap at a time the user types context,
//! optionally copies the payload, and dispatches it for consolidation.

pub mod clipboard;
pub mod control_loop;
pub mod keyboard;
pub mod state;

pub use clipboard::{ClipboardAdapter, ClipboardBackend, CommandClipboard, CopyReport};
pub use control_loop::ControlLoop;
pub use keyboard::{KeyboardListener, RawModeGuard, Signal};
pub use state::{GapCursor, GapOutcome, SessionReport};
