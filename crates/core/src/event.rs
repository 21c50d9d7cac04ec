//! Session event system: decoupled communication between the control loop
//! and whatever renders it.
//!
//! The control loop publishes events as gaps move through their states.
//! A terminal renderer (or a test) subscribes and reacts without the loop
//! knowing who is listening.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::window::TimeWindow;

/// Per-gap cursor through the interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapState {
    Composing,
    Copied,
    Dispatching,
    Validated,
    Failed,
    Skipped,
    Aborted,
}

impl GapState {
    /// Terminal states end the gap; the loop moves on (or stops, for Aborted).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Validated | Self::Failed | Self::Skipped | Self::Aborted
        )
    }

    /// Whether the session may move a gap from `self` to `next`.
    pub fn can_move_to(self, next: GapState) -> bool {
        use GapState::*;
        match self {
            Composing => matches!(next, Copied | Dispatching | Skipped | Aborted),
            Copied => matches!(next, Composing | Dispatching | Skipped | Aborted),
            Dispatching => matches!(next, Validated | Failed | Aborted),
            Validated | Failed | Skipped | Aborted => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Composing => "composing",
            Self::Copied => "copied",
            Self::Dispatching => "dispatching",
            Self::Validated => "validated",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for GapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// All events published by an interactive session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A gap is up for review.
    GapOpened {
        index: usize,
        total: usize,
        span: TimeWindow,
        sample_count: usize,
    },

    /// The context text changed; the estimate was refreshed.
    ContextEdited {
        index: usize,
        context: String,
        tokens: usize,
        cost_usd: Option<f64>,
    },

    /// The payload was exported.
    PayloadCopied {
        index: usize,
        backend: String,
        chars: usize,
    },

    /// The request was handed to the consolidation service.
    DispatchStarted {
        index: usize,
        model: String,
        tokens: usize,
    },

    /// A gap moved from one state to another.
    StateChanged {
        index: usize,
        from: GapState,
        to: GapState,
    },

    /// A commit arrived while a dispatch was already in flight.
    DispatchIgnored { index: usize },

    /// The gap reached a terminal state.
    GapResolved {
        index: usize,
        state: GapState,
        reason: String,
        blocks: usize,
    },
}

/// A broadcast-based event bus for session events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<SessionEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: SessionEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SessionEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
