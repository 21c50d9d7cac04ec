//! Per-gap outcomes and the end-of-session report.

use timegap_core::consolidation::ConsolidatedBlock;
use timegap_core::event::GapState;
use timegap_core::window::TimeWindow;

/// The live state of the gap being worked on.
///
/// Starts in Composing; only transitions allowed by
/// [`GapState::can_move_to`] are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapCursor {
    pub index: usize,
    state: GapState,
}

impl GapCursor {
    pub fn open(index: usize) -> Self {
        Self {
            index,
            state: GapState::Composing,
        }
    }

    pub fn state(&self) -> GapState {
        self.state
    }

    /// Move to `next`. Returns the previous state, or `None` when the
    /// transition is not allowed and the cursor stays put.
    pub fn move_to(&mut self, next: GapState) -> Option<GapState> {
        if !self.state.can_move_to(next) {
            return None;
        }
        Some(std::mem::replace(&mut self.state, next))
    }
}

/// Where one gap ended up.
#[derive(Debug, Clone)]
pub struct GapOutcome {
    pub index: usize,
    pub span: TimeWindow,
    pub state: GapState,
    pub reason: String,
    /// Non-empty only when `state` is Validated.
    pub blocks: Vec<ConsolidatedBlock>,
}

impl GapOutcome {
    pub fn new(index: usize, span: TimeWindow, state: GapState, reason: impl Into<String>) -> Self {
        Self {
            index,
            span,
            state,
            reason: reason.into(),
            blocks: Vec::new(),
        }
    }

    pub fn validated(index: usize, span: TimeWindow, blocks: Vec<ConsolidatedBlock>) -> Self {
        let reason = match blocks.len() {
            0 => "no blocks above the minimum duration".to_string(),
            1 => "1 block".to_string(),
            n => format!("{n} blocks"),
        };
        Self {
            index,
            span,
            state: GapState::Validated,
            reason,
            blocks,
        }
    }
}

/// Every gap of a session with its terminal state.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub outcomes: Vec<GapOutcome>,
    /// The run was stopped by an external interrupt.
    pub interrupted: bool,
}

impl SessionReport {
    pub fn count(&self, state: GapState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    /// Blocks from Validated gaps, in gap order.
    pub fn validated_blocks(&self) -> impl Iterator<Item = &ConsolidatedBlock> {
        self.outcomes
            .iter()
            .filter(|o| o.state == GapState::Validated)
            .flat_map(|o| o.blocks.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn cursor_follows_allowed_transitions() {
        let mut cursor = GapCursor::open(2);
        assert_eq!(cursor.state(), GapState::Composing);
        assert_eq!(cursor.move_to(GapState::Copied), Some(GapState::Composing));
        assert_eq!(cursor.move_to(GapState::Dispatching), Some(GapState::Copied));
        assert_eq!(cursor.move_to(GapState::Composing), None);
        assert_eq!(cursor.state(), GapState::Dispatching);
        assert_eq!(cursor.move_to(GapState::Validated), Some(GapState::Dispatching));
        assert!(cursor.state().is_terminal());
        assert_eq!(cursor.move_to(GapState::Aborted), None);
    }

    #[test]
    fn report_counts_and_collects() {
        let span = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 6, 8, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 8, 10, 0, 0).unwrap(),
        )
        .unwrap();
        let block = ConsolidatedBlock::new("Coding", span.start(), span.end());
        let report = SessionReport {
            outcomes: vec![
                GapOutcome::validated(0, span, vec![block]),
                GapOutcome::new(1, span, GapState::Skipped, "empty submission"),
                GapOutcome::new(2, span, GapState::Failed, "timed out"),
            ],
            interrupted: false,
        };
        assert_eq!(report.count(GapState::Validated), 1);
        assert_eq!(report.count(GapState::Aborted), 0);
        assert_eq!(report.validated_blocks().count(), 1);
        assert_eq!(report.outcomes[0].reason, "1 block");
    }
}
