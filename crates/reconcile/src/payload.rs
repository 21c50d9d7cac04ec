//! Payload assembly: one bounded consolidation request per gap.

use chrono::Duration;
use timegap_core::consolidation::ConsolidationRequest;
use timegap_core::window::Gap;

/// Builds requests that never reference time outside their gap.
#[derive(Debug, Clone)]
pub struct PayloadAssembler {
    min_duration: Duration,
    /// Context that applies to every gap, e.g. read from a context file.
    standing_context: Option<String>,
}

impl PayloadAssembler {
    pub fn new(min_duration: Duration) -> Self {
        Self {
            min_duration,
            standing_context: None,
        }
    }

    pub fn with_standing_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.standing_context = (!context.trim().is_empty()).then(|| context.trim().to_string());
        self
    }

    pub fn assemble(&self, gap: &Gap, context: &str) -> ConsolidationRequest {
        let samples = gap
            .samples
            .iter()
            .filter(|s| !s.is_afk)
            .filter_map(|s| s.clipped_to(&gap.span))
            .collect();

        ConsolidationRequest {
            context_text: self.context_text(context),
            samples,
            min_duration_seconds: self.min_duration.num_seconds(),
            window_span: gap.span,
        }
    }

    fn context_text(&self, typed: &str) -> String {
        let typed = typed.trim();
        match (&self.standing_context, typed.is_empty()) {
            (Some(standing), true) => standing.clone(),
            (Some(standing), false) => format!("{standing}\n\n{typed}"),
            (None, _) => typed.to_string(),
        }
    }
}
