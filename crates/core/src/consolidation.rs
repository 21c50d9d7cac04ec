//! Consolidator trait: the abstraction over the semantic consolidation service.
//!
//! A Consolidator takes one bounded request (a gap, its samples, and the
//! user's free-text context) and returns labeled time blocks as raw text.
//! The response is untrusted: it is handed to the result validator before
//! anything reaches the user.
//!
//! Implementations: OpenAI-compatible chat completions.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::RawActivitySample;
use crate::error::ProviderError;
use crate::window::TimeWindow;

/// Everything the consolidation service is allowed to see for one gap.
///
/// Built fresh per gap; never mutated after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationRequest {
    /// Free-text context typed by the user.
    pub context_text: String,

    /// Samples clipped to `window_span`, ordered by timestamp.
    pub samples: Vec<RawActivitySample>,

    /// Blocks shorter than this are discarded.
    pub min_duration_seconds: i64,

    /// The originating gap's bounds.
    pub window_span: TimeWindow,
}

/// The service's reply, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConsolidation {
    pub content: String,

    /// Which model actually responded (may differ from requested).
    pub model: String,
}

/// A candidate labeled interval proposed for a gap, after validation.
///
/// Invariant: `start < end`, both within the originating gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedBlock {
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration: Duration,
    pub project: Option<String>,
    pub task: Option<String>,
}

impl ConsolidatedBlock {
    pub fn new(description: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            description: description.into(),
            start,
            end,
            duration: end - start,
            project: None,
            task: None,
        }
    }

    /// The block in wire form.
    pub fn to_record(&self) -> TimeEntryRecord {
        TimeEntryRecord {
            description: self.description.clone(),
            start_date: self.start.format("%Y-%m-%d").to_string(),
            start_time: self.start.format("%H:%M:%S").to_string(),
            end_date: self.end.format("%Y-%m-%d").to_string(),
            end_time: self.end.format("%H:%M:%S").to_string(),
            duration: format_hms(self.duration),
            project: self.project.clone(),
            task: self.task.clone(),
        }
    }
}

/// One block in the consolidation wire format.
///
/// Field names are the downstream contract and must stay snake_case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntryRecord {
    pub description: String,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `HH:MM:SS`, 24-hour
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    /// `HH:MM:SS`
    pub duration: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
}

/// Format a duration as `HH:MM:SS`. Negative durations format as zero.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// The core Consolidator trait.
#[async_trait]
pub trait Consolidator: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai").
    fn name(&self) -> &str;

    /// The model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Send one request and return the raw response text.
    async fn consolidate(
        &self,
        request: &ConsolidationRequest,
    ) -> std::result::Result<RawConsolidation, ProviderError>;
}
