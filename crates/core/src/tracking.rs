//! Time tracking: entries the user has already recorded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::window::TimeWindow;

/// A previously recorded, already-labeled interval. Read-only to timegap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntry {
    pub start: DateTime<Utc>,

    /// `start + duration`.
    pub end: DateTime<Utc>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub task: Option<String>,
}

impl TrackedEntry {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            description: None,
            project: None,
            task: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The time tracking collaborator.
///
/// Only reads are part of this trait. Creating entries is a separate,
/// explicitly approved action that timegap never performs on its own.
#[async_trait]
pub trait TrackingSource: Send + Sync {
    /// A human-readable name for this source (e.g., "toggl").
    fn name(&self) -> &str;

    /// Fetch entries overlapping `window`, clipped to it.
    async fn fetch_entries(&self, window: &TimeWindow) -> Result<Vec<TrackedEntry>, SourceError>;
}
