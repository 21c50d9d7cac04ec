//! Activity capture: raw events and normalized samples.
//!
//! A capture service (ActivityWatch) records what the user's machine was
//! doing, bucket by bucket. Raw [`CapturedEvent`]s come off the wire with
//! string timestamps and free-form data; the normalizer turns them into
//! [`RawActivitySample`]s.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::window::TimeWindow;

/// A capture bucket (one watcher on one host).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: String,

    /// Watcher type, e.g. `currentwindow`, `afkstatus`, `web.tab.current`.
    #[serde(rename = "type", default)]
    pub bucket_type: String,

    #[serde(default)]
    pub hostname: String,

    #[serde(default)]
    pub client: String,
}

impl Bucket {
    /// Whether this bucket records presence rather than activity.
    pub fn is_afk_bucket(&self) -> bool {
        self.bucket_type == "afkstatus" || self.id.starts_with("aw-watcher-afk")
    }
}

/// An event exactly as the capture service reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedEvent {
    /// The bucket this event came from (filled in by the client).
    #[serde(default)]
    pub bucket_id: String,

    /// The bucket's watcher type (filled in by the client).
    #[serde(default)]
    pub bucket_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// ISO-8601 timestamp, unparsed.
    pub timestamp: String,

    /// Duration in seconds.
    #[serde(default)]
    pub duration: f64,

    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// A single normalized activity sample. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivitySample {
    pub timestamp: DateTime<Utc>,

    /// Non-negative length of the sample in seconds.
    pub duration_seconds: f64,

    pub app: String,

    pub title: String,

    /// Presence marker rather than activity. Never sent for consolidation.
    #[serde(default, skip_serializing)]
    pub is_afk: bool,
}

impl RawActivitySample {
    /// Exclusive end of the sample interval, or `None` when it is not
    /// representable.
    pub fn checked_end(&self) -> Option<DateTime<Utc>> {
        // f64 -> i64 saturates
        let millis = (self.duration_seconds * 1000.0).round() as i64;
        Duration::try_milliseconds(millis).and_then(|d| self.timestamp.checked_add_signed(d))
    }

    /// Exclusive end of the sample interval, saturating at the latest
    /// representable instant.
    pub fn end(&self) -> DateTime<Utc> {
        self.checked_end().unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the sample interval intersects `window`.
    ///
    /// A zero-length sample intersects when its instant lies inside the window.
    pub fn intersects(&self, window: &TimeWindow) -> bool {
        if self.duration_seconds <= 0.0 {
            return self.timestamp >= window.start() && self.timestamp < window.end();
        }
        window.overlaps(self.timestamp, self.end())
    }

    /// A copy of this sample with its interval trimmed to `window`.
    ///
    /// Returns `None` when the sample does not intersect the window.
    pub fn clipped_to(&self, window: &TimeWindow) -> Option<Self> {
        if !self.intersects(window) {
            return None;
        }
        let start = self.timestamp.max(window.start());
        let end = self.end().min(window.end()).max(start);
        Some(Self {
            timestamp: start,
            duration_seconds: (end - start).num_milliseconds() as f64 / 1000.0,
            app: self.app.clone(),
            title: self.title.clone(),
            is_afk: self.is_afk,
        })
    }
}

/// The activity capture collaborator.
///
/// Bucket discovery is resolved inside the implementation; callers only ask
/// for everything captured within a window.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// A human-readable name for this source (e.g., "activitywatch").
    fn name(&self) -> &str;

    /// Can we reach the service?
    async fn health_check(&self) -> Result<(), SourceError>;

    /// List the buckets the service knows about.
    async fn buckets(&self) -> Result<Vec<Bucket>, SourceError>;

    /// Fetch every raw event captured within `window`, across all buckets.
    async fn fetch_events(&self, window: &TimeWindow) -> Result<Vec<CapturedEvent>, SourceError>;
}
