//! Event normalization from raw capture events to ordered activity samples.
//!
//! Pure transform: parses timestamps, flags presence-only events as AFK,
//! drops them, collapses exact duplicates, and sorts by timestamp.
//! Unparseable events are dropped and reported, never fatal.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use timegap_core::activity::{CapturedEvent, RawActivitySample};
use timegap_core::error::NormalizationError;
use tracing::{debug, warn};

/// Apps that only ever show up while the machine is locked.
const LOCK_SCREEN_APPS: &[&str] = &["loginwindow", "LockApp.exe", "lockscreen"];

/// The normalized sample set for one window.
///
/// Iteration is lazy and can be restarted any number of times.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSamples {
    samples: Vec<RawActivitySample>,
    /// Events that could not be parsed.
    pub rejected: Vec<NormalizationError>,
    /// How many AFK samples were removed.
    pub afk_dropped: usize,
    /// How many exact duplicates were collapsed.
    pub duplicates_dropped: usize,
}

impl NormalizedSamples {
    pub fn iter(&self) -> std::slice::Iter<'_, RawActivitySample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[RawActivitySample] {
        &self.samples
    }
}

impl<'a> IntoIterator for &'a NormalizedSamples {
    type Item = &'a RawActivitySample;
    type IntoIter = std::slice::Iter<'a, RawActivitySample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Parse one captured event into a sample.
pub fn parse_event(event: &CapturedEvent) -> Result<RawActivitySample, NormalizationError> {
    let reject = |reason: String| NormalizationError {
        bucket: event.bucket_id.clone(),
        timestamp: event.timestamp.clone(),
        reason,
    };

    let timestamp = DateTime::parse_from_rfc3339(event.timestamp.trim())
        .map_err(|e| reject(format!("bad timestamp: {e}")))?
        .with_timezone(&Utc);

    if !event.duration.is_finite() || event.duration < 0.0 {
        return Err(reject(format!("bad duration: {}", event.duration)));
    }

    let afk_bucket =
        event.bucket_type == "afkstatus" || event.bucket_id.starts_with("aw-watcher-afk");

    let (app, title) = if afk_bucket {
        ("afk".to_string(), data_str(event, "status").unwrap_or_default())
    } else {
        let app = data_str(event, "app")
            .or_else(|| browser_name(&event.bucket_id))
            .unwrap_or_else(|| event.bucket_id.clone());
        let title = data_str(event, "title")
            .filter(|t| !t.is_empty())
            .or_else(|| data_str(event, "url"))
            .unwrap_or_default();
        (app, title)
    };

    let is_afk = afk_bucket || LOCK_SCREEN_APPS.contains(&app.as_str());

    let sample = RawActivitySample {
        timestamp,
        duration_seconds: event.duration,
        app,
        title,
        is_afk,
    };
    if sample.checked_end().is_none() {
        return Err(reject(format!("duration out of range: {}", event.duration)));
    }
    Ok(sample)
}

/// `aw-watcher-web-firefox_laptop` -> `firefox`
fn browser_name(bucket_id: &str) -> Option<String> {
    let rest = bucket_id.strip_prefix("aw-watcher-web-")?;
    let browser = rest.split('_').next().unwrap_or(rest);
    (!browser.is_empty()).then(|| browser.to_string())
}

fn data_str(event: &CapturedEvent, key: &str) -> Option<String> {
    event
        .data
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Normalize the raw events captured for one window.
pub fn normalize(events: &[CapturedEvent]) -> NormalizedSamples {
    let mut out = NormalizedSamples::default();
    let mut seen: HashSet<(DateTime<Utc>, String, String)> = HashSet::new();

    for event in events {
        let sample = match parse_event(event) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(bucket = %e.bucket, reason = %e.reason, "Dropping unparseable sample");
                out.rejected.push(e);
                continue;
            }
        };

        if sample.is_afk {
            out.afk_dropped += 1;
            continue;
        }

        if !seen.insert((sample.timestamp, sample.app.clone(), sample.title.clone())) {
            out.duplicates_dropped += 1;
            continue;
        }

        out.samples.push(sample);
    }

    out.samples.sort_by_key(|s| s.timestamp);

    debug!(
        kept = out.samples.len(),
        afk = out.afk_dropped,
        duplicates = out.duplicates_dropped,
        rejected = out.rejected.len(),
        "Normalized samples"
    );

    out
}
