//! Gap detection: the uncovered parts of a window.
//!
//! Classic interval complement: sort the tracked intervals, walk the window,
//! and collect what lies between them and at both ends. Uncovered slivers
//! shorter than the merge tolerance are boundary noise from entry timestamps
//! and are absorbed into the neighbouring busy time. Spans shorter than the
//! minimum activity duration are dropped.
//!
//! Two uncovered spans separated by a very short tracked entry stay separate
//! gaps. Merging them would put part of a tracked interval inside a gap, and
//! gaps never overlap tracked time.

use chrono::{DateTime, Duration, Utc};
use timegap_config::AppConfig;
use timegap_core::error::Error;
use timegap_core::tracking::TrackedEntry;
use timegap_core::window::{Gap, TimeWindow};
use tracing::debug;

use crate::normalize::NormalizedSamples;

/// Computes gaps for a window. Deterministic; no side effects.
#[derive(Debug, Clone, Copy)]
pub struct GapDetector {
    min_duration: Duration,
    merge_tolerance: Duration,
}

impl GapDetector {
    pub fn new(min_duration: Duration, merge_tolerance: Duration) -> Self {
        Self {
            min_duration,
            merge_tolerance,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.min_activity_duration(), config.merge_tolerance())
    }

    pub fn min_duration(&self) -> Duration {
        self.min_duration
    }

    /// Uncovered spans of `window`, ordered and pairwise disjoint.
    ///
    /// Tracked entries must not overlap each other; overlapping input is a
    /// precondition violation and fails fast with [`Error::InvalidInput`].
    pub fn uncovered(
        &self,
        window: &TimeWindow,
        entries: &[TrackedEntry],
    ) -> Result<Vec<TimeWindow>, Error> {
        let busy = busy_intervals(window, entries)?;

        let mut spans = Vec::new();
        let mut cursor = window.start();
        for (start, end) in busy {
            self.push_span(&mut spans, cursor, start)?;
            cursor = cursor.max(end);
        }
        self.push_span(&mut spans, cursor, window.end())?;

        Ok(spans)
    }

    /// Gaps of `window` with the samples that fall inside each, clipped.
    pub fn detect(
        &self,
        window: &TimeWindow,
        entries: &[TrackedEntry],
        samples: &NormalizedSamples,
    ) -> Result<Vec<Gap>, Error> {
        let gaps: Vec<Gap> = self
            .uncovered(window, entries)?
            .into_iter()
            .map(|span| Gap {
                samples: samples.iter().filter_map(|s| s.clipped_to(&span)).collect(),
                span,
            })
            .collect();

        debug!(
            window = %window,
            entries = entries.len(),
            gaps = gaps.len(),
            "Detected gaps"
        );

        Ok(gaps)
    }

    fn push_span(
        &self,
        spans: &mut Vec<TimeWindow>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), Error> {
        if start >= end {
            return Ok(());
        }
        let length = end - start;
        if length < self.merge_tolerance || length < self.min_duration {
            return Ok(());
        }
        spans.push(TimeWindow::new(start, end)?);
        Ok(())
    }
}

/// Tracked intervals clipped to the window, sorted, checked for overlap.
fn busy_intervals(
    window: &TimeWindow,
    entries: &[TrackedEntry],
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, Error> {
    let mut busy = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.end < entry.start {
            return Err(Error::InvalidInput(format!(
                "tracked entry ends ({}) before it starts ({})",
                entry.end.to_rfc3339(),
                entry.start.to_rfc3339()
            )));
        }
        if let Some(clamped) = window.clamp(entry.start, entry.end) {
            busy.push(clamped);
        }
    }

    busy.sort();

    for pair in busy.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.0 < prev.1 {
            return Err(Error::InvalidInput(format!(
                "tracked entries overlap: [{}, {}) and [{}, {})",
                prev.0.format("%H:%M:%S"),
                prev.1.format("%H:%M:%S"),
                next.0.format("%H:%M:%S"),
                next.1.format("%H:%M:%S"),
            )));
        }
    }

    Ok(busy)
}
