//! Time windows and gaps.
//!
//! All intervals in timegap are half-open: `[start, end)`.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::RawActivitySample;
use crate::error::Error;

/// A half-open interval under analysis. Invariant: `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting empty or inverted spans.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, Error> {
        if start >= end {
            return Err(Error::InvalidInput(format!(
                "window start {} must be before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `[start, end)` shares any instant with this window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }

    /// Clamp `[start, end)` to this window. Returns `None` when nothing is left.
    pub fn clamp(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = start.max(self.start);
        let end = end.min(self.end);
        (start < end).then_some((start, end))
    }

    /// The window covering the current work day up to `now`.
    ///
    /// Before `end_hour` the work day is still yesterday's, so late-night
    /// sessions are attributed to the day they started on.
    pub fn workday(now: DateTime<Local>, start_hour: u32, end_hour: u32) -> Result<Self, Error> {
        let start_time = NaiveTime::from_hms_opt(start_hour, 0, 0).ok_or_else(|| {
            Error::InvalidInput(format!("work day start hour {start_hour} is out of range"))
        })?;

        let mut day = now.date_naive();
        if now.hour() < end_hour {
            day = day.pred_opt().unwrap_or(day);
        }

        let start = Local
            .from_local_datetime(&day.and_time(start_time))
            .earliest()
            .ok_or_else(|| Error::InvalidInput("work day start does not exist locally".into()))?;

        Self::new(start.with_timezone(&Utc), now.with_timezone(&Utc))
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// A maximal uncovered sub-interval of a window, at or above the minimum
/// activity duration, with the samples that fall inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    /// The gap bounds.
    pub span: TimeWindow,

    /// Normalized samples intersecting the gap, clipped to its bounds and
    /// ordered by timestamp.
    pub samples: Vec<RawActivitySample>,
}

impl Gap {
    pub fn start(&self) -> DateTime<Utc> {
        self.span.start()
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.span.end()
    }

    pub fn duration(&self) -> Duration {
        self.span.duration()
    }
}
