//! Fetch and reconcile: everything a run does before the interactive loop.

use timegap_config::AppConfig;
use timegap_core::activity::{ActivitySource, CapturedEvent};
use timegap_core::error::{Error, SourceError};
use timegap_core::tracking::{TrackedEntry, TrackingSource};
use timegap_core::window::{Gap, TimeWindow};
use timegap_reconcile::{GapDetector, NormalizedSamples, normalize};
use tracing::{info, warn};

/// The reconciled state of one window.
#[derive(Debug)]
pub struct Timeline {
    pub window: TimeWindow,
    pub events: Vec<CapturedEvent>,
    pub entries: Vec<TrackedEntry>,
    pub samples: NormalizedSamples,
    pub gaps: Vec<Gap>,
    /// Collaborators that could not be reached; the run went on without them.
    pub unavailable: Vec<SourceError>,
}

impl Timeline {
    pub fn gaps_with_activity(&self) -> usize {
        self.gaps
            .iter()
            .filter(|g| g.samples.iter().any(|s| !s.is_afk))
            .count()
    }
}

/// Fetch samples and tracked entries for `window`, then detect gaps.
///
/// An unreachable collaborator is recorded and treated as empty. Only
/// invalid input (e.g. overlapping tracked entries) fails the run.
pub async fn collect(
    config: &AppConfig,
    window: TimeWindow,
    activity: &dyn ActivitySource,
    tracking: &dyn TrackingSource,
) -> Result<Timeline, Error> {
    let mut unavailable = Vec::new();

    let events = match fetch_events(activity, &window).await {
        Ok(events) => events,
        Err(e) => {
            warn!(source = %activity.name(), error = %e, "Activity capture unavailable");
            unavailable.push(e);
            Vec::new()
        }
    };

    let entries = match tracking.fetch_entries(&window).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(source = %tracking.name(), error = %e, "Time tracking unavailable");
            unavailable.push(e);
            Vec::new()
        }
    };

    let samples = normalize(&events);
    let gaps = GapDetector::from_config(config).detect(&window, &entries, &samples)?;

    info!(
        window = %window,
        events = events.len(),
        samples = samples.len(),
        entries = entries.len(),
        gaps = gaps.len(),
        "Timeline reconciled"
    );

    Ok(Timeline {
        window,
        events,
        entries,
        samples,
        gaps,
        unavailable,
    })
}

async fn fetch_events(
    activity: &dyn ActivitySource,
    window: &TimeWindow,
) -> Result<Vec<CapturedEvent>, SourceError> {
    activity.health_check().await?;
    activity.fetch_events(window).await
}
