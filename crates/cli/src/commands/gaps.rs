//! `timegap gaps`: list untracked gaps without consolidating.

use chrono::Local;
use timegap_config::AppConfig;
use timegap_providers::{ActivityWatchClient, TogglClient};
use tracing::warn;

use super::WindowArgs;
use crate::pipeline::{self, Timeline};
use crate::render;
use crate::snapshot::SnapshotStore;

pub async fn run(window: WindowArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if fetch_timeline(&config, &window).await?.is_none() {
        eprintln!("Interrupted.");
    }
    Ok(())
}

/// Fetch, reconcile, snapshot and print the timeline.
///
/// Returns `None` when Ctrl-C arrives during the fetch.
pub(crate) async fn fetch_timeline(
    config: &AppConfig,
    args: &WindowArgs,
) -> Result<Option<Timeline>, Box<dyn std::error::Error>> {
    let window = args.resolve(config, Local::now())?;
    let activity = ActivityWatchClient::from_config(config)?;
    let tracking = TogglClient::from_config(config)?;

    println!("Fetching activity from {} ...", activity.base_url());

    let timeline = tokio::select! {
        result = pipeline::collect(config, window, &activity, &tracking) => result?,
        _ = tokio::signal::ctrl_c() => return Ok(None),
    };

    let new_events = if config.snapshot.enabled && !args.no_snapshot {
        let store = SnapshotStore::new(AppConfig::snapshot_path());
        match store.replace(&timeline.window, &timeline.events) {
            Ok(new) => Some(new),
            Err(e) => {
                warn!(path = %store.path().display(), error = %e, "Snapshot not saved");
                None
            }
        }
    } else {
        None
    };

    println!();
    for line in render::timeline_lines(&timeline, new_events) {
        println!("{line}");
    }
    println!();

    Ok(Some(timeline))
}
