//! Timeline snapshot persistence.
//!
//! Each run stores the raw events it fetched so the next run can report how
//! much is new. The file is overwritten every time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use timegap_core::activity::CapturedEvent;
use timegap_core::error::Error;
use timegap_core::window::TimeWindow;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub event_count: usize,
    pub events: Vec<CapturedEvent>,
}

impl TimelineSnapshot {
    pub fn new(window: &TimeWindow, events: Vec<CapturedEvent>) -> Self {
        Self {
            fetched_at: Utc::now(),
            start: window.start(),
            end: window.end(),
            event_count: events.len(),
            events,
        }
    }

    /// How many of `events` this snapshot does not contain.
    pub fn count_new(&self, events: &[CapturedEvent]) -> usize {
        let known: HashSet<String> = self.events.iter().map(event_key).collect();
        events
            .iter()
            .filter(|e| !known.contains(&event_key(e)))
            .count()
    }
}

/// Identity of an event across runs: its id when the service gave one.
fn event_key(event: &CapturedEvent) -> String {
    match event.id {
        Some(id) => format!("{}#{id}", event.bucket_id),
        None => format!(
            "{}@{}:{}",
            event.bucket_id,
            event.timestamp,
            serde_json::Value::Object(event.data.clone())
        ),
    }
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The previous snapshot, if one was written.
    pub fn load(&self) -> Result<Option<TimelineSnapshot>, Error> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Internal(format!("failed to read {}: {e}", self.path.display()))
        })?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, snapshot: &TimelineSnapshot) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Internal(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&self.path, json).map_err(|e| {
            Error::Internal(format!("failed to write {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), events = snapshot.event_count, "Snapshot saved");
        Ok(())
    }

    /// Store `events` and return how many were not in the previous snapshot.
    pub fn replace(&self, window: &TimeWindow, events: &[CapturedEvent]) -> Result<usize, Error> {
        let new_events = match self.load() {
            Ok(Some(previous)) => previous.count_new(events),
            Ok(None) => events.len(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable snapshot");
                events.len()
            }
        };
        self.save(&TimelineSnapshot::new(window, events.to_vec()))?;
        Ok(new_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 6, 8, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 8, 10, 30, 0).unwrap(),
        )
        .unwrap()
    }

    fn event(id: Option<i64>, ts: &str) -> CapturedEvent {
        CapturedEvent {
            bucket_id: "aw-watcher-window_laptop".into(),
            bucket_type: "currentwindow".into(),
            id,
            timestamp: ts.into(),
            duration: 60.0,
            data: serde_json::Map::new(),
        }
    }

    #[test]
    fn first_run_counts_everything_as_new() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("timeline_snapshot.json"));
        let events = vec![event(Some(1), "2025-06-08T09:00:00Z")];
        assert_eq!(store.replace(&window(), &events).unwrap(), 1);

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.event_count, 1);
        assert_eq!(saved.start, window().start());
    }

    #[test]
    fn second_run_counts_only_new_events() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested").join("snap.json"));
        store
            .replace(
                &window(),
                &[event(Some(1), "2025-06-08T09:00:00Z"), event(None, "2025-06-08T09:05:00Z")],
            )
            .unwrap();

        let next = [
            event(Some(1), "2025-06-08T09:00:00Z"),
            event(None, "2025-06-08T09:05:00Z"),
            event(Some(2), "2025-06-08T09:10:00Z"),
            event(None, "2025-06-08T09:15:00Z"),
        ];
        assert_eq!(store.replace(&window(), &next).unwrap(), 2);
        assert_eq!(store.load().unwrap().unwrap().event_count, 4);
    }

    #[test]
    fn corrupt_snapshot_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = SnapshotStore::new(&path);

        assert!(store.load().is_err());
        assert_eq!(store.replace(&window(), &[event(Some(9), "2025-06-08T09:00:00Z")]).unwrap(), 1);
        assert!(store.load().unwrap().is_some());
    }
}
