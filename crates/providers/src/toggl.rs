//! Toggl Track client (read-only).
//!
//! Only `GET me/time_entries` is used. Creating entries is a separate,
//! explicitly approved action and is not implemented here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use timegap_config::AppConfig;
use timegap_core::error::SourceError;
use timegap_core::tracking::{TrackedEntry, TrackingSource};
use timegap_core::window::TimeWindow;
use tracing::{debug, warn};

use crate::http::{build_client, source_error};

const SERVICE: &str = "Toggl";

pub struct TogglClient {
    api_url: String,
    api_token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

/// The subset of a v9 time entry we read.
#[derive(Debug, Deserialize)]
struct ApiTimeEntry {
    #[serde(default)]
    description: Option<String>,
    start: String,
    /// Absent while the entry is running.
    #[serde(default)]
    stop: Option<String>,
    #[serde(default)]
    project_id: Option<i64>,
    #[serde(default)]
    task_id: Option<i64>,
}

impl TogglClient {
    pub fn new(
        api_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.filter(|t| !t.trim().is_empty()),
            timeout,
            client: build_client(SERVICE, timeout)?,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        Self::new(
            &config.tracking.api_url,
            config.tracking.api_token.clone(),
            config.network_timeout(),
        )
    }

    pub fn has_token(&self) -> bool {
        self.api_token.is_some()
    }
}

/// Convert API entries to tracked intervals inside `window`.
///
/// Running entries end at the window end. Entries outside the window are
/// discarded and the rest are clipped to it. Inverted entries touching the
/// window are passed through unclipped so gap detection rejects them.
fn to_tracked(entries: Vec<ApiTimeEntry>, window: &TimeWindow) -> Vec<TrackedEntry> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(start) = parse_instant(&entry.start) else {
            warn!(start = %entry.start, "Skipping time entry with unparseable start");
            continue;
        };
        let end = match entry.stop.as_deref() {
            None => window.end(),
            Some(stop) => match parse_instant(stop) {
                Some(end) => end,
                None => {
                    warn!(stop = %stop, "Skipping time entry with unparseable stop");
                    continue;
                }
            },
        };

        let (start, end) = if end < start {
            if !window.overlaps(end, start) {
                continue;
            }
            warn!(
                start = %start.to_rfc3339(),
                stop = %end.to_rfc3339(),
                "Time entry stops before it starts"
            );
            (start, end)
        } else {
            let Some(clamped) = window.clamp(start, end) else {
                continue;
            };
            clamped
        };

        out.push(TrackedEntry {
            start,
            end,
            description: entry.description.filter(|d| !d.is_empty()),
            project: entry.project_id.map(|id| id.to_string()),
            task: entry.task_id.map(|id| id.to_string()),
        });
    }
    out.sort_by_key(|e| e.start);
    out
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl TrackingSource for TogglClient {
    fn name(&self) -> &str {
        "toggl"
    }

    async fn fetch_entries(&self, window: &TimeWindow) -> Result<Vec<TrackedEntry>, SourceError> {
        let token = self
            .api_token
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("Toggl API token".into()))?;

        let url = format!("{}/me/time_entries", self.api_url);
        let response = self
            .client
            .get(&url)
            .basic_auth(token, Some("api_token"))
            .query(&[
                (
                    "start_date",
                    window.start().to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                (
                    "end_date",
                    window.end().to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
            ])
            .send()
            .await
            .map_err(|e| source_error(SERVICE, e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                service: SERVICE.into(),
                status_code: status.as_u16(),
                message: body,
            });
        }

        let entries: Vec<ApiTimeEntry> = response.json().await.map_err(|e| SourceError::Decode {
            service: SERVICE.into(),
            reason: e.to_string(),
        })?;

        let tracked = to_tracked(entries, window);
        debug!(count = tracked.len(), "Fetched tracked entries");
        Ok(tracked)
    }
}
