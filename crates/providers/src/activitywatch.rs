//! ActivityWatch capture client.
//!
//! Talks to the local aw-server REST API (`/api/0`): connectivity via
//! `/info`, bucket discovery via `/buckets`, and per-bucket event queries
//! bounded by the analysis window.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use timegap_config::AppConfig;
use timegap_core::activity::{ActivitySource, Bucket, CapturedEvent};
use timegap_core::error::SourceError;
use timegap_core::window::TimeWindow;
use tracing::{debug, warn};

use crate::http::{build_client, source_error};

const SERVICE: &str = "ActivityWatch";

pub struct ActivityWatchClient {
    base_url: String,
    event_limit: u32,
    timeout: Duration,
    client: reqwest::Client,
}

/// An event as aw-server returns it; the bucket is implied by the URL.
#[derive(Debug, Deserialize)]
struct ApiEvent {
    #[serde(default)]
    id: Option<i64>,
    timestamp: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    data: serde_json::Map<String, serde_json::Value>,
}

impl ActivityWatchClient {
    pub fn new(
        base_url: impl Into<String>,
        event_limit: u32,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            event_limit,
            timeout,
            client: build_client(SERVICE, timeout)?,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        Self::new(
            &config.activity.base_url,
            config.activity.event_limit,
            config.network_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/0/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let url = self.api_url(path);
        debug!(url = %url, "ActivityWatch request");

        let response = self
            .client
            .get(&url)
            .query(query)
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

        response.json().await.map_err(|e| SourceError::Decode {
            service: SERVICE.into(),
            reason: e.to_string(),
        })
    }

    async fn bucket_events(
        &self,
        bucket: &Bucket,
        window: &TimeWindow,
    ) -> Result<Vec<CapturedEvent>, SourceError> {
        let query = [
            (
                "start",
                window.start().to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            (
                "end",
                window.end().to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            ("limit", self.event_limit.to_string()),
        ];
        let events: Vec<ApiEvent> = self
            .get_json(&format!("buckets/{}/events", bucket.id), &query)
            .await?;

        Ok(events
            .into_iter()
            .map(|e| CapturedEvent {
                bucket_id: bucket.id.clone(),
                bucket_type: bucket.bucket_type.clone(),
                id: e.id,
                timestamp: e.timestamp,
                duration: e.duration,
                data: e.data,
            })
            .collect())
    }
}

#[async_trait]
impl ActivitySource for ActivityWatchClient {
    fn name(&self) -> &str {
        "activitywatch"
    }

    async fn health_check(&self) -> Result<(), SourceError> {
        let _: serde_json::Value = self.get_json("info", &[]).await?;
        Ok(())
    }

    async fn buckets(&self) -> Result<Vec<Bucket>, SourceError> {
        let by_id: HashMap<String, Bucket> = self.get_json("buckets/", &[]).await?;
        let mut buckets: Vec<Bucket> = by_id
            .into_iter()
            .map(|(id, mut bucket)| {
                if bucket.id.is_empty() {
                    bucket.id = id;
                }
                bucket
            })
            .collect();
        buckets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(buckets)
    }

    /// Events from every bucket. A bucket that fails is skipped.
    async fn fetch_events(&self, window: &TimeWindow) -> Result<Vec<CapturedEvent>, SourceError> {
        let buckets = self.buckets().await?;
        let mut events = Vec::new();

        for bucket in &buckets {
            match self.bucket_events(bucket, window).await {
                Ok(batch) => {
                    debug!(bucket = %bucket.id, count = batch.len(), "Fetched bucket events");
                    events.extend(batch);
                }
                Err(e @ SourceError::Connectivity { .. }) | Err(e @ SourceError::Timeout { .. }) => {
                    return Err(e);
                }
                Err(e) => {
                    warn!(bucket = %bucket.id, error = %e, "Skipping bucket");
                }
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client =
            ActivityWatchClient::new("http://localhost:5600/", 100, Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5600");
        assert_eq!(client.api_url("info"), "http://localhost:5600/api/0/info");
    }

    #[test]
    fn from_config_uses_activity_section() {
        let mut config = AppConfig::default();
        config.activity.base_url = "http://aw.local:5666".into();
        let client = ActivityWatchClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "http://aw.local:5666");
        assert_eq!(client.event_limit, 1000);
    }

    #[test]
    fn api_event_tolerates_missing_fields() {
        let event: ApiEvent =
            serde_json::from_str(r#"{"timestamp": "2025-06-08T09:41:00.000Z"}"#).unwrap();
        assert_eq!(event.id, None);
        assert_eq!(event.duration, 0.0);
        assert!(event.data.is_empty());
    }
}
