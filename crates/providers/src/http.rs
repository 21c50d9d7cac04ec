//! Shared reqwest plumbing for the capture and tracking clients.

use std::time::Duration;

use timegap_core::error::SourceError;

pub(crate) fn build_client(service: &str, timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::Connectivity {
            service: service.into(),
            reason: format!("cannot build HTTP client: {e}"),
        })
}

/// Map a transport failure onto the source taxonomy.
pub(crate) fn source_error(service: &str, err: reqwest::Error, timeout: Duration) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout {
            service: service.into(),
            timeout_secs: timeout.as_secs(),
        }
    } else {
        SourceError::Connectivity {
            service: service.into(),
            reason: err.to_string(),
        }
    }
}
