//! Error types for the timegap domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum; the top-level
//! [`Error`] is what aborts a whole run.

use thiserror::Error;

/// The top-level error type for timegap operations.
///
/// Only [`Error::InvalidInput`] (and an external interrupt, which is not an
/// error) abort a run. Everything else is isolated to a single gap.
#[derive(Debug, Error)]
pub enum Error {
    // --- Precondition violations ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Sample parsing ---
    #[error("Normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    // --- Capture / tracking collaborators ---
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    // --- Consolidation collaborator ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Consolidation result ---
    #[error("Malformed result: {0}")]
    Malformed(#[from] MalformedResult),

    // --- Clipboard ---
    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A raw capture record that could not be turned into a sample.
///
/// The offending record is dropped; processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unparseable sample in bucket '{bucket}': {reason} (timestamp: {timestamp:?})")]
pub struct NormalizationError {
    pub bucket: String,
    pub timestamp: String,
    pub reason: String,
}

/// Failures talking to the activity capture or time tracking services.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("{service} unreachable: {reason}")]
    Connectivity { service: String, reason: String },

    #[error("{service} request timed out after {timeout_secs}s")]
    Timeout { service: String, timeout_secs: u64 },

    #[error("{service} returned status {status_code}: {message}")]
    Api {
        service: String,
        status_code: u16,
        message: String,
    },

    #[error("{service} response could not be decoded: {reason}")]
    Decode { service: String, reason: String },

    #[error("{0} is not configured")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether this failure means the service could not be reached in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// A consolidation response that failed validation.
///
/// The whole batch for the gap is rejected; nothing partial is surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedResult {
    #[error("response is not valid JSON: {0}")]
    NotJson(String),

    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("block {index}: missing required field '{field}'")]
    MissingField { index: usize, field: String },

    #[error("block {index}: field '{field}' is invalid: {reason}")]
    InvalidField {
        index: usize,
        field: String,
        reason: String,
    },

    #[error("block {index}: end {end} does not follow start {start}")]
    NonChronological {
        index: usize,
        start: String,
        end: String,
    },

    #[error("blocks '{first}' and '{second}' overlap")]
    Overlap { first: String, second: String },
}
