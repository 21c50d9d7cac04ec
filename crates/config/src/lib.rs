//! Configuration loading, validation, and management for timegap.
//!
//! Loads configuration from `~/.timegap/config.toml` with environment
//! variable overrides. Validates all settings at startup; the resulting
//! value is immutable and handed to every component constructor.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.timegap/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Consolidated blocks (and gaps) shorter than this are discarded
    #[serde(default = "default_min_activity_duration")]
    pub min_activity_duration_minutes: u32,

    /// Uncovered slivers shorter than this are treated as boundary noise
    #[serde(default = "default_merge_tolerance")]
    pub merge_tolerance_secs: u64,

    /// Consolidation model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for the consolidation model
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Activity capture service
    #[serde(default)]
    pub activity: ActivityConfig,

    /// Time tracking service (read-only)
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Consolidation service
    #[serde(default)]
    pub consolidation: ConsolidationConfig,

    /// Network deadlines
    #[serde(default)]
    pub network: NetworkConfig,

    /// Default analysis window
    #[serde(default)]
    pub workday: WorkdayConfig,

    /// Timeline snapshot persistence
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Custom model pricing overrides (model name → pricing)
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverrideConfig>,
}

fn default_min_activity_duration() -> u32 {
    5
}
fn default_merge_tolerance() -> u64 {
    60
}

/// Upper bound for `merge_tolerance_secs`.
pub const MAX_MERGE_TOLERANCE_SECS: u64 = 3600;
fn default_model() -> String {
    "gpt-5-nano".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default = "default_activity_url")]
    pub base_url: String,

    /// Maximum events requested per bucket
    #[serde(default = "default_event_limit")]
    pub event_limit: u32,
}

fn default_activity_url() -> String {
    "http://localhost:5600".into()
}
fn default_event_limit() -> u32 {
    1000
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            base_url: default_activity_url(),
            event_limit: default_event_limit(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_tracking_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

fn default_tracking_url() -> String {
    "https://api.track.toggl.com/api/v9".into()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            api_url: default_tracking_url(),
            api_token: None,
        }
    }
}

impl std::fmt::Debug for TrackingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &redact(&self.api_token))
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// OpenAI-compatible base URL (`/chat/completions` is appended)
    #[serde(default = "default_consolidation_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Replace the built-in instructions with the contents of this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,

    /// Standing user context prepended to whatever is typed per gap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_file: Option<PathBuf>,
}

fn default_consolidation_url() -> String {
    "https://api.openai.com/v1".into()
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            api_url: default_consolidation_url(),
            api_key: None,
            prompt_file: None,
            context_file: None,
        }
    }
}

impl std::fmt::Debug for ConsolidationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolidationConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("prompt_file", &self.prompt_file)
            .field("context_file", &self.context_file)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Deadline for capture and tracking requests
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Deadline for one consolidation dispatch
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    15
}
fn default_dispatch_timeout() -> u64 {
    120
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            dispatch_timeout_secs: default_dispatch_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkdayConfig {
    #[serde(default)]
    pub start_hour: u32,

    /// Before this hour, the work day is still the previous one
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,
}

fn default_end_hour() -> u32 {
    4
}

impl Default for WorkdayConfig {
    fn default() -> Self {
        Self {
            start_hour: 0,
            end_hour: default_end_hour(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.timegap/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Secrets from the environment only fill in what the file left empty;
    /// everything else overrides the file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("AW_SERVER_URL") {
            self.activity.base_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("LLM_API_URL") {
            self.consolidation.api_url = url;
        }
        if let Some(minutes) = lookup("MIN_ACTIVITY_DURATION_MINUTES") {
            self.min_activity_duration_minutes = parse_env("MIN_ACTIVITY_DURATION_MINUTES", &minutes)?;
        }
        if let Some(hour) = lookup("WORK_DAY_START_HOUR") {
            self.workday.start_hour = parse_env("WORK_DAY_START_HOUR", &hour)?;
        }
        if let Some(hour) = lookup("WORK_DAY_END_HOUR") {
            self.workday.end_hour = parse_env("WORK_DAY_END_HOUR", &hour)?;
        }
        if self.tracking.api_token.is_none() {
            self.tracking.api_token = lookup("TOGGL_API_TOKEN");
        }
        if self.consolidation.api_key.is_none() {
            self.consolidation.api_key =
                lookup("TIMEGAP_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".timegap")
    }

    /// Where the timeline snapshot lives.
    pub fn snapshot_path() -> PathBuf {
        Self::config_dir().join("timeline_snapshot.json")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_activity_duration_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "min_activity_duration_minutes must be at least 1".into(),
            ));
        }

        if self.merge_tolerance_secs > MAX_MERGE_TOLERANCE_SECS {
            return Err(ConfigError::ValidationError(format!(
                "merge_tolerance_secs must be at most {MAX_MERGE_TOLERANCE_SECS}"
            )));
        }

        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.network.timeout_secs == 0 || self.network.dispatch_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "network timeouts must be greater than zero".into(),
            ));
        }

        if self.workday.start_hour > 23 || self.workday.end_hour > 23 {
            return Err(ConfigError::ValidationError(
                "workday hours must be between 0 and 23".into(),
            ));
        }

        if self.activity.base_url.trim().is_empty() || self.consolidation.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "service URLs must not be empty".into(),
            ));
        }

        Ok(())
    }

    pub fn min_activity_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.min_activity_duration_minutes))
    }

    pub fn merge_tolerance(&self) -> chrono::Duration {
        let secs = self.merge_tolerance_secs.min(MAX_MERGE_TOLERANCE_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.network.dispatch_timeout_secs)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            min_activity_duration_minutes: default_min_activity_duration(),
            merge_tolerance_secs: default_merge_tolerance(),
            model: default_model(),
            temperature: default_temperature(),
            activity: ActivityConfig::default(),
            tracking: TrackingConfig::default(),
            consolidation: ConsolidationConfig::default(),
            network: NetworkConfig::default(),
            workday: WorkdayConfig::default(),
            snapshot: SnapshotConfig::default(),
            custom_pricing: HashMap::new(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key}={value:?} is not a valid number")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.min_activity_duration_minutes, 5);
        assert_eq!(config.merge_tolerance_secs, 60);
        assert_eq!(config.activity.base_url, "http://localhost:5600");
        assert!(config.snapshot.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.network.timeout_secs, config.network.timeout_secs);
    }

    #[test]
    fn zero_min_duration_rejected() {
        let config = AppConfig {
            min_activity_duration_minutes: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn huge_merge_tolerance_rejected() {
        let config = AppConfig {
            merge_tolerance_secs: u64::MAX,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(
            config.merge_tolerance(),
            chrono::Duration::seconds(MAX_MERGE_TOLERANCE_SECS as i64)
        );
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.model, "gpt-5-nano");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "min_activity_duration_minutes = 10\n[snapshot]\nenabled = false\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.min_activity_duration_minutes, 10);
        assert!(!config.snapshot.enabled);
        assert_eq!(config.merge_tolerance_secs, 60);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("AW_SERVER_URL", "http://aw.local:5600"),
                ("LLM_MODEL", "gpt-4o-mini"),
                ("MIN_ACTIVITY_DURATION_MINUTES", "2"),
                ("TOGGL_API_TOKEN", "tok"),
            ]))
            .unwrap();
        assert_eq!(config.activity.base_url, "http://aw.local:5600");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.min_activity_duration_minutes, 2);
        assert_eq!(config.tracking.api_token.as_deref(), Some("tok"));
    }

    #[test]
    fn env_secret_does_not_replace_file_secret() {
        let mut config = AppConfig::default();
        config.consolidation.api_key = Some("from-file".into());
        config
            .apply_env(env(&[("OPENAI_API_KEY", "from-env")]))
            .unwrap();
        assert_eq!(config.consolidation.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn non_numeric_env_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("WORK_DAY_END_HOUR", "late")]))
            .unwrap_err();
        assert!(err.to_string().contains("WORK_DAY_END_HOUR"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.tracking.api_token = Some("super-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-5-nano"));
        assert!(toml_str.contains("localhost:5600"));
    }
}
