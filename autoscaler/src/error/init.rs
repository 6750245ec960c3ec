use displaydoc::Display;
use thiserror::Error;

/// Errors that can only occur during startup. All are fatal: `main`
/// logs and exits rather than attempting to run with partial state.
#[derive(Debug, Error, Display, strum::AsRefStr)]
pub enum InitError {
    /// failed to load configuration: {0}
    Config(#[from] config::ConfigError),
    /// failed to parse configuration: {0}
    ConfigParse(#[from] serde_path_to_error::Error<serde_json::Error>),
    /// configuration document is missing or malformed: {0}
    ConfigSource(String),
    /// initial app list fetch failed: {0}
    AppListFetch(String),
    /// invalid app configuration for {app_key}: {reason}
    InvalidAppConfig { app_key: String, reason: String },
    /// failed to install tracing subscriber: {0}
    Telemetry(#[from] telemetry::TelemetryError),
}
