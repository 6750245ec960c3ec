//! Structured logging initialization for the autoscaler binary.
//!
//! Kept deliberately small: the control plane has no inbound requests to
//! trace and no metrics export requirement, so this crate wires up
//! `tracing-subscriber` with an `EnvFilter` and nothing else.

use displaydoc::Display;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Telemetry configuration, nested under `Config::telemetry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit newline-delimited JSON instead of the default human format.
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Errors encountered while setting up the global subscriber.
#[derive(Debug, thiserror::Error, Display)]
pub enum TelemetryError {
    /// failed to install global tracing subscriber: {0}
    Init(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Installs the process-wide tracing subscriber.
///
/// Must be called exactly once, before any other component logs.
pub fn init_telemetry(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let registry = tracing_subscriber::fmt().with_env_filter(filter);

    if config.json {
        tracing::subscriber::set_global_default(registry.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(registry.finish())?;
    }

    Ok(())
}
