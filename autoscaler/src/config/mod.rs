//! Process configuration.
//!
//! Two layers exist here, matching spec's distinction between "what
//! main needs to boot" and "what the fleet runs on":
//!
//! - [`Config`] is the local, static configuration: where to fetch the
//!   remote control document from, telemetry setup, and CLI-provided
//!   overrides. Loaded once via [`Config::try_read`].
//! - [`Settings`] is the *remote* control document fetched from the
//!   `ConfigSource` (interval, probe endpoints, alarm template). It is
//!   built once at startup and handed by `Arc` to every component that
//!   needs it; nothing mutates it afterwards.

pub mod app_config;
pub mod settings;
pub mod source;

pub use app_config::AppConfig;
pub use settings::Settings;
pub use source::ConfigSource;

use std::path::PathBuf;

use json_patch::merge;
use serde::{Deserialize, Serialize};

use crate::{error::InitError, types::Secret};

const DEFAULT_CONFIG_PATH: &str = "/etc/autoscaler/config.yaml";
const ENV_PREFIX: &str = "AUTOSCALER";

/// Local process configuration: where the remote control document
/// lives and how this process should present itself. Everything that
/// varies per-fleet-app lives in [`Settings`]/[`AppConfig`] instead.
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub telemetry: telemetry::Config,
    pub config_source: source::ConfigSourceSettings,
    /// Bearer token attached to every orchestrator request via
    /// `ApiClient`. Authenticated API *negotiation* is explicitly out
    /// of scope (spec.md §1); this is passthrough only.
    pub dcos_bearer_token: Option<Secret<String>>,
}

impl Config {
    /// Builds configuration from (in increasing priority): the default
    /// config path or an explicit `--config` file, then environment
    /// variables prefixed `AUTOSCALER__`.
    pub fn try_read(
        config_file_path: Option<PathBuf>,
    ) -> Result<Self, InitError> {
        let default_config = serde_json::to_value(Self::default())
            .expect("default config is serializable");
        let mut builder = config::Config::builder();
        if let Some(path) = config_file_path {
            builder = builder.add_source(config::File::from(path));
        } else if std::fs::exists(DEFAULT_CONFIG_PATH).unwrap_or_default() {
            builder = builder.add_source(config::File::from(PathBuf::from(
                DEFAULT_CONFIG_PATH,
            )));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__")
                .convert_case(config::Case::Kebab),
        );

        let input_config: serde_json::Value =
            builder.build()?.try_deserialize()?;

        let mut merged = default_config;
        merge(&mut merged, &input_config);

        let config: Config = serde_path_to_error::deserialize(merged)?;
        Ok(config)
    }
}
