//! The remote source of truth: where `Settings` and the desired app
//! list come from.
//!
//! Two implementations exist because the original system had two
//! overlapping entry points (see `SPEC_FULL.md` §9, Open question 2).
//! The HTTP-polled source is the production path; the environment
//! variable source is kept as an explicit, opt-in secondary source for
//! local and offline runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{AppConfig, Settings};
use crate::error::{InitError, RuntimeError};

/// Local configuration selecting and parameterizing the `ConfigSource`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ConfigSourceSettings {
    /// URL of the remote settings document. When set, `HttpConfigSource`
    /// is used.
    pub settings_url: Option<String>,
    /// Name of an environment variable holding the entire settings +
    /// app-list document as JSON. Used only when `settings_url` is
    /// unset; see `EnvConfigSource`.
    pub legacy_env_var: Option<String>,
}

/// Document shape returned by `scale_api_url`: `{"data": {"marathon_apps": [...]}}`.
#[derive(Debug, Deserialize)]
struct AppListDocument {
    data: AppListData,
}

#[derive(Debug, Deserialize)]
struct AppListData {
    marathon_apps: Vec<AppConfig>,
}

/// Supplies `Settings` at startup and the desired app list on every
/// reconciliation tick. Implementations decide internally whether a
/// fetch failure should be surfaced as fatal (startup) or skipped
/// (reconciliation) — the trait itself only reports what happened.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch_settings(&self) -> Result<Settings, InitError>;
    async fn fetch_apps(
        &self,
        scale_api_url: &Url,
    ) -> Result<Vec<AppConfig>, RuntimeError>;
}

/// Production `ConfigSource`: both documents are plain HTTP GETs.
pub struct HttpConfigSource {
    client: reqwest::Client,
    settings_url: Url,
}

impl HttpConfigSource {
    #[must_use]
    pub fn new(client: reqwest::Client, settings_url: Url) -> Self {
        Self {
            client,
            settings_url,
        }
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn fetch_settings(&self) -> Result<Settings, InitError> {
        let response = self
            .client
            .get(self.settings_url.clone())
            .send()
            .await
            .map_err(|e| InitError::ConfigSource(e.to_string()))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| InitError::ConfigSource(e.to_string()))?;
        Settings::from_document(&body)
    }

    async fn fetch_apps(
        &self,
        scale_api_url: &Url,
    ) -> Result<Vec<AppConfig>, RuntimeError> {
        let response = self
            .client
            .get(scale_api_url.clone())
            .send()
            .await
            .map_err(|e| {
                RuntimeError::Transport(scale_api_url.to_string(), e.to_string())
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::Http {
                status: status.as_u16(),
                path: scale_api_url.to_string(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let doc: AppListDocument = response.json().await.map_err(|e| {
            RuntimeError::Metric(format!("malformed app list document: {e}"))
        })?;
        Ok(doc.data.marathon_apps)
    }
}

/// Legacy `ConfigSource`: both documents are parsed out of a single
/// environment variable holding the full document
/// (`{..settings fields.., "data": {"marathon_apps": [...]}}`).
/// Re-reads the variable on every call so a supervisor restart or a
/// process manager that rewrites the environment takes effect without
/// a code change, matching the original's behavior of re-reading
/// `AUTOSCALE_ARGS` on every poll.
pub struct EnvConfigSource {
    var_name: String,
}

impl EnvConfigSource {
    #[must_use]
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }

    fn read(&self) -> Result<serde_json::Value, String> {
        let raw = std::env::var(&self.var_name).map_err(|_| {
            format!("environment variable {} is not set", self.var_name)
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("malformed {} document: {e}", self.var_name))
    }
}

#[async_trait]
impl ConfigSource for EnvConfigSource {
    async fn fetch_settings(&self) -> Result<Settings, InitError> {
        let value = self.read().map_err(InitError::ConfigSource)?;
        Settings::from_document(value.to_string().as_bytes())
    }

    async fn fetch_apps(
        &self,
        _scale_api_url: &Url,
    ) -> Result<Vec<AppConfig>, RuntimeError> {
        let value = self.read().map_err(RuntimeError::Metric)?;
        let doc: AppListDocument = serde_json::from_value(value)
            .map_err(|e| RuntimeError::Metric(e.to_string()))?;
        Ok(doc.data.marathon_apps)
    }
}
