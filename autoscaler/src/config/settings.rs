use std::{collections::HashMap, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::error::InitError;

/// Wire shape of the remote control document, `GET`-ed once at startup
/// and re-fetched on `InitError`-fatal failure only (mid-run refetch of
/// this document is out of scope; only the app list is re-polled).
///
/// Field names and the `internal` typo are the orchestrator's, not
/// ours; wire formats are not ours to rename.
#[derive(Debug, Deserialize)]
struct RawSettingsDocument {
    dcos_master: String,
    prometheus_host: String,
    internal: u64,
    alarm_api: RawAlarmApi,
    scale_api_url: String,
}

#[derive(Debug, Deserialize)]
struct RawAlarmApi {
    host: String,
    url: String,
    params: HashMap<String, String>,
}

/// Immutable, process-wide control parameters built once at bootstrap
/// from the `ConfigSource` document and threaded by `Arc` to every
/// component. Nothing mutates it after construction; there is no other
/// module-level configuration state anywhere in the crate.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dcos_master: Url,
    pub prometheus_host: Url,
    pub interval: Duration,
    pub request_timeout: Duration,
    pub alarm_host: Url,
    pub alarm_url: String,
    pub alarm_params: HashMap<String, String>,
    pub scale_api_url: Url,
    /// Optional override applied to every alarm's `key` field,
    /// superseding each app's own `alarm_key`. Carried over from the
    /// original's `ALARM_API_BODY_GLOBALKEY` environment override.
    pub global_alarm_key: Option<String>,
}

impl Settings {
    pub fn from_document(body: &[u8]) -> Result<Self, InitError> {
        let raw: RawSettingsDocument = serde_path_to_error::deserialize(
            &mut serde_json::Deserializer::from_slice(body),
        )
        .map_err(|e| {
            InitError::ConfigSource(format!(
                "malformed settings document: {e}"
            ))
        })?;

        let dcos_master = Url::parse(&raw.dcos_master).map_err(|e| {
            InitError::ConfigSource(format!("invalid dcos_master url: {e}"))
        })?;
        let prometheus_host =
            Url::parse(&raw.prometheus_host).map_err(|e| {
                InitError::ConfigSource(format!(
                    "invalid prometheus_host url: {e}"
                ))
            })?;
        let alarm_host = Url::parse(&raw.alarm_api.host).map_err(|e| {
            InitError::ConfigSource(format!("invalid alarm host url: {e}"))
        })?;
        let scale_api_url = Url::parse(&raw.scale_api_url).map_err(|e| {
            InitError::ConfigSource(format!(
                "invalid scale_api_url: {e}"
            ))
        })?;

        if raw.internal == 0 {
            return Err(InitError::ConfigSource(
                "internal (sample interval) must be > 0".to_string(),
            ));
        }
        let interval = Duration::from_secs(raw.internal);

        Ok(Self {
            dcos_master,
            prometheus_host,
            interval,
            request_timeout: interval / 2,
            alarm_host,
            alarm_url: raw.alarm_api.url,
            alarm_params: raw.alarm_api.params,
            scale_api_url,
            global_alarm_key: std::env::var("ALARM_API_BODY_GLOBALKEY").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_timeout_is_half_the_interval() {
        let doc = serde_json::json!({
            "dcos_master": "https://dcos.example.com",
            "prometheus_host": "https://prom.example.com",
            "internal": 60,
            "alarm_api": {
                "host": "https://alarms.example.com",
                "url": "/alarm",
                "params": {"key": "abc"},
            },
            "scale_api_url": "https://config.example.com/apps",
        });
        let settings =
            Settings::from_document(doc.to_string().as_bytes()).unwrap();
        assert_eq!(settings.interval, Duration::from_secs(60));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_zero_interval() {
        let doc = serde_json::json!({
            "dcos_master": "https://dcos.example.com",
            "prometheus_host": "https://prom.example.com",
            "internal": 0,
            "alarm_api": {"host": "https://a", "url": "/a", "params": {}},
            "scale_api_url": "https://config.example.com/apps",
        });
        assert!(
            Settings::from_document(doc.to_string().as_bytes()).is_err()
        );
    }
}
