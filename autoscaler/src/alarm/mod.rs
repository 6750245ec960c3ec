//! Alarm emission, redesigned as an explicit sink.
//!
//! The original channels alarms by logging a JSON string that a
//! dedicated log handler filters on and POSTs onward. Here logging
//! (`tracing`) and alarming (`AlarmSink`) are fully orthogonal: nothing
//! inspects log content to decide whether to alarm.

pub mod http;

pub use http::HttpAlarmSink;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::{config::AppConfig, config::Settings, error::RuntimeError};

/// Wire payload POSTed to the alarm endpoint. Field names and casing
/// are the monitoring endpoint's, not ours.
#[derive(Debug, Clone, Serialize)]
pub struct AlarmPayload {
    #[serde(rename = "alarmLevel")]
    pub alarm_level: String,
    pub area: String,
    pub cluster: String,
    pub detail: String,
    #[serde(rename = "dingAlarm")]
    pub ding_alarm: bool,
    pub key: String,
    pub project: String,
    pub source: String,
    #[serde(rename = "startTime")]
    pub start_time: String,
    pub threshold: String,
    #[serde(rename = "type")]
    pub alarm_type: String,
}

/// Builds alarm payloads from the immutable `Settings` template plus
/// per-event fields. Holds no mutable state.
pub struct AlarmFormatter {
    settings: std::sync::Arc<Settings>,
}

impl AlarmFormatter {
    #[must_use]
    pub fn new(settings: std::sync::Arc<Settings>) -> Self {
        Self { settings }
    }

    /// `detail` is the event-specific message (e.g. `"current 4,
    /// scaling to 8"` or a ceiling notice); everything else is derived
    /// from `app` and the global template.
    #[must_use]
    pub fn build(&self, app: &AppConfig, detail: impl Into<String>) -> AlarmPayload {
        let key = self
            .settings
            .global_alarm_key
            .clone()
            .or_else(|| app.alarm_key.clone())
            .unwrap_or_default();

        AlarmPayload {
            alarm_level: "WARN".to_string(),
            area: "dcos".to_string(),
            cluster: app.tenant.as_str().to_string(),
            detail: detail.into(),
            ding_alarm: false,
            key,
            project: app.app_id.as_str().trim_start_matches('/').to_string(),
            source: format!("{}{}", app.tenant, app.app_id),
            start_time: Utc::now().to_rfc3339(),
            threshold: format!(
                "min_range={:?} max_range={:?} scale_up_factor={} cool_down_factor={} autoscale_multiplier={}",
                app.min_range,
                app.max_range,
                app.scale_up_factor,
                app.cool_down_factor,
                app.autoscale_multiplier
            ),
            alarm_type: "autoscale".to_string(),
        }
    }
}

/// Transport for alarm payloads. The transport mechanics are out of
/// core scope; the wire shape they must carry (§6) is implemented by
/// `HttpAlarmSink`.
#[async_trait]
pub trait AlarmSink: Send + Sync {
    async fn send(&self, payload: &AlarmPayload) -> Result<(), RuntimeError>;
}
