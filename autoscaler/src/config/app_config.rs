use serde::{Deserialize, Serialize};

use crate::types::{AppId, TenantId, TriggerMode};

/// Immutable per-application scaling policy. Identity is
/// `(tenant, app_id)`; two `AppConfig`s for the same identity are
/// compared by value equality to detect a "modified" app during
/// reconciliation (see `Supervisor::reconcile`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    pub tenant: TenantId,
    pub app_id: AppId,
    pub trigger_mode: TriggerMode,
    pub autoscale_multiplier: f64,
    pub min_instances: i64,
    pub max_instances: i64,
    pub cool_down_factor: u32,
    pub scale_up_factor: u32,
    pub min_range: Vec<f64>,
    pub max_range: Vec<f64>,
    pub log_level: Option<String>,
    pub alarm_key: Option<String>,
}

/// Validation failure kind for an individual `AppConfig`, surfaced at
/// startup as `InitError::InvalidAppConfig` and at reconciliation time
/// as a logged-and-skipped entry.
#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum AppConfigError {
    /// tenant must be nonempty
    EmptyTenant,
    /// min_instances ({min}) must not exceed max_instances ({max})
    InstanceRange { min: i64, max: i64 },
    /// autoscale_multiplier must be >= 1.0, got {0}
    Multiplier(f64),
    /// cool_down_factor and scale_up_factor must be >= 1
    HysteresisFactor,
    /// min_range and max_range must be nonempty and of equal length (got {min_len} and {max_len})
    ThresholdLength { min_len: usize, max_len: usize },
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), AppConfigError> {
        if self.tenant.as_str().is_empty() {
            return Err(AppConfigError::EmptyTenant);
        }
        if self.min_instances > self.max_instances {
            return Err(AppConfigError::InstanceRange {
                min: self.min_instances,
                max: self.max_instances,
            });
        }
        if self.autoscale_multiplier < 1.0 {
            return Err(AppConfigError::Multiplier(self.autoscale_multiplier));
        }
        if self.cool_down_factor < 1 || self.scale_up_factor < 1 {
            return Err(AppConfigError::HysteresisFactor);
        }
        if self.min_range.is_empty()
            || self.min_range.len() != self.max_range.len()
        {
            return Err(AppConfigError::ThresholdLength {
                min_len: self.min_range.len(),
                max_len: self.max_range.len(),
            });
        }
        Ok(())
    }
}
