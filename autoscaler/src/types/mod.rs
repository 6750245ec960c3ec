//! Newtypes and small value types shared across the crate.

mod secret;

pub use secret::Secret;

use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The orchestrator tenant a given app lives under (a URL path segment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An application id, always normalized to carry a leading `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AppId(String);

impl<'de> Deserialize<'de> for AppId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::new(String::deserialize(deserializer)?))
    }
}

impl AppId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.starts_with('/') {
            Self(value)
        } else {
            Self(format!("/{value}"))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity key for an application: `(tenant, app_id)`, used as the
/// reconciliation key by the supervisor and as the span key by the
/// control loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppKey {
    pub tenant: TenantId,
    pub app_id: AppId,
}

impl fmt::Display for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tenant, self.app_id)
    }
}

/// Which `MetricProbe` implementation services a given app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    Mem,
    Jvm,
}

/// The discrete output of `ScalingMode::direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Hold,
    Up,
}
