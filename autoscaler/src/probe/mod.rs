//! `MetricProbe` capability and the closed dispatch table over
//! `TriggerMode`.
//!
//! Concrete metric providers are out of core scope per the
//! specification; the two implementations here exist because their
//! wire formats are fully specified (§6) rather than left as an
//! interface contract only.

pub mod jvm;
pub mod mem;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RuntimeError;

/// Capability exposed to `ScalingMode`: returns a sample vector whose
/// length must equal the configured threshold dimension.
///
/// `app_name` is the orchestrator's display name for the app (cached by
/// `AppHandle::exists` from the environment metadata the first time it
/// is observed), not the `AppId` path — the metric backends key their
/// series off that name.
#[async_trait]
pub trait MetricProbe: Send + Sync {
    async fn sample(&self, app_name: &str) -> Result<Vec<f64>, RuntimeError>;
}

/// Maps a `TriggerMode` tag to its probe implementation. Closed by
/// design: adding a trigger mode means adding a match arm here, not
/// opening the dispatch to arbitrary trait objects registered at
/// runtime.
pub fn probe_for(
    mode: crate::types::TriggerMode,
    prometheus_host: url::Url,
    http: reqwest::Client,
) -> Arc<dyn MetricProbe> {
    match mode {
        crate::types::TriggerMode::Jvm => {
            Arc::new(jvm::JvmHeapProbe::new(prometheus_host, http))
        }
        crate::types::TriggerMode::Mem => {
            Arc::new(mem::MemUtilizationProbe::new(prometheus_host, http))
        }
    }
}
