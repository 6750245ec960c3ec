use displaydoc::Display;
use thiserror::Error;

/// Non-fatal errors raised during a control-loop cycle or a
/// reconciliation tick. Every variant is caught at the cycle boundary;
/// none of them ever unwind past a `ControlLoop` or `Supervisor` task.
#[derive(Debug, Clone, Error, Display, strum::AsRefStr)]
pub enum RuntimeError {
    /// network error calling {0}: {1}
    Transport(String, String),
    /// request to {0} timed out after {1:?}
    Timeout(String, std::time::Duration),
    /// orchestrator returned HTTP {status} for {path}: {body}
    Http {
        status: u16,
        path: String,
        body: String,
    },
    /// probe returned no usable datapoint: {0}
    Metric(String),
    /// probe sample dimension {got} does not match configured thresholds {expected}
    DimensionMismatch { expected: usize, got: usize },
    /// target instance count {target} exceeds max_instances {max}
    PolicyViolation { target: i64, max: i64 },
}

impl RuntimeError {
    /// True for the orchestrator's app-lookup 404 special case: the
    /// app is treated as absent, not as an error to log and skip on.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::Http { status: 404, .. })
    }
}
