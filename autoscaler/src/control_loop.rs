//! Per-application scaling state machine.
//!
//! Runs an unbounded periodic loop until `Stop()` (a
//! `tokio_util::sync::CancellationToken`) is observed. Cancellation is
//! checked at the start of each cycle and interrupts the inter-cycle
//! sleep directly, rather than waiting out a full interval.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    alarm::{AlarmFormatter, AlarmSink},
    app_handle::AppHandle,
    config::{AppConfig, Settings},
    error::RuntimeError,
    scaling_mode::ScalingMode,
    types::Direction,
};

/// Hysteresis counters. The mutual-exclusion invariant
/// (`scale_up_count > 0 ⇒ cool_down_count == 0` and vice versa) is
/// enforced entirely by the private `apply_*` methods; nothing outside
/// this type can set one counter without clearing the other.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    scale_up_count: u32,
    cool_down_count: u32,
}

impl LoopState {
    fn apply_up(&mut self) {
        self.scale_up_count += 1;
        self.cool_down_count = 0;
    }

    fn apply_down(&mut self) {
        self.cool_down_count += 1;
        self.scale_up_count = 0;
    }

    fn reset(&mut self) {
        self.scale_up_count = 0;
        self.cool_down_count = 0;
    }

    #[must_use]
    pub fn scale_up_count(&self) -> u32 {
        self.scale_up_count
    }

    #[must_use]
    pub fn cool_down_count(&self) -> u32 {
        self.cool_down_count
    }
}

pub struct ControlLoop {
    app: AppConfig,
    app_handle: AppHandle,
    scaling_mode: ScalingMode,
    alarm_formatter: Arc<AlarmFormatter>,
    alarm_sink: Arc<dyn AlarmSink>,
    interval: std::time::Duration,
    state: LoopState,
    cancel: CancellationToken,
}

impl ControlLoop {
    #[must_use]
    pub fn new(
        app: AppConfig,
        app_handle: AppHandle,
        scaling_mode: ScalingMode,
        alarm_formatter: Arc<AlarmFormatter>,
        alarm_sink: Arc<dyn AlarmSink>,
        settings: &Settings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            app,
            app_handle,
            scaling_mode,
            alarm_formatter,
            alarm_sink,
            interval: settings.interval,
            state: LoopState::default(),
            cancel,
        }
    }

    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs cycles until `Stop()` fires. Consumes `self`: once stopped,
    /// a `ControlLoop` is never resumed — the supervisor always starts
    /// a fresh one on replace.
    pub async fn run(mut self) {
        let app_key = format!("{}{}", self.app.tenant, self.app.app_id);
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.run_once().await;

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = self.cancel.cancelled() => break,
            }
        }
        tracing::info!(app = %app_key, "control loop terminated");
    }

    /// Runs exactly one cycle, bypassing the sleep and cancellation
    /// check in [`Self::run`]. Exposed so integration tests can drive
    /// the hysteresis state machine cycle-by-cycle without waiting out
    /// real intervals.
    pub async fn run_once(&mut self) {
        let span = tracing::info_span!(
            "control_loop_cycle",
            tenant = %self.app.tenant,
            app_id = %self.app.app_id,
            trigger_mode = ?self.app.trigger_mode,
        );
        self.run_cycle().instrument(span).await;
    }

    async fn run_cycle(&mut self) {
        let exists = match self.app_handle.exists().await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::error!(error = %e, "failed to check app existence, skipping cycle");
                return;
            }
        };
        if !exists {
            tracing::error!(
                app_id = %self.app.app_id,
                "could not find app in orchestrator, skipping cycle"
            );
            return;
        }

        let direction = match self
            .scaling_mode
            .direction(self.app_handle.display_name())
            .await
        {
            Ok(direction) => direction,
            Err(e) => {
                tracing::error!(error = %e, "failed to sample scaling metric, skipping cycle");
                return;
            }
        };

        match direction {
            Direction::Up => {
                self.state.apply_up();
                tracing::info!(
                    scale_up_count = self.state.scale_up_count,
                    scale_up_factor = self.app.scale_up_factor,
                    "above threshold"
                );
                if self.state.scale_up_count >= self.app.scale_up_factor {
                    self.scale_action_up().await;
                    self.state.reset();
                }
            }
            Direction::Down => {
                self.state.apply_down();
                tracing::info!(
                    cool_down_count = self.state.cool_down_count,
                    cool_down_factor = self.app.cool_down_factor,
                    "below threshold"
                );
                if self.state.cool_down_count >= self.app.cool_down_factor {
                    self.scale_action_down();
                    self.state.reset();
                }
            }
            Direction::Hold => {
                self.state.reset();
            }
        }
    }

    /// `target` is always `>= current` because `autoscale_multiplier
    /// >= 1.0`; the only question is whether it stays at `current`
    /// (multiplier rounds down to a no-op), grows freely, or is clamped
    /// at `max_instances`.
    async fn scale_action_up(&mut self) {
        let current = match self.app_handle.instances().await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "failed to read instance count, aborting scale action");
                return;
            }
        };

        let raw_target =
            (current as f64 * self.app.autoscale_multiplier).ceil() as i64;

        let (target, detail) = if raw_target > self.app.max_instances {
            let target = self.app.max_instances;
            let violation = RuntimeError::PolicyViolation {
                target: raw_target,
                max: self.app.max_instances,
            };
            tracing::warn!(error = %violation, target, "clamping scale target to max_instances");
            (
                target,
                format!(
                    "current {current}, scaling to {target} (clamped at max_instances ceiling {target})"
                ),
            )
        } else if raw_target > current {
            (raw_target, format!("current {current}, scaling to {raw_target}"))
        } else {
            (raw_target, format!("current {current}, already at ceiling"))
        };

        self.emit_alarm(&detail).await;

        if target != current
            && let Err(e) = self.app_handle.set_instances(target).await
        {
            tracing::error!(error = %e, target, "failed to write new instance count");
        }
    }

    /// Downscale is deliberately disabled: the action logs and
    /// preserves the cool-down observation for audit, but never writes
    /// to the orchestrator and never alarms.
    fn scale_action_down(&self) {
        tracing::warn!(app_id = %self.app.app_id, "scale down trigger off");
    }

    async fn emit_alarm(&self, detail: &str) {
        let payload = self.alarm_formatter.build(&self.app, detail);
        if let Err(e) = self.alarm_sink.send(&payload).await {
            tracing::error!(error = %e, "failed to emit alarm");
        }
    }
}
