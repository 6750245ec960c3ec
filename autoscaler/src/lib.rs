//! Autoscaling control plane for a multi-tenant Marathon-on-DCOS
//! deployment.
//!
//! The binary (`src/main.rs`) does little beyond bootstrapping: reading
//! [`config::Config`], initializing telemetry, fetching the remote
//! [`config::Settings`] document, and registering [`supervisor::Supervisor`]
//! (plus the shutdown-signal listener) with a [`meltdown::Meltdown`]
//! scheduler. Everything else lives here so integration tests under
//! `tests/` can drive it directly.

pub mod alarm;
pub mod api_client;
pub mod app_handle;
pub mod config;
pub mod control_loop;
pub mod error;
pub mod probe;
pub mod scaling_mode;
pub mod shutdown;
pub mod supervisor;
pub mod types;
