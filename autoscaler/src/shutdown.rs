//! The process shutdown-signal listener, registered with `meltdown`
//! alongside the `Supervisor` the same way the teacher registers its own
//! `wait_for_shutdown_signals` task ahead of the gateway and its
//! monitors.

use futures::future::BoxFuture;
use meltdown::Token;
use tracing::info;

use crate::error::RuntimeError;

/// Resolves on `SIGINT` or `SIGTERM` (or just `ctrl_c` on platforms
/// without `SIGTERM`). Its only job is to complete: `main`'s meltdown
/// loop treats *any* registered service finishing as the cue to trigger
/// every other service's cancellation token.
pub struct ShutdownSignal;

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

impl meltdown::Service for ShutdownSignal {
    type Future = BoxFuture<'static, Result<(), RuntimeError>>;

    fn run(self, _token: Token) -> Self::Future {
        Box::pin(async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            Ok(())
        })
    }
}
