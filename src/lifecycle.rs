//! Process lifecycle
//! Owns shutdown: termination signals are external events fed into an
//! explicit controller object, not ambient global mutation

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

/// Coordinates graceful shutdown of the gateway.
///
/// SIGINT (interactive interrupt) and SIGTERM (managed shutdown) trigger
/// identical behavior: stop accepting new work immediately and let the
/// process exit with status 0. Idempotent - the first termination request
/// wins, later ones have no additional effect. In-flight requests are not
/// drained; connection-level cleanup belongs to the transport underneath.
#[derive(Debug, Default)]
pub struct LifecycleController {
    shutting_down: AtomicBool,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown has already been requested
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Record a termination request. Returns true only for the first one.
    pub fn request_shutdown(&self) -> bool {
        let first = !self.shutting_down.swap(true, Ordering::SeqCst);
        if first {
            info!("🛑 Shutting down gateway gracefully...");
        }
        first
    }

    /// Resolves once a termination signal arrives (or immediately if
    /// shutdown was already requested).
    pub async fn shutdown_requested(&self) {
        if self.is_shutting_down() {
            return;
        }

        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                // Without a handler the only way to stop is SIGKILL;
                // log it and park this branch
                error!("failed to install SIGINT handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }

        self.request_shutdown();
    }
}
