//! Coordinated shutdown for the API server, device gateway and
//! background tasks.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Cloneable handle around a single stopping flag. Triggering is
/// idempotent; waiters that arrive after the flag flipped resolve
/// immediately.
#[derive(Clone)]
pub struct ShutdownSignal {
    stopping: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (stopping, _) = watch::channel(false);
        Self {
            stopping: Arc::new(stopping),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.stopping.borrow()
    }

    pub fn trigger(&self) {
        let flipped = self.stopping.send_if_modified(|stopping| {
            if *stopping {
                false
            } else {
                *stopping = true;
                true
            }
        });
        if flipped {
            info!("🛑 Shutdown signal triggered");
        }
    }

    pub async fn wait(&self) {
        let mut rx = self.stopping.subscribe();
        // The sender lives in self, so wait_for cannot fail here.
        let _ = rx.wait_for(|stopping| *stopping).await;
    }

    /// An owned future for use inside `select!` arms.
    pub fn notified(&self) -> ShutdownNotified {
        ShutdownNotified {
            rx: self.stopping.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once the owning signal has been triggered.
pub struct ShutdownNotified {
    rx: watch::Receiver<bool>,
}

impl ShutdownNotified {
    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|stopping| *stopping).await;
    }
}

/// Trigger the signal on SIGTERM or SIGINT (Ctrl+C elsewhere).
pub async fn listen_for_shutdown_signals(shutdown: ShutdownSignal) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => info!("📡 SIGTERM received"),
            _ = sigint.recv() => info!("📡 SIGINT received (Ctrl+C)"),
        }

        shutdown.trigger();
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("📡 Ctrl+C received");
        shutdown.trigger();
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_waiters() {
        let signal = ShutdownSignal::new();
        let notified = signal.notified();
        signal.trigger();
        assert!(signal.is_triggered());
        notified.wait().await;
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_triggered() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.trigger();
        signal.wait().await;
    }

    #[tokio::test]
    async fn late_waiters_see_the_flag() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        // Created after the flip, must still resolve.
        signal.notified().wait().await;
    }
}
