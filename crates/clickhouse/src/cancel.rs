//! Cooperative cancellation for long-running statements.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Cancellation flag shared between the runner, the executor and the
/// progress poller.
///
/// The first `cancel` wins; its reason is kept and later calls are ignored.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Returns true if this call cancelled the token.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Resolves with the reason once the token is cancelled.
    pub async fn cancelled(&self) -> String {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(reason) = rx.borrow_and_update().clone() {
                return reason;
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` holds the sender
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Cancels a token on Ctrl+C or SIGTERM for as long as it is alive.
pub struct SignalGuard {
    handle: JoinHandle<()>,
}

impl SignalGuard {
    /// Must be called from within a tokio runtime.
    pub fn install(token: CancelToken) -> Self {
        let handle = tokio::spawn(async move {
            let signal = shutdown_signal().await;
            warn!(signal, "Received shutdown signal, interrupting migration");
            token.cancel(format!("received {}", signal));
        });
        Self { handle }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Wait for Ctrl+C or SIGTERM and name the one that arrived.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
