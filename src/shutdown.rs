//! Graceful shutdown coordination.
//!
//! One process-wide manager: signal handlers set a flag and wake every
//! waiter on a shared [`Notify`]. Background loops observe the notify in
//! their `tokio::select!`; `main` blocks on [`wait_for_shutdown`] and exits
//! with code 0 once signalled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::Notify;

use crate::logger::{self, LogTag};

pub static SHUTDOWN_MANAGER: Lazy<ShutdownManager> = Lazy::new(ShutdownManager::new);

pub struct ShutdownManager {
    shutdown_requested: AtomicBool,
    notify: Arc<Notify>,
}

impl ShutdownManager {
    fn new() -> Self {
        Self {
            shutdown_requested: AtomicBool::new(false),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Shared notify handle for background loops
    pub fn notify_handle(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Request shutdown and wake all waiters. Idempotent.
    pub fn initiate_shutdown(&self) {
        if self.shutdown_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        logger::info(LogTag::Shutdown, "Shutting down gracefully...");
        self.notify.notify_waiters();
    }

    /// Block until shutdown has been requested
    pub async fn wait_for_shutdown(&self) {
        while !self.is_shutdown_requested() {
            self.notify.notified().await;
        }
    }
}

/// Check if shutdown has been requested
pub fn is_shutdown_requested() -> bool {
    SHUTDOWN_MANAGER.is_shutdown_requested()
}

/// Shared notify handle used by background loops
pub fn shutdown_notify() -> Arc<Notify> {
    SHUTDOWN_MANAGER.notify_handle()
}

/// Install Ctrl-C and SIGTERM handlers
pub fn install_shutdown_handlers() -> Result<(), String> {
    ctrlc::set_handler(move || {
        SHUTDOWN_MANAGER.initiate_shutdown();
    })
    .map_err(|e| format!("Failed to install Ctrl-C handler: {}", e))?;

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| format!("Failed to install SIGTERM handler: {}", e))?;

        tokio::spawn(async move {
            sigterm.recv().await;
            SHUTDOWN_MANAGER.initiate_shutdown();
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_wakes_waiters() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutdown_requested());

        let notify = manager.notify_handle();
        let waiter = tokio::spawn(async move {
            notify.notified().await;
        });

        // Give the waiter a turn to register before notifying
        tokio::task::yield_now().await;
        manager.initiate_shutdown();
        assert!(manager.is_shutdown_requested());

        // Second call is a no-op
        manager.initiate_shutdown();

        waiter.await.unwrap();
        manager.wait_for_shutdown().await;
    }
}
