//! Shutdown coordination for the application.

use std::sync::Arc;

use tokio::sync::watch;

/// Coordinator for requested shutdowns.
///
/// Backed by a watch channel so a request made before the runner starts
/// waiting is not lost.
#[derive(Debug)]
pub struct Shutdown {
    /// Latest shutdown reason, `None` until a shutdown is requested.
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Handle that modules can use to request a shutdown.
    pub fn shutdowner(&self) -> Shutdowner {
        Shutdowner {
            tx: Arc::clone(&self.tx),
        }
    }

    /// Whether a shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until a shutdown is requested and return its reason.
    pub async fn requested(&self) -> String {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(reason) = rx.borrow_and_update().clone() {
                return reason;
            }
            // The sender lives as long as `self`, so this only fails if it is gone.
            if rx.changed().await.is_err() {
                return "shutdown channel closed".to_string();
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle that asks the running application to stop.
///
/// Provided to every module through the dependency graph.
#[derive(Debug, Clone)]
pub struct Shutdowner {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Shutdowner {
    /// Request a graceful shutdown. Later requests keep the first reason.
    pub fn shutdown(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn request_before_wait_is_observed() {
        let shutdown = Shutdown::new();
        shutdown.shutdowner().shutdown("maintenance");
        assert!(shutdown.is_requested());

        let reason = tokio::time::timeout(Duration::from_secs(1), shutdown.requested())
            .await
            .unwrap();
        assert_eq!(reason, "maintenance");
    }

    #[tokio::test]
    async fn first_reason_wins() {
        let shutdown = Shutdown::new();
        let handle = shutdown.shutdowner();
        handle.shutdown("first");
        handle.shutdown("second");
        assert_eq!(shutdown.requested().await, "first");
    }
}
