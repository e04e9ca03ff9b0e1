//! Shutdown coordination for the gateway.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::GatewayError;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// How a server task ended after shutdown was requested.
#[derive(Debug)]
pub enum Drain {
    /// The task returned within the grace period.
    Completed(Result<(), GatewayError>),
    /// The grace period elapsed; the task was aborted.
    TimedOut,
    /// The task panicked or was cancelled.
    Failed(tokio::task::JoinError),
}

/// Wait up to `grace` for a server task to finish, aborting it afterwards.
pub async fn drain_within(
    grace: Duration,
    mut task: JoinHandle<Result<(), GatewayError>>,
) -> Drain {
    match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok(result)) => Drain::Completed(result),
        Ok(Err(join)) => Drain::Failed(join),
        Err(_) => {
            task.abort();
            Drain::TimedOut
        }
    }
}
