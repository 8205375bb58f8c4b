//! Graceful shutdown: one `CancellationToken` for the listener and every
//! session, plus a `TaskTracker` so shutdown can wait for sessions to finish
//! their teardown.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// Default time to wait for the listener and sessions to drain.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How a graceful shutdown finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The listener stopped and every session tore down.
    Drained,
    /// The timeout elapsed first.
    TimedOut {
        /// Sessions still running when we gave up.
        sessions: usize,
    },
}

/// Coordinates shutdown of the listener and every live session.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the cancellation token; sessions select on it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wrap a session future so [`graceful_shutdown`](Self::graceful_shutdown)
    /// waits for it.
    pub fn track_session<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Sessions currently tracked.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel everything, then wait up to `timeout` for `handles` and all
    /// tracked sessions to finish.
    pub async fn graceful_shutdown(
        &self,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> ShutdownOutcome {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        self.sessions.close();
        info!(
            listeners = handles.len(),
            sessions = self.sessions.len(),
            timeout_secs = timeout.as_secs(),
            "draining"
        );

        let drain = async {
            let _ = futures::future::join_all(handles).await;
            self.sessions.wait().await;
        };
        if tokio::time::timeout(timeout, drain).await.is_ok() {
            ShutdownOutcome::Drained
        } else {
            let sessions = self.sessions.len();
            warn!(sessions, "shutdown timed out after {timeout:?}");
            ShutdownOutcome::TimedOut { sessions }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_cancels_every_token() {
        let coord = ShutdownCoordinator::new();
        let t1 = coord.token();
        let t2 = coord.token();
        assert!(!coord.is_shutting_down());
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
    }

    #[tokio::test]
    async fn drains_listener_and_sessions() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let listener = tokio::spawn(async move {
            token.cancelled().await;
        });
        let token = coord.token();
        let session = tokio::spawn(coord.track_session(async move {
            token.cancelled().await;
        }));
        assert_eq!(coord.live_sessions(), 1);

        let outcome = coord.graceful_shutdown(vec![listener], None).await;
        assert_eq!(outcome, ShutdownOutcome::Drained);
        assert_eq!(coord.live_sessions(), 0);
        session.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_session_times_out() {
        let coord = ShutdownCoordinator::new();
        // Ignores cancellation
        let _session = tokio::spawn(coord.track_session(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        }));

        let outcome = coord
            .graceful_shutdown(Vec::new(), Some(Duration::from_millis(100)))
            .await;
        assert_eq!(outcome, ShutdownOutcome::TimedOut { sessions: 1 });
        assert!(coord.is_shutting_down());
    }
}
