//! Idle watchdog.
//!
//! A resettable deadline polled alongside the socket in the session's
//! `select!`. Each received frame pushes the deadline out by the timeout; the
//! watchdog is dropped with the session, so it never outlives its connection.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{self, Instant, Sleep};

/// Per-connection inactivity timer.
#[derive(Debug)]
pub struct IdleWatchdog {
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl IdleWatchdog {
    /// Start a watchdog that fires `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sleep: Box::pin(time::sleep(timeout)),
        }
    }

    /// Record activity: the deadline becomes `timeout` from now.
    pub fn touch(&mut self) {
        let deadline = Instant::now() + self.timeout;
        self.sleep.as_mut().reset(deadline);
    }

    /// Current deadline.
    pub fn deadline(&self) -> Instant {
        self.sleep.deadline()
    }

    /// Configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves once the deadline passes. Cancel-safe.
    pub async fn expired(&mut self) {
        self.sleep.as_mut().await;
    }
}
