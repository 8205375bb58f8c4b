//! Per-connection request throttling with an escalating penalty.
//!
//! A command that arrives within `base_delay × multiplier` of the previous
//! dispatched command is a violation. The first few violations are tolerated;
//! from `throttle_after` on, the command is swallowed and the window grows by
//! `penalty_step × base_delay`; at `max_violations` the connection is dropped.
//! Any command that respects the current window resets both counters.

use std::time::{Duration, Instant};

/// Throttling parameters, fixed for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatePolicy {
    /// Minimum spacing between commands.
    pub base_delay: Duration,
    /// Violation count that forces a disconnect.
    pub max_violations: u32,
    /// Violation count from which commands are suppressed.
    pub throttle_after: u32,
    /// Multiplier increment applied on each suppressed command.
    pub penalty_step: u32,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_violations: 10,
            throttle_after: 5,
            penalty_step: 5,
        }
    }
}

/// Verdict for one incoming command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    /// Dispatch the command.
    Allow,
    /// Do not dispatch; tell the client to wait `delay`.
    Throttle {
        /// The new enforced spacing.
        delay: Duration,
    },
    /// Too many violations; close the connection.
    Disconnect,
}

/// Rate limiter state for one connection.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RatePolicy,
    last_command: Instant,
    violations: u32,
    multiplier: u32,
}

impl RateLimiter {
    /// Create a limiter whose window starts at `now` (connection time).
    pub fn new(policy: RatePolicy, now: Instant) -> Self {
        Self {
            policy,
            last_command: now,
            violations: 0,
            multiplier: 1,
        }
    }

    /// Classify a command arriving at `now`.
    pub fn check(&mut self, now: Instant) -> RateDecision {
        if now.saturating_duration_since(self.last_command) <= self.window() {
            self.violations += 1;
            if self.violations >= self.policy.max_violations {
                return RateDecision::Disconnect;
            }
            if self.violations >= self.policy.throttle_after {
                self.multiplier = self.multiplier.saturating_add(self.policy.penalty_step);
                return RateDecision::Throttle {
                    delay: self.window(),
                };
            }
        } else {
            self.violations = 0;
            self.multiplier = 1;
        }
        RateDecision::Allow
    }

    /// Record that a command was dispatched at `now`.
    pub fn record(&mut self, now: Instant) {
        self.last_command = now;
    }

    /// Current enforced spacing.
    pub fn window(&self) -> Duration {
        self.policy.base_delay.saturating_mul(self.multiplier)
    }

    /// Current violation count.
    pub fn violations(&self) -> u32 {
        self.violations
    }
}
