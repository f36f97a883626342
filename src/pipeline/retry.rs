//! Per-page retry policy.
//!
//! Decides what the acquisition loop does after a failed page attempt. The
//! rules are deliberately small: a circuit short-circuit waits a fixed
//! cooldown without touching the budget, everything else backs off linearly
//! until the page's budget runs out.

use crate::Error;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Failed attempts allowed per page before the run is aborted.
    pub max_retries: u32,
    /// Delay after the first failure; multiplied by the attempt number.
    pub base_delay: Duration,
    pub ceiling: Duration,
    /// Fixed wait after the gate refused a request.
    pub circuit_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
            ceiling: Duration::from_secs(30),
            circuit_cooldown: Duration::from_secs(5),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Gate refused; wait and retry the same page, budget untouched.
    Cooldown { delay: Duration },
    Retry { delay: Duration },
    Abort,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_circuit_cooldown(mut self, cooldown: Duration) -> Self {
        self.circuit_cooldown = cooldown;
        self
    }

    /// `min(base_delay * attempt, ceiling)`, stretched to a server hint but
    /// never past the ceiling.
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let linear = self.base_delay.saturating_mul(attempt.max(1));
        let chosen = match retry_after {
            Some(hint) => linear.max(hint),
            None => linear,
        };
        chosen.min(self.ceiling)
    }

    /// `attempt` counts failures on the current page, 1-based.
    pub fn decide(&self, err: &Error, attempt: u32) -> Decision {
        if err.is_circuit_open() {
            return Decision::Cooldown {
                delay: self.circuit_cooldown,
            };
        }
        if attempt > self.max_retries {
            return Decision::Abort;
        }
        let hint = match err {
            Error::RateLimited { .. } => err.retry_after(),
            _ => None,
        };
        Decision::Retry {
            delay: self.backoff(attempt, hint),
        }
    }
}
