use crate::{Error, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Successes required in half-open state before the breaker closes again.
pub const HALF_OPEN_SUCCESS_QUOTA: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_threshold: u32,
    pub timeout_ms: u64,
    pub monitor_window_ms: u64,
    /// Failures currently inside the monitor window.
    pub recent_failures: usize,
    pub half_open_successes: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    /// How long the breaker stays open before probing.
    pub timeout: Duration,
    /// Sliding window in which failures count toward opening.
    pub monitor_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
            monitor_window: Duration::from_secs(300),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the open-state timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sliding monitor window
    pub fn with_monitor_window(mut self, window: Duration) -> Self {
        self.monitor_window = window;
        self
    }
}

#[derive(Debug)]
struct State {
    state: CircuitState,
    failures: VecDeque<Instant>,
    next_attempt: Instant,
    half_open_successes: u32,
}

/// Sliding-window circuit breaker gating a single outbound operation.
///
/// - Opens when the failures inside `monitor_window` reach `failure_threshold`
/// - Short-circuits with [`Error::CircuitOpen`] until `timeout` elapses
/// - Half-open probing needs [`HALF_OPEN_SUCCESS_QUOTA`] successes to close;
///   any half-open failure reopens immediately
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                next_attempt: Instant::now(),
                half_open_successes: 0,
            }),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // State stays consistent even if a holder panicked; every mutation is a single step.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admission check. Flips `Open` to `HalfOpen` once the cooldown has elapsed.
    pub fn allow(&self) -> Result<()> {
        let mut st = self.lock();
        if st.state == CircuitState::Open {
            let now = Instant::now();
            if now < st.next_attempt {
                return Err(Error::CircuitOpen {
                    retry_in: st.next_attempt - now,
                });
            }
            st.state = CircuitState::HalfOpen;
            st.half_open_successes = 0;
            info!("circuit breaker half-open, probing");
        }
        Ok(())
    }

    /// Run `operation` through the breaker.
    ///
    /// The operation is not invoked while the breaker is open. Its error, if
    /// any, is recorded and returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.allow()?;
        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(e)
            }
        }
    }

    pub fn on_success(&self) {
        let mut st = self.lock();
        if st.state != CircuitState::HalfOpen {
            return;
        }
        st.half_open_successes += 1;
        if st.half_open_successes >= HALF_OPEN_SUCCESS_QUOTA {
            st.state = CircuitState::Closed;
            st.failures.clear();
            st.half_open_successes = 0;
            info!("circuit breaker closed, service recovered");
        }
    }

    pub fn on_failure(&self) {
        let mut st = self.lock();
        let now = Instant::now();
        st.failures.push_back(now);
        while let Some(&oldest) = st.failures.front() {
            if now.duration_since(oldest) >= self.cfg.monitor_window {
                st.failures.pop_front();
            } else {
                break;
            }
        }

        let reopen = st.state == CircuitState::HalfOpen;
        if reopen || st.failures.len() >= self.cfg.failure_threshold as usize {
            st.state = CircuitState::Open;
            st.next_attempt = now + self.cfg.timeout;
            st.half_open_successes = 0;
            warn!(
                recent_failures = st.failures.len(),
                window_secs = self.cfg.monitor_window.as_secs(),
                timeout_ms = self.cfg.timeout.as_millis() as u64,
                reopened = reopen,
                "circuit breaker open"
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = Instant::now();
        let st = self.lock();
        let open_remaining_ms = if st.state == CircuitState::Open && st.next_attempt > now {
            Some((st.next_attempt - now).as_millis() as u64)
        } else {
            None
        };
        let recent_failures = st
            .failures
            .iter()
            .filter(|t| now.duration_since(**t) < self.cfg.monitor_window)
            .count();
        CircuitBreakerSnapshot {
            state: st.state,
            failure_threshold: self.cfg.failure_threshold,
            timeout_ms: self.cfg.timeout.as_millis() as u64,
            monitor_window_ms: self.cfg.monitor_window.as_millis() as u64,
            recent_failures,
            half_open_successes: st.half_open_successes,
            open_remaining_ms,
        }
    }
}
