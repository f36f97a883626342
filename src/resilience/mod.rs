//! # Resilience Primitives Module
//!
//! Failure isolation and pacing for a harvest run. Both primitives are owned
//! by one pipeline and never shared across runs.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`circuit_breaker`] | Sliding-window circuit breaker gating page fetches |
//! | [`pacing`] | Adaptive inter-request delay from recent outcomes |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: requests pass through, failures are counted in a sliding window
//! - **Open**: threshold reached, requests fail fast with `CircuitOpen`
//! - **Half-Open**: cooldown elapsed, three successes are needed to close
//!
//! ```rust
//! use resilient_harvest::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::new()
//!     .with_failure_threshold(3)
//!     .with_timeout(Duration::from_secs(120))
//!     .with_monitor_window(Duration::from_secs(600));
//! let breaker = CircuitBreaker::new(config);
//! assert!(breaker.allow().is_ok());
//! ```
//!
//! ## Pacing
//!
//! ```rust
//! use resilient_harvest::resilience::pacing::{PacingConfig, PacingController};
//! use std::time::Duration;
//!
//! let pacing = PacingController::new(PacingConfig::default());
//! pacing.record_success(Some(Duration::from_millis(350)));
//! let delay = pacing.compute_delay();
//! assert!(delay >= Duration::from_millis(500));
//! ```

pub mod circuit_breaker;
pub mod pacing;
