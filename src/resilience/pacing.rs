use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacingSnapshot {
    pub success_streak: u32,
    pub failure_streak: u32,
    /// Mean of the recorded response times, if any.
    pub avg_response_ms: Option<u64>,
    /// Delay before jitter for the current state.
    pub nominal_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PacingConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Hard floor applied after jitter.
    pub min_delay: Duration,
    /// Floor for the success-streak speedup.
    pub accelerated_floor: Duration,
    /// Success streak length above which pacing speeds up.
    pub success_streak_threshold: u32,
    pub acceleration_factor: f64,
    /// Mean response time above which the remote is considered congested.
    pub slow_response_threshold: Duration,
    pub slow_response_factor: f64,
    /// Total jitter span as a fraction of the delay, centred on zero.
    pub jitter_factor: f64,
    pub history_capacity: usize,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2_000),
            max_delay: Duration::from_millis(30_000),
            min_delay: Duration::from_millis(500),
            accelerated_floor: Duration::from_millis(1_000),
            success_streak_threshold: 5,
            acceleration_factor: 0.8,
            slow_response_threshold: Duration::from_millis(3_000),
            slow_response_factor: 1.5,
            jitter_factor: 0.3,
            history_capacity: 10,
        }
    }
}

impl PacingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    /// Set the jitter span. `0.0` makes `compute_delay` deterministic.
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = if factor.is_finite() { factor.clamp(0.0, 1.0) } else { 0.0 };
        self
    }
}

#[derive(Debug, Default)]
struct State {
    success_streak: u32,
    failure_streak: u32,
    response_times: VecDeque<Duration>,
}

/// Adaptive inter-request delay driven by recent outcomes.
///
/// Failures back off exponentially, a long success streak speeds up gently,
/// slow responses stretch the delay, and jitter keeps independent runs from
/// synchronizing.
pub struct PacingController {
    cfg: PacingConfig,
    state: Mutex<State>,
}

impl PacingController {
    pub fn new(cfg: PacingConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_success(&self, response_time: Option<Duration>) {
        let mut st = self.lock();
        st.success_streak = st.success_streak.saturating_add(1);
        st.failure_streak = 0;
        if let Some(rt) = response_time {
            st.response_times.push_back(rt);
            while st.response_times.len() > self.cfg.history_capacity {
                st.response_times.pop_front();
            }
        }
    }

    pub fn record_failure(&self) {
        let mut st = self.lock();
        st.failure_streak = st.failure_streak.saturating_add(1);
        st.success_streak = 0;
    }

    fn avg_response(st: &State) -> Option<Duration> {
        if st.response_times.is_empty() {
            return None;
        }
        let total: Duration = st.response_times.iter().sum();
        Some(total / st.response_times.len() as u32)
    }

    fn nominal_delay_ms(&self, st: &State) -> f64 {
        let cfg = &self.cfg;
        let base = cfg.base_delay.as_millis() as f64;
        let max = cfg.max_delay.as_millis() as f64;

        let mut delay = base;
        if st.failure_streak > 0 {
            // powi on a capped exponent keeps huge streaks finite
            let factor = 2f64.powi(st.failure_streak.min(64) as i32);
            delay = (base * factor).min(max);
        } else if st.success_streak > cfg.success_streak_threshold {
            delay = (delay * cfg.acceleration_factor)
                .max(cfg.accelerated_floor.as_millis() as f64);
        }

        if let Some(avg) = Self::avg_response(st) {
            if avg > cfg.slow_response_threshold {
                delay *= cfg.slow_response_factor;
            }
        }
        delay
    }

    /// Next inter-request delay, always within `[min_delay, max_delay]`.
    pub fn compute_delay(&self) -> Duration {
        let nominal = {
            let st = self.lock();
            self.nominal_delay_ms(&st)
        };
        let jitter = if self.cfg.jitter_factor > 0.0 {
            nominal * self.cfg.jitter_factor * rand::thread_rng().gen_range(-0.5..0.5)
        } else {
            0.0
        };
        let min = self.cfg.min_delay.as_millis() as f64;
        let max = (self.cfg.max_delay.as_millis() as f64).max(min);
        let ms = (nominal + jitter).clamp(min, max).round();
        Duration::from_millis(ms as u64)
    }

    /// Sleep for [`compute_delay`](Self::compute_delay).
    pub async fn wait(&self) {
        let delay = self.compute_delay();
        {
            let st = self.lock();
            debug!(
                delay_ms = delay.as_millis() as u64,
                success_streak = st.success_streak,
                failure_streak = st.failure_streak,
                "pacing delay"
            );
        }
        tokio::time::sleep(delay).await;
    }

    pub fn snapshot(&self) -> PacingSnapshot {
        let st = self.lock();
        PacingSnapshot {
            success_streak: st.success_streak,
            failure_streak: st.failure_streak,
            avg_response_ms: Self::avg_response(&st).map(|d| d.as_millis() as u64),
            nominal_delay_ms: self.nominal_delay_ms(&st).round() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady() -> PacingController {
        PacingController::new(PacingConfig::new().with_jitter_factor(0.0))
    }

    #[test]
    fn test_base_delay_without_history() {
        assert_eq!(steady().compute_delay(), Duration::from_millis(2_000));
    }

    #[test]
    fn test_failure_backoff_is_exponential_and_capped() {
        let p = steady();
        p.record_failure();
        assert_eq!(p.compute_delay(), Duration::from_millis(4_000));
        p.record_failure();
        assert_eq!(p.compute_delay(), Duration::from_millis(8_000));
        for _ in 0..10 {
            p.record_failure();
        }
        assert_eq!(p.compute_delay(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_success_streak_accelerates() {
        let p = steady();
        for _ in 0..5 {
            p.record_success(None);
        }
        assert_eq!(p.compute_delay(), Duration::from_millis(2_000));
        p.record_success(None);
        assert_eq!(p.compute_delay(), Duration::from_millis(1_600));
    }

    #[test]
    fn test_streaks_are_mutually_exclusive() {
        let p = steady();
        p.record_failure();
        p.record_failure();
        p.record_success(None);
        let snap = p.snapshot();
        assert_eq!(snap.failure_streak, 0);
        assert_eq!(snap.success_streak, 1);

        p.record_failure();
        let snap = p.snapshot();
        assert_eq!(snap.success_streak, 0);
        assert_eq!(snap.failure_streak, 1);
    }

    #[test]
    fn test_slow_responses_stretch_delay() {
        let p = steady();
        p.record_success(Some(Duration::from_millis(4_000)));
        assert_eq!(p.compute_delay(), Duration::from_millis(3_000));
        assert_eq!(p.snapshot().avg_response_ms, Some(4_000));
    }

    #[test]
    fn test_history_is_bounded() {
        let p = steady();
        for _ in 0..10 {
            p.record_success(Some(Duration::from_millis(10_000)));
        }
        for _ in 0..10 {
            p.record_success(Some(Duration::from_millis(100)));
        }
        assert_eq!(p.snapshot().avg_response_ms, Some(100));
    }

    #[test]
    fn test_delay_always_within_bounds() {
        let p = PacingController::new(PacingConfig::default());
        for _ in 0..200 {
            p.record_failure();
            let d = p.compute_delay();
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(30_000));
        }
        for _ in 0..200 {
            p.record_success(Some(Duration::from_millis(60_000)));
            let d = p.compute_delay();
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(30_000));
        }
    }

    #[test]
    fn test_floor_applies_to_tiny_base() {
        let p = PacingController::new(
            PacingConfig::new()
                .with_base_delay(Duration::from_millis(10))
                .with_jitter_factor(0.0),
        );
        assert_eq!(p.compute_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_within_fifteen_percent() {
        let p = PacingController::new(PacingConfig::default());
        for _ in 0..200 {
            let ms = p.compute_delay().as_millis() as u64;
            assert!((1_700..=2_300).contains(&ms), "{} outside jitter band", ms);
        }
    }
}
