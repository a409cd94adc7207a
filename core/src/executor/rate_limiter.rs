//! Rate-derived delay between trials

use governor::{
    clock::DefaultClock, state::InMemoryState, state::NotKeyed, Jitter, Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::config::TrialRate;

/// Longest spacing the limiter accepts; slower rates are clamped to it.
const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Spaces trials at the configured rate using a governor token bucket
///
/// The bucket holds a single token, so there is no initial burst: the first
/// trial is admitted immediately and each later one waits a full interval.
pub struct TrialRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    interval: Duration,
    jitter: Duration,
}

impl TrialRateLimiter {
    /// Create a limiter for `rate`, adding up to `jitter` × interval of
    /// random delay to each wait
    pub fn new(rate: &TrialRate, jitter: f64) -> Self {
        let interval = rate
            .interval()
            .clamp(Duration::from_nanos(1), MAX_INTERVAL);
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(NonZeroU32::MIN);
        let jitter = if jitter > 0.0 {
            interval.mul_f64(jitter.min(1.0))
        } else {
            Duration::ZERO
        };

        Self {
            limiter: RateLimiter::direct(quota),
            interval,
            jitter,
        }
    }

    /// Wait until the next trial may start
    pub async fn wait(&self) {
        if self.jitter.is_zero() {
            self.limiter.until_ready().await;
        } else {
            self.limiter
                .until_ready_with_jitter(Jitter::up_to(self.jitter))
                .await;
        }
    }

    /// Try to admit a trial without waiting
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Spacing between trials
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum jitter added to each wait
    pub fn max_jitter(&self) -> Duration {
        self.jitter
    }
}

impl std::fmt::Debug for TrialRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrialRateLimiter")
            .field("interval", &self.interval)
            .field("jitter", &self.jitter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_interval_from_rate() {
        let limiter = TrialRateLimiter::new(&TrialRate::PerSecond(20.0), 0.0);
        assert_eq!(limiter.interval(), Duration::from_millis(50));
        assert_eq!(limiter.max_jitter(), Duration::ZERO);
    }

    #[test]
    fn test_jitter_fraction() {
        let limiter =
            TrialRateLimiter::new(&TrialRate::Interval(Duration::from_millis(100)), 0.5);
        assert_eq!(limiter.max_jitter(), Duration::from_millis(50));
    }

    #[test]
    fn test_no_initial_burst() {
        let limiter = TrialRateLimiter::new(&TrialRate::PerSecond(10.0), 0.0);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_wait_spaces_trials() {
        let limiter = TrialRateLimiter::new(&TrialRate::PerSecond(50.0), 0.0);
        let start = Instant::now();
        for _ in 0..4 {
            limiter.wait().await;
        }
        // First is immediate, three more at 20ms spacing
        assert!(start.elapsed() >= Duration::from_millis(55));
    }

    #[test]
    fn test_rate_limiter_debug() {
        let limiter = TrialRateLimiter::new(&TrialRate::PerSecond(10.0), 0.0);
        let debug = format!("{:?}", limiter);
        assert!(debug.contains("TrialRateLimiter"));
        assert!(debug.contains("100ms"));
    }
}
