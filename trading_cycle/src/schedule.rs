//! When the next cycle is due.

use std::time::Duration;

use tokio::time::Instant;

/// Linear backoff, capped: `min(cap, attempt × step)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub step: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(30),
            cap: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.cap)
    }
}

/// Retry state of the periodic loop.
///
/// `attempt` starts at 1 and resets to 1 after a successful cycle. After a
/// failure the next cycle waits for the backoff of the current attempt and
/// then the regular interval.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    policy: BackoffPolicy,
    interval: Duration,
    attempt: u32,
    next_due: Instant,
}

impl RetrySchedule {
    pub fn new(interval: Duration, policy: BackoffPolicy) -> Self {
        Self {
            policy,
            interval,
            attempt: 1,
            next_due: Instant::now(),
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn record_success(&mut self, now: Instant) {
        self.attempt = 1;
        self.next_due = now + self.interval;
    }

    /// Returns the backoff applied on top of the interval.
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        let backoff = self.policy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.next_due = now + backoff + self.interval;
        backoff
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn backoff_grows_by_step_until_cap() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = (1..=12).map(|a| policy.delay(a).as_secs()).collect();
        assert_eq!(
            delays,
            vec![30, 60, 90, 120, 150, 180, 210, 240, 270, 300, 300, 300]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_attempt() {
        let mut schedule = RetrySchedule::new(Duration::from_secs(60), BackoffPolicy::default());
        let now = Instant::now();

        assert_eq!(schedule.record_failure(now), Duration::from_secs(30));
        assert_eq!(schedule.record_failure(now), Duration::from_secs(60));
        assert_eq!(schedule.attempt(), 3);
        assert_eq!(schedule.next_due(), now + Duration::from_secs(120));

        schedule.record_success(now);
        assert_eq!(schedule.attempt(), 1);
        assert_eq!(schedule.next_due(), now + Duration::from_secs(60));
        assert_eq!(schedule.record_failure(now), Duration::from_secs(30));
    }

    proptest! {
        #[test]
        fn backoff_is_monotone_and_capped(attempt in 1u32..10_000) {
            let policy = BackoffPolicy::default();
            let d = policy.delay(attempt);
            prop_assert!(d <= policy.cap);
            prop_assert!(d >= policy.delay(attempt - 1));
            if attempt <= 10 {
                prop_assert_eq!(d, Duration::from_secs(30 * attempt as u64));
            }
        }
    }
}
