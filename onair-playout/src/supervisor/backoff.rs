//! Restart backoff with symmetric jitter
//!
//! The delay before restart attempt `n` (1-based) is:
//!
//! ```text
//! exponential(n) = min(max, base × 2^(n-1))
//! span           = floor(exponential(n) × jitter_ratio)
//! delay          = max(100ms, exponential(n) + uniform[-span, +span])
//! ```
//!
//! The exponential part is derived from the attempt number alone, so jitter
//! never feeds back into later attempts.

use rand::Rng;
use std::time::Duration;

use crate::error::{Error, Result};

/// Lower clamp applied after jitter
pub const MIN_BACKOFF: Duration = Duration::from_millis(100);

/// Restart backoff parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first restart (before jitter)
    pub base: Duration,
    /// Cap on the exponential part
    pub max: Duration,
    /// Jitter band as a fraction of the exponential part, in `0.0..=1.0`
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            max: Duration::from_millis(30_000),
            jitter_ratio: 0.2,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration, jitter_ratio: f64) -> Result<Self> {
        let policy = Self {
            base,
            max,
            jitter_ratio,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base.is_zero() {
            return Err(Error::Config("base backoff must be greater than zero".to_string()));
        }
        if self.max < self.base {
            return Err(Error::Config(format!(
                "max backoff ({}ms) must not be below base backoff ({}ms)",
                self.max.as_millis(),
                self.base.as_millis()
            )));
        }
        if !self.jitter_ratio.is_finite() || !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(Error::Config(format!(
                "jitter ratio must be within 0.0..=1.0, got {}",
                self.jitter_ratio
            )));
        }
        Ok(())
    }

    /// `min(max, base × 2^(attempt-1))`; attempt 0 is treated as 1
    pub fn exponential(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.exponential_ms(attempt))
    }

    /// `floor(exponential(attempt) × jitter_ratio)`
    pub fn span(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.span_ms(attempt))
    }

    /// Inclusive range every `delay(attempt)` falls into
    pub fn bounds(&self, attempt: u32) -> (Duration, Duration) {
        let exp = self.exponential_ms(attempt);
        let span = self.span_ms(attempt);
        let floor = MIN_BACKOFF.as_millis() as u64;
        (
            Duration::from_millis(exp.saturating_sub(span).max(floor)),
            Duration::from_millis(exp.saturating_add(span).max(floor)),
        )
    }

    /// Jittered delay before restart `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    /// Same as [`delay`](Self::delay) with a caller-supplied RNG
    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exp = self.exponential_ms(attempt) as i128;
        let span = self.span_ms(attempt) as i128;
        let jitter = if span == 0 {
            0
        } else {
            rng.gen_range(-span..=span)
        };

        let floor = MIN_BACKOFF.as_millis() as i128;
        let ms = (exp + jitter).max(floor).min(u64::MAX as i128);
        Duration::from_millis(ms as u64)
    }

    fn exponential_ms(&self, attempt: u32) -> u64 {
        let base_ms = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        let shift = attempt.saturating_sub(1).min(63);
        base_ms.saturating_mul(1u64 << shift).min(max_ms)
    }

    fn span_ms(&self, attempt: u32) -> u64 {
        (self.exponential_ms(attempt) as f64 * self.jitter_ratio).floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scenario_a() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(1_000), Duration::from_millis(8_000), 0.2)
            .expect("valid policy")
    }

    #[test]
    fn test_exponential_doubles_until_cap() {
        let policy = scenario_a();
        assert_eq!(policy.exponential(1), Duration::from_millis(1_000));
        assert_eq!(policy.exponential(2), Duration::from_millis(2_000));
        assert_eq!(policy.exponential(3), Duration::from_millis(4_000));
        assert_eq!(policy.exponential(4), Duration::from_millis(8_000));
        assert_eq!(policy.exponential(5), Duration::from_millis(8_000));
        assert_eq!(policy.exponential(u32::MAX), Duration::from_millis(8_000));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        let policy = scenario_a();
        assert_eq!(policy.exponential(0), policy.exponential(1));
    }

    #[test]
    fn test_scenario_a_bands() {
        let policy = scenario_a();
        assert_eq!(
            policy.bounds(1),
            (Duration::from_millis(800), Duration::from_millis(1_200))
        );
        assert_eq!(
            policy.bounds(2),
            (Duration::from_millis(1_600), Duration::from_millis(2_400))
        );
        assert_eq!(
            policy.bounds(3),
            (Duration::from_millis(3_200), Duration::from_millis(4_800))
        );
    }

    #[test]
    fn test_delay_always_within_bounds() {
        let policy = scenario_a();
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 1..=12 {
            let (low, high) = policy.bounds(attempt);
            for _ in 0..500 {
                let delay = policy.delay_with(attempt, &mut rng);
                assert!(
                    delay >= low && delay <= high,
                    "attempt {}: {:?} outside [{:?}, {:?}]",
                    attempt,
                    delay,
                    low,
                    high
                );
            }
        }
    }

    #[test]
    fn test_jitter_actually_spreads() {
        let policy = scenario_a();
        let mut rng = StdRng::seed_from_u64(42);
        let samples: Vec<Duration> = (0..200).map(|_| policy.delay_with(3, &mut rng)).collect();
        let min = samples.iter().min().copied().unwrap_or_default();
        let max = samples.iter().max().copied().unwrap_or_default();
        assert!(max - min > Duration::from_millis(400), "spread {:?}..{:?}", min, max);
    }

    #[test]
    fn test_floor_applies_to_tiny_base() {
        let policy =
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(40), 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for attempt in 1..=5 {
            for _ in 0..100 {
                assert!(policy.delay_with(attempt, &mut rng) >= MIN_BACKOFF);
            }
        }
        assert_eq!(policy.bounds(1), (MIN_BACKOFF, MIN_BACKOFF));
    }

    #[test]
    fn test_zero_ratio_is_deterministic() {
        let policy =
            BackoffPolicy::new(Duration::from_millis(500), Duration::from_secs(10), 0.0).unwrap();
        for attempt in 1..=4 {
            assert_eq!(policy.delay(attempt), policy.exponential(attempt));
        }
    }

    #[test]
    fn test_validation_rejects_bad_parameters() {
        assert!(BackoffPolicy::new(Duration::ZERO, Duration::from_secs(1), 0.2).is_err());
        assert!(
            BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(1), 0.2).is_err()
        );
        assert!(
            BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(2), 1.5).is_err()
        );
        assert!(
            BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(2), f64::NAN).is_err()
        );
    }
}
