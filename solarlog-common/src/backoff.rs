//! Capped exponential backoff.
//!
//! A pure function of failure count to delay, applied uniformly to device
//! reconnect attempts and sink retry attempts.

use std::time::Duration;

/// Capped exponential backoff policy.
///
/// The delay after `n` consecutive failures is `base * multiplier^(n-1)`,
/// capped at `ceiling`. Zero failures yield zero delay.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub base: Duration,
    /// Growth factor per additional failure.
    pub multiplier: f64,
    /// Maximum delay.
    pub ceiling: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            ceiling: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the next attempt after `failures` consecutive failures.
    ///
    /// Non-finite or negative products clamp into `[0, ceiling]`; the
    /// `Duration` conversion never panics.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        // Clamp the exponent; beyond ~64 doublings the ceiling always wins.
        let exp = (failures - 1).min(64) as i32;
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exp);
        if !secs.is_finite() {
            return self.ceiling;
        }
        Duration::from_secs_f64(secs.clamp(0.0, self.ceiling.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            ceiling: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_no_failures_no_delay() {
        assert_eq!(policy().delay(0), Duration::ZERO);
    }

    #[test]
    fn test_exponential_growth() {
        let p = policy();
        assert_eq!(p.delay(1), Duration::from_secs(1));
        assert_eq!(p.delay(2), Duration::from_secs(2));
        assert_eq!(p.delay(3), Duration::from_secs(4));
        assert_eq!(p.delay(4), Duration::from_secs(8));
    }

    #[test]
    fn test_strictly_increasing_until_ceiling() {
        let p = policy();
        let mut previous = Duration::ZERO;
        for failures in 1..=10 {
            let d = p.delay(failures);
            if d < p.ceiling {
                assert!(d > previous, "delay must grow until the cap");
            }
            previous = d;
        }
    }

    #[test]
    fn test_ceiling_applies() {
        let p = policy();
        assert_eq!(p.delay(7), Duration::from_secs(60));
        assert_eq!(p.delay(100), Duration::from_secs(60));
        // No overflow for absurd counts
        assert_eq!(p.delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_pathological_multiplier_never_panics() {
        // A negative multiplier flips the sign of every other product.
        let p = BackoffPolicy {
            base: Duration::from_secs(1),
            multiplier: -2.0,
            ceiling: Duration::from_secs(60),
        };
        for failures in 1..=6 {
            let d = p.delay(failures);
            assert!(d <= p.ceiling);
        }
        // -2^1 = -2 clamps to zero
        assert_eq!(p.delay(2), Duration::ZERO);

        let p = BackoffPolicy {
            base: Duration::from_secs(1),
            multiplier: f64::NAN,
            ceiling: Duration::from_secs(60),
        };
        assert_eq!(p.delay(3), Duration::from_secs(60));
    }

    #[test]
    fn test_non_integer_multiplier() {
        let p = BackoffPolicy {
            base: Duration::from_millis(500),
            multiplier: 1.5,
            ceiling: Duration::from_secs(10),
        };
        assert_eq!(p.delay(1), Duration::from_millis(500));
        assert_eq!(p.delay(2), Duration::from_millis(750));
    }
}
