//! Bounded exponential backoff for transient provider failures.
//!
//! `RetryPolicy` is plain data: it decides *whether* another attempt is allowed
//! and *how long* to wait before it. The completion client owns the loop and the
//! sleeping, so the policy can be exercised without a runtime or a network.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// How the computed backoff is randomised before sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jitter {
    /// Sleep exactly the exponential backoff.
    None,
    /// Uniform in `[0, backoff]`.
    #[default]
    Full,
    /// Uniform in `[backoff / 2, backoff]`.
    Equal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Ceiling applied before jitter.
    pub max_delay: Duration,
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(20),
            jitter: Jitter::Full,
        }
    }
}

impl RetryPolicy {
    /// True while another attempt is allowed after `failed` failed attempts.
    pub fn should_retry(&self, failed: u32) -> bool {
        failed < self.max_attempts.max(1)
    }

    /// Un-jittered delay after the `failed`-th failed attempt (1-based).
    pub fn backoff(&self, failed: u32) -> Duration {
        let exp = failed.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Delay to sleep after the `failed`-th failed attempt. Never exceeds `backoff(failed)`.
    pub fn delay_for<R: Rng + ?Sized>(&self, failed: u32, rng: &mut R) -> Duration {
        let ceiling = self.backoff(failed);
        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        match self.jitter {
            Jitter::None => ceiling,
            Jitter::Full => Duration::from_millis(rng.gen_range(0..=ceiling_ms)),
            Jitter::Equal => {
                let half = ceiling_ms / 2;
                Duration::from_millis(rng.gen_range(half..=ceiling_ms))
            }
        }
    }
}
