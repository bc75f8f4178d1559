//! Retry, pacing and rate-limit policies applied around every fetch.
//!
//! Retries cover transient failures only. Rate limiting is handled by a
//! separate cool-down path that never consumes the retry budget.

use rand::Rng;
use std::time::Duration;

use crate::config::RetrySettings;

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Exponential backoff for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the uniform jitter added to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }

    /// Backoff plus a uniform jitter in `[0, jitter]`.
    pub fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        self.backoff(attempt) + uniform(Duration::ZERO, self.jitter)
    }
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

/// Cool-down applied when a source explicitly rate-limits us.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    /// Used when the source gives no `Retry-After` hint.
    pub default_cooldown: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            default_cooldown: Duration::from_secs(45),
            jitter_min: Duration::from_secs(1),
            jitter_max: Duration::from_secs(5),
        }
    }
}

impl RateLimitPolicy {
    /// Cool-down for a given hint, jitter included.
    pub fn cooldown(&self, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(self.default_cooldown) + uniform(self.jitter_min, self.jitter_max)
    }
}

// ---------------------------------------------------------------------------
// Combined provider policy
// ---------------------------------------------------------------------------

/// Everything a provider applies around a single `fetch_price` call.
#[derive(Debug, Clone)]
pub struct ProviderPolicy {
    /// Pre-request delay bounds, drawn once per call.
    pub pre_delay_min: Duration,
    pub pre_delay_max: Duration,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimitPolicy,
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        Self {
            pre_delay_min: Duration::from_secs(2),
            pre_delay_max: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

impl ProviderPolicy {
    pub fn from_settings(s: &RetrySettings) -> Self {
        Self {
            pre_delay_min: Duration::from_millis(s.pre_delay_min_ms),
            pre_delay_max: Duration::from_millis(s.pre_delay_max_ms),
            retry: RetryPolicy {
                max_attempts: s.max_attempts.max(1),
                base_delay: Duration::from_millis(s.base_delay_ms),
                max_delay: Duration::from_millis(s.max_delay_ms),
                jitter: Duration::from_millis(s.jitter_ms),
            },
            rate_limit: RateLimitPolicy {
                default_cooldown: Duration::from_secs(s.rate_limit_default_secs),
                jitter_min: Duration::from_millis(s.cooldown_jitter_min_ms),
                jitter_max: Duration::from_millis(s.cooldown_jitter_max_ms),
            },
        }
    }

    /// A policy with every wait set to zero. Used by tests.
    pub fn immediate() -> Self {
        Self {
            pre_delay_min: Duration::ZERO,
            pre_delay_max: Duration::ZERO,
            retry: RetryPolicy {
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                jitter: Duration::ZERO,
                ..RetryPolicy::default()
            },
            rate_limit: RateLimitPolicy {
                default_cooldown: Duration::ZERO,
                jitter_min: Duration::ZERO,
                jitter_max: Duration::ZERO,
            },
        }
    }

    pub fn pre_delay(&self) -> Duration {
        uniform(self.pre_delay_min, self.pre_delay_max)
    }
}

/// Uniform duration in `[min, max]`; returns `min` when the range is empty.
pub fn uniform(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
    Duration::from_millis(millis as u64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
