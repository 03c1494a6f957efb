//! Query cache configuration.
//!
//! Controls freshness, garbage collection and retry behavior of the query
//! client. The binary builds it from the validated `[cache]` settings.

use std::time::Duration;

const DEFAULT_STALE_TIME_MS: u64 = 0;
const DEFAULT_GC_TIME_MS: u64 = 5 * 60 * 1000;
const DEFAULT_RETRY: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Runtime settings for a [`QueryClient`](super::QueryClient).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long fetched data counts as fresh. Zero means stale immediately.
    pub stale_time: Duration,
    /// How long an unobserved entry stays cached before eviction.
    pub gc_time: Duration,
    /// Extra attempts for a failing query fetch. Mutations never retry.
    pub retry: u32,
    /// Base delay of the exponential retry backoff.
    pub retry_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_millis(DEFAULT_STALE_TIME_MS),
            gc_time: Duration::from_millis(DEFAULT_GC_TIME_MS),
            retry: DEFAULT_RETRY,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            stale_time: settings.stale_time,
            gc_time: settings.gc_time,
            retry: settings.retry,
            retry_delay: settings.retry_delay,
        }
    }
}

impl CacheConfig {
    /// Backoff before retry number `attempt` (zero based), capped at 30s.
    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        let base = u64::try_from(self.retry_delay.as_millis()).unwrap_or(u64::MAX);
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor).min(MAX_RETRY_DELAY_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.stale_time, Duration::ZERO);
        assert_eq!(config.gc_time, Duration::from_secs(300));
        assert_eq!(config.retry, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn retry_delay_doubles_per_attempt() {
        let config = CacheConfig::default();
        assert_eq!(config.retry_delay_for(0), Duration::from_millis(1000));
        assert_eq!(config.retry_delay_for(1), Duration::from_millis(2000));
        assert_eq!(config.retry_delay_for(2), Duration::from_millis(4000));
    }

    #[test]
    fn retry_delay_is_capped() {
        let config = CacheConfig::default();
        assert_eq!(config.retry_delay_for(10), Duration::from_secs(30));
        assert_eq!(config.retry_delay_for(80), Duration::from_secs(30));
    }
}
