//! Engine tuning parameters.

use std::time::Duration;

use trading_core::error::ExchangeError;

use crate::retry::ExponentialBackoff;

/// Bounded exponential retry for transient exchange failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Random spread applied to each delay, as a fraction of it
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Fresh backoff sequence for one operation.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.base_delay, self.max_delay, self.jitter_factor)
    }

    /// Delay before the next attempt after `error`.
    ///
    /// Honors a rate limiter's hint. Every delay is capped at `max_delay`.
    pub fn delay_after(&self, backoff: &mut ExponentialBackoff, error: &ExchangeError) -> Duration {
        let delay = backoff.next_delay();
        let delay = match error {
            ExchangeError::RateLimited { retry_after_secs } => {
                delay.max(Duration::from_secs(*retry_after_secs))
            }
            _ => delay,
        };
        delay.min(self.max_delay)
    }
}

/// Configuration of the strategy manager and its workers.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long `stop_strategy` waits for a worker before detaching it
    pub stop_grace: Duration,
    /// Overall bound for `stop_all_strategies`
    pub shutdown_deadline: Duration,
    /// Timeout applied to every exchange request
    pub request_timeout: Duration,
    /// Poll interval for algorithms that do not set their own
    pub default_poll_interval: Duration,
    /// Cancel a worker's own resting orders when it stops cleanly
    pub cancel_open_orders_on_stop: bool,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(10),
            shutdown_deadline: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            default_poll_interval: Duration::from_secs(5),
            cancel_open_orders_on_stop: true,
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_hint_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            jitter_factor: 0.0,
        };
        let mut backoff = policy.backoff();

        let hinted = ExchangeError::RateLimited { retry_after_secs: 1 };
        assert_eq!(policy.delay_after(&mut backoff, &hinted), Duration::from_secs(1));

        let long_hint = ExchangeError::RateLimited { retry_after_secs: 60 };
        assert_eq!(policy.delay_after(&mut backoff, &long_hint), Duration::from_secs(2));

        let network = ExchangeError::Network("reset".into());
        assert_eq!(policy.delay_after(&mut backoff, &network), Duration::from_millis(400));
    }

    #[test]
    fn test_jittered_delay_never_exceeds_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            jitter_factor: 0.5,
        };
        let mut backoff = policy.backoff();
        let network = ExchangeError::Network("reset".into());
        for _ in 0..10 {
            assert!(policy.delay_after(&mut backoff, &network) <= Duration::from_secs(4));
        }
    }
}
