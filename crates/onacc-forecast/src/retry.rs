//! Bounded retry for per-locality fetches.
//!
//! Only network-level failures (timeouts, refused connections) are retried,
//! and at most once, so every locality still ends with exactly one outcome.
//! API errors, schema errors and invalid configs are never retried.

use std::future::Future;
use std::time::Duration;

use crate::error::ForecastError;

/// Upper bound on retries per locality
pub const MAX_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Number of retries after the first attempt (0 or 1)
    pub max_retries: u32,
    /// Delay before each retry
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryConfig {
    /// Retries beyond `MAX_RETRIES` are clamped.
    pub fn new(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES),
            delay: Duration::from_millis(delay_ms),
        }
    }

    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn from_pipeline_config(config: &onacc_core::PipelineConfig) -> Self {
        if config.retry_network_errors {
            Self::new(MAX_RETRIES, config.retry_delay_ms)
        } else {
            Self::disabled()
        }
    }
}

/// Run `operation`, retrying it when it fails with a retryable error.
///
/// Returns the first success or the last error.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, ForecastError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ForecastError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!("Request succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                tracing::warn!(
                    "Retryable error, attempt {} of {} in {:?}: {}",
                    attempt + 1,
                    config.max_retries + 1,
                    config.delay,
                    e
                );
                tokio::time::sleep(config.delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!("Giving up after {} attempts: {}", attempt + 1, e);
                } else {
                    tracing::debug!("Non-retryable error: {}", e);
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onacc_core::NetworkError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.delay, Duration::from_millis(500));
    }

    #[test]
    fn test_retries_are_clamped() {
        assert_eq!(RetryConfig::new(5, 10).max_retries, 1);
        assert_eq!(RetryConfig::new(0, 10).max_retries, 0);
    }

    #[test]
    fn test_from_pipeline_config() {
        let mut pipeline = onacc_core::PipelineConfig::default();
        assert_eq!(RetryConfig::from_pipeline_config(&pipeline).max_retries, 1);

        pipeline.retry_network_errors = false;
        assert_eq!(RetryConfig::from_pipeline_config(&pipeline).max_retries, 0);
    }

    #[tokio::test]
    async fn test_network_error_retried_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&RetryConfig::new(1, 0), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ForecastError::Network(NetworkError::Timeout))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(&RetryConfig::new(1, 0), || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ForecastError::Network(NetworkError::ConnectionFailed(
                    "reset".into(),
                )))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_api_and_schema_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&RetryConfig::new(1, 0), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ForecastError::Api {
                status: 503,
                body: "down".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&RetryConfig::new(1, 0), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ForecastError::Schema("bad".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_makes_single_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&RetryConfig::disabled(), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ForecastError::Network(NetworkError::Timeout))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
