//! Retry with exponential backoff for calls to model providers.

use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::extraction::ExtractionError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Time budget for one attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(180),
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let secs = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powf(attempt.saturating_sub(1) as f64);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Failures worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    Network,
    TooManyRequests,
    ServiceUnavailable,
    ServerError,
    Timeout,
}

impl TransientError {
    pub fn classify(err: &ExtractionError) -> Option<Self> {
        match err {
            ExtractionError::Network(msg) if msg.to_lowercase().contains("timed out") => {
                Some(TransientError::Timeout)
            }
            ExtractionError::Network(_) => Some(TransientError::Network),
            ExtractionError::Api { status: 429, .. } => Some(TransientError::TooManyRequests),
            ExtractionError::Api { status: 503, .. } => Some(TransientError::ServiceUnavailable),
            ExtractionError::Api { status, .. } if *status >= 500 => Some(TransientError::ServerError),
            _ => None,
        }
    }

    /// Minimum wait suggested for this kind of failure
    pub fn recommended_delay(&self) -> Duration {
        match self {
            TransientError::TooManyRequests => Duration::from_secs(20),
            TransientError::ServiceUnavailable => Duration::from_secs(10),
            TransientError::ServerError | TransientError::Network | TransientError::Timeout => {
                Duration::from_secs(2)
            }
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, ExtractionError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ExtractionError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match timeout(config.attempt_timeout, operation()).await {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    tracing::info!("Request succeeded on attempt {}", attempt);
                }
                return Ok(value);
            }
            Ok(Err(error)) => error,
            Err(_) => ExtractionError::Network("request timed out".to_string()),
        };

        let Some(transient) = TransientError::classify(&error) else {
            return Err(error);
        };

        if attempt >= config.max_attempts {
            tracing::warn!("Giving up after {} attempts: {}", attempt, error);
            return Err(error);
        }

        let delay = config
            .backoff(attempt)
            .max(transient.recommended_delay())
            .min(config.max_delay);
        tracing::debug!(
            "Transient error on attempt {} ({:?}), retrying in {:?}",
            attempt,
            transient,
            delay
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(fast(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ExtractionError::Api {
                        status: 503,
                        body: "busy".to_string(),
                    })
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = with_retry(fast(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ExtractionError::Api {
                    status: 401,
                    body: "bad key".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(ExtractionError::Api { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = with_retry(fast(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ExtractionError::Network("connection refused".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_transient_classification() {
        let api = |status| ExtractionError::Api {
            status,
            body: String::new(),
        };
        assert_eq!(TransientError::classify(&api(429)), Some(TransientError::TooManyRequests));
        assert_eq!(TransientError::classify(&api(502)), Some(TransientError::ServerError));
        assert_eq!(TransientError::classify(&api(400)), None);
        assert_eq!(
            TransientError::classify(&ExtractionError::Parse("x".into())),
            None
        );
        assert_eq!(
            TransientError::classify(&ExtractionError::Network("operation timed out".into())),
            Some(TransientError::Timeout)
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            ..RetryConfig::default()
        };
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(5), Duration::from_secs(3));
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }
}
