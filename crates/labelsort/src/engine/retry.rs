//! Bounded exponential backoff for transient service errors.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::gmail::MailError;
use crate::llm::LlmError;

/// Errors that can say whether repeating the request may help.
pub trait Transient {
    fn is_transient(&self) -> bool;

    /// Delay the service asked for, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Transient for MailError {
    fn is_transient(&self) -> bool {
        MailError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            MailError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        LlmError::is_transient(self)
    }
}

/// The last error of a retried operation and how many attempts were made.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub error: E,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `failed + 1`, after `failed` failures.
    pub fn backoff(&self, failed: u32) -> Duration {
        let exponent = failed.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, Exhausted<E>>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.max_attempts => {
                    let delay = error
                        .retry_after()
                        .map(|hint| hint.max(self.backoff(attempt)).min(self.max_backoff))
                        .unwrap_or_else(|| self.backoff(attempt));
                    log::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt,
                        self.max_attempts,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    return Err(Exhausted {
                        attempts: attempt,
                        error,
                    })
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
