//! Retry executor: exponential backoff with jitter around any async operation.
//!
//! The operation is attempted up to `max_retries + 1` times. Errors that are not
//! `Retryable` abort on the attempt that produced them.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Jitter spread as a fraction of the computed delay (±30%).
const JITTER_FRACTION: f64 = 0.3;

/// Classifies an error as transient (worth another attempt) or fatal.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(&self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self.clone()
        }
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Un-jittered delay after the `failed_attempt`-th attempt failed (1-based):
    /// `min(base * exponential_base^(failed_attempt - 1), max)`.
    pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1) as i32;
        let raw_ms = self.base_delay.as_millis() as f64 * self.exponential_base.powi(exponent);
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms.max(0.0).round() as u64)
    }

    fn delay_before_next(&self, failed_attempt: u32) -> Duration {
        let delay = self.backoff_delay(failed_attempt);
        if !self.jitter {
            return delay;
        }
        let delay_ms = delay.as_millis() as f64;
        let spread = rand::thread_rng().gen_range(-1.0..=1.0) * delay_ms * JITTER_FRACTION;
        Duration::from_millis((delay_ms + spread).max(0.0).round() as u64)
    }
}

/// Successful outcome plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// A non-retryable error; remaining attempts were not consumed.
    #[error("non-retryable failure on attempt {attempts}: {error}")]
    Fatal { attempts: u32, error: E },

    /// Every attempt failed with a retryable error.
    #[error("failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Runs `operation` until it succeeds, fails fatally, or the budget is spent.
/// The closure receives the 1-based attempt number.
pub async fn execute_with_retry<T, E, F, Fut>(
    mut operation: F,
    config: &RetryConfig,
    context: &str,
) -> Result<Retried<T>, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let total_attempts = config.total_attempts();
    let mut attempt = 1;

    loop {
        debug!("{context} - Attempt {attempt}/{total_attempts}");

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{context} succeeded on attempt {attempt}");
                }
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(err) if !err.is_retryable() => {
                warn!("{context} - Non-retryable error: {err}");
                return Err(RetryError::Fatal {
                    attempts: attempt,
                    error: err,
                });
            }
            Err(err) if attempt >= total_attempts => {
                error!("{context} - All {total_attempts} attempts failed");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            Err(err) => {
                let delay = config.delay_before_next(attempt);
                warn!(
                    "{context} - Attempt {attempt} failed: {err}. Retrying in {}ms...",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
