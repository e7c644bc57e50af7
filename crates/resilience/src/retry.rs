// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Retry policy, composable with [`crate::breaker::CircuitBreaker`]
//! (spec §4.2).

use casare_core::error::{Classify, ErrorKind};
use rand::Rng;
use std::time::Duration;

/// `attempts`, `initial_delay`, `multiplier`, optional `max_delay` cap, and
/// optional jitter band (spec §4.2: "retry(attempts, initial_delay,
/// multiplier, max_delay?, jitter?)").
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Option<Duration>,
    /// `Some(0.25)` applies spec's default ±25% jitter band; `None` disables it.
    pub jitter: Option<f64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay: Duration::from_millis(100), multiplier: 2.0, max_delay: Some(Duration::from_secs(30)), jitter: Some(0.25) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self { max_attempts, initial_delay, multiplier, max_delay: None, jitter: None }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn with_jitter(mut self, band: f64) -> Self {
        self.jitter = Some(band);
        self
    }

    /// `min(initial * multiplier^(n-1), max_delay)` for attempt `n` (1-indexed),
    /// then applies jitter if configured (spec §4.2).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32 - 1);
        let capped = match self.max_delay {
            Some(max) => base_millis.min(max.as_millis() as f64),
            None => base_millis,
        };
        let jittered = match self.jitter {
            Some(band) => {
                let mut rng = rand::thread_rng();
                let factor = 1.0 + rng.gen_range(-band..=band);
                (capped * factor).max(0.0)
            }
            None => capped,
        };
        Duration::from_millis(jittered.round() as u64)
    }
}

#[derive(Debug)]
pub enum RetryError<E> {
    Exhausted { attempts: u32, source: E },
    NotRetryable(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } => source,
            RetryError::NotRetryable(source) => source,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Exhausted { attempts, source } => write!(f, "retries exhausted after {attempts} attempts: {source}"),
            RetryError::NotRetryable(source) => write!(f, "{source}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::NotRetryable(source) => Some(source),
        }
    }
}

/// Whether `kind` is retryable under this policy, honoring spec §7's
/// single-retry carve-out for `Conflict`.
fn should_retry(kind: ErrorKind, attempt: u32) -> bool {
    if kind.is_single_retry() {
        return attempt == 1;
    }
    kind.is_retryable()
}

/// Retries an async fallible operation per `policy`. Only error kinds
/// [`ErrorKind::is_retryable`] are retried (one retry for `Conflict`);
/// everything else propagates immediately (spec §4.2, §7).
pub async fn retry_async<F, Fut, T, E>(policy: RetryPolicy, mut f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Classify,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let kind = error.kind();
                if attempt >= policy.max_attempts || !should_retry(kind, attempt) {
                    return Err(if attempt >= policy.max_attempts {
                        RetryError::Exhausted { attempts: attempt, source: error }
                    } else {
                        RetryError::NotRetryable(error)
                    });
                }
                tokio::time::sleep(policy.delay_for_attempt(attempt + 1)).await;
            }
        }
    }
}

/// Blocking equivalent of [`retry_async`], for call sites that aren't
/// inside a tokio runtime.
pub fn retry_blocking<F, T, E>(policy: RetryPolicy, mut f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Result<T, E>,
    E: Classify,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f() {
            Ok(value) => return Ok(value),
            Err(error) => {
                let kind = error.kind();
                if attempt >= policy.max_attempts || !should_retry(kind, attempt) {
                    return Err(if attempt >= policy.max_attempts {
                        RetryError::Exhausted { attempts: attempt, source: error }
                    } else {
                        RetryError::NotRetryable(error)
                    });
                }
                std::thread::sleep(policy.delay_for_attempt(attempt + 1));
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
