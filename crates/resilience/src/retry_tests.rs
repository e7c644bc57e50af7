// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;
use casare_core::error::{Classify, ErrorKind};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct FakeError(ErrorKind);

impl std::fmt::Display for FakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fake error: {}", self.0)
    }
}

impl std::error::Error for FakeError {}

impl Classify for FakeError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[test]
fn delay_for_attempt_without_jitter_matches_spec_formula() {
    let policy = RetryPolicy { max_attempts: 5, initial_delay: Duration::from_millis(10), multiplier: 2.0, max_delay: None, jitter: None };
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(40));
}

#[test]
fn delay_for_attempt_respects_max_delay_cap() {
    let policy = RetryPolicy { max_attempts: 5, initial_delay: Duration::from_millis(100), multiplier: 10.0, max_delay: Some(Duration::from_millis(250)), jitter: None };
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(250));
}

#[test]
fn delay_for_attempt_jitter_stays_within_band() {
    let policy = RetryPolicy { max_attempts: 5, initial_delay: Duration::from_millis(1000), multiplier: 1.0, max_delay: None, jitter: Some(0.25) };
    for _ in 0..50 {
        let delay = policy.delay_for_attempt(1).as_millis();
        assert!((750..=1250).contains(&delay), "delay {delay} outside +/-25% band");
    }
}

#[tokio::test]
async fn retry_async_retries_transient_until_success_matches_scenario_s3() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy { max_attempts: 3, initial_delay: Duration::from_millis(1), multiplier: 2.0, max_delay: None, jitter: None };

    let result: Result<&str, RetryError<FakeError>> = retry_async(policy, {
        let attempts = attempts.clone();
        move || {
            let attempts = attempts.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(FakeError(ErrorKind::Transient))
                } else {
                    Ok("done")
                }
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn retry_blocking_does_not_retry_non_retryable_kinds() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::default();
    let result: Result<(), RetryError<FakeError>> = retry_blocking(policy, || {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(FakeError(ErrorKind::Validation))
    });

    assert!(matches!(result, Err(RetryError::NotRetryable(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn retry_blocking_exhausts_after_max_attempts() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy { max_attempts: 3, initial_delay: Duration::from_millis(1), multiplier: 1.0, max_delay: None, jitter: None };
    let result: Result<(), RetryError<FakeError>> = retry_blocking(policy, || {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(FakeError(ErrorKind::Transient))
    });

    assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn conflict_kind_retries_exactly_once() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy { max_attempts: 5, initial_delay: Duration::from_millis(1), multiplier: 1.0, max_delay: None, jitter: None };
    let result: Result<(), RetryError<FakeError>> = retry_blocking(policy, || {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(FakeError(ErrorKind::Conflict))
    });

    assert!(matches!(result, Err(RetryError::NotRetryable(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
