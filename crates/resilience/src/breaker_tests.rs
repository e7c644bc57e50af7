// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;
use casare_core::FakeClock;

#[derive(Debug, PartialEq)]
struct BoomError(&'static str);

impl From<CircuitOpen> for BoomError {
    fn from(_: CircuitOpen) -> Self {
        BoomError("circuit_open")
    }
}

fn breaker(config: BreakerConfig) -> (CircuitBreaker<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    (CircuitBreaker::with_clock("test", config, clock.clone()), clock)
}

#[test]
fn closed_breaker_admits_calls_and_resets_failure_count_on_success() {
    let (cb, _clock) = breaker(BreakerConfig { failure_threshold: 3, ..Default::default() });
    assert_eq!(cb.call::<_, (), BoomError>(|| Err(BoomError("x"))), Err(BoomError("x")));
    assert_eq!(cb.call::<_, (), BoomError>(|| Ok(())), Ok(()));
    assert_eq!(cb.state(), BreakerState::Closed);
    assert_eq!(cb.stats().failed, 1);
}

#[test]
fn reaching_failure_threshold_opens_the_breaker() {
    let (cb, _clock) = breaker(BreakerConfig { failure_threshold: 2, ..Default::default() });
    let _ = cb.call::<_, (), BoomError>(|| Err(BoomError("x")));
    let _ = cb.call::<_, (), BoomError>(|| Err(BoomError("x")));
    assert_eq!(cb.state(), BreakerState::Open);
    assert_eq!(cb.stats().times_opened, 1);
}

#[test]
fn open_breaker_fails_fast_without_invoking_the_closure() {
    let (cb, _clock) = breaker(BreakerConfig { failure_threshold: 1, ..Default::default() });
    let _ = cb.call::<_, (), BoomError>(|| Err(BoomError("x")));
    assert_eq!(cb.state(), BreakerState::Open);

    let mut invoked = false;
    let result = cb.call::<_, (), BoomError>(|| {
        invoked = true;
        Ok(())
    });
    assert!(!invoked);
    assert_eq!(result, Err(BoomError("circuit_open")));
    assert_eq!(cb.stats().blocked, 1);
}

#[test]
fn half_open_after_timeout_closes_on_success_threshold() {
    let (cb, clock) = breaker(BreakerConfig {
        failure_threshold: 1,
        success_threshold: 2,
        timeout: Duration::from_secs(10),
        half_open_max_calls: 5,
    });
    let _ = cb.call::<_, (), BoomError>(|| Err(BoomError("x")));
    assert_eq!(cb.state(), BreakerState::Open);

    clock.advance(Duration::from_secs(11));
    let _ = cb.call::<_, (), BoomError>(|| Ok(()));
    assert_eq!(cb.state(), BreakerState::HalfOpen);

    let _ = cb.call::<_, (), BoomError>(|| Ok(()));
    assert_eq!(cb.state(), BreakerState::Closed);
}

#[test]
fn half_open_failure_reopens_the_breaker() {
    let (cb, clock) = breaker(BreakerConfig { failure_threshold: 1, success_threshold: 2, timeout: Duration::from_secs(10), half_open_max_calls: 5 });
    let _ = cb.call::<_, (), BoomError>(|| Err(BoomError("x")));
    clock.advance(Duration::from_secs(11));
    let _ = cb.call::<_, (), BoomError>(|| Err(BoomError("x")));
    assert_eq!(cb.state(), BreakerState::Open);
    assert_eq!(cb.stats().times_opened, 2);
}

#[test]
fn registry_returns_the_same_breaker_for_a_name() {
    let registry = CircuitBreakerRegistry::with_clock(BreakerConfig::default(), FakeClock::new());
    let a = registry.get_or_create("session:robot-1", None);
    let b = registry.get_or_create("session:robot-1", None);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(registry.names(), vec!["session:robot-1".to_string()]);
}

#[test]
fn failures_never_increase_without_a_failing_call_circuit_monotonicity() {
    // Property 8: in the absence of failures, failure_count is non-increasing.
    let (cb, _clock) = breaker(BreakerConfig { failure_threshold: 100, ..Default::default() });
    for _ in 0..10 {
        let _ = cb.call::<_, (), BoomError>(|| Ok(()));
    }
    assert_eq!(cb.stats().failed, 0);
    assert_eq!(cb.state(), BreakerState::Closed);
}
