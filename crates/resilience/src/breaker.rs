// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Circuit breaker state machine (spec §4.2).
//!
//! One [`CircuitBreaker`] per protected call site, each behind its own
//! `parking_lot::Mutex` (spec §5: "one lock per breaker, state transitions
//! atomic with respect to the call that triggers them"). A
//! [`CircuitBreakerRegistry`] maps a name to its breaker; the registry is
//! constructed and injected by the composition root rather than held as a
//! bare `static` (DESIGN NOTES: "global singletons -> explicit injection").

use casare_core::{Clock, SystemClock};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Raised when a call is short-circuited by an open breaker.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("circuit open, retry in {remaining_seconds}s")]
pub struct CircuitOpen {
    pub remaining_seconds: u64,
}

impl casare_core::error::Classify for CircuitOpen {
    fn kind(&self) -> casare_core::error::ErrorKind {
        casare_core::error::ErrorKind::CircuitOpen
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }
}

/// Observability counters for one breaker (spec §4.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub blocked: u64,
    pub times_opened: u64,
    pub last_failure_time_ms: Option<u64>,
    pub opened_at_ms: Option<u64>,
}

struct Inner {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    half_open_inflight: u32,
    stats: BreakerStats,
}

impl Inner {
    fn new() -> Self {
        Self { state: BreakerState::Closed, failure_count: 0, success_count: 0, opened_at: None, half_open_inflight: 0, stats: BreakerStats::default() }
    }
}

/// Per-resource circuit breaker (spec §4.2). Generic over [`Clock`] so
/// tests can drive the open->half-open transition deterministically with
/// `FakeClock` instead of sleeping in real time.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: BreakerConfig,
    clock: C,
    inner: Mutex<Inner>,
}

impl CircuitBreaker<SystemClock> {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn with_clock(name: impl Into<String>, config: BreakerConfig, clock: C) -> Self {
        Self { name: name.into(), config, clock, inner: Mutex::new(Inner::new()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> BreakerStats {
        self.inner.lock().stats
    }

    /// Whether a call should currently be admitted, applying the
    /// open -> half-open transition if `timeout` has elapsed since
    /// `opened_at` (spec §4.2). Does not itself record anything.
    fn admit(&self, inner: &mut Inner) -> Result<(), u64> {
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(|| self.clock.now());
                let elapsed = self.clock.now().saturating_duration_since(opened_at);
                if elapsed >= self.config.timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.half_open_inflight = 0;
                    Ok(())
                } else {
                    let remaining = self.config.timeout.saturating_sub(elapsed);
                    Err(remaining.as_secs().max(1))
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_inflight < self.config.half_open_max_calls {
                    Ok(())
                } else {
                    Err(1)
                }
            }
        }
    }

    fn record_success(&self, inner: &mut Inner) {
        inner.stats.successful += 1;
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                }
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self, inner: &mut Inner) {
        inner.stats.failed += 1;
        inner.stats.last_failure_time_ms = Some(self.clock.epoch_ms());
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    self.trip(inner);
                }
            }
            BreakerState::HalfOpen => {
                self.trip(inner);
            }
            BreakerState::Open => {}
        }
    }

    fn trip(&self, inner: &mut Inner) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(self.clock.now());
        inner.stats.opened_at_ms = Some(self.clock.epoch_ms());
        inner.stats.times_opened += 1;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.half_open_inflight = 0;
        tracing::warn!(breaker = %self.name, "circuit breaker opened");
    }

    /// Run `f` under this breaker. Fails fast with `E::from(CircuitOpen)`
    /// while open; otherwise runs `f` and propagates its own error
    /// unwrapped on failure (spec §4.2: "propagates the underlying error,
    /// not a wrapper").
    pub fn call<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<CircuitOpen>,
    {
        {
            let mut inner = self.inner.lock();
            inner.stats.total += 1;
            match self.admit(&mut inner) {
                Ok(()) => {
                    if inner.state == BreakerState::HalfOpen {
                        inner.half_open_inflight += 1;
                    }
                }
                Err(remaining_seconds) => {
                    inner.stats.blocked += 1;
                    return Err(E::from(CircuitOpen { remaining_seconds }));
                }
            }
        }

        let result = f();

        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.half_open_inflight = inner.half_open_inflight.saturating_sub(1);
        }
        match &result {
            Ok(_) => self.record_success(&mut inner),
            Err(_) => self.record_failure(&mut inner),
        }
        result
    }

    /// Async equivalent of [`CircuitBreaker::call`].
    pub async fn call_async<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: From<CircuitOpen>,
    {
        {
            let mut inner = self.inner.lock();
            inner.stats.total += 1;
            match self.admit(&mut inner) {
                Ok(()) => {
                    if inner.state == BreakerState::HalfOpen {
                        inner.half_open_inflight += 1;
                    }
                }
                Err(remaining_seconds) => {
                    inner.stats.blocked += 1;
                    return Err(E::from(CircuitOpen { remaining_seconds }));
                }
            }
        }

        let result = f().await;

        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.half_open_inflight = inner.half_open_inflight.saturating_sub(1);
        }
        match &result {
            Ok(_) => self.record_success(&mut inner),
            Err(_) => self.record_failure(&mut inner),
        }
        result
    }
}

/// Process-wide map of breaker name -> breaker, constructed and owned by
/// the composition root, never a bare `static` (DESIGN NOTES).
pub struct CircuitBreakerRegistry<C: Clock = SystemClock> {
    clock: C,
    default_config: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker<C>>>>,
}

impl CircuitBreakerRegistry<SystemClock> {
    pub fn new(default_config: BreakerConfig) -> Self {
        Self::with_clock(default_config, SystemClock)
    }
}

impl<C: Clock> CircuitBreakerRegistry<C> {
    pub fn with_clock(default_config: BreakerConfig, clock: C) -> Self {
        Self { clock, default_config, breakers: Mutex::new(HashMap::new()) }
    }

    /// Returns the named breaker, creating it with the registry's default
    /// config (or `config` if given and the breaker is new) on first use.
    pub fn get_or_create(&self, name: &str, config: Option<BreakerConfig>) -> Arc<CircuitBreaker<C>> {
        let mut breakers = self.breakers.lock();
        if let Some(existing) = breakers.get(name) {
            return existing.clone();
        }
        let breaker = Arc::new(CircuitBreaker::with_clock(name, config.unwrap_or(self.default_config), self.clock.clone()));
        breakers.insert(name.to_string(), breaker.clone());
        breaker
    }

    pub fn stats(&self, name: &str) -> Option<BreakerStats> {
        self.breakers.lock().get(name).map(|b| b.stats())
    }

    pub fn names(&self) -> Vec<String> {
        self.breakers.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
