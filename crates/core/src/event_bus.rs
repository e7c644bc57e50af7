// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! In-process synchronous pub/sub (spec §4.1).
//!
//! `publish` clones the subscriber list for the event's kind under the lock
//! and runs handlers after releasing it, so a handler that itself calls
//! `subscribe`/`publish`/`unsubscribe` cannot deadlock against the
//! registration lock. Handlers run in registration order and a panicking
//! handler is caught and logged rather than aborting its siblings.

use crate::event::{Event, EventKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A registered handler, boxed so the bus can hold heterogeneous closures.
type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque handle returned by [`EventBus::subscribe`], usable with
/// [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

struct Subscriber {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    subscribers: HashMap<EventKind, Vec<Subscriber>>,
}

/// Thread-safe, in-process event bus. Cheaply `Clone`-able: clones share the
/// same subscriber table (an `Arc<Mutex<_>>` underneath).
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
    next_id: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Inner::default())), next_id: Arc::new(AtomicU64::new(1)) }
    }

    /// Register a handler for `kind`. Handlers see events in registration order.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionHandle
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock()
            .subscribers
            .entry(kind)
            .or_default()
            .push(Subscriber { id, handler: Arc::new(handler) });
        SubscriptionHandle(id)
    }

    /// Remove a previously registered handler. No-op if already removed.
    pub fn unsubscribe(&self, kind: EventKind, handle: SubscriptionHandle) {
        if let Some(subs) = self.inner.lock().subscribers.get_mut(&kind) {
            subs.retain(|s| s.id != handle.0);
        }
    }

    /// Number of handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner.lock().subscribers.get(&kind).map(|v| v.len()).unwrap_or(0)
    }

    /// Deliver `event` to every subscriber of `event.kind`, synchronously,
    /// in registration order. A handler panic is caught and logged; it does
    /// not prevent remaining handlers from running.
    pub fn publish(&self, event: Event) {
        let handlers: Vec<Handler> = {
            let guard = self.inner.lock();
            guard
                .subscribers
                .get(&event.kind)
                .map(|subs| subs.iter().map(|s| s.handler.clone()).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            let event_ref = &event;
            if catch_unwind(AssertUnwindSafe(|| handler(event_ref))).is_err() {
                tracing::error!(kind = %event.kind, "event bus handler panicked");
            }
        }
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
