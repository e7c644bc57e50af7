// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn subscriber_receives_published_event() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    bus.subscribe(EventKind::NodeStarted, move |e| seen2.lock().push(e.timestamp_ms));

    bus.publish(Event::new(EventKind::NodeStarted, 10));
    bus.publish(Event::new(EventKind::NodeCompleted, 20));

    assert_eq!(*seen.lock(), vec![10]);
}

#[test]
fn handlers_fire_in_registration_order() {
    let bus = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..3 {
        let order = order.clone();
        bus.subscribe(EventKind::WorkflowStarted, move |_| order.lock().push(i));
    }

    bus.publish(Event::new(EventKind::WorkflowStarted, 0));
    assert_eq!(*order.lock(), vec![0, 1, 2]);
}

#[test]
fn unsubscribe_stops_delivery() {
    let bus = EventBus::new();
    let count = Arc::new(Mutex::new(0));
    let count2 = count.clone();
    let handle = bus.subscribe(EventKind::JobSubmitted, move |_| *count2.lock() += 1);

    bus.publish(Event::new(EventKind::JobSubmitted, 0));
    bus.unsubscribe(EventKind::JobSubmitted, handle);
    bus.publish(Event::new(EventKind::JobSubmitted, 0));

    assert_eq!(*count.lock(), 1);
}

#[test]
fn handler_count_reflects_registrations() {
    let bus = EventBus::new();
    assert_eq!(bus.handler_count(EventKind::JobAssigned), 0);
    bus.subscribe(EventKind::JobAssigned, |_| {});
    bus.subscribe(EventKind::JobAssigned, |_| {});
    assert_eq!(bus.handler_count(EventKind::JobAssigned), 2);
}

#[test]
fn a_panicking_handler_does_not_stop_siblings() {
    let bus = EventBus::new();
    let ran = Arc::new(Mutex::new(false));
    let ran2 = ran.clone();

    bus.subscribe(EventKind::NodeError, |_| panic!("boom"));
    bus.subscribe(EventKind::NodeError, move |_| *ran2.lock() = true);

    bus.publish(Event::new(EventKind::NodeError, 0));

    assert!(*ran.lock(), "second handler should still have run");
}

#[test]
fn clone_shares_the_same_subscriber_table() {
    let bus = EventBus::new();
    let clone = bus.clone();
    let count = Arc::new(Mutex::new(0));
    let count2 = count.clone();
    clone.subscribe(EventKind::RobotHeartbeat, move |_| *count2.lock() += 1);

    bus.publish(Event::new(EventKind::RobotHeartbeat, 0));
    assert_eq!(*count.lock(), 1);
}

#[test]
fn handler_can_subscribe_during_publish_without_deadlock() {
    let bus = EventBus::new();
    let bus2 = bus.clone();
    let reentrant_ran = Arc::new(Mutex::new(false));
    let reentrant_ran2 = reentrant_ran.clone();

    bus.subscribe(EventKind::WorkflowCompleted, move |_| {
        bus2.subscribe(EventKind::WorkflowCompleted, {
            let reentrant_ran2 = reentrant_ran2.clone();
            move |_| *reentrant_ran2.lock() = true
        });
    });

    bus.publish(Event::new(EventKind::WorkflowCompleted, 0));
    // The handler registered during the first publish should see the next one.
    bus.publish(Event::new(EventKind::WorkflowCompleted, 0));
    assert!(*reentrant_ran.lock());
}
