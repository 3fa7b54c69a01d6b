// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control-loop integration tests
//!
//! A node driven the way firmware drives it: publish, spin, rate-sleep.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tinypub::{Clock, LoopbackTransport, ManualClock, Node, QosProfile, SystemClock, Timer};

#[test]
fn test_loop_at_100hz_with_10hz_timer() {
    let bus = LoopbackTransport::new();
    let clock = ManualClock::new(0);
    let mut node = Node::new("ctrl", bus, clock.clone());

    let ticks = Rc::new(Cell::new(0u32));
    let tick_sink = Rc::clone(&ticks);
    node.create_timer(Duration::from_millis(100), move || {
        tick_sink.set(tick_sink.get() + 1);
    })
    .expect("Failed to create timer");

    let received = Rc::new(Cell::new(0u32));
    let rx_sink = Rc::clone(&received);
    node.create_subscription::<u64, _>(
        "loop_counter",
        Some(7800),
        move |_| rx_sink.set(rx_sink.get() + 1),
        QosProfile::default(),
    )
    .expect("Failed to create subscription");
    let publisher = node
        .create_broadcast_publisher::<u64>("loop_counter", Some(7800), QosProfile::default())
        .expect("Failed to create publisher");

    let mut rate = node.create_rate(100.0).expect("Failed to create rate");
    for iteration in 0..100u64 {
        node.publish(publisher, &iteration)
            .expect("Failed to publish");
        node.spin_once();
        rate.sleep();
    }

    // 100 iterations of 10ms: exactly one second of manual time
    assert_eq!(clock.now_micros(), 1_000_000);
    assert_eq!(received.get(), 100);
    // Timer polled at 0, 10, .., 990ms: fires at 100, 200, .., 900ms
    assert_eq!(ticks.get(), 9);
}

#[test]
fn test_slow_iteration_does_not_burst_timer() {
    let clock = ManualClock::new(0);
    let fired = Rc::new(Cell::new(0u32));
    let sink = Rc::clone(&fired);
    let mut timer = Timer::new(
        Duration::from_millis(10),
        move || sink.set(sink.get() + 1),
        clock.clone(),
    );

    // One iteration stalls for 5 periods
    clock.advance(Duration::from_millis(50));
    let fires: u32 = (0..5).map(|_| u32::from(timer.spin_once())).sum();

    assert_eq!(fires, 1);
    assert_eq!(fired.get(), 1);
    assert_eq!(timer.fire_count(), 1);
}

#[test]
fn test_rate_sleep_real_clock_10ms() {
    let clock = SystemClock::new();
    let mut node = Node::new("rt", LoopbackTransport::new(), clock);
    let mut rate = node.create_rate(100.0).expect("Failed to create rate");

    let start = clock.now_micros();
    node.spin_once();
    rate.sleep();
    let elapsed = clock.now_micros() - start;

    // Tolerance: OS timer resolution on loaded CI hosts
    assert!(elapsed >= 9_000, "slept {}us", elapsed);
    assert!(elapsed < 50_000, "slept {}us", elapsed);
}
