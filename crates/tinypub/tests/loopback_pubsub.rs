// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publish/subscribe integration tests over the in-process loopback bus
//!
//! Deterministic: no OS sockets, time driven by `ManualClock`.

use std::cell::RefCell;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::rc::Rc;

use tinypub::config::DEFAULT_MULTICAST_GROUP;
use tinypub::message::encode_message;
use tinypub::{
    impl_message, DeliveryMode, Error, LoopbackTransport, ManualClock, Message, Node, NodeConfig,
    Publisher, QosProfile, Subscription, TopicRegistry, TopicRole,
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Point {
    x: f32,
}
impl_message!(Point { x: f32 });

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct JointState {
    id: u8,
    position: f64,
    velocity: f32,
    enabled: bool,
}
impl_message!(JointState {
    id: u8,
    position: f64,
    velocity: f32,
    enabled: bool,
});

type LoopbackNode = Node<LoopbackTransport, ManualClock>;

fn loopback_node(name: &str) -> (LoopbackNode, LoopbackTransport, ManualClock) {
    let bus = LoopbackTransport::new();
    let clock = ManualClock::new(0);
    let node = Node::new(name, bus.clone(), clock.clone());
    (node, bus, clock)
}

#[test]
fn test_broadcast_end_to_end_port_7100() {
    let bus = LoopbackTransport::new();
    let clock = ManualClock::new(0);
    let mut registry = TopicRegistry::new();

    let mut sub = Subscription::<Point, _, _>::new(
        "/point",
        7100,
        QosProfile::default(),
        bus.clone(),
        clock.clone(),
    )
    .expect("Failed to create subscription");
    sub.init(&mut registry).expect("Failed to init subscription");

    let mut publisher = Publisher::<Point, _, _>::new(
        "/point",
        DeliveryMode::Broadcast,
        7100,
        QosProfile::default(),
        bus.clone(),
        clock.clone(),
    )
    .expect("Failed to create publisher");
    publisher
        .init(&mut registry)
        .expect("Failed to init publisher");

    publisher
        .publish(&Point { x: 1.5 })
        .expect("Failed to publish");

    let mut out = Point::default();
    assert!(sub.take(&mut out));
    assert_eq!(out, Point { x: 1.5 });
    assert_eq!(sub.stats().received, 1);
    assert_eq!(sub.stats().dropped, 0);

    // First registrant (the subscription) owns the entry
    let entry = registry.get("/point").expect("topic registered");
    assert_eq!(entry.role, TopicRole::Subscriber);
    assert_eq!(entry.port, 7100);
    assert_eq!(entry.payload_size, 4);
}

#[test]
fn test_spin_all_depth_leaves_remainder_pending() {
    let (mut node, bus, _) = loopback_node("drain");
    let depth = 4;
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);

    node.create_subscription::<u32, _>(
        "flood",
        Some(7200),
        move |v| sink.borrow_mut().push(*v),
        QosProfile::default().with_depth(depth),
    )
    .expect("Failed to create subscription");
    let publisher = node
        .create_broadcast_publisher::<u32>("flood", Some(7200), QosProfile::default())
        .expect("Failed to create publisher");

    for i in 0..depth + 2 {
        node.publish(publisher, &i).expect("Failed to publish");
    }

    assert_eq!(node.spin_subscriptions(), depth as usize);
    assert_eq!(bus.pending(7200), 2);
    assert_eq!(node.spin_subscriptions(), 2);
    assert_eq!(bus.pending(7200), 0);
    assert_eq!(*seen.borrow(), (0..depth + 2).collect::<Vec<_>>());
}

#[test]
fn test_wrong_length_never_mutates_output() {
    let (mut node, bus, _) = loopback_node("guard");
    let sub = node
        .create_polling_subscription::<JointState>("joint", Some(7300), QosProfile::default())
        .expect("Failed to create subscription");
    let dest = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 7300);
    let size = <JointState as Message>::SIZE;
    let sentinel = JointState {
        id: 9,
        position: 1.0,
        velocity: 2.0,
        enabled: true,
    };

    let mut rng = fastrand::Rng::with_seed(7);
    for round in 1..=20u64 {
        let mut len = rng.usize(0..size * 2);
        if len == size {
            len += 1;
        }
        let junk: Vec<u8> = (0..len).map(|_| rng.u8(..)).collect();
        bus.inject(dest, &junk);

        let mut out = sentinel;
        assert!(!node.take(sub, &mut out));
        assert_eq!(out, sentinel);
        let stats = node.subscription(sub).expect("owned").stats();
        assert_eq!(stats.dropped, round);
        assert_eq!(stats.received, 0);
    }
}

#[test]
fn test_custom_layout_round_trip_through_bus() {
    let (mut node, _, clock) = loopback_node("joints");
    let sub = node
        .create_polling_subscription::<JointState>("joint", None, QosProfile::sensor_data())
        .expect("Failed to create subscription");
    let publisher = node
        .create_broadcast_publisher::<JointState>("joint", None, QosProfile::sensor_data())
        .expect("Failed to create publisher");

    let state = JointState {
        id: 3,
        position: -0.785,
        velocity: 0.25,
        enabled: true,
    };
    clock.advance_micros(1_234);
    node.publish(publisher, &state).expect("Failed to publish");

    let subscription = node.subscription(sub).expect("owned");
    assert_eq!(subscription.try_take(), Some(state));
    assert_eq!(subscription.stats().last_receive_micros, 1_234);
    assert_eq!(subscription.message_size(), 24);
}

#[test]
fn test_multicast_only_reaches_members() {
    let (mut node, bus, _) = loopback_node("mc");
    let hits = Rc::new(RefCell::new(0u32));
    let sink = Rc::clone(&hits);

    node.create_multicast_subscription::<u16, _>(
        "status",
        Some(7400),
        DEFAULT_MULTICAST_GROUP,
        move |_| *sink.borrow_mut() += 1,
        QosProfile::default(),
    )
    .expect("Failed to create multicast subscription");
    let outsider = node
        .create_polling_subscription::<u16>("status_plain", Some(7400), QosProfile::default())
        .expect("Failed to create subscription");
    let publisher = node
        .create_multicast_publisher::<u16>(
            "status",
            Some(7400),
            DEFAULT_MULTICAST_GROUP,
            QosProfile::default(),
        )
        .expect("Failed to create publisher");

    node.publish(publisher, &0xBEEF).expect("Failed to publish");
    assert_eq!(node.spin_once(), 1);
    assert_eq!(*hits.borrow(), 1);

    let mut out = 0u16;
    assert!(!node.take(outsider, &mut out));
    assert_eq!(bus.pending(7400), 0);
}

#[test]
fn test_unicast_publisher_reaches_port_listeners() {
    let (mut node, _, _) = loopback_node("uni");
    let sub = node
        .create_polling_subscription::<[f32; 3]>("vec", Some(7500), QosProfile::default())
        .expect("Failed to create subscription");
    let publisher = node
        .create_publisher::<[f32; 3]>(
            "vec",
            Ipv4Addr::new(192, 168, 4, 2),
            Some(7500),
            QosProfile::default(),
        )
        .expect("Failed to create publisher");

    node.publish(publisher, &[1.0, 2.0, 3.0])
        .expect("Failed to publish");

    let mut out = [0.0f32; 3];
    assert!(node.take(sub, &mut out));
    assert_eq!(out, [1.0, 2.0, 3.0]);
    assert_eq!(
        node.publisher(publisher).map(|p| p.destination().to_string()),
        Some("192.168.4.2:7500".to_string())
    );
}

#[test]
fn test_send_failures_counted_and_recoverable() {
    let (mut node, bus, _) = loopback_node("flaky");
    let publisher = node
        .create_broadcast_publisher::<u8>("flaky", Some(7600), QosProfile::default())
        .expect("Failed to create publisher");

    bus.set_fail_sends(true);
    assert!(matches!(
        node.publish(publisher, &1),
        Err(Error::Send { .. })
    ));
    bus.set_fail_sends(false);
    node.publish(publisher, &2).expect("Failed to publish");

    let stats = node.publisher(publisher).expect("owned").stats();
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.send_errors, 1);
}

#[test]
fn test_namespaced_nodes_share_topics_by_absolute_name() {
    let bus = LoopbackTransport::new();
    let clock = ManualClock::new(0);
    let mut left = Node::with_config(
        NodeConfig::new("left").with_namespace("arm"),
        bus.clone(),
        clock.clone(),
    );
    let mut right = Node::with_config(
        NodeConfig::new("right").with_namespace("base"),
        bus.clone(),
        clock.clone(),
    );

    let publisher = left
        .create_broadcast_publisher::<i32>("/shared/heartbeat", None, QosProfile::default())
        .expect("Failed to create publisher");
    let sub = right
        .create_polling_subscription::<i32>("/shared/heartbeat", None, QosProfile::default())
        .expect("Failed to create subscription");

    assert_eq!(
        left.registry().port_for("/shared/heartbeat"),
        right.registry().port_for("/shared/heartbeat")
    );

    left.publish(publisher, &-17).expect("Failed to publish");
    let mut out = 0;
    assert!(right.take(sub, &mut out));
    assert_eq!(out, -17);

    // Relative names are namespaced per node
    assert_eq!(left.resolve_topic_name("odom"), "/arm/odom");
    assert_eq!(right.resolve_topic_name("odom"), "/base/odom");
}

#[test]
fn test_raw_injection_matches_encoded_layout() {
    let (mut node, bus, _) = loopback_node("raw");
    let sub = node
        .create_polling_subscription::<JointState>("joint_raw", Some(7700), QosProfile::default())
        .expect("Failed to create subscription");

    // Producer on another platform: same C layout, built by hand
    let mut bytes = [0u8; 24];
    bytes[0] = 5;
    bytes[8..16].copy_from_slice(&2.5f64.to_le_bytes());
    bytes[16..20].copy_from_slice(&(-1.0f32).to_le_bytes());
    bytes[20] = 1;
    bus.inject(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 7700), &bytes);

    let mut out = JointState::default();
    assert!(node.take(sub, &mut out));
    assert_eq!(
        out,
        JointState {
            id: 5,
            position: 2.5,
            velocity: -1.0,
            enabled: true,
        }
    );

    let mut encoded = [0u8; 24];
    encode_message(&out, &mut encoded).expect("Failed to encode");
    assert_eq!(encoded, bytes);
}
