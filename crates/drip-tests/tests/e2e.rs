//! End-to-end flows through the hub: stream, receive, squeeze, split, collect.

use drip_core::constants::TOTAL_SPLITS_WEIGHT;
use drip_core::types::{
    AccountId, ControllerId, Hash256, SplitsReceiver, StreamConfig, StreamReceiver,
};
use drip_hub::vault::Direction;
use drip_hub::{AssetBalance, HubEvent};
use drip_tests::helpers::*;

struct World {
    hub: TestHub,
    clock: drip_hub::ManualClock,
    alice: Sender,
    bob: AccountId,
    carol: AccountId,
}

fn world() -> World {
    let (mut hub, clock) = hub_with(&[addr(0xa), addr(0xb), addr(0xc)]);
    let ids: Vec<_> = (0..3).map(|i| AccountId::new(ControllerId(i), 1)).collect();
    hub.drain_events();
    World {
        hub,
        clock,
        alice: Sender::new(ids[0], addr(0xa), ASSET),
        bob: ids[1],
        carol: ids[2],
    }
}

fn assert_conserved(hub: &TestHub) {
    assert_eq!(hub.vault().custody(ASSET), hub.asset_balance(ASSET).total());
}

#[test]
fn one_hour_stream_is_received_cycle_by_cycle() {
    let mut w = world();
    let receivers = vec![StreamReceiver::new(w.bob, StreamConfig::per_sec(1))];
    let out = w.alice.set(&mut w.hub, 3_600, receivers).unwrap();
    assert_eq!(out.max_end, T0 + 3_600);

    w.clock.advance(CYCLE);
    assert_eq!(w.hub.receivable_cycles(w.bob, ASSET), 1);
    assert_eq!(w.hub.receive_streams(w.bob, ASSET, 1).unwrap(), 600);
    assert_eq!(w.alice.balance_now(&w.hub), 3_000);
    assert_conserved(&w.hub);

    w.clock.set(T0 + 3_600);
    assert_eq!(w.hub.receive_streams(w.bob, ASSET, u32::MAX).unwrap(), 3_000);
    assert_eq!(w.hub.splittable(w.bob, ASSET), 3_600);
    assert_eq!(w.alice.balance_now(&w.hub), 0);
    assert_eq!(
        w.hub.asset_balance(ASSET),
        AssetBalance {
            streams: 0,
            splits: 3_600,
        }
    );

    let split = w.hub.split(w.bob, ASSET, &[]).unwrap();
    assert_eq!(split.collectable_amt, 3_600);
    let collected = w.hub.collect(&addr(0xb), w.bob, ASSET, &addr(0xee)).unwrap();
    assert_eq!(collected, 3_600);
    assert_eq!(w.hub.vault().paid_to(ASSET, &addr(0xee)), 3_600);
    assert_eq!(w.hub.vault().custody(ASSET), 0);
    assert_conserved(&w.hub);
}

#[test]
fn squeezed_funds_are_not_received_twice() {
    let mut w = world();
    let receivers = vec![StreamReceiver::new(w.bob, StreamConfig::per_sec(1))];
    w.alice.set(&mut w.hub, 1_000, receivers).unwrap();

    w.clock.advance(300);
    let history = w.alice.history.clone();
    let sender = w.alice.account;
    let squeezed = w
        .hub
        .squeeze_streams(w.bob, ASSET, sender, Hash256::ZERO, &history)
        .unwrap();
    assert_eq!(squeezed, 300);
    // A second squeeze at the same instant finds nothing new.
    let again = w
        .hub
        .squeeze_result(w.bob, ASSET, sender, Hash256::ZERO, &history)
        .unwrap();
    assert_eq!(again, 0);

    w.clock.set(T0 + 2 * CYCLE);
    assert_eq!(w.hub.receive_streams(w.bob, ASSET, u32::MAX).unwrap(), 700);
    assert_eq!(w.hub.splittable(w.bob, ASSET), 1_000);
    assert_conserved(&w.hub);
}

#[test]
fn splits_cascade_to_collectable() {
    let mut w = world();
    let bob_ctl = addr(0xb);
    let half = [SplitsReceiver::new(w.carol, TOTAL_SPLITS_WEIGHT / 2)];
    w.hub.set_splits(&bob_ctl, w.bob, &half).unwrap();
    w.hub
        .give(&addr(0xa), w.alice.account, w.bob, ASSET, 1_001)
        .unwrap();

    let out = w.hub.split(w.bob, ASSET, &half).unwrap();
    assert_eq!(out.split_amt, 500);
    assert_eq!(out.collectable_amt, 501);
    assert_eq!(w.hub.splittable(w.carol, ASSET), 500);
    assert_eq!(w.hub.collectable(w.bob, ASSET), 501);

    w.hub.split(w.carol, ASSET, &[]).unwrap();
    let carol_ctl = addr(0xc);
    let carol_got = w
        .hub
        .collect(&carol_ctl, w.carol, ASSET, &carol_ctl)
        .unwrap();
    assert_eq!(carol_got, 500);
    let bob_got = w.hub.collect(&bob_ctl, w.bob, ASSET, &bob_ctl).unwrap();
    assert_eq!(bob_got, 501);
    assert_eq!(w.hub.vault().total(ASSET, Direction::Out), 1_001);
    assert_conserved(&w.hub);
}

#[test]
fn withdrawing_mid_stream_refunds_the_controller() {
    let mut w = world();
    let receivers = vec![StreamReceiver::new(w.bob, StreamConfig::per_sec(1))];
    w.alice.set(&mut w.hub, 1_000, receivers.clone()).unwrap();

    w.clock.advance(100);
    let out = w.alice.set(&mut w.hub, -500, receivers).unwrap();
    assert_eq!(out.balance, 400);
    assert_eq!(out.max_end, T0 + 500);
    assert_eq!(w.hub.vault().paid_to(ASSET, &addr(0xa)), 500);

    w.clock.set(T0 + 2 * CYCLE);
    assert_eq!(w.hub.receive_streams(w.bob, ASSET, u32::MAX).unwrap(), 500);
    assert_eq!(w.alice.drain(&mut w.hub).unwrap(), 0);
    assert_conserved(&w.hub);
}

#[test]
fn fixed_duration_stream_leaves_the_rest_withdrawable() {
    let mut w = world();
    let config = StreamConfig::per_sec(1).with_start(T0 + 50).with_duration(100);
    let out = w
        .alice
        .set(&mut w.hub, 1_000, vec![StreamReceiver::new(w.bob, config)])
        .unwrap();
    assert_eq!(out.max_end, T0 + 150);

    w.clock.set(T0 + CYCLE);
    assert_eq!(w.alice.balance_now(&w.hub), 900);
    assert_eq!(w.hub.receive_streams(w.bob, ASSET, u32::MAX).unwrap(), 100);
    assert_eq!(w.alice.drain(&mut w.hub).unwrap(), 900);
    assert_eq!(w.hub.vault().custody(ASSET), 100);
    assert_conserved(&w.hub);
}

#[test]
fn two_receivers_share_a_balance() {
    let mut w = world();
    let receivers = vec![
        StreamReceiver::new(w.bob, StreamConfig::per_sec(1)),
        StreamReceiver::new(w.carol, StreamConfig::per_sec(3)),
    ];
    let out = w.alice.set(&mut w.hub, 2_000, receivers).unwrap();
    assert_eq!(out.max_end, T0 + 500);

    w.clock.set(T0 + CYCLE);
    assert_eq!(w.hub.receive_streams(w.bob, ASSET, u32::MAX).unwrap(), 500);
    assert_eq!(w.hub.receive_streams(w.carol, ASSET, u32::MAX).unwrap(), 1_500);
    assert_eq!(w.alice.balance_now(&w.hub), 0);
    assert_conserved(&w.hub);
}

#[test]
fn events_follow_the_call_order() {
    let mut w = world();
    let receivers = vec![StreamReceiver::new(w.bob, StreamConfig::per_sec(1))];
    w.alice.set(&mut w.hub, 600, receivers).unwrap();
    w.clock.set(T0 + CYCLE);
    w.hub.receive_streams(w.bob, ASSET, u32::MAX).unwrap();
    w.hub.split(w.bob, ASSET, &[]).unwrap();
    w.hub.collect(&addr(0xb), w.bob, ASSET, &addr(0xb)).unwrap();

    let kinds: Vec<&str> = w
        .hub
        .drain_events()
        .iter()
        .map(|event| match event {
            HubEvent::StreamsSet { .. } => "streams_set",
            HubEvent::StreamsReceived { .. } => "streams_received",
            HubEvent::Collectable { .. } => "collectable",
            HubEvent::Collected { .. } => "collected",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        ["streams_set", "streams_received", "collectable", "collected"]
    );
    assert!(w.hub.events().is_empty());
}
