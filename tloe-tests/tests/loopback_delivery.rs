//! Two endpoints talking over an in-memory fabric
//!
//! The sending side records every data frame in its retransmission buffer;
//! the receiving side NAKs gaps and eventually ACKs. Losses are injected with
//! a drop filter and time is driven by a manual clock.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tloe_io::{Clock, LoopbackFabric, ManualClock};
use tloe_protocol::{AckKind, Channel, Endpoint, Fabric, Frame, RxEvent, SeqNum};

const CHANNEL: u8 = 2;

fn send_data(endpoint: &mut Endpoint, fabric: &mut LoopbackFabric, now: std::time::Instant) {
    let seq = endpoint.next_tx_seq();
    let frame = Frame::data(
        seq,
        endpoint.next_rx_seq().prev(),
        Channel::new(CHANNEL).unwrap(),
        1,
        Bytes::from(format!("tl-msg-{}", seq.as_raw())),
    );
    fabric.send(&frame.to_bytes().unwrap()).unwrap();
    endpoint.record_sent(frame, now).unwrap();
}

/// Poll until the fabric is empty, then push out queued control frames
fn pump(endpoint: &mut Endpoint, fabric: &mut LoopbackFabric, clock: &ManualClock) -> usize {
    let mut handled = 0;
    loop {
        let cycle = endpoint.poll(fabric, clock.now()).unwrap();
        endpoint.transmit_control(fabric).unwrap();
        if cycle.event == RxEvent::Idle {
            break;
        }
        handled += 1;
    }
    handled
}

fn drain(endpoint: &mut Endpoint) -> Vec<Bytes> {
    std::iter::from_fn(|| endpoint.pop_message())
        .map(|message| message.payload)
        .collect()
}

#[test]
fn test_lossless_delivery_and_ack() {
    let clock = ManualClock::new();
    let (mut fa, mut fb) = LoopbackFabric::pair();
    let mut sender = Endpoint::default();
    let mut receiver = Endpoint::default();

    for _ in 0..3 {
        send_data(&mut sender, &mut fa, clock.now());
    }
    assert_eq!(pump(&mut receiver, &mut fb, &clock), 3);
    assert_eq!(drain(&mut receiver).len(), 3);

    // The delayed ACK goes out once the delay has passed
    clock.advance(Duration::from_millis(2));
    pump(&mut receiver, &mut fb, &clock);
    assert_eq!(fb.sent(), 1);

    pump(&mut sender, &mut fa, &clock);
    assert!(sender.retransmit().is_empty());
    assert_eq!(sender.acked_seq(), SeqNum::new(2));
    assert_eq!(sender.credits().get(Channel::new(CHANNEL).unwrap()), 3);
}

#[test]
fn test_lost_frame_recovered_by_nak() {
    let clock = ManualClock::new();
    let (mut fa, mut fb) = LoopbackFabric::pair();
    let mut sender = Endpoint::default();
    let mut receiver = Endpoint::default();

    // Lose the first transmission of frame 2 only
    let lost_once = Arc::new(AtomicBool::new(false));
    let flag = lost_once.clone();
    fa.set_drop_filter(move |bytes| {
        let frame = Frame::from_bytes(bytes).unwrap();
        frame.seq_num == SeqNum::new(2) && !flag.swap(true, Ordering::SeqCst)
    });

    for _ in 0..5 {
        send_data(&mut sender, &mut fa, clock.now());
    }
    assert_eq!(fa.dropped(), 1);

    // Frames 3 and 4 arrive ahead of 2, each answered by a NAK for 1
    pump(&mut receiver, &mut fb, &clock);
    assert_eq!(receiver.next_rx_seq(), SeqNum::new(2));
    assert_eq!(receiver.stats().out_of_sequence, 2);
    assert_eq!(receiver.stats().naks_sent, 2);

    // The sender reclaims 0 and 1 and re-sends 2..=4 per NAK
    pump(&mut sender, &mut fa, &clock);
    assert_eq!(sender.retransmit().len(), 3);
    assert_eq!(sender.stats().retransmitted, 6);
    assert!(lost_once.load(Ordering::SeqCst));

    pump(&mut receiver, &mut fb, &clock);
    assert_eq!(receiver.next_rx_seq(), SeqNum::new(5));
    assert_eq!(receiver.stats().duplicates, 3);

    let delivered = drain(&mut receiver);
    let expected: Vec<Bytes> = (0..5)
        .map(|seq| Bytes::from(format!("tl-msg-{}", seq)))
        .collect();
    assert_eq!(delivered, expected);

    // Let the delayed ACK fire and confirm the rest
    clock.advance(Duration::from_millis(2));
    pump(&mut receiver, &mut fb, &clock);
    pump(&mut sender, &mut fa, &clock);

    assert!(sender.retransmit().is_empty());
    assert_eq!(sender.acked_seq(), SeqNum::new(4));
    assert_eq!(sender.credits().get(Channel::new(CHANNEL).unwrap()), 5);
    assert_eq!(sender.stats().credit_increments, 5);
}

#[test]
fn test_lost_ack_is_repaired_by_duplicate() {
    let clock = ManualClock::new();
    let (mut fa, mut fb) = LoopbackFabric::pair();
    let mut sender = Endpoint::default();
    let mut receiver = Endpoint::default();

    // Every ACK from the receiver is lost until the filter is cleared
    fb.set_drop_filter(|bytes| {
        Frame::from_bytes(bytes)
            .map(|frame| frame.ack_kind == AckKind::Ack)
            .unwrap_or(false)
    });

    send_data(&mut sender, &mut fa, clock.now());
    pump(&mut receiver, &mut fb, &clock);
    clock.advance(Duration::from_millis(2));
    pump(&mut receiver, &mut fb, &clock);
    assert_eq!(fb.dropped(), 1);
    assert_eq!(sender.retransmit().len(), 1);

    // The sender never heard back; a re-send shows up as a duplicate
    fb.clear_drop_filter();
    let stale = sender.retransmit().entries().next().unwrap().frame.clone();
    fa.send(&stale.to_bytes().unwrap()).unwrap();
    pump(&mut receiver, &mut fb, &clock);
    assert_eq!(receiver.stats().duplicates, 1);

    clock.advance(Duration::from_millis(2));
    pump(&mut receiver, &mut fb, &clock);
    pump(&mut sender, &mut fa, &clock);

    assert!(sender.retransmit().is_empty());
    assert_eq!(drain(&mut receiver).len(), 1);
}
