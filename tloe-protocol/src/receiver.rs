//! TLoE receive cycle
//!
//! One call to [`Endpoint::poll`] is one cycle: take at most one frame off the
//! fabric, classify it against the receive window, serve it, then give the
//! delayed ACK timer a chance to fire.

use crate::ack;
use crate::endpoint::{Endpoint, EndpointError, InboundMessage};
use crate::fabric::Fabric;
use crate::frame::{AckKind, Frame};
use crate::sequence::SeqNum;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Classification of an inbound frame
///
/// Control frames are split off before the receive window is consulted, so a
/// data-path variant can never hold an ACK/NAK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Peer acknowledged our frames up to the sequence number
    Ack(SeqNum),
    /// Peer received in order up to the sequence number and lost the next one
    Nak(SeqNum),
    /// Exactly the expected frame
    Normal(Frame),
    /// Already delivered
    Duplicate(Frame),
    /// Ahead of the expected frame: something in between was lost
    OutOfSequence(Frame),
}

impl Inbound {
    pub fn classify(frame: Frame, next_rx_seq: SeqNum) -> Self {
        match frame.ack_kind {
            AckKind::Ack => Inbound::Ack(frame.seq_num_ack),
            AckKind::Nak => Inbound::Nak(frame.seq_num_ack),
            AckKind::None => match frame.seq_num.circular_cmp(next_rx_seq) {
                Ordering::Equal => Inbound::Normal(frame),
                Ordering::Less => Inbound::Duplicate(frame),
                Ordering::Greater => Inbound::OutOfSequence(frame),
            },
        }
    }
}

/// What a receive cycle did with its frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEvent {
    /// Nothing was waiting on the fabric
    Idle,
    /// Bytes arrived that did not decode as a frame
    Malformed,
    Ack {
        ack_seq: SeqNum,
        reclaimed: usize,
    },
    Nak {
        ack_seq: SeqNum,
        reclaimed: usize,
        resent: usize,
    },
    /// Payload accepted into the inbound queue
    Normal(SeqNum),
    Duplicate(SeqNum),
    OutOfSequence {
        seq: SeqNum,
        expected: SeqNum,
    },
    /// In-order frame refused because the inbound queue is full; a NAK asks
    /// the peer to send it again
    Backpressure(SeqNum),
}

/// Outcome of one receive cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    pub event: RxEvent,
    /// A delayed ACK was queued at the end of the cycle
    pub ack_flushed: bool,
}

impl Endpoint {
    /// Run one receive cycle
    pub fn poll<F: Fabric + ?Sized>(
        &mut self,
        fabric: &mut F,
        now: Instant,
    ) -> Result<Cycle, EndpointError> {
        let received = self.receive_one(fabric, now);

        // The timer check runs even when serving the frame failed
        let flushed = self.flush_delayed_ack(now);

        Ok(Cycle {
            event: received?,
            ack_flushed: flushed?,
        })
    }

    fn receive_one<F: Fabric + ?Sized>(
        &mut self,
        fabric: &mut F,
        now: Instant,
    ) -> Result<RxEvent, EndpointError> {
        let Some(size) = fabric.recv(&mut self.recv_buf)? else {
            return Ok(RxEvent::Idle);
        };

        match Frame::from_bytes(&self.recv_buf[..size]) {
            Ok(frame) => self.handle_frame(frame, fabric, now),
            Err(err) => {
                warn!(%err, size, "dropping malformed frame");
                self.stats.malformed += 1;
                Ok(RxEvent::Malformed)
            }
        }
    }

    /// Serve one decoded frame
    ///
    /// This is the body of [`Endpoint::poll`] without the fabric receive and
    /// the timer check.
    pub fn handle_frame<F: Fabric + ?Sized>(
        &mut self,
        frame: Frame,
        fabric: &mut F,
        now: Instant,
    ) -> Result<RxEvent, EndpointError> {
        match Inbound::classify(frame, self.next_rx_seq) {
            Inbound::Ack(ack_seq) => {
                let reclaimed = self.serve_ack(ack_seq);
                Ok(RxEvent::Ack { ack_seq, reclaimed })
            }
            Inbound::Nak(ack_seq) => {
                let reclaimed = self.serve_ack(ack_seq);
                let resent = self.retransmit.resend_from(ack_seq.next(), fabric, now)?;
                Ok(RxEvent::Nak {
                    ack_seq,
                    reclaimed,
                    resent,
                })
            }
            Inbound::Normal(frame) => self.serve_normal(frame, now),
            Inbound::Duplicate(frame) => Ok(self.serve_duplicate(frame, now)),
            Inbound::OutOfSequence(frame) => self.serve_out_of_sequence(frame, now),
        }
    }

    /// Queue the delayed ACK if the policy says it is due
    pub fn flush_delayed_ack(&mut self, now: Instant) -> Result<bool, EndpointError> {
        if !self.delayed_ack.should_flush(now) {
            return Ok(false);
        }

        self.delayed_ack.build_and_enqueue_ack(&mut self.control)?;
        self.stats.acks_flushed += 1;
        Ok(true)
    }

    // ACK and NAK both confirm everything up to `ack_seq`. `next_rx_seq` is
    // about the other direction and stays put.
    fn serve_ack(&mut self, ack_seq: SeqNum) -> usize {
        let reclaimed = self.retransmit.slide(ack_seq);

        self.acked_seq = ack_seq;
        self.stats.acks += 1;

        if self.stats.acks % 100 == 0 {
            info!(
                next_tx = %self.next_tx_seq,
                acked = %self.acked_seq,
                next_rx = %self.next_rx_seq,
                ack_cnt = self.stats.acks,
                "ack progress"
            );
        }

        reclaimed
    }

    fn serve_normal(&mut self, frame: Frame, now: Instant) -> Result<RxEvent, EndpointError> {
        let seq = frame.seq_num;
        let message = InboundMessage {
            seq,
            channel: frame.channel,
            credit: frame.credit,
            payload: frame.payload,
        };

        if self.inbound.enqueue(message).is_err() {
            let last = self.next_rx_seq.prev();
            warn!(%seq, %last, "inbound queue full, refusing frame");
            ack::enqueue_nak(&mut self.control, last)?;
            self.stats.naks_sent += 1;
            self.stats.backpressure += 1;
            return Ok(RxEvent::Backpressure(seq));
        }

        self.delayed_ack
            .on_normal(seq, frame.channel, frame.credit, now);
        self.next_rx_seq = seq.next();
        self.acked_seq = frame.seq_num_ack;
        self.stats.delivered += 1;

        Ok(RxEvent::Normal(seq))
    }

    fn serve_duplicate(&mut self, frame: Frame, now: Instant) -> RxEvent {
        let seq = frame.seq_num;
        debug!(%seq, next_rx = %self.next_rx_seq, "duplicate frame");

        self.delayed_ack.on_duplicate(seq, now);
        self.stats.duplicates += 1;

        RxEvent::Duplicate(seq)
    }

    fn serve_out_of_sequence(
        &mut self,
        frame: Frame,
        now: Instant,
    ) -> Result<RxEvent, EndpointError> {
        let seq = frame.seq_num;
        let expected = self.next_rx_seq;
        let last = expected.prev();
        warn!(%seq, next_rx = %expected, %last, "frame out of sequence");

        ack::enqueue_nak(&mut self.control, last)?;
        self.delayed_ack.restart_timer(now);
        self.stats.naks_sent += 1;
        self.stats.out_of_sequence += 1;

        Ok(RxEvent::OutOfSequence { seq, expected })
    }
}
