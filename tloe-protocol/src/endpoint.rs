//! TLoE endpoint state
//!
//! One [`Endpoint`] per connection. It owns the retransmission manager, the
//! delayed ACK coordinator and the three bounded queues; the receive cycle
//! that drives them lives in [`crate::receiver`].

use crate::ack::{AckError, AckPolicy, DelayedAck};
use crate::credit::CreditTracker;
use crate::fabric::Fabric;
use crate::frame::{Channel, Frame, FrameError, MAX_FRAME_SIZE};
use crate::queue::BoundedQueue;
use crate::retransmit::{RetransmitError, RetransmitManager};
use crate::sequence::SeqNum;
use bytes::Bytes;
use std::io;
use std::time::Instant;
use thiserror::Error;

/// Receive buffer size
///
/// One byte larger than the biggest valid frame, so a datagram that is too
/// long arrives at the decoder as too long instead of being truncated to a
/// plausible frame.
pub const RECV_BUFFER_SIZE: usize = MAX_FRAME_SIZE + 1;

/// Endpoint errors
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("Fabric error: {0}")]
    Fabric(#[from] io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Retransmission error: {0}")]
    Retransmit(#[from] RetransmitError),

    #[error("Acknowledgment error: {0}")]
    Ack(#[from] AckError),
}

/// Endpoint sizing and ACK policy
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Unconfirmed data frames kept for retransmission
    pub retransmit_capacity: usize,
    /// Outbound ACK/NAK frames awaiting transmission
    pub control_capacity: usize,
    /// Accepted payloads awaiting the consumer
    pub inbound_capacity: usize,
    /// Starting credit on every channel
    pub initial_credit: u32,
    pub ack_policy: AckPolicy,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            retransmit_capacity: 1024,
            control_capacity: 64,
            inbound_capacity: 1024,
            initial_credit: 0,
            ack_policy: AckPolicy::default(),
        }
    }
}

/// Endpoint statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointStats {
    /// ACK/NAK frames served
    pub acks: u64,
    /// Duplicate data frames discarded
    pub duplicates: u64,
    /// Out-of-sequence data frames discarded
    pub out_of_sequence: u64,
    /// Coalesced frames not yet released by an ACK flush
    pub pending_delay: u32,
    /// Credits returned by sliding the retransmission buffer
    pub credit_increments: u64,
    /// Payloads accepted into the inbound queue
    pub delivered: u64,
    /// Delayed ACKs emitted
    pub acks_flushed: u64,
    /// NAKs emitted
    pub naks_sent: u64,
    /// Frames re-sent in response to NAKs
    pub retransmitted: u64,
    /// Undecodable frames dropped
    pub malformed: u64,
    /// In-order frames refused because the inbound queue was full
    pub backpressure: u64,
}

/// Payload accepted in order, ready for the upper layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub seq: SeqNum,
    pub channel: Channel,
    pub credit: u32,
    pub payload: Bytes,
}

/// Reliable-delivery state of one connection
pub struct Endpoint {
    pub(crate) next_tx_seq: SeqNum,
    /// Next in-order sequence number expected from the peer
    pub(crate) next_rx_seq: SeqNum,
    /// Last sequence number of ours the peer has acknowledged
    pub(crate) acked_seq: SeqNum,
    pub(crate) retransmit: RetransmitManager,
    pub(crate) control: BoundedQueue<Frame>,
    pub(crate) inbound: BoundedQueue<InboundMessage>,
    pub(crate) delayed_ack: DelayedAck,
    pub(crate) stats: EndpointStats,
    pub(crate) recv_buf: Box<[u8]>,
}

impl Endpoint {
    /// Create an endpoint
    ///
    /// # Panics
    /// Panics if any configured capacity is zero
    pub fn new(config: EndpointConfig) -> Self {
        Endpoint {
            next_tx_seq: SeqNum::ZERO,
            next_rx_seq: SeqNum::ZERO,
            acked_seq: SeqNum::ZERO.prev(),
            retransmit: RetransmitManager::new(config.retransmit_capacity, config.initial_credit),
            control: BoundedQueue::new(config.control_capacity),
            inbound: BoundedQueue::new(config.inbound_capacity),
            delayed_ack: DelayedAck::new(config.ack_policy, Instant::now()),
            stats: EndpointStats::default(),
            recv_buf: vec![0u8; RECV_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Record a data frame the transmit path just sent
    pub fn record_sent(&mut self, frame: Frame, now: Instant) -> Result<(), EndpointError> {
        let seq = frame.seq_num;
        self.retransmit.record(frame, now)?;
        self.next_tx_seq = seq.next();
        Ok(())
    }

    /// Send every queued ACK/NAK frame
    ///
    /// A frame leaves the queue only once the fabric accepted it.
    pub fn transmit_control<F: Fabric + ?Sized>(
        &mut self,
        fabric: &mut F,
    ) -> Result<usize, EndpointError> {
        let mut sent = 0;

        while let Some(frame) = self.control.peek_front() {
            let bytes = frame.to_bytes()?;
            fabric.send(&bytes)?;
            self.control.dequeue();
            sent += 1;
        }

        Ok(sent)
    }

    /// Take the oldest payload delivered in order
    pub fn pop_message(&mut self) -> Option<InboundMessage> {
        self.inbound.dequeue()
    }

    /// Take the oldest queued ACK/NAK frame without sending it
    pub fn pop_control(&mut self) -> Option<Frame> {
        self.control.dequeue()
    }

    pub fn next_tx_seq(&self) -> SeqNum {
        self.next_tx_seq
    }

    pub fn next_rx_seq(&self) -> SeqNum {
        self.next_rx_seq
    }

    pub fn acked_seq(&self) -> SeqNum {
        self.acked_seq
    }

    pub fn retransmit(&self) -> &RetransmitManager {
        &self.retransmit
    }

    pub fn credits(&self) -> &CreditTracker {
        self.retransmit.credits()
    }

    pub fn delayed_ack(&self) -> &DelayedAck {
        &self.delayed_ack
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    pub fn control_len(&self) -> usize {
        self.control.len()
    }

    /// Snapshot of the diagnostic counters
    pub fn stats(&self) -> EndpointStats {
        EndpointStats {
            pending_delay: self.delayed_ack.state().pending_count,
            credit_increments: self.retransmit.credit_increments(),
            retransmitted: self.retransmit.resent(),
            ..self.stats.clone()
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(EndpointConfig::default())
    }
}
