//! Delayed ACK coalescing and NAK generation
//!
//! Inbound data frames are not acknowledged one by one. The coordinator
//! remembers the newest acknowledgment content and emits a single ACK once the
//! policy decides the pending window is old enough or large enough. NAKs
//! bypass the timer entirely.

use crate::frame::{AckKind, Channel, Frame};
use crate::queue::BoundedQueue;
use crate::sequence::SeqNum;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default upper bound on how long an ACK may be held back
pub const DEFAULT_ACK_DELAY: Duration = Duration::from_millis(1);

/// Default number of coalesced frames after which an ACK is forced
pub const DEFAULT_ACK_BATCH: u32 = 3;

/// ACK/NAK emission errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AckError {
    #[error("Control frame queue is full")]
    QueueFull,
}

/// Flush thresholds for delayed ACKs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPolicy {
    /// Flush once the oldest unacknowledged frame has waited longer than this
    pub max_delay: Duration,
    /// Flush once more than this many frames were coalesced
    pub max_batch: u32,
}

impl AckPolicy {
    pub fn new(max_delay: Duration, max_batch: u32) -> Self {
        AckPolicy {
            max_delay,
            max_batch,
        }
    }

    /// Check whether a pending ACK is due
    pub fn should_flush(&self, state: &DelayedAckState, now: Instant) -> bool {
        state.ack_pending
            && (now.saturating_duration_since(state.ack_time) > self.max_delay
                || state.batch_count > self.max_batch)
    }

    /// Restart the delay window without dropping the pending ACK content
    pub fn reset(&self, state: &mut DelayedAckState, now: Instant) {
        state.ack_time = now;
        state.batch_count = 0;
    }
}

impl Default for AckPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ACK_DELAY, DEFAULT_ACK_BATCH)
    }
}

/// Delayed ACK timer state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedAckState {
    /// An ACK is owed to the peer
    pub ack_pending: bool,
    /// Start of the current delay window
    pub ack_time: Instant,
    /// Sequence number the next ACK will carry
    pub last_ack_seq: SeqNum,
    /// Channel the next ACK will carry
    pub last_channel: Channel,
    /// Credit the next ACK will carry
    pub last_credit: u32,
    /// Frames coalesced and not yet released by a flush
    ///
    /// Each flush releases exactly one unit.
    pub pending_count: u32,
    /// Frames coalesced since the last flush or timer restart
    pub batch_count: u32,
}

impl DelayedAckState {
    /// Idle state; `last_ack_seq` starts one before the first sequence number
    pub fn new(now: Instant) -> Self {
        DelayedAckState {
            ack_pending: false,
            ack_time: now,
            last_ack_seq: SeqNum::ZERO.prev(),
            last_channel: Channel::default(),
            last_credit: 0,
            pending_count: 0,
            batch_count: 0,
        }
    }
}

/// Delayed ACK coordinator
#[derive(Debug, Clone)]
pub struct DelayedAck {
    policy: AckPolicy,
    state: DelayedAckState,
}

impl DelayedAck {
    pub fn new(policy: AckPolicy, now: Instant) -> Self {
        DelayedAck {
            policy,
            state: DelayedAckState::new(now),
        }
    }

    fn start_timer(&mut self, now: Instant) {
        if !self.state.ack_pending {
            self.state.ack_pending = true;
            self.state.ack_time = now;
        }
    }

    fn count_frame(&mut self) {
        self.state.pending_count = self.state.pending_count.saturating_add(1);
        self.state.batch_count = self.state.batch_count.saturating_add(1);
    }

    /// A frame was accepted in order; it becomes the ACK content
    pub fn on_normal(&mut self, seq: SeqNum, channel: Channel, credit: u32, now: Instant) {
        self.start_timer(now);
        self.state.last_ack_seq = seq;
        self.state.last_channel = channel;
        self.state.last_credit = credit;
        self.count_frame();
    }

    /// A duplicate arrived; the peer still needs to hear an ACK
    ///
    /// The ACK sequence never moves backwards, in the idle state as well as
    /// while pending: a stale duplicate arriving right after a flush re-ACKs
    /// the newest in-order frame rather than its own older number.
    pub fn on_duplicate(&mut self, seq: SeqNum, now: Instant) {
        self.start_timer(now);
        if seq.gt(self.state.last_ack_seq) {
            self.state.last_ack_seq = seq;
        }
        self.count_frame();
    }

    /// Start a fresh delay window (after a gap was detected)
    pub fn restart_timer(&mut self, now: Instant) {
        self.policy.reset(&mut self.state, now);
    }

    pub fn should_flush(&self, now: Instant) -> bool {
        self.policy.should_flush(&self.state, now)
    }

    /// The ACK frame a flush would emit right now
    pub fn build_ack(&self) -> Frame {
        let mut frame = Frame::control(
            AckKind::Ack,
            self.state.last_ack_seq,
            self.state.last_ack_seq,
        );
        frame.channel = self.state.last_channel;
        frame.credit = self.state.last_credit;
        frame
    }

    /// Emit the pending ACK onto the control queue and go idle
    ///
    /// On a full queue nothing changes, so the flush can be retried.
    pub fn build_and_enqueue_ack(&mut self, queue: &mut BoundedQueue<Frame>) -> Result<(), AckError> {
        queue
            .enqueue(self.build_ack())
            .map_err(|_| AckError::QueueFull)?;

        self.state.ack_pending = false;
        self.state.pending_count = self.state.pending_count.saturating_sub(1);
        self.state.batch_count = 0;
        Ok(())
    }

    pub fn state(&self) -> &DelayedAckState {
        &self.state
    }

    pub fn policy(&self) -> &AckPolicy {
        &self.policy
    }
}

/// Build a NAK naming the last frame received in order
///
/// The NAK is a fresh control frame: `seq_num` and `seq_num_ack` both carry
/// `last_in_order`, channel and credit are zero. Nothing of the frame that
/// exposed the gap is echoed back.
pub fn nak_frame(last_in_order: SeqNum) -> Frame {
    Frame::control(AckKind::Nak, last_in_order, last_in_order)
}

/// Enqueue a NAK immediately, bypassing the delayed ACK timer
pub fn enqueue_nak(queue: &mut BoundedQueue<Frame>, last_in_order: SeqNum) -> Result<(), AckError> {
    queue
        .enqueue(nak_frame(last_in_order))
        .map_err(|_| AckError::QueueFull)
}
