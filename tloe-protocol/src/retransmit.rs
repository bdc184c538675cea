//! Retransmission buffer management
//!
//! Every data frame put on the fabric is kept here until the peer confirms it.
//! Confirmation slides the window from the front and returns one flow-control
//! credit per reclaimed frame; a NAK re-sends everything from the requested
//! point to the tail.

use crate::credit::CreditTracker;
use crate::fabric::Fabric;
use crate::frame::{Frame, FrameError};
use crate::queue::BoundedQueue;
use crate::sequence::SeqNum;
use std::io::{self, ErrorKind};
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// Retransmission errors
#[derive(Error, Debug)]
pub enum RetransmitError {
    #[error("Retransmission buffer is full")]
    BufferFull,

    #[error("Frame {seq} is not after the buffer tail {tail}")]
    OutOfOrder { seq: SeqNum, tail: SeqNum },

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Fabric send failed: {0}")]
    Io(#[from] io::Error),
}

/// Transmission state of a buffered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Sent once, not yet confirmed
    Sent,
    /// Re-sent at least once after a NAK
    Resent,
}

/// Buffered copy of a sent data frame
#[derive(Debug, Clone)]
pub struct RetransmitEntry {
    pub frame: Frame,
    pub state: EntryState,
    /// Time of the most recent (re)transmission
    pub send_time: Instant,
}

/// Owns the retransmission buffer and the credits it returns
pub struct RetransmitManager {
    buffer: BoundedQueue<RetransmitEntry>,
    credits: CreditTracker,
    /// Total credits returned through sliding
    credit_increments: u64,
    /// Total frames re-sent
    resent: u64,
}

impl RetransmitManager {
    /// Create a manager with room for `capacity` unconfirmed frames
    pub fn new(capacity: usize, initial_credit: u32) -> Self {
        RetransmitManager {
            buffer: BoundedQueue::new(capacity),
            credits: CreditTracker::new(initial_credit),
            credit_increments: 0,
            resent: 0,
        }
    }

    /// Record a freshly sent data frame
    pub fn record(&mut self, frame: Frame, now: Instant) -> Result<(), RetransmitError> {
        if let Some(tail) = self.buffer.peek_back() {
            let tail = tail.frame.seq_num;
            if !frame.seq_num.gt(tail) {
                return Err(RetransmitError::OutOfOrder {
                    seq: frame.seq_num,
                    tail,
                });
            }
        }

        self.buffer
            .enqueue(RetransmitEntry {
                frame,
                state: EntryState::Sent,
                send_time: now,
            })
            .map_err(|_| RetransmitError::BufferFull)
    }

    /// Reclaim every frame up to and including `last_confirmed`
    ///
    /// Returns the number of reclaimed frames. Each one returns a credit on its
    /// channel.
    pub fn slide(&mut self, last_confirmed: SeqNum) -> usize {
        let mut reclaimed = 0;

        while self
            .buffer
            .peek_front()
            .is_some_and(|entry| entry.frame.seq_num.le(last_confirmed))
        {
            let Some(entry) = self.buffer.dequeue() else {
                break;
            };
            self.credits.increment(entry.frame.channel, 1);
            self.credit_increments += 1;
            reclaimed += 1;
        }

        reclaimed
    }

    /// Re-send every buffered frame from `threshold` through the tail
    ///
    /// Returns the number of frames handed to the fabric. A fabric that would
    /// block ends the pass early without an error; the frames not reached keep
    /// their state and go out on the next NAK.
    pub fn resend_from<F: Fabric + ?Sized>(
        &mut self,
        threshold: SeqNum,
        fabric: &mut F,
        now: Instant,
    ) -> Result<usize, RetransmitError> {
        let mut count = 0;
        let mut outcome = Ok(());

        for entry in self
            .buffer
            .iter_mut()
            .skip_while(|entry| entry.frame.seq_num.lt(threshold))
        {
            if let Err(err) = resend_entry(entry, fabric, now) {
                outcome = Err(err);
                break;
            }
            count += 1;
        }

        self.resent += count as u64;

        match outcome {
            Ok(()) => Ok(count),
            Err(RetransmitError::Io(err)) if err.kind() == ErrorKind::WouldBlock => {
                debug!(resent = count, "fabric busy, retransmission cut short");
                Ok(count)
            }
            Err(err) => Err(err),
        }
    }

    /// Buffered entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &RetransmitEntry> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    pub fn credits(&self) -> &CreditTracker {
        &self.credits
    }

    pub fn credit_increments(&self) -> u64 {
        self.credit_increments
    }

    pub fn resent(&self) -> u64 {
        self.resent
    }
}

fn resend_entry<F: Fabric + ?Sized>(
    entry: &mut RetransmitEntry,
    fabric: &mut F,
    now: Instant,
) -> Result<(), RetransmitError> {
    entry.frame.marker = true;
    debug!(seq = %entry.frame.seq_num, "retransmitting frame");

    let bytes = entry.frame.to_bytes()?;
    fabric.send(&bytes)?;

    entry.state = EntryState::Resent;
    entry.send_time = now;
    Ok(())
}
