//! TLoE Frame Structures and Serialization
//!
//! A TLoE frame is a 64-bit header word, an opaque payload and a 64-bit mask
//! word, all in network byte order:
//!
//! ```text
//!  63      54 53          32 31          10  9   8  7   5 4     0
//! +----------+--------------+--------------+---+---+-----+-------+
//! | reserved |   seq_num    | seq_num_ack  |ack|rsv| chan| credit|
//! +----------+--------------+--------------+---+---+-----+-------+
//! |                     payload (0..=1484 bytes)                 |
//! +--------------------------------------------------------------+
//! |                mask (bit 0: data marker)                     |
//! +--------------------------------------------------------------+
//! ```
//!
//! A frame whose marker is clear carries no TileLink data and is an ACK or NAK,
//! selected by the ack bit. Data frames use the ack bit and `seq_num_ack` to
//! piggyback an acknowledgment of the reverse stream.

use crate::sequence::{SeqNum, MAX_SEQ_NUM};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Size of the header word in bytes
pub const HEADER_SIZE: usize = 8;

/// Size of the mask word in bytes
pub const MASK_SIZE: usize = 8;

/// Largest frame accepted on the fabric
pub const MAX_FRAME_SIZE: usize = 1500;

/// Maximum payload size (frame minus header and mask)
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - HEADER_SIZE - MASK_SIZE;

/// Number of flow-control channels addressable by the 3-bit channel field
pub const CHANNEL_COUNT: usize = 8;

/// Largest credit value representable by the 5-bit credit field
pub const MAX_CREDIT: u32 = 0x1F;

const SEQ_NUM_SHIFT: u32 = 32;
const SEQ_NUM_ACK_SHIFT: u32 = 10;
const ACK_BIT: u64 = 1 << 9;
const CHANNEL_SHIFT: u32 = 5;
const CHANNEL_MASK: u64 = 0x7;
const CREDIT_MASK: u64 = MAX_CREDIT as u64;
const MARKER_BIT: u64 = 1;

/// Acknowledgment kind carried by a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    /// Data frame, no standalone acknowledgment
    None,
    /// Positive acknowledgment up to and including `seq_num_ack`
    Ack,
    /// Negative acknowledgment: `seq_num_ack` is the last frame received in order
    Nak,
}

/// Flow-control channel identifier (3 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Channel(u8);

impl Channel {
    /// Create a channel id
    ///
    /// Returns `None` if the id does not fit the 3-bit field.
    pub fn new(id: u8) -> Option<Self> {
        if (id as usize) < CHANNEL_COUNT {
            Some(Channel(id))
        } else {
            None
        }
    }

    /// Create a channel id, masking the value to 3 bits
    #[inline]
    pub fn new_unchecked(id: u8) -> Self {
        Channel(id & CHANNEL_MASK as u8)
    }

    #[inline]
    pub fn as_index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn as_raw(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// TLoE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number of this frame
    pub seq_num: SeqNum,
    /// Acknowledged sequence number of the reverse stream
    pub seq_num_ack: SeqNum,
    /// Acknowledgment kind
    pub ack_kind: AckKind,
    /// Data marker: set for data-bearing frames, clear for ACK/NAK
    pub marker: bool,
    /// Flow-control channel
    pub channel: Channel,
    /// Credit granted on `channel`
    pub credit: u32,
    /// Opaque TileLink payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a data frame
    pub fn data(
        seq_num: SeqNum,
        seq_num_ack: SeqNum,
        channel: Channel,
        credit: u32,
        payload: Bytes,
    ) -> Self {
        Frame {
            seq_num,
            seq_num_ack,
            ack_kind: AckKind::None,
            marker: true,
            channel,
            credit,
            payload,
        }
    }

    /// Create a control (ACK/NAK) frame with no payload
    pub fn control(ack_kind: AckKind, seq_num: SeqNum, seq_num_ack: SeqNum) -> Self {
        Frame {
            seq_num,
            seq_num_ack,
            ack_kind,
            marker: false,
            channel: Channel::default(),
            credit: 0,
            payload: Bytes::new(),
        }
    }

    /// Check if this is an ACK/NAK frame
    #[inline]
    pub fn is_control(&self) -> bool {
        self.ack_kind != AckKind::None
    }

    /// Total encoded size of the frame
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + MASK_SIZE
    }

    fn header_word(&self) -> Result<u64, FrameError> {
        if self.credit > MAX_CREDIT {
            return Err(FrameError::CreditOverflow(self.credit));
        }

        let ack = match self.ack_kind {
            AckKind::Nak => 0,
            AckKind::Ack | AckKind::None => ACK_BIT,
        };

        Ok(((self.seq_num.as_raw() as u64) << SEQ_NUM_SHIFT)
            | ((self.seq_num_ack.as_raw() as u64) << SEQ_NUM_ACK_SHIFT)
            | ack
            | ((self.channel.as_raw() as u64 & CHANNEL_MASK) << CHANNEL_SHIFT)
            | (self.credit as u64 & CREDIT_MASK))
    }

    /// Serialize the frame to bytes
    pub fn to_bytes(&self) -> Result<BytesMut, FrameError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(self.size());
        buf.put_u64(self.header_word()?);
        buf.put_slice(&self.payload);
        buf.put_u64(if self.marker { MARKER_BIT } else { 0 });
        Ok(buf)
    }

    /// Parse a frame from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let min = HEADER_SIZE + MASK_SIZE;
        if bytes.len() < min {
            return Err(FrameError::InsufficientData {
                expected: min,
                actual: bytes.len(),
            });
        }
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(FrameError::PayloadTooLarge {
                size: bytes.len() - min,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut head = &bytes[..HEADER_SIZE];
        let header = head.get_u64();
        let mut tail = &bytes[bytes.len() - MASK_SIZE..];
        let mask = tail.get_u64();

        let marker = mask & MARKER_BIT != 0;
        let ack_kind = if marker {
            AckKind::None
        } else if header & ACK_BIT != 0 {
            AckKind::Ack
        } else {
            AckKind::Nak
        };

        let seq_field = |shift: u32| {
            SeqNum::new_unchecked(((header >> shift) & MAX_SEQ_NUM as u64) as u32)
        };

        Ok(Frame {
            seq_num: seq_field(SEQ_NUM_SHIFT),
            seq_num_ack: seq_field(SEQ_NUM_ACK_SHIFT),
            ack_kind,
            marker,
            channel: Channel::new_unchecked(((header >> CHANNEL_SHIFT) & CHANNEL_MASK) as u8),
            credit: (header & CREDIT_MASK) as u32,
            payload: Bytes::copy_from_slice(&bytes[HEADER_SIZE..bytes.len() - MASK_SIZE]),
        })
    }
}

/// Frame encoding and parsing errors
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Credit {0} does not fit the 5-bit credit field")]
    CreditOverflow(u32),
}
