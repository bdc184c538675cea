//! TLoE Reliable Delivery Core
//!
//! This crate implements the receive-side protocol engine of TileLink over
//! Ethernet: frame classification, the retransmission buffer and its sliding
//! window, delayed ACK coalescing, NAK-driven retransmission and per-channel
//! credit return.

pub mod ack;
pub mod credit;
pub mod endpoint;
pub mod fabric;
pub mod frame;
pub mod queue;
pub mod receiver;
pub mod retransmit;
pub mod sequence;

pub use ack::{AckError, AckPolicy, DelayedAck, DelayedAckState};
pub use credit::CreditTracker;
pub use endpoint::{Endpoint, EndpointConfig, EndpointError, EndpointStats, InboundMessage};
pub use fabric::Fabric;
pub use frame::{AckKind, Channel, Frame, FrameError};
pub use queue::BoundedQueue;
pub use receiver::{Cycle, Inbound, RxEvent};
pub use retransmit::{EntryState, RetransmitEntry, RetransmitError, RetransmitManager};
pub use sequence::SeqNum;
