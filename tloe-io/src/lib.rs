//! TLoE I/O and Platform Abstraction
//!
//! Concrete fabrics and clocks for driving a [`tloe_protocol::Endpoint`]:
//! a UDP transport, an in-memory loopback pair for tests, and clock sources.

pub mod loopback;
pub mod time;
pub mod udp;

pub use loopback::{DropFilter, LoopbackFabric};
pub use time::{Clock, ManualClock, MonotonicClock, Timer};
pub use udp::{FabricError, UdpFabric};
