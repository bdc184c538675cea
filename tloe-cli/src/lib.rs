//! TLoE CLI Library
//!
//! Shared functionality for the TLoE node binary.

pub mod config;
pub mod stats;

pub use config::{Config, ConfigError, NodeConfig, ProtocolConfig};
pub use stats::{display_compact_stats, display_endpoint_stats, format_bytes, format_duration};
