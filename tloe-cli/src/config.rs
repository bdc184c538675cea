//! Configuration file support for the TLoE node

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tloe_protocol::{AckPolicy, EndpointConfig};

/// Addresses and output of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Local bind address
    pub bind: Option<SocketAddr>,
    /// Peer address
    pub peer: Option<SocketAddr>,
    /// Output destination for delivered payloads (file path or "-" for stdout)
    #[serde(default = "default_output")]
    pub output: String,
    /// Statistics interval in seconds
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

fn default_output() -> String {
    "-".to_string()
}

fn default_stats_interval() -> u64 {
    1
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            bind: None,
            peer: None,
            output: default_output(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

/// Endpoint sizing and delayed ACK policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_buffer_capacity")]
    pub retransmit_capacity: usize,
    #[serde(default = "default_control_capacity")]
    pub control_capacity: usize,
    #[serde(default = "default_buffer_capacity")]
    pub inbound_capacity: usize,
    #[serde(default)]
    pub initial_credit: u32,
    /// Longest an ACK may be held back, in microseconds
    #[serde(default = "default_ack_delay_us")]
    pub ack_delay_us: u64,
    /// Frames coalesced before an ACK is forced
    #[serde(default = "default_ack_batch")]
    pub ack_batch: u32,
}

fn default_buffer_capacity() -> usize {
    1024
}

fn default_control_capacity() -> usize {
    64
}

fn default_ack_delay_us() -> u64 {
    1000
}

fn default_ack_batch() -> u32 {
    3
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            retransmit_capacity: default_buffer_capacity(),
            control_capacity: default_control_capacity(),
            inbound_capacity: default_buffer_capacity(),
            initial_credit: 0,
            ack_delay_us: default_ack_delay_us(),
            ack_batch: default_ack_batch(),
        }
    }
}

impl ProtocolConfig {
    /// Validate and convert into the engine's configuration
    pub fn to_endpoint_config(&self) -> Result<EndpointConfig, ConfigError> {
        for (name, value) in [
            ("retransmit_capacity", self.retransmit_capacity),
            ("control_capacity", self.control_capacity),
            ("inbound_capacity", self.inbound_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }

        Ok(EndpointConfig {
            retransmit_capacity: self.retransmit_capacity,
            control_capacity: self.control_capacity,
            inbound_capacity: self.inbound_capacity,
            initial_credit: self.initial_credit,
            ack_policy: AckPolicy::new(Duration::from_micros(self.ack_delay_us), self.ack_batch),
        })
    }
}

/// Combined configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Example configuration for a node talking to one peer
    pub fn example() -> Self {
        Config {
            node: NodeConfig {
                bind: Some(SocketAddr::from(([0, 0, 0, 0], 9000))),
                peer: Some(SocketAddr::from(([192, 168, 1, 10], 9000))),
                ..NodeConfig::default()
            },
            protocol: ProtocolConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Get statistics interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
