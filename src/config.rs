//! Wire-visible constants and the overridable runtime [`Config`].
//!
//! The constants mirror the fixed values a compliant peer MUST agree on to
//! interoperate (port numbers, header layout, timeout). [`Config`] lets a
//! binary override the behavior-visible ones (window size, timeout, retry
//! budget) without touching the wire layout itself.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SquallError;

/// Default UDP port the receiver listens on.
pub const SERVER_PORT: u16 = 8888;
/// Largest datagram the codec will ever emit or accept.
pub const MAX_BUFFER_SIZE: usize = 1500;
/// Fixed wire header length, in bytes.
pub const HEADER_SIZE: usize = 20;
/// Largest payload carried by a single data packet.
pub const MAX_DATA_SIZE: usize = 1480;
/// Cap on simultaneously in-flight packets, and on the receiver's
/// out-of-order buffer.
pub const FLOW_CONTROL_WINDOW_SIZE: usize = 64;
/// Fixed per-packet retransmission timer. There is no RTT estimator: this
/// value never changes at runtime.
pub const PACKET_TIMEOUT_MS: u64 = 1000;
/// Reno controller starting slow-start threshold.
pub const INITIAL_SSTHRESH: u32 = 16;
/// Reno controller starting congestion window.
pub const INITIAL_CWND: f64 = 1.0;
/// Port an impairment simulator may sit behind; does not change the
/// protocol, only where the sender points its socket.
pub const ROUTER_PORT: u16 = 12345;
/// Bounded retry budget for control packets (SYN, SYN-ACK, handshake ACK,
/// FIN, FIN-ACK). The reference has no such retry; this crate adds it per
/// the recommended deviation.
pub const MAX_CONTROL_RETRIES: u32 = 5;

/// Runtime-overridable knobs. Defaults match the constants above; a binary
/// may load overrides from a TOML file and/or CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_port: u16,
    pub router_port: Option<u16>,
    pub flow_control_window_size: usize,
    pub packet_timeout_ms: u64,
    pub max_control_retries: u32,
    pub initial_ssthresh: u32,
    pub initial_cwnd: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_port: SERVER_PORT,
            router_port: None,
            flow_control_window_size: FLOW_CONTROL_WINDOW_SIZE,
            packet_timeout_ms: PACKET_TIMEOUT_MS,
            max_control_retries: MAX_CONTROL_RETRIES,
            initial_ssthresh: INITIAL_SSTHRESH,
            initial_cwnd: INITIAL_CWND,
        }
    }
}

impl Config {
    /// Load a config from a TOML file, falling back to defaults for any
    /// field the file omits.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SquallError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&text).map_err(|e| SquallError::Config(e.to_string()))
    }

    pub fn packet_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.packet_timeout_ms)
    }
}
