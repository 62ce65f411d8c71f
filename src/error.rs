//! Setup-boundary error taxonomy.
//!
//! In-flight protocol anomalies (bad checksum, malformed decode, duplicate
//! or out-of-order packets) are never turned into a [`SquallError`] — they
//! are handled locally by the receiver and sender cores and only ever
//! surfaced as counters in [`crate::stats::TransferStats`]. Only setup and
//! handshake/teardown failures reach the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SquallError {
    #[error("socket I/O failed")]
    Io(#[from] std::io::Error),

    #[error("handshake failed after {retries} retries")]
    HandshakeFailed { retries: u32 },

    #[error("teardown failed after {retries} retries")]
    TeardownFailed { retries: u32 },

    #[error("invalid configuration: {0}")]
    Config(String),
}
