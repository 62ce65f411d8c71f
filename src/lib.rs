//! A reliable file-transfer protocol over an unreliable datagram
//! substrate: a UDP-like packet service that may drop, duplicate, reorder,
//! or corrupt datagrams.
//!
//! - [`wire`] — fixed packet header, flags, and the integrity checksum.
//! - [`handshake`] — three-way establishment and four-way teardown.
//! - [`receiver`] — in-order delivery cursor and the out-of-order buffer.
//! - [`window`] — the sender's send window, sequence cursors, and the
//!   shared aggregate the two sender-side threads operate on.
//! - [`congestion`] — the TCP Reno controller.
//! - [`net`] — binds the above to real sockets and runs the sender's main
//!   loop concurrently with its ACK receiver task, and the receiver's
//!   single-threaded loop.
//! - [`stats`] — end-of-transfer statistics.
//! - [`config`] — wire-visible constants and the overridable [`config::Config`].
//! - [`error`] — setup-boundary error taxonomy.

pub mod config;
pub mod congestion;
pub mod error;
pub mod handshake;
pub mod net;
pub mod receiver;
pub mod stats;
pub mod wire;
pub mod window;

pub use config::Config;
pub use error::SquallError;
pub use net::{ConnectedChannel, ReceiverChannel};
pub use stats::TransferStats;
