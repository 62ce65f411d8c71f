//! Receiver core: in-order delivery, the out-of-order buffer, and
//! cumulative ACK generation. Pure logic — no socket I/O — so it can be
//! driven directly by tests as well as by [`crate::net::ReceiverChannel`].

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::wire::Packet;

/// What happened to an ingested data packet, for the caller to act on and
/// to feed into [`crate::stats::ReceiverStats`].
#[derive(Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Delivered now, plus zero or more buffered packets that became
    /// contiguous as a result, in delivery order.
    Delivered(Vec<Bytes>),
    /// Out of order; buffered for later, or dropped because the buffer was
    /// already at its cap (will be recovered by retransmission).
    Buffered,
    /// Already delivered previously; payload discarded.
    Discarded,
}

/// Receives data packets for a single connection: an `expected_seq` cursor
/// plus a capped map of not-yet-deliverable out-of-order packets.
pub struct Receiver {
    expected_seq: u32,
    buffer: BTreeMap<u32, Bytes>,
    capacity: usize,
}

impl Receiver {
    pub fn new(capacity: usize) -> Self {
        Receiver {
            expected_seq: 1,
            buffer: BTreeMap::new(),
            capacity,
        }
    }

    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    /// `ack_num` to stamp on the next outgoing ACK: the highest in-order
    /// sequence delivered so far.
    pub fn ack_num(&self) -> u32 {
        self.expected_seq - 1
    }

    /// Every key currently held is strictly greater than `expected_seq`.
    pub fn buffer_invariant_holds(&self) -> bool {
        self.buffer.keys().all(|&k| k > self.expected_seq)
    }

    /// Ingest a decoded, checksum-verified data packet and apply the
    /// delivery rule from the protocol. Control packets must not be passed
    /// here — the caller dispatches on `flags` first.
    pub fn ingest(&mut self, packet: &Packet) -> DeliveryOutcome {
        use std::cmp::Ordering;

        match packet.seq_num.cmp(&self.expected_seq) {
            Ordering::Equal => {
                let mut delivered = vec![packet.payload.clone()];
                self.expected_seq += 1;
                while let Some(next) = self.buffer.remove(&self.expected_seq) {
                    delivered.push(next);
                    self.expected_seq += 1;
                }
                DeliveryOutcome::Delivered(delivered)
            }
            Ordering::Greater => {
                if self.buffer.len() < self.capacity || self.buffer.contains_key(&packet.seq_num)
                {
                    self.buffer.insert(packet.seq_num, packet.payload.clone());
                }
                DeliveryOutcome::Buffered
            }
            Ordering::Less => DeliveryOutcome::Discarded,
        }
    }
}
