//! The sender's shared state: send window, sequence cursors, and the Reno
//! controller, bundled into a single aggregate per the cyclic-coupling
//! design note — callers lock one mutex and call named event methods
//! (`on_ack`, `scan_timeouts`, `admit`) rather than juggling two objects
//! with mutual callbacks.

use std::collections::BTreeMap;
use std::time::Instant;

use bytes::Bytes;

use crate::config::Config;
use crate::congestion::{DupAckOutcome, RenoController};
use crate::stats::SenderStats;

/// One in-flight packet: its encoded bytes and when it was last sent.
#[derive(Debug, Clone)]
pub struct SendWindowEntry {
    pub encoded: Bytes,
    pub last_sent: Instant,
}

/// What the caller should do after feeding an ACK into [`SenderState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckEffect {
    /// Duplicate ACK, not yet the third — nothing to send.
    DuplicateCounted,
    /// The new ACK advanced `send_base`; some window entries were removed.
    Advanced,
    /// Fast retransmit of `send_base` was triggered; the sequence to resend
    /// is carried in the variant.
    FastRetransmit(u32),
    /// An ACK at or behind an already-acknowledged point; nothing changed.
    Stale,
}

/// Shared sender aggregate: window + sequence cursors + congestion control.
/// Exactly one of these lives behind the `Mutex<..>` + `Condvar` described
/// in the concurrency model.
pub struct SenderState {
    window: BTreeMap<u32, SendWindowEntry>,
    send_base: u32,
    next_seq: u32,
    reno: RenoController,
    timeout: std::time::Duration,
    fast_retransmit_target: Option<u32>,
    pub stats: SenderStats,
}

impl SenderState {
    pub fn new(config: &Config) -> Self {
        SenderState {
            window: BTreeMap::new(),
            send_base: 1,
            next_seq: 1,
            reno: RenoController::new(config),
            timeout: config.packet_timeout(),
            fast_retransmit_target: None,
            stats: SenderStats::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn send_base(&self) -> u32 {
        self.send_base
    }

    pub fn reno(&self) -> &RenoController {
        &self.reno
    }

    /// Room left in the window right now: `effective_window - in_flight`.
    pub fn admissible(&self) -> usize {
        self.reno
            .effective_window()
            .saturating_sub(self.window.len())
    }

    /// Record a newly-sent (or retransmitted) packet for `seq`.
    pub fn insert(&mut self, seq: u32, encoded: Bytes, now: Instant) {
        let len = encoded.len() as u64;
        self.window.insert(
            seq,
            SendWindowEntry {
                encoded,
                last_sent: now,
            },
        );
        if seq >= self.next_seq {
            self.next_seq = seq + 1;
        }
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += len;
    }

    /// Take and clear the pending fast-retransmit target, if any.
    pub fn take_fast_retransmit_target(&mut self) -> Option<u32> {
        self.fast_retransmit_target.take()
    }

    /// Every window entry whose timer has expired: `(seq, encoded bytes)`.
    /// Refreshes each entry's `last_sent` and informs the Reno controller
    /// of one timeout event per expired entry, per spec.
    pub fn scan_timeouts(&mut self, now: Instant) -> Vec<(u32, Bytes)> {
        let expired: Vec<u32> = self
            .window
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_sent) > self.timeout)
            .map(|(seq, _)| *seq)
            .collect();

        let mut out = Vec::with_capacity(expired.len());
        for seq in expired {
            self.reno.on_timeout();
            self.stats.timeouts += 1;
            if let Some(entry) = self.window.get_mut(&seq) {
                entry.last_sent = now;
                self.stats.retransmissions += 1;
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += entry.encoded.len() as u64;
                out.push((seq, entry.encoded.clone()));
            }
        }
        out
    }

    /// Feed a received ACK. `ack_num` is cumulative: it names the highest
    /// in-order sequence the receiver has delivered.
    pub fn on_ack(&mut self, ack_num: u32) -> AckEffect {
        if ack_num + 1 > self.send_base {
            let new_send_base = ack_num + 1;
            self.window.retain(|&seq, _| seq > ack_num);
            self.send_base = new_send_base;
            self.reno.on_new_ack();
            self.stats.acks_received += 1;
            AckEffect::Advanced
        } else if ack_num + 1 == self.send_base {
            self.stats.duplicate_acks += 1;
            match self.reno.on_dup_ack() {
                DupAckOutcome::Counted => AckEffect::DuplicateCounted,
                DupAckOutcome::FastRetransmit => {
                    self.stats.fast_retransmits += 1;
                    self.fast_retransmit_target = Some(self.send_base);
                    AckEffect::FastRetransmit(self.send_base)
                }
            }
        } else {
            AckEffect::Stale
        }
    }

    /// Retrieve the encoded bytes for a fast-retransmit target, refreshing
    /// its send timestamp and counting one retransmission, if it is still
    /// in the window (it may already have been cumulatively ACKed).
    pub fn take_for_retransmit(&mut self, seq: u32, now: Instant) -> Option<Bytes> {
        let entry = self.window.get_mut(&seq)?;
        entry.last_sent = now;
        self.stats.retransmissions += 1;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += entry.encoded.len() as u64;
        Some(entry.encoded.clone())
    }
}
