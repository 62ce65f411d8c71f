//! End-of-transfer statistics, returned to the caller on completion and
//! suitable for JSON export from the CLI binaries.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub acks_received: u64,
    pub duplicate_acks: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    pub fast_retransmits: u64,
}

impl SenderStats {
    /// Retransmissions as a fraction of packets sent.
    pub fn loss_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.retransmissions as f64 / self.packets_sent as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiverStats {
    pub packets_received: u64,
    pub bytes_delivered: u64,
    pub duplicate_packets: u64,
    pub out_of_order_packets: u64,
}

/// Stats attached to the outcome of a single `send_bytes` / `receive_to`
/// call, serializable for the `--stats-json` CLI flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStats {
    #[serde(flatten)]
    pub sender: Option<SenderStats>,
    #[serde(flatten)]
    pub receiver: Option<ReceiverStats>,
    pub elapsed_ms: u64,
}

impl TransferStats {
    pub fn for_sender(stats: SenderStats, elapsed: Duration) -> Self {
        TransferStats {
            sender: Some(stats),
            receiver: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn for_receiver(stats: ReceiverStats, elapsed: Duration) -> Self {
        TransferStats {
            sender: None,
            receiver: Some(stats),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_loss_rate_zero_div_is_zero() {
        assert_eq!(SenderStats::default().loss_rate(), 0.0);
    }

    #[test]
    fn sender_loss_rate_computes_ratio() {
        let stats = SenderStats {
            packets_sent: 100,
            retransmissions: 5,
            ..Default::default()
        };
        assert!((stats.loss_rate() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn transfer_stats_json_roundtrips_for_sender() {
        let stats = TransferStats::for_sender(
            SenderStats {
                packets_sent: 10,
                ..Default::default()
            },
            Duration::from_millis(250),
        );
        let json = serde_json::to_string(&stats).unwrap();
        let back: TransferStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sender.unwrap().packets_sent, 10);
        assert_eq!(back.elapsed_ms, 250);
    }
}
