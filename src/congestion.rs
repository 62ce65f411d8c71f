//! TCP Reno congestion control.
//!
//! ```text
//!      new ACK, cwnd < ssthresh          new ACK, cwnd >= ssthresh
//!   ┌───────────────┐  ───────────────▶  ┌──────────────────────┐
//!   │   SLOW_START   │                   │ CONGESTION_AVOIDANCE │
//!   └───────┬────────┘                   └──────────┬───────────┘
//!           │ 3 dup ACKs                             │ 3 dup ACKs
//!           ▼                                         ▼
//!                    ┌───────────────────┐
//!                    │   FAST_RECOVERY    │
//!                    └─────────┬──────────┘
//!                              │ new ACK ≥ send_base
//!                              ▼
//!                    back to CONGESTION_AVOIDANCE
//! ```
//!
//! Timeout always resets to `SLOW_START` with `cwnd = 1`, regardless of the
//! state it fired from.

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenoState {
    SlowStart,
    CongestionAvoidance,
    FastRecovery,
}

/// Result of feeding a duplicate ACK into the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupAckOutcome {
    /// Nothing to do yet (fewer than 3 duplicates, or already recovering).
    Counted,
    /// The third duplicate ACK arrived: enter fast recovery and retransmit
    /// `send_base` now.
    FastRetransmit,
}

#[derive(Debug, Clone)]
pub struct RenoController {
    cwnd: f64,
    ssthresh: u32,
    state: RenoState,
    dup_ack_count: u32,
    flow_control_window_size: usize,
}

impl RenoController {
    pub fn new(config: &Config) -> Self {
        RenoController {
            cwnd: config.initial_cwnd,
            ssthresh: config.initial_ssthresh,
            state: RenoState::SlowStart,
            dup_ack_count: 0,
            flow_control_window_size: config.flow_control_window_size,
        }
    }

    pub fn cwnd(&self) -> f64 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    pub fn state(&self) -> RenoState {
        self.state
    }

    pub fn dup_ack_count(&self) -> u32 {
        self.dup_ack_count
    }

    /// Cap on simultaneously in-flight packets: `min(flow_control_window_size, floor(cwnd))`.
    pub fn effective_window(&self) -> usize {
        self.flow_control_window_size.min(self.cwnd.floor() as usize)
    }

    /// A new cumulative ACK advanced `send_base`. Call after the window has
    /// had every entry with key `<= ack_num` removed.
    pub fn on_new_ack(&mut self) {
        self.dup_ack_count = 0;
        match self.state {
            RenoState::FastRecovery => {
                self.state = RenoState::CongestionAvoidance;
                self.cwnd = self.ssthresh as f64;
            }
            RenoState::SlowStart => {
                self.cwnd += 1.0;
                if self.cwnd >= self.ssthresh as f64 {
                    self.state = RenoState::CongestionAvoidance;
                }
            }
            RenoState::CongestionAvoidance => {
                self.cwnd += 1.0 / self.cwnd;
            }
        }
    }

    /// A duplicate cumulative ACK arrived (`ack_num < send_base`).
    pub fn on_dup_ack(&mut self) -> DupAckOutcome {
        if self.state == RenoState::FastRecovery {
            self.cwnd += 1.0;
            return DupAckOutcome::Counted;
        }

        self.dup_ack_count += 1;
        if self.dup_ack_count == 3 {
            self.state = RenoState::FastRecovery;
            self.ssthresh = (self.cwnd / 2.0).max(2.0) as u32;
            self.cwnd = self.ssthresh as f64 + 3.0;
            DupAckOutcome::FastRetransmit
        } else {
            DupAckOutcome::Counted
        }
    }

    /// A packet in the window timed out without being acknowledged.
    pub fn on_timeout(&mut self) {
        self.ssthresh = (self.cwnd / 2.0).max(2.0) as u32;
        self.cwnd = 1.0;
        self.state = RenoState::SlowStart;
        self.dup_ack_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RenoController {
        RenoController::new(&Config::default())
    }

    #[test]
    fn starts_in_slow_start_with_defaults() {
        let c = controller();
        assert_eq!(c.cwnd(), 1.0);
        assert_eq!(c.ssthresh(), 16);
        assert_eq!(c.state(), RenoState::SlowStart);
        assert_eq!(c.dup_ack_count(), 0);
    }

    #[test]
    fn slow_start_doubles_per_ack_until_ssthresh() {
        let mut c = controller();
        for expected in 2..=16 {
            c.on_new_ack();
            assert_eq!(c.cwnd() as u32, expected);
        }
        assert_eq!(c.state(), RenoState::CongestionAvoidance);
    }

    #[test]
    fn congestion_avoidance_increments_by_one_over_cwnd() {
        let mut c = controller();
        // Drive into congestion avoidance.
        for _ in 0..20 {
            c.on_new_ack();
        }
        assert_eq!(c.state(), RenoState::CongestionAvoidance);
        let before = c.cwnd();
        c.on_new_ack();
        assert!((c.cwnd() - (before + 1.0 / before)).abs() < 1e-9);
    }

    #[test]
    fn three_duplicate_acks_trigger_fast_retransmit() {
        let mut c = controller();
        c.on_new_ack(); // cwnd = 2
        c.on_new_ack(); // cwnd = 3
        assert_eq!(c.on_dup_ack(), DupAckOutcome::Counted);
        assert_eq!(c.on_dup_ack(), DupAckOutcome::Counted);
        assert_eq!(c.on_dup_ack(), DupAckOutcome::FastRetransmit);
        assert_eq!(c.state(), RenoState::FastRecovery);
        assert_eq!(c.ssthresh(), 2); // max(2, 3/2=1.5 -> 1) clamped to 2
        assert_eq!(c.cwnd(), 5.0); // ssthresh + 3
    }

    #[test]
    fn fast_recovery_inflates_cwnd_on_further_dup_acks() {
        let mut c = controller();
        c.on_new_ack();
        c.on_new_ack();
        c.on_dup_ack();
        c.on_dup_ack();
        c.on_dup_ack();
        let cwnd_after_entry = c.cwnd();
        c.on_dup_ack();
        assert_eq!(c.cwnd(), cwnd_after_entry + 1.0);
    }

    #[test]
    fn new_ack_exits_fast_recovery_to_congestion_avoidance() {
        let mut c = controller();
        c.on_new_ack();
        c.on_new_ack();
        c.on_dup_ack();
        c.on_dup_ack();
        c.on_dup_ack();
        let ssthresh = c.ssthresh();
        c.on_new_ack();
        assert_eq!(c.state(), RenoState::CongestionAvoidance);
        assert_eq!(c.cwnd(), ssthresh as f64);
        assert_eq!(c.dup_ack_count(), 0);
    }

    #[test]
    fn timeout_resets_to_slow_start() {
        let mut c = controller();
        for _ in 0..20 {
            c.on_new_ack();
        }
        assert_eq!(c.state(), RenoState::CongestionAvoidance);
        c.on_timeout();
        assert_eq!(c.state(), RenoState::SlowStart);
        assert_eq!(c.cwnd(), 1.0);
        assert_eq!(c.dup_ack_count(), 0);
    }

    #[test]
    fn ssthresh_never_drops_below_two() {
        let mut c = controller();
        // cwnd stays at 1.0 so ssthresh would compute to 0 without the clamp.
        c.on_timeout();
        assert!(c.ssthresh() >= 2);
    }

    #[test]
    fn effective_window_caps_at_flow_control_window_size() {
        let mut c = controller();
        for _ in 0..200 {
            c.on_new_ack();
        }
        assert_eq!(c.effective_window(), Config::default().flow_control_window_size);
    }

    #[test]
    fn effective_window_honors_configured_override() {
        let config = Config {
            flow_control_window_size: 8,
            ..Config::default()
        };
        let mut c = RenoController::new(&config);
        for _ in 0..200 {
            c.on_new_ack();
        }
        assert_eq!(c.effective_window(), 8);
    }

    #[test]
    fn effective_window_never_below_one_while_cwnd_at_least_one() {
        let c = controller();
        assert_eq!(c.effective_window(), 1);
    }
}
