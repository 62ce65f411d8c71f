//! Networking glue: binds the pure [`crate::window::SenderState`] /
//! [`crate::receiver::Receiver`] cores to real `UdpSocket`s and runs the
//! two-thread sender concurrency model from the design (main loop +
//! `AckReceiverTask`), plus the single-threaded receiver loop.

use std::io::Write;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::{Config, MAX_BUFFER_SIZE, MAX_DATA_SIZE};
use crate::error::SquallError;
use crate::handshake;
use crate::receiver::{DeliveryOutcome, Receiver};
use crate::stats::{ReceiverStats, TransferStats};
use crate::wire::{Flags, Packet};
use crate::window::SenderState;

/// How long the main loop and the ACK task each block on a single
/// `recv`/wait before checking shutdown state again.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A connection on the sender side: a socket connected to one peer plus
/// the shared `Mutex<SenderState>` + `Condvar` aggregate the main loop and
/// the `AckReceiverTask` both operate on.
pub struct ConnectedChannel {
    socket: Arc<UdpSocket>,
    config: Config,
    state: Arc<Mutex<SenderState>>,
    condvar: Arc<Condvar>,
}

impl ConnectedChannel {
    /// Perform the three-way handshake and return an established channel.
    pub fn connect(peer: SocketAddr, config: Config) -> Result<Self, SquallError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(peer)?;
        handshake::client_connect(&socket, &config)?;
        info!(%peer, "connection established");

        Ok(ConnectedChannel {
            socket: Arc::new(socket),
            state: Arc::new(Mutex::new(SenderState::new(&config))),
            condvar: Arc::new(Condvar::new()),
            config,
        })
    }

    /// Drive `data` across the connection to completion: partitions it
    /// into data packets, runs the sliding-window main loop concurrently
    /// with the ACK receiver task, and tears the connection down with FIN.
    pub fn send_bytes(&self, data: &[u8]) -> Result<TransferStats, SquallError> {
        let start = Instant::now();
        let stop = Arc::new(AtomicBool::new(false));

        let ack_thread = {
            let socket = self.socket.clone();
            let state = self.state.clone();
            let condvar = self.condvar.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("squall-ack-task".into())
                .spawn(move || ack_receiver_task(socket, state, condvar, stop))?
        };

        let mut cursor = 0usize;
        loop {
            let now = Instant::now();
            let to_send = self.step(data, &mut cursor, now);

            for packet_bytes in &to_send {
                self.socket.send(packet_bytes)?;
            }

            let (input_exhausted, window_empty) = {
                let state = self.state.lock().unwrap();
                (cursor >= data.len(), state.is_empty())
            };
            if input_exhausted && window_empty {
                break;
            }

            let state = self.state.lock().unwrap();
            let _ = self
                .condvar
                .wait_timeout(state, POLL_INTERVAL)
                .unwrap();
        }

        stop.store(true, Ordering::SeqCst);
        handshake::client_teardown(&self.socket, &self.config, {
            let state = self.state.lock().unwrap();
            state.next_seq()
        })?;
        ack_thread.join().expect("ack task panicked");

        let stats = self.state.lock().unwrap().stats.clone();
        info!(?stats, "transfer complete");
        Ok(TransferStats::for_sender(stats, start.elapsed()))
    }

    /// One iteration of the main step (spec §4.4): drain the fast-retransmit
    /// signal, else scan for timeouts, else admit new data. Returns the raw
    /// bytes to send, computed while holding the lock but sent by the
    /// caller after it is released.
    fn step(&self, data: &[u8], cursor: &mut usize, now: Instant) -> Vec<Bytes> {
        let mut state = self.state.lock().unwrap();

        if let Some(seq) = state.take_fast_retransmit_target() {
            if let Some(bytes) = state.take_for_retransmit(seq, now) {
                debug!(seq, "fast retransmit");
                return vec![bytes];
            }
            return Vec::new();
        }

        let timed_out = state.scan_timeouts(now);
        if !timed_out.is_empty() {
            for (seq, _) in &timed_out {
                debug!(seq, "timeout retransmit");
            }
            return timed_out.into_iter().map(|(_, bytes)| bytes).collect();
        }

        let mut admitted = Vec::new();
        while state.admissible() > 0 && *cursor < data.len() {
            let end = (*cursor + MAX_DATA_SIZE).min(data.len());
            let chunk = Bytes::copy_from_slice(&data[*cursor..end]);
            let seq = state.next_seq();
            let packet = Packet::data(seq, self.config.flow_control_window_size as u16, chunk);
            let encoded = packet.encode();
            state.insert(seq, encoded.clone(), now);
            admitted.push(encoded);
            *cursor = end;
        }
        admitted
    }
}

/// Runs on its own thread for the lifetime of [`ConnectedChannel::send_bytes`].
/// Reads ACKs off the socket and feeds them to the shared aggregate under
/// lock, notifying the main loop's condvar on every update so a fast
/// retransmit signal is acted on promptly instead of waiting out the full
/// poll interval.
fn ack_receiver_task(
    socket: Arc<UdpSocket>,
    state: Arc<Mutex<SenderState>>,
    condvar: Arc<Condvar>,
    stop: Arc<AtomicBool>,
) {
    if let Err(e) = socket.set_read_timeout(Some(POLL_INTERVAL)) {
        warn!(error = %e, "failed to set ack task read timeout");
        return;
    }
    let mut buf = [0u8; MAX_BUFFER_SIZE];

    loop {
        match socket.recv(&mut buf) {
            Ok(n) => {
                if let Ok((packet, checksum)) = Packet::decode(Bytes::copy_from_slice(&buf[..n])) {
                    if packet.verify(checksum)
                        && packet.flags.has_ack()
                        && !packet.flags.has_fin()
                        && !packet.flags.has_syn()
                    {
                        // A retransmitted SYN-ACK (from the bounded handshake
                        // retry) can still arrive after the data phase starts
                        // if the final handshake ACK was lost; it also carries
                        // ACK and must not be mistaken for a data-phase ACK.
                        let mut state = state.lock().unwrap();
                        state.on_ack(packet.ack_num);
                        condvar.notify_all();
                    }
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                warn!(error = %e, "ack task recv failed");
            }
        }

        if stop.load(Ordering::SeqCst) {
            let state = state.lock().unwrap();
            if state.is_empty() {
                break;
            }
        }
    }
}

/// A single-threaded receiver: one bound socket, one connection.
pub struct ReceiverChannel {
    socket: UdpSocket,
    config: Config,
}

impl ReceiverChannel {
    /// Wait for (and complete) the server side of the three-way handshake
    /// on an already-bound socket.
    pub fn accept(socket: UdpSocket, config: Config) -> Result<Self, SquallError> {
        let peer = handshake::server_accept(&socket, &config)?;
        info!(%peer, "peer connected");
        Ok(ReceiverChannel { socket, config })
    }

    /// Receive the data phase to completion, writing contiguous bytes to
    /// `sink` as they become deliverable, until FIN is received and
    /// acknowledged.
    pub fn receive_to(&self, mut sink: impl Write) -> Result<TransferStats, SquallError> {
        let start = Instant::now();
        let mut receiver = Receiver::new(self.config.flow_control_window_size);
        let mut stats = ReceiverStats::default();
        let mut buf = [0u8; MAX_BUFFER_SIZE];

        self.socket.set_read_timeout(None)?;

        loop {
            let n = self.socket.recv(&mut buf)?;
            let Ok((packet, checksum)) = Packet::decode(Bytes::copy_from_slice(&buf[..n])) else {
                continue;
            };
            if !packet.verify(checksum) {
                continue;
            }

            if packet.flags.has_fin() {
                handshake::server_reply_fin(&self.socket, &self.config, &packet)?;
                break;
            }

            stats.packets_received += 1;
            match receiver.ingest(&packet) {
                DeliveryOutcome::Delivered(chunks) => {
                    for chunk in &chunks {
                        sink.write_all(chunk)?;
                        stats.bytes_delivered += chunk.len() as u64;
                    }
                }
                DeliveryOutcome::Buffered => stats.out_of_order_packets += 1,
                DeliveryOutcome::Discarded => stats.duplicate_packets += 1,
            }

            let ack = Packet::control(
                0,
                receiver.ack_num(),
                Flags::ack(),
                self.config.flow_control_window_size as u16,
            );
            self.socket.send(&ack.encode())?;
        }

        info!(?stats, "transfer complete");
        Ok(TransferStats::for_receiver(stats, start.elapsed()))
    }
}
