//! On-wire packet format: header layout, flags, and the integrity checksum.
//!
//! Fixed 20-byte header followed by up to [`crate::config::MAX_DATA_SIZE`]
//! bytes of payload. All multi-byte fields are little-endian. The last four
//! header bytes are reserved padding, always zero on the wire, kept so the
//! header lands on a 4-byte-aligned 20 bytes (the reference struct pads to
//! the same width).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::config::{HEADER_SIZE, MAX_DATA_SIZE};

/// SYN bit: connection establishment request / reply.
pub const FLAG_SYN: u16 = 0b001;
/// ACK bit: `ack_num` is valid and acknowledges data up to that sequence.
pub const FLAG_ACK: u16 = 0b010;
/// FIN bit: teardown request / reply.
pub const FLAG_FIN: u16 = 0b100;

/// Bitmask of [`FLAG_SYN`] / [`FLAG_ACK`] / [`FLAG_FIN`]. Combinable, as
/// used by the SYN-ACK and FIN-ACK control packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(pub u16);

impl Flags {
    pub const NONE: Flags = Flags(0);

    pub fn syn() -> Flags {
        Flags(FLAG_SYN)
    }
    pub fn syn_ack() -> Flags {
        Flags(FLAG_SYN | FLAG_ACK)
    }
    pub fn ack() -> Flags {
        Flags(FLAG_ACK)
    }
    pub fn fin() -> Flags {
        Flags(FLAG_FIN)
    }
    pub fn fin_ack() -> Flags {
        Flags(FLAG_FIN | FLAG_ACK)
    }

    pub fn has_syn(self) -> bool {
        self.0 & FLAG_SYN != 0
    }
    pub fn has_ack(self) -> bool {
        self.0 & FLAG_ACK != 0
    }
    pub fn has_fin(self) -> bool {
        self.0 & FLAG_FIN != 0
    }
}

/// Reasons [`Packet::decode`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("datagram shorter than the {HEADER_SIZE}-byte header")]
    Truncated,
    #[error("data_len {0} exceeds the payload actually present")]
    LengthMismatch(u16),
    #[error("data_len {0} exceeds MAX_DATA_SIZE ({MAX_DATA_SIZE})")]
    PayloadTooLarge(u16),
}

/// A decoded packet: header fields plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub seq_num: u32,
    pub ack_num: u32,
    pub flags: Flags,
    pub window_size: u16,
    pub payload: Bytes,
}

impl Packet {
    pub fn data(seq_num: u32, window_size: u16, payload: Bytes) -> Self {
        Packet {
            seq_num,
            ack_num: 0,
            flags: Flags::NONE,
            window_size,
            payload,
        }
    }

    pub fn control(seq_num: u32, ack_num: u32, flags: Flags, window_size: u16) -> Self {
        Packet {
            seq_num,
            ack_num,
            flags,
            window_size,
            payload: Bytes::new(),
        }
    }

    pub fn data_len(&self) -> u16 {
        self.payload.len() as u16
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize to wire bytes, computing and stamping the checksum.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_header(&mut buf, 0);
        buf.put_slice(&self.payload);

        let checksum = compute_checksum(&buf);
        // checksum field sits at byte offset 14..16 of the header.
        buf[14..16].copy_from_slice(&checksum.to_le_bytes());

        buf.freeze()
    }

    fn write_header(&self, buf: &mut BytesMut, checksum: u16) {
        buf.put_u32_le(self.seq_num);
        buf.put_u32_le(self.ack_num);
        buf.put_u16_le(self.flags.0);
        buf.put_u16_le(self.window_size);
        buf.put_u16_le(self.data_len());
        buf.put_u16_le(checksum);
        buf.put_u32_le(0); // reserved
    }

    /// Decode a received datagram. Does not itself verify the checksum —
    /// call [`verify`] on the result, since a malformed-but-parseable
    /// packet (bad checksum) must still be discardable without panicking.
    pub fn decode(mut raw: Bytes) -> Result<(Self, u16), DecodeError> {
        if raw.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated);
        }

        let seq_num = raw.get_u32_le();
        let ack_num = raw.get_u32_le();
        let flags = Flags(raw.get_u16_le());
        let window_size = raw.get_u16_le();
        let data_len = raw.get_u16_le();
        let checksum = raw.get_u16_le();
        let _reserved = raw.get_u32_le();

        if data_len as usize > MAX_DATA_SIZE {
            return Err(DecodeError::PayloadTooLarge(data_len));
        }
        if (data_len as usize) > raw.len() {
            return Err(DecodeError::LengthMismatch(data_len));
        }

        let payload = raw.slice(0..data_len as usize);

        Ok((
            Packet {
                seq_num,
                ack_num,
                flags,
                window_size,
                payload,
            },
            checksum,
        ))
    }

    /// Recompute the checksum over `self` and compare against `received`.
    pub fn verify(&self, received_checksum: u16) -> bool {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_header(&mut buf, 0);
        buf.put_slice(&self.payload);
        compute_checksum(&buf) == received_checksum
    }
}

/// 16-bit one's-complement internet checksum (RFC 1071-style) over
/// `region`, treated as a sequence of 16-bit little-endian words. The
/// caller is responsible for zeroing the checksum field before calling
/// this — it does not know which bytes are the checksum field.
pub fn compute_checksum(region: &[u8]) -> u16 {
    let mut acc: u32 = 0;
    let mut chunks = region.chunks_exact(2);

    for word in &mut chunks {
        acc += u16::from_le_bytes([word[0], word[1]]) as u32;
    }
    if let [last] = *chunks.remainder() {
        acc += u16::from_le_bytes([last, 0]) as u32;
    }

    while acc >> 16 != 0 {
        acc = (acc & 0xFFFF) + (acc >> 16);
    }

    !(acc as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data_packet() -> Packet {
        Packet::data(7, FLOW_CONTROL_WINDOW_SIZE_U16, Bytes::from_static(b"hello reliable transport"))
    }

    const FLOW_CONTROL_WINDOW_SIZE_U16: u16 = 64;

    #[test]
    fn header_roundtrip_data() {
        let p = sample_data_packet();
        let encoded = p.encode();
        assert_eq!(encoded.len(), HEADER_SIZE + p.payload.len());
        let (decoded, checksum) = Packet::decode(encoded).unwrap();
        assert_eq!(decoded, p);
        assert!(decoded.verify(checksum));
    }

    #[test]
    fn header_roundtrip_control_syn() {
        let p = Packet::control(0, 0, Flags::syn(), 64);
        let encoded = p.encode();
        assert_eq!(encoded.len(), HEADER_SIZE);
        let (decoded, checksum) = Packet::decode(encoded).unwrap();
        assert_eq!(decoded, p);
        assert!(decoded.verify(checksum));
    }

    #[test]
    fn header_roundtrip_control_synack() {
        let p = Packet::control(0, 1, Flags::syn_ack(), 64);
        let (decoded, checksum) = Packet::decode(p.encode()).unwrap();
        assert_eq!(decoded.flags, Flags::syn_ack());
        assert!(decoded.verify(checksum));
    }

    #[test]
    fn zero_length_payload_is_valid() {
        let p = Packet::data(3, 64, Bytes::new());
        let (decoded, checksum) = Packet::decode(p.encode()).unwrap();
        assert_eq!(decoded.data_len(), 0);
        assert!(decoded.verify(checksum));
    }

    #[test]
    fn max_size_payload_roundtrips() {
        let payload = Bytes::from(vec![0xAB; MAX_DATA_SIZE]);
        let p = Packet::data(1, 64, payload);
        let (decoded, checksum) = Packet::decode(p.encode()).unwrap();
        assert_eq!(decoded.data_len() as usize, MAX_DATA_SIZE);
        assert!(decoded.verify(checksum));
    }

    #[test]
    fn decode_rejects_truncated_header() {
        let raw = Bytes::from_static(&[0u8; HEADER_SIZE - 1]);
        assert_eq!(Packet::decode(raw).unwrap_err(), DecodeError::Truncated);
    }

    #[test]
    fn decode_rejects_data_len_past_payload_too_large() {
        let p = Packet::data(1, 64, Bytes::from_static(b"x"));
        let mut encoded = BytesMut::from(&p.encode()[..]);
        // Claim far more payload than MAX_DATA_SIZE allows.
        encoded[12..14].copy_from_slice(&(MAX_DATA_SIZE as u16 + 1).to_le_bytes());
        assert_eq!(
            Packet::decode(encoded.freeze()).unwrap_err(),
            DecodeError::PayloadTooLarge(MAX_DATA_SIZE as u16 + 1)
        );
    }

    #[test]
    fn decode_rejects_data_len_past_received_bytes() {
        let p = Packet::data(1, 64, Bytes::from_static(b"x"));
        let mut encoded = BytesMut::from(&p.encode()[..]);
        encoded[12..14].copy_from_slice(&200u16.to_le_bytes());
        assert_eq!(
            Packet::decode(encoded.freeze()).unwrap_err(),
            DecodeError::LengthMismatch(200)
        );
    }

    #[test]
    fn single_bit_flip_in_payload_is_detected() {
        let p = sample_data_packet();
        let mut encoded = BytesMut::from(&p.encode()[..]);
        let flip_at = HEADER_SIZE; // first payload byte
        encoded[flip_at] ^= 0x01;
        let (decoded, checksum) = Packet::decode(encoded.freeze()).unwrap();
        assert!(!decoded.verify(checksum));
    }

    #[test]
    fn single_bit_flip_in_header_is_detected() {
        let p = sample_data_packet();
        let mut encoded = BytesMut::from(&p.encode()[..]);
        encoded[0] ^= 0x01; // seq_num low byte
        let (decoded, checksum) = Packet::decode(encoded.freeze()).unwrap();
        assert!(!decoded.verify(checksum));
    }

    #[test]
    fn checksum_of_all_zero_region_is_all_ones() {
        let region = [0u8; HEADER_SIZE];
        assert_eq!(compute_checksum(&region), 0xFFFF);
    }

    #[test]
    fn checksum_handles_odd_length_region() {
        let region = [0x01u8, 0x02, 0x03];
        // Should not panic, and folding an odd trailing byte must match a
        // manual computation: words (0x0201) + (0x0003) = 0x0204, ones'
        // complement = 0xFDFB.
        assert_eq!(compute_checksum(&region), 0xFDFB);
    }

    #[test]
    fn flags_combine_and_query() {
        let f = Flags::fin_ack();
        assert!(f.has_fin());
        assert!(f.has_ack());
        assert!(!f.has_syn());
    }

    proptest::proptest! {
        #[test]
        fn data_packet_roundtrips_for_any_payload(
            seq in 0u32..=u32::MAX,
            payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..=MAX_DATA_SIZE),
        ) {
            let p = Packet::data(seq, 64, Bytes::from(payload));
            let (decoded, checksum) = Packet::decode(p.encode()).unwrap();
            prop_assert_eq!(&decoded, &p);
            prop_assert!(decoded.verify(checksum));
        }

        #[test]
        fn single_byte_corruption_is_detected(
            seq in 0u32..=u32::MAX,
            payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..=MAX_DATA_SIZE),
            flip_index in 0usize..(HEADER_SIZE - 2),
            flip_bit in 0u8..8,
        ) {
            let p = Packet::data(seq, 64, Bytes::from(payload));
            let mut encoded = BytesMut::from(&p.encode()[..]);
            // Skip the checksum field itself (offset 14..16): flipping it
            // is not a detection failure, it's a different valid checksum.
            let offset = if flip_index >= 14 { flip_index + 2 } else { flip_index };
            encoded[offset] ^= 1 << flip_bit;
            let (decoded, checksum) = Packet::decode(encoded.freeze()).unwrap();
            prop_assert!(!decoded.verify(checksum));
        }
    }
}
