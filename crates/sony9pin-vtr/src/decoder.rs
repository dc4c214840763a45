//! Streaming packet decoder.
//!
//! The 9-pin protocol has no start-of-frame marker, so packet boundaries are
//! recovered from the checksum alone. [`PacketDecoder`] accumulates inbound
//! bytes and, at the head of its buffer, tries candidate lengths from
//! shortest to longest, accepting the first whose trailing byte is the
//! checksum of the bytes before it.
//!
//! When no candidate length matches, the head byte is dropped only if the
//! buffer can no longer be the start of a valid packet: either it already
//! holds a full maximum-length window, or a checksum-valid candidate starts
//! at some later offset. Otherwise the decoder waits for more bytes, so
//! packets split across reads reassemble. Once the line has gone quiet the
//! owner calls [`PacketDecoder::drop_stale`], which drops unmatched head
//! bytes unconditionally so that leftover junk cannot swallow the next reply.
//!
//! A data sequence can occasionally produce a false checksum match at a
//! shorter length. That is inherent to the framing and is not corrected.

use bytes::{Buf, BytesMut};
use sony9pin_core::VtrEvent;
use tracing::trace;

use crate::packet::{
    decode_nak, decode_status, decode_timecode, packet_from_frame, verify_checksum, Packet,
    MAX_PACKET_LEN, MIN_PACKET_LEN,
};

/// Default search window: the longest standard packet.
pub const DEFAULT_MAX_PACKET_LEN: usize = MAX_PACKET_LEN;

/// Wider search window for vendor extensions that overflow the length
/// nibble.
pub const EXTENDED_MAX_PACKET_LEN: usize = 256;

/// `cmd1` of an ACK.
pub const ACK_CMD1: u8 = 0x10;
/// `cmd2` of an ACK.
pub const ACK_CMD2: u8 = 0x01;
/// `cmd1` of a NAK.
pub const NAK_CMD1: u8 = 0x10;
/// `cmd2` of a NAK.
pub const NAK_CMD2: u8 = 0x12;
/// `cmd1` of a device type reply.
pub const DEVICE_TYPE_CMD1: u8 = 0x12;
/// `cmd2` of a device type reply.
pub const DEVICE_TYPE_CMD2: u8 = 0x11;
/// `cmd2` of a status data reply (class `0x7_`).
pub const STATUS_DATA_CMD2: u8 = 0x20;

/// Sense return opcodes whose first four data bytes are a timecode.
pub const TIMECODE_RETURN_CMD2: &[u8] = &[0x04, 0x06, 0x08, 0x10, 0x11, 0x14, 0x16, 0x31];

/// Incremental decoder for the inbound byte stream.
#[derive(Debug)]
pub struct PacketDecoder {
    buf: BytesMut,
    max_packet_len: usize,
}

impl Default for PacketDecoder {
    fn default() -> Self {
        PacketDecoder::new(DEFAULT_MAX_PACKET_LEN)
    }
}

impl PacketDecoder {
    /// Create a decoder with the given search window. Values below the
    /// minimum packet length are raised to it.
    pub fn new(max_packet_len: usize) -> Self {
        PacketDecoder {
            buf: BytesMut::with_capacity(max_packet_len.max(64)),
            max_packet_len: max_packet_len.max(MIN_PACKET_LEN),
        }
    }

    /// The search window in bytes.
    pub fn max_packet_len(&self) -> usize {
        self.max_packet_len
    }

    /// Append inbound bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed as packets.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Extract the next packet from the buffer, if one is complete.
    ///
    /// Call repeatedly after each [`feed`](Self::feed) until it returns
    /// `None`.
    pub fn next_packet(&mut self) -> Option<Packet> {
        loop {
            if self.buf.len() < MIN_PACKET_LEN {
                return None;
            }

            if let Some(len) = self.match_at(0) {
                let packet = packet_from_frame(&self.buf[..len]);
                self.buf.advance(len);
                return Some(packet);
            }

            if self.buf.len() >= self.max_packet_len || self.later_candidate() {
                trace!(byte = self.buf[0], "dropping unsynchronized byte");
                self.buf.advance(1);
            } else {
                return None;
            }
        }
    }

    /// Drop head bytes one at a time until a checksum-valid packet starts
    /// the buffer or fewer than [`MIN_PACKET_LEN`] bytes remain.
    ///
    /// Call this when no bytes have arrived for a while: a fragment that
    /// has gone idle is not a packet still arriving. Returns the number of
    /// bytes dropped.
    pub fn drop_stale(&mut self) -> usize {
        let mut dropped = 0;
        while self.buf.len() >= MIN_PACKET_LEN && self.match_at(0).is_none() {
            self.buf.advance(1);
            dropped += 1;
        }
        if dropped > 0 {
            trace!(dropped, pending = self.buf.len(), "dropped stale bytes");
        }
        dropped
    }

    /// Extract and interpret the next packet.
    pub fn next_event(&mut self) -> Option<VtrEvent> {
        self.next_packet().map(|p| interpret(&p))
    }

    /// Append `bytes` and interpret every packet that is now complete.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<VtrEvent> {
        self.feed(bytes);
        std::iter::from_fn(|| self.next_event()).collect()
    }

    /// Shortest checksum-valid length starting at `offset`, if any.
    fn match_at(&self, offset: usize) -> Option<usize> {
        let avail = &self.buf[offset..];
        let max = self.max_packet_len.min(avail.len());
        (MIN_PACKET_LEN..=max).find(|&len| verify_checksum(&avail[..len]))
    }

    fn later_candidate(&self) -> bool {
        (1..=self.buf.len().saturating_sub(MIN_PACKET_LEN)).any(|off| self.match_at(off).is_some())
    }
}

/// Interpret a decoded packet as a [`VtrEvent`].
///
/// ACK, NAK and device type replies are matched on their exact `cmd1`;
/// sense returns on the class nibble alone. Packets that do not match a
/// known reply shape (including timecode returns with malformed BCD) come
/// back as [`VtrEvent::Raw`].
pub fn interpret(packet: &Packet) -> VtrEvent {
    let class = packet.class_nibble();
    let data = &packet.data;

    match (class, packet.cmd2) {
        (0x10, ACK_CMD2) if packet.cmd1 == ACK_CMD1 => return VtrEvent::Ack,
        (0x10, NAK_CMD2) if packet.cmd1 == NAK_CMD1 => {
            let mask = data.first().copied().unwrap_or(0);
            return VtrEvent::Nak(decode_nak(mask));
        }
        (0x10, DEVICE_TYPE_CMD2) if packet.cmd1 == DEVICE_TYPE_CMD1 && data.len() >= 2 => {
            return VtrEvent::DeviceType(u16::from_be_bytes([data[0], data[1]]));
        }
        (0x70, STATUS_DATA_CMD2) => return VtrEvent::Status(decode_status(data)),
        (0x70, cmd2) if TIMECODE_RETURN_CMD2.contains(&cmd2) && data.len() >= 4 => {
            let bytes = [data[0], data[1], data[2], data[3]];
            if let Ok(timecode) = decode_timecode(&bytes) {
                return VtrEvent::Timecode { cmd2, timecode };
            }
        }
        _ => {}
    }

    VtrEvent::Raw {
        cmd1: packet.cmd1,
        cmd2: packet.cmd2,
        data: data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::encode_packet;
    use sony9pin_core::{NakReasons, StatusFlags, Timecode};

    fn drain(decoder: &mut PacketDecoder) -> Vec<VtrEvent> {
        std::iter::from_fn(|| decoder.next_event()).collect()
    }

    // ---------------------------------------------------------------
    // Framing
    // ---------------------------------------------------------------

    #[test]
    fn decodes_single_ack() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0x10, 0x01, 0x11]);
        assert_eq!(drain(&mut dec), vec![VtrEvent::Ack]);
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn resyncs_after_leading_junk() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0xFF, 0xFF, 0x10, 0x01, 0x11]);
        assert_eq!(drain(&mut dec), vec![VtrEvent::Ack]);
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn decodes_back_to_back_packets() {
        let mut dec = PacketDecoder::default();
        let mut bytes = vec![0x10, 0x01, 0x11];
        bytes.extend_from_slice(&[0x12, 0x11, 0x20, 0x25, 0x68]);
        bytes.extend_from_slice(&[0x10, 0x01, 0x11]);
        assert_eq!(
            dec.decode(&bytes),
            vec![VtrEvent::Ack, VtrEvent::DeviceType(0x2025), VtrEvent::Ack]
        );
    }

    #[test]
    fn reassembles_fragmented_timecode_at_every_split() {
        let bytes = [0x74, 0x04, 0x12, 0x34, 0x56, 0x01, 0x15];
        for split in 1..bytes.len() {
            let mut dec = PacketDecoder::default();
            dec.feed(&bytes[..split]);
            assert!(dec.next_event().is_none(), "premature packet at split {split}");
            dec.feed(&bytes[split..]);
            let events = drain(&mut dec);
            assert_eq!(events.len(), 1, "split {split}");
            match &events[0] {
                VtrEvent::Timecode { cmd2, timecode } => {
                    assert_eq!(*cmd2, 0x04);
                    assert_eq!(
                        (timecode.hours, timecode.minutes, timecode.seconds, timecode.frames),
                        (1, 56, 34, 12)
                    );
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn reassembles_fragmented_status_at_every_split() {
        let bytes = [0x74, 0x20, 0x00, 0x01, 0x80, 0x00, 0x15];
        for split in 1..bytes.len() {
            let mut dec = PacketDecoder::default();
            dec.feed(&bytes[..split]);
            assert!(dec.next_event().is_none());
            dec.feed(&bytes[split..]);
            assert_eq!(
                drain(&mut dec),
                vec![VtrEvent::Status(StatusFlags::PLAY | StatusFlags::SERVO_LOCK)]
            );
        }
    }

    #[test]
    fn byte_at_a_time() {
        let mut dec = PacketDecoder::default();
        let mut events = Vec::new();
        for b in [0x12, 0x11, 0x20, 0x25, 0x68] {
            dec.feed(&[b]);
            events.extend(drain(&mut dec));
        }
        assert_eq!(events, vec![VtrEvent::DeviceType(0x2025)]);
    }

    #[test]
    fn short_junk_stays_buffered() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0x00, 0x01, 0x02]);
        assert!(dec.next_packet().is_none());
        assert_eq!(dec.pending(), 3);
    }

    #[test]
    fn stale_junk_no_longer_swallows_the_next_ack() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0x0E, 0x01, 0x01]);
        assert!(dec.next_packet().is_none());
        assert_eq!(dec.drop_stale(), 1);
        assert_eq!(dec.pending(), 2);

        assert_eq!(dec.decode(&[0x10, 0x01, 0x11]), vec![VtrEvent::Ack]);
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn drop_stale_keeps_a_complete_packet_at_the_head() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0x10, 0x01, 0x11]);
        assert_eq!(dec.drop_stale(), 0);
        assert_eq!(drain(&mut dec), vec![VtrEvent::Ack]);
    }

    #[test]
    fn drop_stale_stops_at_a_later_packet() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0xFF, 0xFE, 0x10, 0x01, 0x11]);
        assert_eq!(dec.drop_stale(), 2);
        assert_eq!(drain(&mut dec), vec![VtrEvent::Ack]);
    }

    #[test]
    fn long_junk_is_bounded_by_window() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0x55; 30]);
        assert!(dec.next_packet().is_none());
        assert_eq!(dec.pending(), DEFAULT_MAX_PACKET_LEN - 1);
    }

    #[test]
    fn clear_discards_buffer() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0x10, 0x01]);
        dec.clear();
        dec.feed(&[0x11]);
        assert!(dec.next_packet().is_none());
        assert_eq!(dec.pending(), 1);
    }

    #[test]
    fn extended_window_accepts_long_vendor_packets() {
        // 20 data bytes with the length nibble left at zero.
        let mut frame = vec![0xA0, 0x30];
        frame.extend(std::iter::repeat(0x05).take(20));
        let sum = crate::packet::checksum(&frame);
        frame.push(sum);

        let mut dec = PacketDecoder::new(EXTENDED_MAX_PACKET_LEN);
        dec.feed(&frame);
        let packet = dec.next_packet().unwrap();
        assert_eq!(packet.cmd1, 0xA0);
        assert_eq!(packet.data.len(), 20);
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn window_below_minimum_is_raised() {
        let dec = PacketDecoder::new(1);
        assert_eq!(dec.max_packet_len(), MIN_PACKET_LEN);
    }

    #[test]
    fn encoded_packets_decode() {
        let mut dec = PacketDecoder::default();
        for len in 0..=15usize {
            let data: Vec<u8> = (0..len as u8).collect();
            dec.feed(&encode_packet(0x20, 0x05, &data).unwrap());
        }
        let mut lens = Vec::new();
        while let Some(packet) = dec.next_packet() {
            assert_eq!(packet.class_nibble(), 0x20);
            lens.push(packet.data.len());
        }
        assert_eq!(lens, (0..=15).collect::<Vec<_>>());
        assert_eq!(dec.pending(), 0);
    }

    // ---------------------------------------------------------------
    // Interpretation
    // ---------------------------------------------------------------

    #[test]
    fn interprets_nak_with_zero_length_nibble() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0x10, 0x12, 0x04, 0x26]);
        assert_eq!(
            drain(&mut dec),
            vec![VtrEvent::Nak(NakReasons::CHECKSUM_ERROR)]
        );
    }

    #[test]
    fn nak_requires_exact_cmd1() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0x11, 0x12, 0x04, 0x27]);
        assert_eq!(
            drain(&mut dec),
            vec![VtrEvent::Raw {
                cmd1: 0x11,
                cmd2: 0x12,
                data: vec![0x04],
            }]
        );
    }

    #[test]
    fn nak_without_reason_byte_is_empty() {
        let packet = Packet {
            cmd1: 0x10,
            cmd2: 0x12,
            data: vec![],
        };
        assert_eq!(interpret(&packet), VtrEvent::Nak(NakReasons::empty()));
    }

    #[test]
    fn device_type_requires_exact_cmd1() {
        let mut dec = PacketDecoder::default();
        dec.feed(&[0x10, 0x11, 0x20, 0x25, 0x66]);
        assert_eq!(
            drain(&mut dec),
            vec![VtrEvent::Raw {
                cmd1: 0x10,
                cmd2: 0x11,
                data: vec![0x20, 0x25],
            }]
        );
    }

    #[test]
    fn ack_requires_exact_cmd1() {
        let packet = Packet {
            cmd1: 0x11,
            cmd2: 0x01,
            data: vec![0x00],
        };
        assert!(matches!(interpret(&packet), VtrEvent::Raw { .. }));
    }

    #[test]
    fn short_device_type_is_raw() {
        let packet = Packet {
            cmd1: 0x12,
            cmd2: 0x11,
            data: vec![0x20],
        };
        assert!(matches!(interpret(&packet), VtrEvent::Raw { .. }));
    }

    #[test]
    fn interprets_timecode_returns() {
        for &cmd2 in TIMECODE_RETURN_CMD2 {
            let packet = Packet {
                cmd1: 0x74,
                cmd2,
                data: vec![0x05, 0x03, 0x02, 0x01],
            };
            assert_eq!(
                interpret(&packet),
                VtrEvent::Timecode {
                    cmd2,
                    timecode: Timecode::new(1, 2, 3, 5),
                }
            );
        }
    }

    #[test]
    fn malformed_timecode_is_raw() {
        let packet = Packet {
            cmd1: 0x74,
            cmd2: 0x04,
            data: vec![0x05, 0x03, 0x02, 0xAA],
        };
        assert_eq!(
            interpret(&packet),
            VtrEvent::Raw {
                cmd1: 0x74,
                cmd2: 0x04,
                data: vec![0x05, 0x03, 0x02, 0xAA],
            }
        );
    }

    #[test]
    fn short_timecode_is_raw() {
        let packet = Packet {
            cmd1: 0x72,
            cmd2: 0x04,
            data: vec![0x05, 0x03],
        };
        assert!(matches!(interpret(&packet), VtrEvent::Raw { .. }));
    }

    #[test]
    fn vendor_packet_is_raw() {
        let packet = Packet {
            cmd1: 0x82,
            cmd2: 0x14,
            data: vec![0x01, 0x02],
        };
        assert_eq!(
            interpret(&packet),
            VtrEvent::Raw {
                cmd1: 0x82,
                cmd2: 0x14,
                data: vec![0x01, 0x02],
            }
        );
    }
}
