//! 9-pin packet encoder/decoder.
//!
//! This module handles the pure byte-level side of the protocol: packet
//! framing and checksums, BCD timecode conversion, and the bit tables for
//! NAK reasons and status data.
//!
//! # Packet format
//!
//! ```text
//! <cmd1|len> <cmd2> [<data>...] <checksum>
//! ```
//!
//! - `cmd1|len`: command class in the high nibble, data length (0-15) in
//!   the low nibble
//! - `cmd2`: opcode within the class
//! - `data`: 0 to 15 payload bytes
//! - `checksum`: sum of all preceding bytes, modulo 256
//!
//! There is no start-of-frame marker; see [`crate::decoder`] for how packet
//! boundaries are recovered from a byte stream.

use bytes::{BufMut, BytesMut};
use sony9pin_core::{Error, NakReasons, Result, StatusFlags, Timecode};

/// Maximum number of data bytes a packet can carry (the length nibble).
pub const MAX_DATA_LEN: usize = 15;

/// Shortest well-formed packet: header, cmd2, checksum.
pub const MIN_PACKET_LEN: usize = 3;

/// Longest packet that can be expressed with a 4-bit length nibble.
pub const MAX_PACKET_LEN: usize = MIN_PACKET_LEN + MAX_DATA_LEN;

/// Drop-frame flag in the frames byte of a timecode.
pub const TC_DROP_FRAME_BIT: u8 = 0x40;

/// Color-frame flag in the frames byte of a timecode.
pub const TC_COLOR_FRAME_BIT: u8 = 0x10;

/// Mask selecting the frames value proper from the frames byte.
pub const TC_FRAMES_MASK: u8 = 0x3F;

/// Command class, taken from the high nibble of `cmd1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandClass {
    /// `0x0_` host to device.
    SystemControl = 0x00,
    /// `0x1_` device to host (ACK, NAK, device type).
    SystemControlReturn = 0x10,
    /// `0x2_` host to device.
    TransportControl = 0x20,
    /// `0x4_` host to device.
    PresetSelectControl = 0x40,
    /// `0x6_` host to device.
    SenseRequest = 0x60,
    /// `0x7_` device to host.
    SenseReturn = 0x70,
}

impl CommandClass {
    /// Classify a `cmd1` byte. Returns `None` for classes outside the
    /// standard set (vendor extensions use `0x8_`-`0xB_`).
    pub fn from_cmd1(cmd1: u8) -> Option<Self> {
        match cmd1 & 0xF0 {
            0x00 => Some(CommandClass::SystemControl),
            0x10 => Some(CommandClass::SystemControlReturn),
            0x20 => Some(CommandClass::TransportControl),
            0x40 => Some(CommandClass::PresetSelectControl),
            0x60 => Some(CommandClass::SenseRequest),
            0x70 => Some(CommandClass::SenseReturn),
            _ => None,
        }
    }

    /// The class nibble as a `cmd1` byte with a zero length nibble.
    pub fn cmd1(self) -> u8 {
        self as u8
    }
}

/// A parsed 9-pin packet.
///
/// `cmd1` is kept exactly as it appeared on the wire, length nibble
/// included. Devices do not always fill in the length nibble, so the
/// payload length is `data.len()`, not `cmd1 & 0x0F`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Header byte: class nibble plus length nibble.
    pub cmd1: u8,
    /// Opcode within the class.
    pub cmd2: u8,
    /// Payload bytes (may be empty).
    pub data: Vec<u8>,
}

impl Packet {
    /// The class nibble of `cmd1` (`cmd1 & 0xF0`).
    pub fn class_nibble(&self) -> u8 {
        self.cmd1 & 0xF0
    }

    /// The command class, if it is one of the standard classes.
    pub fn class(&self) -> Option<CommandClass> {
        CommandClass::from_cmd1(self.cmd1)
    }

    /// Re-encode this packet. The header's length nibble is recomputed from
    /// `data`, so a packet decoded with a stale nibble encodes canonically.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_packet(self.cmd1, self.cmd2, &self.data)
    }
}

/// Compute the 8-bit checksum (sum modulo 256) of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Returns `true` if the last byte of `packet` is the checksum of the
/// bytes before it.
pub fn verify_checksum(packet: &[u8]) -> bool {
    match packet.split_last() {
        Some((&last, body)) => checksum(body) == last,
        None => false,
    }
}

/// Encode a packet into raw bytes ready for transmission.
///
/// Only the high nibble of `cmd1` is used; the low nibble is replaced by the
/// data length.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `data` is longer than
/// [`MAX_DATA_LEN`] bytes.
///
/// # Example
///
/// ```
/// use sony9pin_vtr::packet::encode_packet;
///
/// // PLAY
/// let bytes = encode_packet(0x20, 0x01, &[]).unwrap();
/// assert_eq!(bytes, vec![0x20, 0x01, 0x21]);
/// ```
pub fn encode_packet(cmd1: u8, cmd2: u8, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_DATA_LEN {
        return Err(Error::InvalidParameter(format!(
            "packet data length {} exceeds {MAX_DATA_LEN} bytes",
            data.len()
        )));
    }
    Ok(build_packet(cmd1, cmd2, data))
}

/// Encode a packet whose data length is known to fit the length nibble.
pub(crate) fn build_packet(cmd1: u8, cmd2: u8, data: &[u8]) -> Vec<u8> {
    debug_assert!(data.len() <= MAX_DATA_LEN);
    let mut buf = BytesMut::with_capacity(MIN_PACKET_LEN + data.len());
    buf.put_u8((cmd1 & 0xF0) | (data.len() as u8 & 0x0F));
    buf.put_u8(cmd2);
    buf.put_slice(data);
    let sum = checksum(&buf);
    buf.put_u8(sum);
    buf.to_vec()
}

/// Decode a single complete packet.
///
/// `bytes` must hold exactly one packet: between [`MIN_PACKET_LEN`] and
/// [`MAX_PACKET_LEN`] bytes with a valid trailing checksum.
///
/// # Example
///
/// ```
/// use sony9pin_vtr::packet::decode_packet;
///
/// let packet = decode_packet(&[0x10, 0x12, 0x04, 0x26]).unwrap();
/// assert_eq!(packet.cmd2, 0x12);
/// assert_eq!(packet.data, vec![0x04]);
/// ```
pub fn decode_packet(bytes: &[u8]) -> Result<Packet> {
    if !(MIN_PACKET_LEN..=MAX_PACKET_LEN).contains(&bytes.len()) {
        return Err(Error::Protocol(format!(
            "packet length {} outside {MIN_PACKET_LEN}..={MAX_PACKET_LEN}",
            bytes.len()
        )));
    }
    if !verify_checksum(bytes) {
        return Err(Error::Protocol(format!(
            "checksum mismatch in packet {bytes:02X?}"
        )));
    }
    Ok(packet_from_frame(bytes))
}

/// Split a checksum-valid frame into a [`Packet`]. The caller has already
/// checked length and checksum.
pub(crate) fn packet_from_frame(frame: &[u8]) -> Packet {
    Packet {
        cmd1: frame[0],
        cmd2: frame[1],
        data: frame[2..frame.len() - 1].to_vec(),
    }
}

/// Pack a decimal value into one BCD byte, clamping to 0-99.
pub fn to_bcd(value: u8) -> u8 {
    let v = value.min(99);
    ((v / 10) << 4) | (v % 10)
}

/// Unpack one BCD byte into its decimal value, `tens * 10 + ones`.
///
/// Nibbles are not range-checked on their own, so `0x1A` reads as 20.
/// Returns [`Error::Protocol`] if the value is above 99.
pub fn from_bcd(byte: u8) -> Result<u8> {
    let value = (byte >> 4) * 10 + (byte & 0x0F);
    if value > 99 {
        return Err(Error::Protocol(format!("invalid BCD byte 0x{byte:02X}")));
    }
    Ok(value)
}

/// Encode a timecode as 4 BCD bytes in wire order `[ff, ss, mm, hh]`.
///
/// Fields above 99 are clamped rather than rejected. The drop-frame and
/// color-frame flags are OR-ed into the frames byte.
pub fn encode_timecode(tc: &Timecode) -> [u8; 4] {
    let mut frames = to_bcd(tc.frames);
    if tc.drop_frame {
        frames |= TC_DROP_FRAME_BIT;
    }
    if tc.color_frame {
        frames |= TC_COLOR_FRAME_BIT;
    }
    [
        frames,
        to_bcd(tc.seconds),
        to_bcd(tc.minutes),
        to_bcd(tc.hours),
    ]
}

/// Decode 4 BCD bytes in wire order `[ff, ss, mm, hh]` into a timecode.
///
/// # Example
///
/// ```
/// use sony9pin_vtr::packet::decode_timecode;
///
/// let tc = decode_timecode(&[0x05, 0x03, 0x02, 0x01]).unwrap();
/// assert_eq!(tc.to_string(), "01:02:03:05");
/// ```
pub fn decode_timecode(bytes: &[u8; 4]) -> Result<Timecode> {
    let [ff, ss, mm, hh] = *bytes;
    Ok(Timecode {
        hours: from_bcd(hh)?,
        minutes: from_bcd(mm)?,
        seconds: from_bcd(ss)?,
        frames: from_bcd(ff & TC_FRAMES_MASK)?,
        drop_frame: ff & TC_DROP_FRAME_BIT != 0,
        color_frame: ff & TC_COLOR_FRAME_BIT != 0,
    })
}

/// Decode the reason byte of a NAK. Undefined bits are ignored.
pub fn decode_nak(mask: u8) -> NakReasons {
    NakReasons::from_bits_truncate(mask)
}

/// Status data bit table: (status byte index, bit mask, flag).
const STATUS_BITS: &[(usize, u8, StatusFlags)] = &[
    (0, 0x20, StatusFlags::CASSETTE_OUT),
    (0, 0x10, StatusFlags::SERVO_REF_MISSING),
    (0, 0x01, StatusFlags::LOCAL),
    (1, 0x80, StatusFlags::STANDBY),
    (1, 0x20, StatusFlags::STOP),
    (1, 0x10, StatusFlags::EJECT),
    (1, 0x08, StatusFlags::REWIND),
    (1, 0x04, StatusFlags::FORWARD),
    (1, 0x02, StatusFlags::RECORD),
    (1, 0x01, StatusFlags::PLAY),
    (2, 0x80, StatusFlags::SERVO_LOCK),
    (2, 0x20, StatusFlags::SHUTTLE),
    (2, 0x10, StatusFlags::JOG),
    (2, 0x08, StatusFlags::VAR),
    (2, 0x04, StatusFlags::REVERSE),
    (2, 0x02, StatusFlags::STILL),
    (2, 0x01, StatusFlags::CUE_UP),
    (3, 0x80, StatusFlags::AUTO_MODE),
    (3, 0x40, StatusFlags::FREEZE_ON),
    (3, 0x08, StatusFlags::AUDIO_OUT_SET),
    (3, 0x04, StatusFlags::AUDIO_IN_SET),
    (3, 0x02, StatusFlags::OUT_SET),
    (3, 0x01, StatusFlags::IN_SET),
    (4, 0x80, StatusFlags::SELECT_EE),
    (4, 0x40, StatusFlags::FULL_EE),
    (4, 0x10, StatusFlags::EDIT_SET),
    (4, 0x08, StatusFlags::REVIEW_SET),
    (4, 0x04, StatusFlags::AUTO_EDIT_SET),
];

/// Decode status data bytes into a flag set.
///
/// Only the first five bytes carry known flags; missing bytes read as zero
/// and bits outside the table are ignored.
pub fn decode_status(data: &[u8]) -> StatusFlags {
    STATUS_BITS
        .iter()
        .filter(|(idx, mask, _)| data.get(*idx).is_some_and(|b| b & mask != 0))
        .fold(StatusFlags::empty(), |acc, (_, _, flag)| acc | *flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Packet encoding
    // ---------------------------------------------------------------

    #[test]
    fn encode_play() {
        assert_eq!(encode_packet(0x20, 0x01, &[]).unwrap(), vec![0x20, 0x01, 0x21]);
    }

    #[test]
    fn encode_sets_length_nibble() {
        // Status sense, page 0 size 10: 61 20 0A 8B
        let bytes = encode_packet(0x60, 0x20, &[0x0A]).unwrap();
        assert_eq!(bytes, vec![0x61, 0x20, 0x0A, 0x8B]);
    }

    #[test]
    fn encode_ignores_low_nibble_of_cmd1() {
        let a = encode_packet(0xA7, 0x02, &[0x01, 0x02]).unwrap();
        let b = encode_packet(0xA0, 0x02, &[0x01, 0x02]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0], 0xA2);
    }

    #[test]
    fn encode_accepts_fifteen_data_bytes() {
        let data = [0x11u8; 15];
        let bytes = encode_packet(0x40, 0x16, &data).unwrap();
        assert_eq!(bytes.len(), 18);
        assert_eq!(bytes[0], 0x4F);
        assert!(verify_checksum(&bytes));
    }

    #[test]
    fn encode_rejects_sixteen_data_bytes() {
        let data = [0u8; 16];
        let err = encode_packet(0x20, 0x01, &data).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[]), 0x00);
    }

    #[test]
    fn checksum_invariant_holds_for_encoded_packets() {
        for cmd1 in [0x00u8, 0x20, 0x40, 0x60, 0xA0, 0xF0] {
            for len in 0..=MAX_DATA_LEN {
                let data: Vec<u8> = (0..len as u8).map(|i| i.wrapping_mul(37)).collect();
                let bytes = encode_packet(cmd1, 0x5A, &data).unwrap();
                let (last, body) = bytes.split_last().unwrap();
                assert_eq!(checksum(body), *last);
            }
        }
    }

    // ---------------------------------------------------------------
    // Packet decoding
    // ---------------------------------------------------------------

    #[test]
    fn decode_recovers_class_cmd2_and_data() {
        for cmd1 in [0x00u8, 0x1F, 0x2C, 0x65, 0xB3, 0xFF] {
            for cmd2 in [0x00u8, 0x01, 0x7F, 0xFF] {
                for len in [0usize, 1, 4, 15] {
                    let data: Vec<u8> = (0..len as u8).map(|i| i ^ cmd2).collect();
                    let bytes = encode_packet(cmd1, cmd2, &data).unwrap();
                    let packet = decode_packet(&bytes).unwrap();
                    assert_eq!(packet.class_nibble(), cmd1 & 0xF0);
                    assert_eq!(packet.cmd2, cmd2);
                    assert_eq!(packet.data, data);
                }
            }
        }
    }

    #[test]
    fn decode_nak_example() {
        let packet = decode_packet(&[0x10, 0x12, 0x04, 0x26]).unwrap();
        assert_eq!(packet.cmd1, 0x10);
        assert_eq!(packet.cmd2, 0x12);
        assert_eq!(packet.data, vec![0x04]);
        assert_eq!(packet.class(), Some(CommandClass::SystemControlReturn));
    }

    #[test]
    fn decode_rejects_bad_checksum() {
        let err = decode_packet(&[0x20, 0x01, 0x22]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn decode_rejects_bad_length() {
        assert!(decode_packet(&[0x00, 0x00]).is_err());
        assert!(decode_packet(&[0u8; 19]).is_err());
    }

    #[test]
    fn packet_to_bytes_canonicalizes_length_nibble() {
        let packet = decode_packet(&[0x10, 0x12, 0x04, 0x26]).unwrap();
        assert_eq!(packet.to_bytes().unwrap(), vec![0x11, 0x12, 0x04, 0x27]);
    }

    #[test]
    fn command_class_from_cmd1() {
        assert_eq!(
            CommandClass::from_cmd1(0x21),
            Some(CommandClass::TransportControl)
        );
        assert_eq!(CommandClass::from_cmd1(0x74), Some(CommandClass::SenseReturn));
        assert_eq!(CommandClass::from_cmd1(0xA0), None);
        assert_eq!(CommandClass::SenseRequest.cmd1(), 0x60);
    }

    // ---------------------------------------------------------------
    // BCD and timecode
    // ---------------------------------------------------------------

    #[test]
    fn bcd_pack_and_unpack() {
        assert_eq!(to_bcd(0), 0x00);
        assert_eq!(to_bcd(9), 0x09);
        assert_eq!(to_bcd(10), 0x10);
        assert_eq!(to_bcd(59), 0x59);
        assert_eq!(to_bcd(99), 0x99);
        assert_eq!(from_bcd(0x59).unwrap(), 59);
        assert_eq!(from_bcd(0x99).unwrap(), 99);
    }

    #[test]
    fn bcd_clamps_above_99() {
        assert_eq!(to_bcd(100), 0x99);
        assert_eq!(to_bcd(255), 0x99);
    }

    #[test]
    fn bcd_accepts_wide_ones_nibble_up_to_99() {
        assert_eq!(from_bcd(0x0A).unwrap(), 10);
        assert_eq!(from_bcd(0x1A).unwrap(), 20);
        assert_eq!(from_bcd(0x8F).unwrap(), 95);
    }

    #[test]
    fn bcd_rejects_values_above_99() {
        assert!(from_bcd(0x9A).is_err());
        assert!(from_bcd(0xA0).is_err());
        assert!(from_bcd(0xFF).is_err());
    }

    #[test]
    fn encode_timecode_wire_order() {
        let tc = Timecode::new(1, 2, 3, 12);
        assert_eq!(encode_timecode(&tc), [0x12, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn encode_timecode_clamps_fields() {
        let tc = Timecode::new(150, 99, 100, 0);
        assert_eq!(encode_timecode(&tc), [0x00, 0x99, 0x99, 0x99]);
    }

    #[test]
    fn encode_timecode_flags() {
        let tc = Timecode::new(0, 0, 0, 5).with_drop_frame(true);
        assert_eq!(encode_timecode(&tc)[0], 0x45);
        let tc = Timecode::new(0, 0, 0, 5).with_color_frame(true);
        assert_eq!(encode_timecode(&tc)[0], 0x15);
    }

    #[test]
    fn decode_timecode_fields_and_flags() {
        let tc = decode_timecode(&[0x45, 0x59, 0x30, 0x23]).unwrap();
        assert_eq!(tc.hours, 23);
        assert_eq!(tc.minutes, 30);
        assert_eq!(tc.seconds, 59);
        assert_eq!(tc.frames, 5);
        assert!(tc.drop_frame);
        assert!(!tc.color_frame);
    }

    #[test]
    fn decode_timecode_rejects_malformed_bcd() {
        assert!(decode_timecode(&[0x00, 0x00, 0x00, 0xA0]).is_err());
        assert!(decode_timecode(&[0x00, 0xB0, 0x00, 0x00]).is_err());
    }

    #[test]
    fn timecode_round_trip() {
        // The frames byte shares bits 4 and 6 with the flags, so the frames
        // value round-trips for tens digits 0-3 (every real frame rate).
        for hh in 0..=99u8 {
            for mm in [0u8, 1, 30, 59, 99] {
                for ss in [0u8, 9, 45, 99] {
                    for ff in [0u8, 1, 9, 24, 29, 39] {
                        let tc = Timecode::new(hh, mm, ss, ff);
                        let decoded = decode_timecode(&encode_timecode(&tc)).unwrap();
                        assert_eq!(
                            (decoded.hours, decoded.minutes, decoded.seconds, decoded.frames),
                            (hh, mm, ss, ff)
                        );
                        assert!(!decoded.drop_frame);
                    }
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // NAK and status bit tables
    // ---------------------------------------------------------------

    #[test]
    fn nak_checksum_error() {
        assert_eq!(decode_nak(0x04), NakReasons::CHECKSUM_ERROR);
    }

    #[test]
    fn nak_multiple_reasons() {
        let reasons = decode_nak(0x81);
        assert!(reasons.contains(NakReasons::UNKNOWN_CMD));
        assert!(reasons.contains(NakReasons::TIMEOUT));
        assert_eq!(reasons.iter().count(), 2);
    }

    #[test]
    fn nak_every_bit() {
        assert_eq!(decode_nak(0xFF), NakReasons::all());
        assert_eq!(decode_nak(0x0A), NakReasons::empty());
    }

    #[test]
    fn status_play_and_servo_lock() {
        let flags = decode_status(&[0x00, 0x01, 0x80, 0x00]);
        assert_eq!(flags, StatusFlags::PLAY | StatusFlags::SERVO_LOCK);
    }

    #[test]
    fn status_every_byte() {
        let flags = decode_status(&[0x21, 0xA0, 0x04, 0x41, 0x90]);
        assert_eq!(
            flags,
            StatusFlags::CASSETTE_OUT
                | StatusFlags::LOCAL
                | StatusFlags::STANDBY
                | StatusFlags::STOP
                | StatusFlags::REVERSE
                | StatusFlags::FREEZE_ON
                | StatusFlags::IN_SET
                | StatusFlags::SELECT_EE
                | StatusFlags::EDIT_SET
        );
    }

    #[test]
    fn status_all_known_bits() {
        let flags = decode_status(&[0xFF; 10]);
        assert_eq!(flags, StatusFlags::all());
    }

    #[test]
    fn status_ignores_undefined_bits_and_short_data() {
        // 0x40 in byte 0 and 0x40 in byte 2 are undefined.
        assert_eq!(decode_status(&[0x40, 0x00, 0x40]), StatusFlags::empty());
        assert_eq!(decode_status(&[]), StatusFlags::empty());
    }
}
