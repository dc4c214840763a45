//! Core value types decoded from, or encoded into, 9-pin packets.
//!
//! These types carry no wire knowledge of their own; the BCD and bit-table
//! mappings live in the packet codec of `sony9pin-vtr`.

use std::fmt;
use std::str::FromStr;

/// A SMPTE-style timecode as carried by the 9-pin protocol.
///
/// Each field is a two-digit decimal value (0-99) on the wire, so decoded
/// timecodes never exceed 99 in any field. Nothing here enforces a frame
/// rate; decks report whatever their generator or tape holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timecode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    /// Drop-frame flag (bit 6 of the frames byte).
    pub drop_frame: bool,
    /// Color-frame flag (bit 4 of the frames byte).
    pub color_frame: bool,
}

impl Timecode {
    /// Create a non-drop-frame timecode with the color-frame flag cleared.
    pub fn new(hours: u8, minutes: u8, seconds: u8, frames: u8) -> Self {
        Timecode {
            hours,
            minutes,
            seconds,
            frames,
            drop_frame: false,
            color_frame: false,
        }
    }

    /// Return a copy with the drop-frame flag set as given.
    pub fn with_drop_frame(mut self, drop_frame: bool) -> Self {
        self.drop_frame = drop_frame;
        self
    }

    /// Return a copy with the color-frame flag set as given.
    pub fn with_color_frame(mut self, color_frame: bool) -> Self {
        self.color_frame = color_frame;
        self
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.drop_frame { ';' } else { ':' };
        write!(
            f,
            "{:02}:{:02}:{:02}{}{:02}",
            self.hours, self.minutes, self.seconds, sep, self.frames
        )
    }
}

/// Error returned when parsing a [`Timecode`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimecodeError(String);

impl fmt::Display for ParseTimecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid timecode '{}': expected HH:MM:SS:FF", self.0)
    }
}

impl std::error::Error for ParseTimecodeError {}

impl FromStr for Timecode {
    type Err = ParseTimecodeError;

    /// Parse `HH:MM:SS:FF` (one or two digits per field). A `;` before the
    /// frames field marks the timecode as drop-frame.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let err = || ParseTimecodeError(s.to_string());

        let (head, frames, drop_frame) = match s.rfind([':', ';']) {
            Some(pos) => (&s[..pos], &s[pos + 1..], s[pos..].starts_with(';')),
            None => return Err(err()),
        };

        let mut fields = head.split(':');
        let mut next = || -> std::result::Result<u8, ParseTimecodeError> {
            parse_field(fields.next().ok_or_else(err)?).ok_or_else(err)
        };
        let hours = next()?;
        let minutes = next()?;
        let seconds = next()?;
        if fields.next().is_some() {
            return Err(err());
        }
        let frames = parse_field(frames).ok_or_else(err)?;

        Ok(Timecode::new(hours, minutes, seconds, frames).with_drop_frame(drop_frame))
    }
}

fn parse_field(s: &str) -> Option<u8> {
    if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

bitflags::bitflags! {
    /// Reasons carried by a NAK reply.
    ///
    /// The flag values are the bits of the NAK reason byte, so a wire mask
    /// converts with [`NakReasons::from_bits_truncate`]; undefined bits are
    /// dropped.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NakReasons: u8 {
        const UNKNOWN_CMD = 0x01;
        const CHECKSUM_ERROR = 0x04;
        const PARITY_ERROR = 0x10;
        const BUFFER_OVERRUN = 0x20;
        const FRAMING_ERROR = 0x40;
        const TIMEOUT = 0x80;
    }
}

impl fmt::Display for NakReasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

bitflags::bitflags! {
    /// Snapshot of the deck status flags returned by a status sense.
    ///
    /// The bit layout of this set is internal; the mapping from the five
    /// status bytes on the wire is done by `decode_status` in the packet
    /// codec.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u32 {
        // status byte 0
        const CASSETTE_OUT = 1 << 0;
        const SERVO_REF_MISSING = 1 << 1;
        const LOCAL = 1 << 2;
        // status byte 1
        const STANDBY = 1 << 3;
        const STOP = 1 << 4;
        const EJECT = 1 << 5;
        const REWIND = 1 << 6;
        const FORWARD = 1 << 7;
        const RECORD = 1 << 8;
        const PLAY = 1 << 9;
        // status byte 2
        const SERVO_LOCK = 1 << 10;
        const SHUTTLE = 1 << 11;
        const JOG = 1 << 12;
        const VAR = 1 << 13;
        const REVERSE = 1 << 14;
        const STILL = 1 << 15;
        const CUE_UP = 1 << 16;
        // status byte 3
        const AUTO_MODE = 1 << 17;
        const FREEZE_ON = 1 << 18;
        const AUDIO_OUT_SET = 1 << 19;
        const AUDIO_IN_SET = 1 << 20;
        const OUT_SET = 1 << 21;
        const IN_SET = 1 << 22;
        // status byte 4
        const SELECT_EE = 1 << 23;
        const FULL_EE = 1 << 24;
        const EDIT_SET = 1 << 25;
        const REVIEW_SET = 1 << 26;
        const AUTO_EDIT_SET = 1 << 27;
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "[{}]", names.join(" "))
    }
}
