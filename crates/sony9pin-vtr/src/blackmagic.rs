//! Blackmagic Advanced Media Protocol extensions.
//!
//! HyperDeck and similar recorders accept the standard 9-pin command set
//! plus a handful of clip and playlist commands framed the same way. The
//! builders here produce those packets; [`BlackmagicAmp`] sends them through
//! a [`Vtr`].

use std::time::Duration;

use sony9pin_core::error::Result;
use sony9pin_core::types::Timecode;

use crate::commands::time_sense;
use crate::packet::{build_packet, encode_packet, encode_timecode};
use crate::vtr::Vtr;

// ---------------------------------------------------------------
// Opcodes (cmd1 with zero length nibble, cmd2)
// ---------------------------------------------------------------

const AUTO_SKIP: (u8, u8) = (0xA0, 0x01);
const LIST_NEXT_ID: (u8, u8) = (0xA0, 0x15);
const CLEAR_PLAYLIST: (u8, u8) = (0x20, 0x29);
const SET_PLAYBACK_LOOP: (u8, u8) = (0x40, 0x42);
const SET_STOP_MODE: (u8, u8) = (0x40, 0x44);
const APPEND_PRESET: (u8, u8) = (0x40, 0x16);
const SEEK_TO_TIMELINE_POSITION: (u8, u8) = (0x00, 0x02);
const SEEK_RELATIVE_CLIP: (u8, u8) = (0x80, 0x03);

/// What the output shows once playback stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopMode {
    #[default]
    Off = 0,
    FreezeLast = 1,
    FreezeNext = 2,
    Black = 3,
}

fn packet(op: (u8, u8), data: &[u8]) -> Vec<u8> {
    build_packet(op.0, op.1, data)
}

/// Skip `delta` clips from the current one (negative skips backwards).
pub fn cmd_auto_skip(delta: i8) -> Vec<u8> {
    packet(AUTO_SKIP, &[delta as u8])
}

/// Request the next clip ID.
pub fn cmd_list_next_id_single() -> Vec<u8> {
    packet(LIST_NEXT_ID, &[])
}

/// Request the next `count` clip IDs. `count` is clamped to 1..=255.
pub fn cmd_list_next_id(count: u16) -> Vec<u8> {
    let n = count.clamp(1, 255) as u8;
    packet(LIST_NEXT_ID, &[n])
}

pub fn cmd_clear_playlist() -> Vec<u8> {
    packet(CLEAR_PLAYLIST, &[])
}

/// Enable or disable looping. `timeline` loops the whole timeline rather
/// than the current clip.
pub fn cmd_set_playback_loop(enable: bool, timeline: bool) -> Vec<u8> {
    let v = u8::from(enable) | (u8::from(timeline) << 1);
    packet(SET_PLAYBACK_LOOP, &[v])
}

pub fn cmd_set_stop_mode(mode: StopMode) -> Vec<u8> {
    packet(SET_STOP_MODE, &[mode as u8])
}

/// Append a clip to the playlist.
///
/// Data: name length (big-endian u16), name bytes, IN and OUT timecodes as
/// BCD `[ff, ss, mm, hh]`. The fixed part is 10 bytes, so names longer than
/// 5 bytes do not fit a packet and return
/// [`Error::InvalidParameter`](sony9pin_core::Error::InvalidParameter).
pub fn cmd_append_preset(name: &str, in_tc: &Timecode, out_tc: &Timecode) -> Result<Vec<u8>> {
    let name = name.as_bytes();
    let len = name.len().min(u16::MAX as usize) as u16;

    let mut data = Vec::with_capacity(10 + name.len());
    data.extend_from_slice(&len.to_be_bytes());
    data.extend_from_slice(&name[..len as usize]);
    data.extend_from_slice(&encode_timecode(in_tc));
    data.extend_from_slice(&encode_timecode(out_tc));

    encode_packet(APPEND_PRESET.0, APPEND_PRESET.1, &data)
}

/// Seek to a position on the timeline.
///
/// A value in `0.0..=1.0` is a fraction of the timeline, scaled to
/// `0..=65535`; anything else is taken as the raw 16-bit position and
/// clamped. Sent little-endian.
pub fn cmd_seek_to_timeline_position(position: f64) -> Vec<u8> {
    let v: u16 = if (0.0..=1.0).contains(&position) {
        (position * 65535.0).round() as u16
    } else {
        position.clamp(0.0, 65535.0) as u16
    };
    packet(SEEK_TO_TIMELINE_POSITION, &v.to_le_bytes())
}

/// Seek `delta` clips relative to the current one.
pub fn cmd_seek_relative_clip(delta: i8) -> Vec<u8> {
    packet(SEEK_RELATIVE_CLIP, &[delta as u8])
}

/// Blackmagic command set on top of a [`Vtr`] session.
///
/// # Example
///
/// ```no_run
/// use sony9pin_vtr::blackmagic::{BlackmagicAmp, StopMode};
/// # async fn example(vtr: &sony9pin_vtr::Vtr) -> sony9pin_core::Result<()> {
/// let amp = BlackmagicAmp::new(vtr);
/// amp.set_stop_mode(StopMode::FreezeLast).await?;
/// amp.set_playback_loop(true, false).await?;
/// vtr.play().await?;
/// # Ok(())
/// # }
/// ```
pub struct BlackmagicAmp<'a> {
    vtr: &'a Vtr,
}

impl<'a> BlackmagicAmp<'a> {
    pub fn new(vtr: &'a Vtr) -> Self {
        BlackmagicAmp { vtr }
    }

    /// Send any command as-is.
    pub async fn send(&self, cmd1: u8, cmd2: u8, data: &[u8]) -> Result<()> {
        self.vtr.send_command(cmd1, cmd2, data).await
    }

    /// Alias for [`send`](Self::send).
    pub async fn raw(&self, cmd1: u8, cmd2: u8, data: &[u8]) -> Result<()> {
        self.send(cmd1, cmd2, data).await
    }

    /// Current time sense with automatic LTC/VITC selection.
    pub async fn timecode_auto(&self) -> Result<()> {
        self.vtr.current_time_sense(time_sense::AUTO).await
    }

    /// Poll [`timecode_auto`](Self::timecode_auto) every `interval` for
    /// `duration`.
    pub async fn poll_timecode(&self, interval: Duration, duration: Duration) -> Result<()> {
        self.vtr
            .poll_timecode(time_sense::AUTO, interval, duration)
            .await
    }

    pub async fn auto_skip(&self, delta: i8) -> Result<()> {
        self.vtr.send(&cmd_auto_skip(delta)).await
    }

    pub async fn list_next_id_single(&self) -> Result<()> {
        self.vtr.send(&cmd_list_next_id_single()).await
    }

    pub async fn list_next_id(&self, count: u16) -> Result<()> {
        self.vtr.send(&cmd_list_next_id(count)).await
    }

    pub async fn clear_playlist(&self) -> Result<()> {
        self.vtr.send(&cmd_clear_playlist()).await
    }

    pub async fn set_playback_loop(&self, enable: bool, timeline: bool) -> Result<()> {
        self.vtr
            .send(&cmd_set_playback_loop(enable, timeline))
            .await
    }

    pub async fn set_stop_mode(&self, mode: StopMode) -> Result<()> {
        self.vtr.send(&cmd_set_stop_mode(mode)).await
    }

    pub async fn append_preset(&self, name: &str, in_tc: &Timecode, out_tc: &Timecode) -> Result<()> {
        let bytes = cmd_append_preset(name, in_tc, out_tc)?;
        self.vtr.send(&bytes).await
    }

    pub async fn seek_to_timeline_position(&self, position: f64) -> Result<()> {
        self.vtr
            .send(&cmd_seek_to_timeline_position(position))
            .await
    }

    pub async fn seek_relative_clip(&self, delta: i8) -> Result<()> {
        self.vtr.send(&cmd_seek_relative_clip(delta)).await
    }
}
