//! Events interpreted from packets returned by the deck.
//!
//! A session decodes every checksum-valid packet on the inbound byte stream
//! into a [`VtrEvent`] and publishes it through a `tokio::sync::broadcast`
//! channel. Subscribers receive every event; [`EventKind`] lets them filter.

use std::fmt;

use crate::types::{NakReasons, StatusFlags, Timecode};

/// A packet from the deck, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VtrEvent {
    /// Positive acknowledgement of the last command.
    Ack,

    /// Negative acknowledgement, with the reasons reported by the deck.
    Nak(NakReasons),

    /// Reply to a device type request (16-bit, big-endian on the wire).
    DeviceType(u16),

    /// Reply to a status sense.
    Status(StatusFlags),

    /// A timecode-bearing sense return (current time, in/out data, ...).
    Timecode {
        /// The sense return opcode that carried the timecode.
        cmd2: u8,
        timecode: Timecode,
    },

    /// A checksum-valid packet with no specific interpretation.
    Raw {
        cmd1: u8,
        cmd2: u8,
        data: Vec<u8>,
    },
}

/// The kind of a [`VtrEvent`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ack,
    Nak,
    DeviceType,
    Status,
    Timecode,
    Raw,
}

impl VtrEvent {
    /// Return the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            VtrEvent::Ack => EventKind::Ack,
            VtrEvent::Nak(_) => EventKind::Nak,
            VtrEvent::DeviceType(_) => EventKind::DeviceType,
            VtrEvent::Status(_) => EventKind::Status,
            VtrEvent::Timecode { .. } => EventKind::Timecode,
            VtrEvent::Raw { .. } => EventKind::Raw,
        }
    }
}

impl fmt::Display for VtrEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VtrEvent::Ack => write!(f, "ACK"),
            VtrEvent::Nak(reasons) => write!(f, "NAK {:02x} {}", reasons.bits(), reasons),
            VtrEvent::DeviceType(id) => write!(f, "DEVICE_TYPE 0x{id:04x}"),
            VtrEvent::Status(flags) => write!(f, "STATUS {flags}"),
            VtrEvent::Timecode { timecode, .. } => write!(f, "TIMECODE {timecode}"),
            VtrEvent::Raw { cmd1, cmd2, data } => {
                write!(f, "RAW {cmd1:02x} {cmd2:02x}")?;
                for b in data {
                    write!(f, " {b:02x}")?;
                }
                Ok(())
            }
        }
    }
}
