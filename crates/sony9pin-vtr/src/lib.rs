//! Sony 9-pin (RS-422) VTR protocol engine.
//!
//! This crate speaks the Sony 9-pin remote protocol used by broadcast
//! tape decks, video servers and disk recorders. It provides:
//!
//! - **Packet codec** ([`packet`]) -- framing, checksums, BCD timecode and
//!   the NAK/status bit tables.
//! - **Stream decoder** ([`decoder`]) -- resynchronizing byte-stream parser
//!   that turns arbitrary chunks into [`VtrEvent`](sony9pin_core::VtrEvent)s.
//! - **Command builders** ([`commands`]) -- the standard transport, sense,
//!   preset and system commands as ready-to-send byte vectors.
//! - **Vtr** ([`vtr`]) -- a live session over a
//!   [`Transport`](sony9pin_core::Transport) with ACK/NAK waits, deck
//!   state snapshots and event subscriptions.
//! - **VtrBuilder** ([`builder`]) -- fluent construction of `Vtr` sessions.
//! - **Vendor extensions** ([`blackmagic`], [`odetics`]).
//!
//! # Example
//!
//! ```
//! use sony9pin_vtr::commands::cmd_play;
//! use sony9pin_vtr::decoder::PacketDecoder;
//! use sony9pin_core::VtrEvent;
//!
//! assert_eq!(cmd_play(), vec![0x20, 0x01, 0x21]);
//!
//! let mut decoder = PacketDecoder::default();
//! let events = decoder.decode(&[0x10, 0x01, 0x11]);
//! assert_eq!(events, vec![VtrEvent::Ack]);
//! ```

pub mod blackmagic;
pub mod builder;
pub mod commands;
pub mod decoder;
mod io;
pub mod odetics;
pub mod packet;
pub mod vtr;

pub use blackmagic::BlackmagicAmp;
pub use builder::VtrBuilder;
pub use decoder::PacketDecoder;
pub use io::DeckState;
pub use odetics::Odetics;
pub use packet::{CommandClass, Packet};
pub use vtr::{AckOutcome, EventSubscription, Vtr};
