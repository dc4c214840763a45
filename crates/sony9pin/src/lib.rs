//! # sony9pin -- Sony 9-pin VTR control
//!
//! `sony9pin` is an asynchronous Rust library for driving broadcast decks,
//! video servers and disk recorders over the Sony 9-pin RS-422 remote
//! protocol. It frames commands, resynchronizes the reply stream, tracks
//! ACK/NAK acknowledgements and decodes status bits and BCD timecode.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use sony9pin::{AckOutcome, VtrBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let vtr = VtrBuilder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .build()
//!         .await?;
//!
//!     let outcome = vtr
//!         .send_and_await_ack(&sony9pin::commands::cmd_play(), Duration::from_millis(500))
//!         .await?;
//!     if let AckOutcome::Nakked(reasons) = outcome {
//!         println!("deck refused PLAY: {reasons}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                   | Purpose                                         |
//! |-------------------------|-------------------------------------------------|
//! | `sony9pin-core`         | [`Transport`] trait, [`Timecode`], flags, errors |
//! | `sony9pin-transport`    | RS-422 serial transport                          |
//! | `sony9pin-vtr`          | Packet codec, resynchronizer, `Vtr` session      |
//! | **`sony9pin`**          | This facade crate -- re-exports everything       |
//!
//! ## Events
//!
//! Every packet the deck sends is interpreted into a [`VtrEvent`] and
//! broadcast to subscribers:
//!
//! ```no_run
//! use sony9pin::{Vtr, VtrEvent};
//! # async fn example(vtr: &Vtr) -> sony9pin::Result<()> {
//! let mut events = vtr.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         VtrEvent::Timecode { timecode, .. } => println!("TC {timecode}"),
//!         other => println!("{other}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub use sony9pin_core::*;
pub use sony9pin_transport::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
pub use sony9pin_vtr::{
    blackmagic, builder, commands, decoder, odetics, packet, AckOutcome, BlackmagicAmp,
    CommandClass, DeckState, EventSubscription, Odetics, Packet, PacketDecoder, Vtr, VtrBuilder,
};
