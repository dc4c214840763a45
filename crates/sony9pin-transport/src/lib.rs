//! Transport implementations for sony9pin.
//!
//! This crate provides [`SerialTransport`], the RS-422 implementation of the
//! [`Transport`](sony9pin_core::Transport) trait from `sony9pin-core`. Decks
//! are usually reached through a USB RS-422 adapter presenting a virtual
//! COM port.
//!
//! # Example
//!
//! ```no_run
//! use sony9pin_transport::{SerialConfig, SerialTransport};
//! use sony9pin_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> sony9pin_core::Result<()> {
//! // 38400 baud, 8 data bits, odd parity, 1 stop bit
//! let mut transport =
//!     SerialTransport::open_with_config("/dev/ttyUSB0", SerialConfig::default()).await?;
//!
//! // PLAY
//! transport.send(&[0x20, 0x01, 0x21]).await?;
//!
//! let mut buf = [0u8; 64];
//! let n = transport.receive(&mut buf, Duration::from_millis(200)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
