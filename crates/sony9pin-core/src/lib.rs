//! sony9pin-core: Core traits, types, and error definitions for sony9pin.
//!
//! This crate defines the device-agnostic pieces shared by every part of the
//! workspace: the byte-level [`Transport`] the protocol engine drives, the
//! decoded value types (timecode, status flags, NAK reasons), and the
//! [`VtrEvent`]s a session publishes.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`VtrEvent`] -- interpreted packets returned by the deck
//! - [`Timecode`], [`StatusFlags`], [`NakReasons`] -- decoded payloads
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use sony9pin_core::*`.
pub use error::{Error, Result};
pub use events::{EventKind, VtrEvent};
pub use transport::Transport;
pub use types::*;
