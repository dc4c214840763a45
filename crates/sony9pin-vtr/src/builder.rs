//! VtrBuilder -- fluent builder for constructing [`Vtr`] sessions.
//!
//! Separates configuration from construction so that callers can set up
//! serial link parameters, the acknowledgement timeout and the decoder
//! window before the transport is opened.
//!
//! # Example
//!
//! ```no_run
//! use sony9pin_vtr::builder::VtrBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> sony9pin_core::Result<()> {
//! let vtr = VtrBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .ack_timeout(Duration::from_millis(500))
//!     .build()
//!     .await?;
//! vtr.play().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use sony9pin_core::error::{Error, Result};
use sony9pin_core::transport::Transport;
use sony9pin_transport::{SerialConfig, SerialTransport};

use crate::decoder::DEFAULT_MAX_PACKET_LEN;
use crate::io::{spawn_io_task, IoConfig};
use crate::packet::MIN_PACKET_LEN;
use crate::vtr::Vtr;

/// Default time to wait for an ACK or NAK.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(800);

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Fluent builder for [`Vtr`].
///
/// Every setting has a default matching a standard 9-pin deck, so the
/// simplest usage is:
///
/// ```ignore
/// let vtr = VtrBuilder::new()
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct VtrBuilder {
    serial_port: Option<String>,
    serial_config: SerialConfig,
    ack_timeout: Duration,
    max_packet_len: usize,
    event_capacity: usize,
}

impl Default for VtrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VtrBuilder {
    pub fn new() -> Self {
        VtrBuilder {
            serial_port: None,
            serial_config: SerialConfig::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_packet_len: DEFAULT_MAX_PACKET_LEN,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Serial device path (`/dev/ttyUSB0`, `COM3`, ...). Required by
    /// [`build()`](Self::build).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override only the baud rate of the serial configuration.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.serial_config.baud_rate = baud;
        self
    }

    /// Replace the whole serial configuration.
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial_config = config;
        self
    }

    /// Default timeout for acknowledgement waits (800ms unless set).
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Longest packet the resynchronizer will search for. Use
    /// [`EXTENDED_MAX_PACKET_LEN`](crate::decoder::EXTENDED_MAX_PACKET_LEN)
    /// for decks whose vendor replies overflow the length nibble.
    pub fn max_packet_len(mut self, len: usize) -> Self {
        self.max_packet_len = len;
        self
    }

    /// Number of events buffered per subscriber before it starts lagging.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Build a [`Vtr`] with a caller-provided transport.
    ///
    /// This is the primary entry point for testing (pass a
    /// `MockTransport` from `sony9pin-test-harness`) and for callers that
    /// manage the link themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Vtr> {
        if self.max_packet_len < MIN_PACKET_LEN {
            return Err(Error::InvalidParameter(format!(
                "max_packet_len must be at least {MIN_PACKET_LEN}"
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidParameter(
                "event_capacity must be non-zero".into(),
            ));
        }

        let (event_tx, _) = broadcast::channel(self.event_capacity);
        let config = IoConfig {
            max_packet_len: self.max_packet_len,
        };
        let io = spawn_io_task(transport, config, event_tx.clone());

        Ok(Vtr::new(io, event_tx, self.ack_timeout))
    }

    /// Build a [`Vtr`] on a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<Vtr> {
        let port = self
            .serial_port
            .as_deref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        let transport = SerialTransport::open_with_config(port, self.serial_config.clone()).await?;
        info!(port, baud = self.serial_config.baud_rate, "VTR session opened");
        self.build_with_transport(Box::new(transport)).await
    }
}
