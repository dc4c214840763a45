//! The byte link between host and deck.
//!
//! A 9-pin control port is a point-to-point RS-422 line at 38400 baud, 8O1.
//! Nothing on the line marks where a packet starts, so a [`Transport`] only
//! moves bytes: it may hand back half a packet, or a packet and a half, and
//! the resynchronizer in `sony9pin-vtr` puts them back together.
//!
//! `sony9pin-transport` provides the serial implementation and
//! `sony9pin-test-harness` a scripted `MockTransport`.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Byte-level link to one deck.
///
/// A deck session owns its transport exclusively, from a single task, so
/// implementations need no internal locking.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write a complete outbound packet.
    ///
    /// Returns once every byte has left the transmit buffer. The deck
    /// answers within a few milliseconds, so a reply must not be able to
    /// overtake a half-written command.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever the deck has sent into `buf`.
    ///
    /// Returns as soon as at least one byte is available, with no regard
    /// for packet boundaries. Waits at most `timeout`, then returns
    /// [`Error::Timeout`](crate::error::Error::Timeout). A timeout means
    /// the line was quiet, not that the link failed. Parity or framing
    /// faults on the 8O1 line surface as
    /// [`Error::Io`](crate::error::Error::Io).
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Release the port. Later `send` and `receive` calls return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Short name of the link for log fields, such as the device path.
    fn link_name(&self) -> &str {
        "deck"
    }
}
