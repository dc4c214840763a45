//! Scripted [`Transport`] standing in for a deck.
//!
//! A test lists the packets it expects the engine to send, in order, and
//! what the "deck" answers to each. Besides plain replies the mock can
//! answer late, push bytes nobody asked for, and hand inbound data out in
//! small reads so packet reassembly gets exercised.
//!
//! ```
//! use sony9pin_test_harness::MockTransport;
//! use std::time::Duration;
//!
//! let mut deck = MockTransport::new();
//! // PLAY is acknowledged at once.
//! deck.expect(&[0x20, 0x01, 0x21], &[0x10, 0x01, 0x11]);
//! // STOP is acknowledged 10ms later.
//! deck.expect_delayed(&[0x20, 0x00, 0x20], &[0x10, 0x01, 0x11], Duration::from_millis(10));
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use sony9pin_core::error::{Error, Result};
use sony9pin_core::transport::Transport;

#[derive(Debug)]
struct Exchange {
    command: Vec<u8>,
    reply: Vec<u8>,
    latency: Duration,
}

/// Deck simulator driven by a script of exchanges.
///
/// Each `send()` is logged and checked against the next scripted command.
/// A mismatch, or a send past the end of the script, fails with
/// [`Error::Protocol`]. The matching reply becomes readable after its
/// latency; `receive()` returns [`Error::Timeout`] if nothing becomes
/// readable in time.
#[derive(Debug)]
pub struct MockTransport {
    script: VecDeque<Exchange>,
    /// Replies not yet readable, ordered by due time.
    pending: VecDeque<(Instant, Vec<u8>)>,
    readable: VecDeque<u8>,
    max_chunk: Option<usize>,
    open: bool,
    sent: Vec<Vec<u8>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            script: VecDeque::new(),
            pending: VecDeque::new(),
            readable: VecDeque::new(),
            max_chunk: None,
            open: true,
            sent: Vec::new(),
        }
    }

    /// Script `command` to be answered with `reply` straight away. An empty
    /// `reply` is a deck that stays silent.
    pub fn expect(&mut self, command: &[u8], reply: &[u8]) {
        self.expect_delayed(command, reply, Duration::ZERO);
    }

    /// Script `command` to be answered with `reply` after `latency`.
    pub fn expect_delayed(&mut self, command: &[u8], reply: &[u8], latency: Duration) {
        self.script.push_back(Exchange {
            command: command.to_vec(),
            reply: reply.to_vec(),
            latency,
        });
    }

    /// Make `data` readable now, unprompted (line noise, a late reply,
    /// unsolicited status).
    pub fn push_inbound(&mut self, data: &[u8]) {
        self.readable.extend(data);
    }

    /// Cap every read at `n` bytes.
    pub fn set_max_chunk(&mut self, n: usize) {
        self.max_chunk = Some(n.max(1));
    }

    /// Everything sent so far, one entry per `send()`.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn remaining_expectations(&self) -> usize {
        self.script.len()
    }

    /// Simulate a pulled cable (`false`) or a reconnect (`true`).
    pub fn set_connected(&mut self, connected: bool) {
        self.open = connected;
    }

    fn release_until(&mut self, now: Instant) {
        while self.pending.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, reply)) = self.pending.pop_front() {
                self.readable.extend(reply);
            }
        }
    }

    fn take_readable(&mut self, buf: &mut [u8]) -> usize {
        let n = self
            .readable
            .len()
            .min(buf.len())
            .min(self.max_chunk.unwrap_or(usize::MAX));
        for (dst, b) in buf.iter_mut().zip(self.readable.drain(..n)) {
            *dst = b;
        }
        n
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::NotConnected);
        }
        self.sent.push(data.to_vec());

        let Some(exchange) = self.script.pop_front() else {
            return Err(Error::Protocol(format!(
                "mock deck: unscripted send {data:02X?}"
            )));
        };
        if exchange.command != data {
            return Err(Error::Protocol(format!(
                "mock deck: expected {:02X?}, got {:02X?}",
                exchange.command, data
            )));
        }

        if !exchange.reply.is_empty() {
            self.pending
                .push_back((Instant::now() + exchange.latency, exchange.reply));
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.open {
            return Err(Error::NotConnected);
        }

        let now = Instant::now();
        self.release_until(now);
        if !self.readable.is_empty() {
            return Ok(self.take_readable(buf));
        }

        // Block like a real port would: until the next reply is due, or for
        // the whole timeout if it is not due in time.
        match self.pending.front().map(|(due, _)| *due) {
            Some(due) if due <= now + timeout => {
                tokio::time::sleep_until(due).await;
                self.release_until(due);
                Ok(self.take_readable(buf))
            }
            Some(_) => {
                tokio::time::sleep(timeout).await;
                Err(Error::Timeout)
            }
            None => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        self.pending.clear();
        self.readable.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.open
    }

    fn link_name(&self) -> &str {
        "mock deck"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAY: [u8; 3] = [0x20, 0x01, 0x21];
    const STOP: [u8; 3] = [0x20, 0x00, 0x20];
    const ACK: [u8; 3] = [0x10, 0x01, 0x11];

    async fn read(deck: &mut MockTransport, ms: u64) -> Result<Vec<u8>> {
        let mut buf = [0u8; 32];
        let n = deck.receive(&mut buf, Duration::from_millis(ms)).await?;
        Ok(buf[..n].to_vec())
    }

    #[tokio::test]
    async fn scripted_reply_is_readable_after_send() {
        let mut deck = MockTransport::new();
        deck.expect(&PLAY, &ACK);

        deck.send(&PLAY).await.unwrap();
        assert_eq!(read(&mut deck, 100).await.unwrap(), ACK);
        assert_eq!(deck.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn sends_are_logged_in_order() {
        let mut deck = MockTransport::new();
        deck.expect(&PLAY, &ACK);
        deck.expect(&STOP, &ACK);
        assert_eq!(deck.remaining_expectations(), 2);

        deck.send(&PLAY).await.unwrap();
        deck.send(&STOP).await.unwrap();
        assert_eq!(deck.sent_data(), &[PLAY.to_vec(), STOP.to_vec()]);
    }

    #[tokio::test]
    async fn off_script_send_fails() {
        let mut deck = MockTransport::new();
        deck.expect(&PLAY, &ACK);
        assert!(matches!(deck.send(&STOP).await, Err(Error::Protocol(_))));

        let mut deck = MockTransport::new();
        assert!(matches!(deck.send(&PLAY).await, Err(Error::Protocol(_))));
        // Logged even though it failed.
        assert_eq!(deck.sent_data().len(), 1);
    }

    #[tokio::test]
    async fn silence_times_out() {
        let mut deck = MockTransport::new();
        assert!(matches!(read(&mut deck, 10).await, Err(Error::Timeout)));

        deck.expect(&PLAY, &[]);
        deck.send(&PLAY).await.unwrap();
        assert!(matches!(read(&mut deck, 10).await, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn late_reply_arrives_after_latency() {
        let mut deck = MockTransport::new();
        deck.expect_delayed(&PLAY, &ACK, Duration::from_millis(30));
        deck.send(&PLAY).await.unwrap();

        assert!(matches!(read(&mut deck, 5).await, Err(Error::Timeout)));

        let started = Instant::now();
        assert_eq!(read(&mut deck, 100).await.unwrap(), ACK);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn unprompted_bytes_are_chunked() {
        let mut deck = MockTransport::new();
        deck.push_inbound(&[0xFF, 0x10, 0x01, 0x11, 0x00]);
        deck.set_max_chunk(2);

        assert_eq!(read(&mut deck, 10).await.unwrap(), [0xFF, 0x10]);
        assert_eq!(read(&mut deck, 10).await.unwrap(), [0x01, 0x11]);
        assert_eq!(read(&mut deck, 10).await.unwrap(), [0x00]);
    }

    #[tokio::test]
    async fn names_itself_in_logs() {
        let deck = MockTransport::new();
        assert_eq!(deck.link_name(), "mock deck");
    }

    #[tokio::test]
    async fn closed_deck_refuses_io() {
        let mut deck = MockTransport::new();
        assert!(deck.is_connected());
        deck.close().await.unwrap();
        assert!(!deck.is_connected());
        assert!(matches!(deck.send(&PLAY).await, Err(Error::NotConnected)));

        let mut deck = MockTransport::new();
        deck.set_connected(false);
        assert!(matches!(read(&mut deck, 10).await, Err(Error::NotConnected)));
    }
}
