//! IO task types and implementation.
//!
//! This module defines the request/response protocol between [`Vtr`]
//! methods and the single IO task that owns the transport, plus the IO task
//! loop itself.
//!
//! The IO task handles writes queued by the session, idle reads of the
//! inbound byte stream, packet resynchronization, and publication of every
//! decoded event to subscribers and to the last-observed state cache. An
//! idle read that times out with bytes still buffered drops them as stale.
//!
//! [`Vtr`]: crate::vtr::Vtr

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use sony9pin_core::error::{Error, Result};
use sony9pin_core::events::VtrEvent;
use sony9pin_core::transport::Transport;
use sony9pin_core::types::{StatusFlags, Timecode};

use crate::decoder::PacketDecoder;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the IO task.
pub(crate) struct IoConfig {
    /// Search window of the packet resynchronizer.
    pub max_packet_len: usize,
}

/// A request sent from session methods to the IO task.
pub(crate) enum Request {
    /// Write bytes to the transport; replies once written and flushed.
    Send {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Close the transport and stop the IO task.
    Close { reply: oneshot::Sender<Result<()>> },
}

/// The most recent values reported by the deck.
///
/// Each field is replaced wholesale when a new reply of that kind arrives;
/// values are never merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeckState {
    /// Flags from the last status data reply.
    pub status: Option<StatusFlags>,
    /// Timecode from the last timecode-bearing sense return.
    pub timecode: Option<Timecode>,
    /// Identifier from the last device type reply.
    pub device_type: Option<u16>,
}

impl DeckState {
    /// Fold an event into the state. Returns `true` if a field changed.
    fn apply(&mut self, event: &VtrEvent) -> bool {
        match event {
            VtrEvent::Status(flags) => self.status.replace(*flags) != Some(*flags),
            VtrEvent::Timecode { timecode, .. } => {
                self.timecode.replace(*timecode) != Some(*timecode)
            }
            VtrEvent::DeviceType(id) => self.device_type.replace(*id) != Some(*id),
            _ => false,
        }
    }
}

/// Handle to the IO task. Stored inside `Vtr`.
pub(crate) struct VtrIo {
    /// Request channel.
    pub cmd_tx: mpsc::Sender<Request>,
    /// Cancellation token for shutdown on drop.
    pub cancel: CancellationToken,
    /// Join handle for the IO task.
    pub task: JoinHandle<()>,
    /// Last-observed deck state, published by the IO task.
    pub state: watch::Receiver<DeckState>,
}

impl VtrIo {
    /// Queue bytes for transmission and wait until they have been written.
    pub async fn send(&self, bytes: Vec<u8>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Send {
                bytes,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::NotConnected),
        }
    }

    /// Close the transport and wait for the IO task to exit.
    pub async fn close(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Close { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;

        reply_rx.await.map_err(|_| Error::NotConnected)?
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task. Returns the handle for sending requests.
///
/// The IO task owns the transport exclusively: every write and every read
/// happens on it, so writes are serialized in request order.
pub(crate) fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    event_tx: broadcast::Sender<VtrEvent>,
) -> VtrIo {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(32);
    let (state_tx, state_rx) = watch::channel(DeckState::default());
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(io_loop(
        transport,
        config,
        event_tx,
        state_tx,
        cmd_rx,
        cancel_clone,
    ));

    VtrIo {
        cmd_tx,
        cancel,
        task,
        state: state_rx,
    }
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// How long an idle read waits before the loop checks for requests again.
const IDLE_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Queued requests
/// 3. Idle reads of the inbound stream
async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    event_tx: broadcast::Sender<VtrEvent>,
    state_tx: watch::Sender<DeckState>,
    mut cmd_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut decoder = PacketDecoder::new(config.max_packet_len);
    let mut read_failing = false;

    debug!(
        link = transport.link_name(),
        max_packet_len = decoder.max_packet_len(),
        "IO task started"
    );

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("IO task cancelled");
                break;
            }

            req = cmd_rx.recv() => {
                match req {
                    Some(Request::Send { bytes, reply }) => {
                        trace!(data = ?bytes, "TX");
                        let result = transport.send(&bytes).await;
                        let _ = reply.send(result);
                    }
                    Some(Request::Close { reply }) => {
                        debug!("IO task close requested");
                        let result = transport.close().await;
                        let _ = reply.send(result);
                        return;
                    }
                    None => {
                        debug!("all request senders dropped, exiting IO task");
                        break;
                    }
                }
            }

            // Idle: read whatever the deck has sent.
            _ = async {
                let mut buf = [0u8; 256];
                match transport.receive(&mut buf, IDLE_READ_TIMEOUT).await {
                    Ok(n) if n > 0 => {
                        read_failing = false;
                        trace!(data = ?&buf[..n], "RX");
                        decoder.feed(&buf[..n]);
                        while let Some(event) = decoder.next_event() {
                            publish(event, &event_tx, &state_tx);
                        }
                    }
                    Ok(_) | Err(Error::Timeout) => {
                        // The line is quiet, so buffered bytes are not part
                        // of a packet still arriving.
                        if decoder.pending() > 0 && decoder.drop_stale() > 0 {
                            while let Some(event) = decoder.next_event() {
                                publish(event, &event_tx, &state_tx);
                            }
                        }
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    Err(e) => {
                        // Warn once per failure streak, not on every retry.
                        if !read_failing {
                            warn!(error = %e, "receive failed");
                            read_failing = true;
                        }
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            } => {}
        }
    }
}

/// Update the state cache and broadcast an event.
///
/// The cache is written first, so a subscriber woken by the event already
/// sees the new value through the session accessors.
fn publish(
    event: VtrEvent,
    event_tx: &broadcast::Sender<VtrEvent>,
    state_tx: &watch::Sender<DeckState>,
) {
    debug!(%event, "event");
    state_tx.send_if_modified(|state| state.apply(&event));
    // No subscribers is not an error.
    let _ = event_tx.send(event);
}
