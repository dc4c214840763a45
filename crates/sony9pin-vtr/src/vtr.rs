//! The [`Vtr`] session: one controlled deck.
//!
//! A `Vtr` owns a background IO task that holds the transport. Every
//! method here queues bytes to that task; replies come back as
//! [`VtrEvent`]s on a broadcast channel and update the last-observed
//! [`DeckState`].
//!
//! Most deck commands are fire-and-forget, the way decks are usually driven:
//! the method returns once the bytes are written, and callers that care
//! about the reply either subscribe to events or use
//! [`send_and_await_ack`](Vtr::send_and_await_ack).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};

use sony9pin_core::error::{Error, Result};
use sony9pin_core::events::{EventKind, VtrEvent};
use sony9pin_core::types::{NakReasons, StatusFlags, Timecode};

use crate::commands;
use crate::io::{DeckState, VtrIo};
use crate::packet::{encode_packet, Packet};

/// Result of a command that waited for its acknowledgement.
///
/// NAK and timeout are outcomes, not errors: the command reached the
/// transport and the deck either refused it or stayed silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The deck acknowledged the command.
    Acked,
    /// The deck rejected the command.
    Nakked(NakReasons),
    /// Neither ACK nor NAK arrived in time.
    TimedOut,
}

impl AckOutcome {
    pub fn is_acked(&self) -> bool {
        matches!(self, AckOutcome::Acked)
    }
}

impl fmt::Display for AckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckOutcome::Acked => write!(f, "ACK"),
            AckOutcome::Nakked(reasons) => write!(f, "NAK {reasons}"),
            AckOutcome::TimedOut => write!(f, "TIMEOUT"),
        }
    }
}

/// A subscription that only yields events of one [`EventKind`].
///
/// Dropping the subscription unsubscribes.
pub struct EventSubscription {
    rx: broadcast::Receiver<VtrEvent>,
    kind: EventKind,
}

impl EventSubscription {
    /// The kind of event this subscription yields.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Wait for the next event of this subscription's kind.
    ///
    /// If the subscriber falls behind, the missed events are skipped and
    /// the wait continues with the oldest retained one.
    pub async fn recv(&mut self) -> Result<VtrEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.kind() == self.kind => return Ok(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(kind = ?self.kind, skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => return Err(Error::NotConnected),
            }
        }
    }
}

/// A connected deck controlled over the 9-pin protocol.
///
/// Constructed via [`VtrBuilder`](crate::builder::VtrBuilder).
pub struct Vtr {
    io: VtrIo,
    event_tx: broadcast::Sender<VtrEvent>,
    ack_timeout: Duration,
    /// Held for the whole of an acknowledgement exchange, so that at most
    /// one ACK/NAK wait is in flight.
    exchange: Mutex<()>,
    closed: AtomicBool,
}

impl Drop for Vtr {
    fn drop(&mut self) {
        // Graceful: signal the IO loop to exit at the next select iteration.
        self.io.cancel.cancel();
        // Abort in case it is stuck in a transport read that ignores the
        // cancellation token.
        self.io.task.abort();
    }
}

impl Vtr {
    /// Create a session around a running IO task.
    ///
    /// Called by [`VtrBuilder`](crate::builder::VtrBuilder); callers should
    /// use the builder API instead.
    pub(crate) fn new(
        io: VtrIo,
        event_tx: broadcast::Sender<VtrEvent>,
        ack_timeout: Duration,
    ) -> Self {
        Vtr {
            io,
            event_tx,
            ack_timeout,
            exchange: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// The default timeout used by [`command_and_await_ack`](Self::command_and_await_ack)
    /// when no explicit timeout is given.
    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// Whether the session is open and its IO task is running.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.io.task.is_finished()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Raw sending
    // ---------------------------------------------------------------

    /// Write already-encoded bytes to the deck.
    ///
    /// Returns once the bytes have been written and flushed. Transport
    /// failures are returned for this call only; the session stays usable.
    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.io.send(bytes.to_vec()).await
    }

    /// Encode and write a [`Packet`].
    pub async fn send_packet(&self, packet: &Packet) -> Result<()> {
        let bytes = packet.to_bytes()?;
        self.send(&bytes).await
    }

    /// Encode and write an arbitrary command. This is the primitive every
    /// catalog helper, including the vendor extensions, is built on.
    pub async fn send_command(&self, cmd1: u8, cmd2: u8, data: &[u8]) -> Result<()> {
        let bytes = encode_packet(cmd1, cmd2, data)?;
        self.send(&bytes).await
    }

    /// Write `bytes` and wait up to `timeout` for the deck's ACK or NAK.
    ///
    /// The event subscription is taken before the bytes are written, so a
    /// reply that arrives immediately is not missed. Concurrent calls are
    /// serialized.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use sony9pin_vtr::{AckOutcome, Vtr};
    /// # use std::time::Duration;
    /// # async fn example(vtr: &Vtr) -> sony9pin_core::Result<()> {
    /// let play = sony9pin_vtr::commands::cmd_play();
    /// match vtr.send_and_await_ack(&play, Duration::from_millis(800)).await? {
    ///     AckOutcome::Acked => println!("playing"),
    ///     AckOutcome::Nakked(reasons) => println!("refused: {reasons}"),
    ///     AckOutcome::TimedOut => println!("no reply"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_and_await_ack(&self, bytes: &[u8], timeout: Duration) -> Result<AckOutcome> {
        let _exchange = self.exchange.lock().await;
        let mut rx = self.event_tx.subscribe();

        self.send(bytes).await?;

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(VtrEvent::Ack) => return Ok(AckOutcome::Acked),
                    Ok(VtrEvent::Nak(reasons)) => return Ok(AckOutcome::Nakked(reasons)),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return Err(Error::NotConnected),
                }
            }
        };

        let outcome = match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result?,
            Err(_) => AckOutcome::TimedOut,
        };
        debug!(%outcome, "acknowledgement");
        Ok(outcome)
    }

    /// Encode a command, write it, and wait for its acknowledgement.
    ///
    /// `timeout` defaults to the session's [`ack_timeout`](Self::ack_timeout).
    pub async fn command_and_await_ack(
        &self,
        cmd1: u8,
        cmd2: u8,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> Result<AckOutcome> {
        let bytes = encode_packet(cmd1, cmd2, data)?;
        self.send_and_await_ack(&bytes, timeout.unwrap_or(self.ack_timeout))
            .await
    }

    // ---------------------------------------------------------------
    // Events and observed state
    // ---------------------------------------------------------------

    /// Subscribe to every event decoded from the deck.
    pub fn subscribe(&self) -> broadcast::Receiver<VtrEvent> {
        self.event_tx.subscribe()
    }

    /// Subscribe to events of a single kind.
    pub fn subscribe_kind(&self, kind: EventKind) -> EventSubscription {
        EventSubscription {
            rx: self.event_tx.subscribe(),
            kind,
        }
    }

    /// Snapshot of everything last reported by the deck.
    pub fn state(&self) -> DeckState {
        *self.io.state.borrow()
    }

    pub fn last_status(&self) -> Option<StatusFlags> {
        self.io.state.borrow().status
    }

    pub fn last_timecode(&self) -> Option<Timecode> {
        self.io.state.borrow().timecode
    }

    pub fn last_device_type(&self) -> Option<u16> {
        self.io.state.borrow().device_type
    }

    /// Wait up to `timeout` for the next event of `kind`.
    ///
    /// Returns `Ok(None)` on timeout. Only events arriving after the call
    /// are considered.
    pub async fn wait_for(&self, kind: EventKind, timeout: Duration) -> Result<Option<VtrEvent>> {
        self.ensure_open()?;
        let mut sub = self.subscribe_kind(kind);
        match tokio::time::timeout(timeout, sub.recv()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Poll status until the servo reports lock.
    ///
    /// Sends a status sense every `interval` and returns `true` as soon as
    /// a status reply carries `SERVO_LOCK`, or `false` once `timeout` has
    /// elapsed without one.
    pub async fn wait_ready(&self, timeout: Duration, interval: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            let next_poll = (Instant::now() + interval).min(deadline);
            let mut sub = self.subscribe_kind(EventKind::Status);
            self.status_sense(0, 10).await?;

            loop {
                match tokio::time::timeout_at(next_poll, sub.recv()).await {
                    Ok(Ok(VtrEvent::Status(flags))) if flags.contains(StatusFlags::SERVO_LOCK) => {
                        return Ok(true);
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => return Err(e),
                    Err(_) => break,
                }
            }
        }

        debug!(?timeout, "deck did not report servo lock");
        Ok(false)
    }

    /// Send a current time sense every `interval` for `duration`.
    ///
    /// Replies arrive as [`VtrEvent::Timecode`] events and update
    /// [`last_timecode`](Self::last_timecode).
    pub async fn poll_timecode(&self, flag: u8, interval: Duration, duration: Duration) -> Result<()> {
        let end = Instant::now() + duration;
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if Instant::now() >= end {
                return Ok(());
            }
            self.current_time_sense(flag).await?;
        }
    }

    // ---------------------------------------------------------------
    // Transport control
    // ---------------------------------------------------------------

    pub async fn play(&self) -> Result<()> {
        self.send(&commands::cmd_play()).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(&commands::cmd_stop()).await
    }

    pub async fn record(&self) -> Result<()> {
        self.send(&commands::cmd_record()).await
    }

    pub async fn standby_on(&self) -> Result<()> {
        self.send(&commands::cmd_standby_on()).await
    }

    pub async fn standby_off(&self) -> Result<()> {
        self.send(&commands::cmd_standby_off()).await
    }

    pub async fn eject(&self) -> Result<()> {
        self.send(&commands::cmd_eject()).await
    }

    pub async fn fast_forward(&self) -> Result<()> {
        self.send(&commands::cmd_fast_forward()).await
    }

    pub async fn rewind(&self) -> Result<()> {
        self.send(&commands::cmd_rewind()).await
    }

    pub async fn sync_play(&self) -> Result<()> {
        self.send(&commands::cmd_sync_play()).await
    }

    pub async fn preroll(&self) -> Result<()> {
        self.send(&commands::cmd_preroll()).await
    }

    pub async fn preview(&self) -> Result<()> {
        self.send(&commands::cmd_preview()).await
    }

    pub async fn review(&self) -> Result<()> {
        self.send(&commands::cmd_review()).await
    }

    /// Cue up to `tc`.
    pub async fn cue_up_with_data(&self, tc: &Timecode) -> Result<()> {
        self.send(&commands::cmd_cue_up_with_data(tc)).await
    }

    /// Jog at a signed speed; negative is reverse. Clamped to -127..=127.
    pub async fn jog(&self, speed: i16) -> Result<()> {
        self.send(&commands::cmd_jog(speed)).await
    }

    /// Variable-speed play; negative is reverse. Clamped to -127..=127.
    pub async fn var_speed(&self, speed: i16) -> Result<()> {
        self.send(&commands::cmd_var_speed(speed)).await
    }

    /// Shuttle; negative is reverse. Clamped to -127..=127.
    pub async fn shuttle(&self, speed: i16) -> Result<()> {
        self.send(&commands::cmd_shuttle(speed)).await
    }

    pub async fn frame_step_forward(&self) -> Result<()> {
        self.send(&commands::cmd_frame_step_forward()).await
    }

    pub async fn frame_step_reverse(&self) -> Result<()> {
        self.send(&commands::cmd_frame_step_reverse()).await
    }

    // ---------------------------------------------------------------
    // Sense requests
    // ---------------------------------------------------------------

    /// Request status bytes `start..start + size`. The reply arrives as
    /// [`VtrEvent::Status`].
    pub async fn status_sense(&self, start: u8, size: u8) -> Result<()> {
        self.send(&commands::cmd_status_sense(start, size)).await
    }

    /// Request the current time; `flag` selects the source (see
    /// [`commands::time_sense`]).
    pub async fn current_time_sense(&self, flag: u8) -> Result<()> {
        self.send(&commands::cmd_current_time_sense(flag)).await
    }

    pub async fn tc_gen_sense(&self) -> Result<()> {
        self.send(&commands::cmd_tc_gen_sense()).await
    }

    pub async fn in_data_sense(&self) -> Result<()> {
        self.send(&commands::cmd_in_data_sense()).await
    }

    pub async fn out_data_sense(&self) -> Result<()> {
        self.send(&commands::cmd_out_data_sense()).await
    }

    /// Request the device type. The reply arrives as
    /// [`VtrEvent::DeviceType`].
    pub async fn device_type(&self) -> Result<()> {
        self.send(&commands::cmd_device_type()).await
    }

    // ---------------------------------------------------------------
    // System control
    // ---------------------------------------------------------------

    pub async fn local_enable(&self) -> Result<()> {
        self.send(&commands::cmd_local_enable()).await
    }

    pub async fn local_disable(&self) -> Result<()> {
        self.send(&commands::cmd_local_disable()).await
    }

    // ---------------------------------------------------------------
    // Preset / select
    // ---------------------------------------------------------------

    pub async fn in_entry(&self) -> Result<()> {
        self.send(&commands::cmd_in_entry()).await
    }

    pub async fn out_entry(&self) -> Result<()> {
        self.send(&commands::cmd_out_entry()).await
    }

    pub async fn in_data_preset(&self, tc: &Timecode) -> Result<()> {
        self.send(&commands::cmd_in_data_preset(tc)).await
    }

    pub async fn out_data_preset(&self, tc: &Timecode) -> Result<()> {
        self.send(&commands::cmd_out_data_preset(tc)).await
    }

    pub async fn preroll_preset(&self, tc: &Timecode) -> Result<()> {
        self.send(&commands::cmd_preroll_preset(tc)).await
    }

    pub async fn auto_mode_on(&self) -> Result<()> {
        self.send(&commands::cmd_auto_mode_on()).await
    }

    pub async fn auto_mode_off(&self) -> Result<()> {
        self.send(&commands::cmd_auto_mode_off()).await
    }

    pub async fn input_check(&self) -> Result<()> {
        self.send(&commands::cmd_input_check()).await
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Close the transport and stop the IO task.
    ///
    /// Every later operation, including a second `close`, returns
    /// [`Error::NotConnected`].
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::NotConnected);
        }
        debug!("closing session");
        self.io.close().await
    }
}
