//! Cue a deck to a timecode and roll it.
//!
//! Waits for servo lock, cues to 01:00:00:00, starts playback and prints
//! the deck's timecode for a few seconds before stopping.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p sony9pin --example play -- /dev/ttyUSB0
//! ```

use std::time::Duration;

use sony9pin::commands::{cmd_play, cmd_stop, time_sense};
use sony9pin::{AckOutcome, Timecode, VtrBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let serial_port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    println!("Connecting to deck on {}...", serial_port);
    let vtr = VtrBuilder::new()
        .serial_port(&serial_port)
        .ack_timeout(Duration::from_millis(500))
        .build()
        .await?;

    vtr.device_type().await?;
    if let Some(event) = vtr
        .wait_for(sony9pin::EventKind::DeviceType, Duration::from_millis(500))
        .await?
    {
        println!("Device: {}", event);
    }

    if !vtr
        .wait_ready(Duration::from_secs(5), Duration::from_millis(250))
        .await?
    {
        anyhow::bail!("deck did not report servo lock");
    }

    let cue = Timecode::new(1, 0, 0, 0);
    println!("Cueing to {}...", cue);
    vtr.cue_up_with_data(&cue).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    match vtr
        .send_and_await_ack(&cmd_play(), vtr.ack_timeout())
        .await?
    {
        AckOutcome::Acked => println!("PLAY acknowledged"),
        other => anyhow::bail!("PLAY not accepted: {}", other),
    }

    vtr.poll_timecode(time_sense::AUTO, Duration::from_millis(200), Duration::from_secs(3))
        .await?;
    if let Some(tc) = vtr.last_timecode() {
        println!("Last timecode: {}", tc);
    }

    let outcome = vtr
        .send_and_await_ack(&cmd_stop(), vtr.ack_timeout())
        .await?;
    println!("STOP: {}", outcome);

    vtr.close().await?;
    Ok(())
}
