//! Print every event a deck sends.
//!
//! Polls status and timecode once a second and prints all decoded events
//! with a relative timestamp. Runs for 30 seconds.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p sony9pin --example monitor -- /dev/ttyUSB0
//! ```

use std::time::Duration;

use sony9pin::commands::time_sense;
use sony9pin::{VtrBuilder, VtrEvent};

const MONITOR_DURATION: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let serial_port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let vtr = VtrBuilder::new().serial_port(&serial_port).build().await?;
    let mut events = vtr.subscribe();

    println!("{:<12} Event", "Timestamp");
    println!("{:-<12} {:-<50}", "", "");

    let start = tokio::time::Instant::now();
    let deadline = start + MONITOR_DURATION;
    let mut poll = tokio::time::interval(POLL_INTERVAL);

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        tokio::select! {
            _ = poll.tick() => {
                vtr.status_sense(0, 10).await?;
                vtr.current_time_sense(time_sense::AUTO).await?;
            }
            received = tokio::time::timeout(remaining, events.recv()) => {
                let event = match received {
                    Ok(Ok(event)) => event,
                    Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(n))) => {
                        println!("(skipped {} events)", n);
                        continue;
                    }
                    Ok(Err(_)) => break,
                    Err(_) => break,
                };

                let elapsed = start.elapsed();
                let timestamp = format!("{:>6}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis());
                match event {
                    VtrEvent::Status(flags) => println!("{} Status    {}", timestamp, flags),
                    VtrEvent::Timecode { cmd2, timecode } => {
                        println!("{} Timecode  {} (0x{:02X})", timestamp, timecode, cmd2)
                    }
                    other => println!("{} {}", timestamp, other),
                }
            }
        }
    }

    println!("\nMonitoring complete.");
    vtr.close().await?;
    Ok(())
}
