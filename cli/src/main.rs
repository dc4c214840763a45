// sony9pin -- send Sony 9-pin commands to a deck and print what it returns.
//
// Usage:
//   sony9pin --port /dev/ttyUSB0 play
//   sony9pin --ack stop
//   sony9pin status
//   sony9pin timecode ltc
//   sony9pin cue 01:02:03:12
//   sony9pin jog -20
//   sony9pin raw 0x61 0x20 0x0a
//   sony9pin monitor --duration 30

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::warn;

use sony9pin::commands::{self, time_sense};
use sony9pin::packet::encode_packet;
use sony9pin::{Timecode, Vtr, VtrBuilder, VtrEvent};

#[cfg(windows)]
const DEFAULT_PORT: &str = "COM1";
#[cfg(not(windows))]
const DEFAULT_PORT: &str = "/dev/ttyUSB0";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Control a Sony 9-pin (RS-422) deck from the command line.
#[derive(Parser, Debug)]
#[command(name = "sony9pin", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, default_value = DEFAULT_PORT)]
    port: String,

    /// Baud rate.
    #[arg(long, default_value_t = 38_400)]
    baud: u32,

    /// Enable debug logging (otherwise RUST_LOG applies).
    #[arg(long)]
    debug: bool,

    /// How long to print replies after sending, in milliseconds.
    #[arg(long, default_value_t = 500)]
    wait: u64,

    /// Wait for ACK/NAK and print the outcome.
    #[arg(long)]
    ack: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Query the device type.
    Device,

    /// Status sense (page 0, 10 bytes).
    Status,

    /// Current time sense.
    Timecode {
        #[arg(value_enum, default_value_t = TimeSource::Auto)]
        source: TimeSource,
    },

    Play,
    Stop,
    Record,
    StandbyOn,
    StandbyOff,
    Eject,

    /// Fast forward.
    Ff,

    /// Rewind.
    Rew,

    /// Cue up to a timecode (HH:MM:SS:FF).
    Cue { timecode: Timecode },

    /// Jog at the given speed (-127..127, negative is reverse).
    Jog {
        #[arg(allow_negative_numbers = true)]
        speed: i16,
    },

    /// Variable speed play (-127..127).
    Var {
        #[arg(allow_negative_numbers = true)]
        speed: i16,
    },

    /// Shuttle (-127..127).
    Shuttle {
        #[arg(allow_negative_numbers = true)]
        speed: i16,
    },

    /// Send an arbitrary command. Bytes are hex (0x..) or decimal.
    Raw {
        #[arg(value_parser = parse_byte)]
        cmd1: u8,
        #[arg(value_parser = parse_byte)]
        cmd2: u8,
        #[arg(value_parser = parse_byte)]
        data: Vec<u8>,
    },

    /// Print every event the deck sends.
    Monitor {
        /// Seconds to listen.
        #[arg(long, default_value_t = 10)]
        duration: u64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TimeSource {
    Auto,
    Ltc,
    Vitc,
}

impl TimeSource {
    fn flag(self) -> u8 {
        match self {
            TimeSource::Auto => time_sense::AUTO,
            TimeSource::Ltc => time_sense::LTC_TC,
            TimeSource::Vitc => time_sense::VITC_TC,
        }
    }
}

/// Parse "0x61", "0X61" or "97" into a u8.
fn parse_byte(s: &str) -> std::result::Result<u8, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).map_err(|e| format!("invalid hex byte: {e}")),
        None => s.parse().map_err(|e| format!("invalid byte: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

/// Wire bytes for a command, or `None` for commands that only listen.
fn command_bytes(command: &Command) -> Result<Option<Vec<u8>>> {
    let bytes = match command {
        Command::Device => commands::cmd_device_type(),
        Command::Status => commands::cmd_status_sense(0, 10),
        Command::Timecode { source } => commands::cmd_current_time_sense(source.flag()),
        Command::Play => commands::cmd_play(),
        Command::Stop => commands::cmd_stop(),
        Command::Record => commands::cmd_record(),
        Command::StandbyOn => commands::cmd_standby_on(),
        Command::StandbyOff => commands::cmd_standby_off(),
        Command::Eject => commands::cmd_eject(),
        Command::Ff => commands::cmd_fast_forward(),
        Command::Rew => commands::cmd_rewind(),
        Command::Cue { timecode } => commands::cmd_cue_up_with_data(timecode),
        Command::Jog { speed } => commands::cmd_jog(*speed),
        Command::Var { speed } => commands::cmd_var_speed(*speed),
        Command::Shuttle { speed } => commands::cmd_shuttle(*speed),
        Command::Raw { cmd1, cmd2, data } => {
            encode_packet(*cmd1, *cmd2, data).context("cannot encode raw command")?
        }
        Command::Monitor { .. } => return Ok(None),
    };
    Ok(Some(bytes))
}

async fn run(vtr: &Vtr, cli: &Cli) -> Result<()> {
    let mut events = vtr.subscribe();

    if let Command::Monitor { duration } = cli.command {
        print_events(&mut events, Duration::from_secs(duration), false).await;
        return Ok(());
    }
    let Some(bytes) = command_bytes(&cli.command)? else {
        return Ok(());
    };

    if cli.ack {
        let outcome = vtr
            .send_and_await_ack(&bytes, vtr.ack_timeout())
            .await
            .context("send failed")?;
        println!("{outcome}");
    } else {
        vtr.send(&bytes).await.context("send failed")?;
    }

    print_events(&mut events, Duration::from_millis(cli.wait), cli.ack).await;
    Ok(())
}

/// Print events until `window` elapses. With `skip_acks`, ACK/NAK are left
/// out since the outcome has already been printed.
async fn print_events(
    events: &mut broadcast::Receiver<VtrEvent>,
    window: Duration,
    skip_acks: bool,
) {
    let deadline = Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Ok(event)) => {
                if skip_acks && matches!(event, VtrEvent::Ack | VtrEvent::Nak(_)) {
                    continue;
                }
                println!("{event}");
            }
            Ok(Err(RecvError::Lagged(skipped))) => warn!(skipped, "event output lagged"),
            Ok(Err(RecvError::Closed)) | Err(_) => break,
        }
    }
}

fn init_logging(debug: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to init logging")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug)?;

    let vtr = VtrBuilder::new()
        .serial_port(&cli.port)
        .baud_rate(cli.baud)
        .build()
        .await
        .with_context(|| format!("failed to open {}", cli.port))?;

    let result = run(&vtr, &cli).await;
    if let Err(e) = vtr.close().await {
        warn!(error = %e, "close failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sony9pin").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let cli = parse(&["play"]);
        assert_eq!(cli.port, DEFAULT_PORT);
        assert_eq!(cli.baud, 38_400);
        assert_eq!(cli.wait, 500);
        assert!(!cli.debug);
        assert!(!cli.ack);
        assert_eq!(cli.command, Command::Play);
    }

    #[test]
    fn global_options() {
        let cli = parse(&["--port", "COM3", "--baud", "19200", "--ack", "--wait", "50", "stop"]);
        assert_eq!(cli.port, "COM3");
        assert_eq!(cli.baud, 19_200);
        assert_eq!(cli.wait, 50);
        assert!(cli.ack);
        assert_eq!(cli.command, Command::Stop);
    }

    #[test]
    fn hyphenated_subcommands() {
        assert_eq!(parse(&["standby-on"]).command, Command::StandbyOn);
        assert_eq!(parse(&["standby-off"]).command, Command::StandbyOff);
    }

    #[test]
    fn timecode_source() {
        assert_eq!(
            parse(&["timecode"]).command,
            Command::Timecode { source: TimeSource::Auto }
        );
        assert_eq!(
            parse(&["timecode", "vitc"]).command,
            Command::Timecode { source: TimeSource::Vitc }
        );
        assert!(Cli::try_parse_from(["sony9pin", "timecode", "smpte"]).is_err());
    }

    #[test]
    fn cue_parses_timecode() {
        assert_eq!(
            parse(&["cue", "01:02:03:12"]).command,
            Command::Cue { timecode: Timecode::new(1, 2, 3, 12) }
        );
        assert!(Cli::try_parse_from(["sony9pin", "cue", "1:2:3"]).is_err());
    }

    #[test]
    fn negative_speeds() {
        assert_eq!(parse(&["jog", "-20"]).command, Command::Jog { speed: -20 });
        assert_eq!(parse(&["shuttle", "64"]).command, Command::Shuttle { speed: 64 });
    }

    #[test]
    fn raw_accepts_hex_and_decimal() {
        assert_eq!(
            parse(&["raw", "0x61", "0x20", "10"]).command,
            Command::Raw { cmd1: 0x61, cmd2: 0x20, data: vec![0x0A] }
        );
        assert!(Cli::try_parse_from(["sony9pin", "raw", "0x61", "0x1FF"]).is_err());
    }

    #[test]
    fn monitor_duration() {
        assert_eq!(parse(&["monitor"]).command, Command::Monitor { duration: 10 });
        assert_eq!(
            parse(&["monitor", "--duration", "3"]).command,
            Command::Monitor { duration: 3 }
        );
    }

    #[test]
    fn parse_byte_forms() {
        assert_eq!(parse_byte("0x7f"), Ok(0x7F));
        assert_eq!(parse_byte("0XFF"), Ok(0xFF));
        assert_eq!(parse_byte("32"), Ok(32));
        assert!(parse_byte("256").is_err());
        assert!(parse_byte("0xZZ").is_err());
    }

    #[test]
    fn bytes_for_commands() {
        assert_eq!(
            command_bytes(&Command::Play).unwrap(),
            Some(vec![0x20, 0x01, 0x21])
        );
        assert_eq!(
            command_bytes(&Command::Raw { cmd1: 0x61, cmd2: 0x20, data: vec![0x0A] }).unwrap(),
            Some(vec![0x61, 0x20, 0x0A, 0x8B])
        );
        assert_eq!(command_bytes(&Command::Monitor { duration: 1 }).unwrap(), None);
        let oversized = Command::Raw { cmd1: 0x20, cmd2: 0x01, data: vec![0; 16] };
        assert!(command_bytes(&oversized).is_err());
    }
}
