//! RS-422 serial transport.
//!
//! [`SerialTransport`] drives a deck through a USB RS-422 adapter (or a
//! built-in port) exposed as a TTY or COM device. The 9-pin link runs at
//! 38400 baud with 8 data bits, odd parity and 1 stop bit, which is what
//! [`SerialConfig::default()`] gives you. Other values are handed to the
//! OS unchanged for odd hardware.
//!
//! ```no_run
//! use sony9pin_transport::SerialTransport;
//! use sony9pin_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> sony9pin_core::Result<()> {
//! let mut link = SerialTransport::open("/dev/ttyUSB0", 38400).await?;
//!
//! // DEVICE TYPE REQUEST
//! link.send(&[0x00, 0x11, 0x11]).await?;
//!
//! let mut reply = [0u8; 32];
//! let n = link.receive(&mut reply, Duration::from_millis(100)).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::io::ErrorKind;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, trace, warn};

use sony9pin_core::error::{Error, Result};
use sony9pin_core::transport::Transport;

/// Line settings for a serial link.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    /// Odd on every 9-pin deck.
    pub parity: Parity,
    /// RS-422 has no handshake lines, so this is normally `None`.
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baud_rate: 38400,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::Odd,
            flow_control: FlowControl::None,
        }
    }
}

impl fmt::Display for SerialConfig {
    /// Conventional `38400 8O1` notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = match self.data_bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(f, "{} {}{}{}", self.baud_rate, data, self.parity, stop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            n => Err(Error::InvalidParameter(format!("unsupported data bits: {n}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            n => Err(Error::InvalidParameter(format!("unsupported stop bits: {n}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl FromStr for Parity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "odd" | "o" => Ok(Parity::Odd),
            "even" | "e" => Ok(Parity::Even),
            _ => Err(Error::InvalidParameter(format!("unknown parity: '{s}'"))),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Parity::None => "N",
            Parity::Odd => "O",
            Parity::Even => "E",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

// Mappings onto the tokio-serial enums.

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => Self::Five,
            DataBits::Six => Self::Six,
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => Self::None,
            FlowControl::Software => Self::Software,
            FlowControl::Hardware => Self::Hardware,
        }
    }
}

/// A deck reached over a serial port.
pub struct SerialTransport {
    stream: Option<SerialStream>,
    path: String,
}

impl SerialTransport {
    /// Open `path` at `baud_rate` with 9-pin line settings (8O1).
    pub async fn open(path: &str, baud_rate: u32) -> Result<Self> {
        Self::open_with_config(
            path,
            SerialConfig {
                baud_rate,
                ..SerialConfig::default()
            },
        )
        .await
    }

    /// Open `path` with explicit line settings.
    ///
    /// ```no_run
    /// # use sony9pin_transport::{SerialTransport, SerialConfig, Parity};
    /// # async fn example() -> sony9pin_core::Result<()> {
    /// let config = SerialConfig {
    ///     parity: Parity::Even,
    ///     ..SerialConfig::default()
    /// };
    /// let link = SerialTransport::open_with_config("COM3", config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open_with_config(path: &str, config: SerialConfig) -> Result<Self> {
        debug!(path, line = %config, flow = ?config.flow_control, "opening RS-422 port");

        let stream = tokio_serial::new(path, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                error!(path, error = %e, "cannot open RS-422 port");
                Error::Transport(format!("cannot open {path}: {e}"))
            })?;

        info!(path, line = %config, "RS-422 port open");

        Ok(SerialTransport {
            stream: Some(stream),
            path: path.to_string(),
        })
    }

    /// Device path this transport was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A vanished adapter shows up as a broken pipe or a not-connected error.
fn link_error(e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        trace!(path = %self.path, tx = ?data, "tx");

        let written = match stream.write_all(data).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| {
            error!(path = %self.path, error = %e, "write failed");
            link_error(e)
        })
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Err(_) => Err(Error::Timeout),
            Ok(Ok(n)) => {
                trace!(path = %self.path, rx = ?&buf[..n], "rx");
                Ok(n)
            }
            Ok(Err(e)) => {
                error!(path = %self.path, error = %e, "read failed");
                Err(link_error(e))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        if let Err(e) = stream.flush().await {
            warn!(path = %self.path, error = %e, "flush on close failed");
        }
        info!(path = %self.path, "RS-422 port closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn link_name(&self) -> &str {
        &self.path
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!(path = %self.path, "RS-422 port dropped without close");
        }
    }
}
