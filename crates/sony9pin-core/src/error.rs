//! Error types for sony9pin.
//!
//! A NAK from the deck is *not* an error. It is reported as data (see
//! `AckOutcome` in `sony9pin-vtr` and
//! [`VtrEvent::Nak`](crate::events::VtrEvent::Nak)). Errors are for link
//! failures, malformed input and use of a closed session.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port could not be opened, written or closed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Bytes that do not form a valid packet or timecode.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No bytes arrived from the transport before the deadline.
    #[error("timed out waiting for the deck")]
    Timeout,

    /// Rejected by an encoder or builder before anything was sent.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The session or transport has been closed.
    #[error("not connected")]
    NotConnected,

    /// The adapter went away under an open session.
    #[error("connection lost")]
    ConnectionLost,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            Error::Transport("cannot open COM9".into()).to_string(),
            "transport error: cannot open COM9"
        );
        assert_eq!(
            Error::Protocol("invalid BCD byte 0x1a".into()).to_string(),
            "protocol error: invalid BCD byte 0x1a"
        );
        assert_eq!(Error::Timeout.to_string(), "timed out waiting for the deck");
        assert_eq!(
            Error::InvalidParameter("data length 16 exceeds 15".into()).to_string(),
            "invalid parameter: data length 16 exceeds 15"
        );
        assert_eq!(Error::NotConnected.to_string(), "not connected");
        assert_eq!(Error::ConnectionLost.to_string(), "connection lost");
    }

    #[test]
    fn io_errors_convert() {
        let e: Error = std::io::Error::new(std::io::ErrorKind::TimedOut, "adapter stalled").into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().ends_with("adapter stalled"));
    }

    #[test]
    fn error_can_cross_tasks() {
        fn assert_bounds<T: Send + Sync + std::error::Error + 'static>() {}
        assert_bounds::<Error>();
    }
}
