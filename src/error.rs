//! Unified error types for rtmp-handshake

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all handshake operations
#[derive(Debug)]
pub enum Error {
    /// I/O error during network operations
    Io(io::Error),
    /// Peer violated the handshake protocol
    Handshake(HandshakeError),
    /// Failed to bind the listening socket
    Bind { addr: SocketAddr, source: io::Error },
    /// Operation timed out
    Timeout,
    /// Connection was closed
    ConnectionClosed,
    /// Invalid configuration
    Config(String),
}

impl Error {
    /// Socket-level failure: disconnect, reset, short read or timeout
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_) | Error::ConnectionClosed | Error::Timeout)
    }

    /// Peer sent data that failed handshake validation
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Handshake(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Handshake(e) => write!(f, "Handshake error: {}", e),
            Error::Bind { addr, source } => write!(f, "Failed to bind {}: {}", addr, source),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Bind { source, .. } => Some(source),
            Error::Handshake(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        // read_exact style helpers report a peer close as UnexpectedEof
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::ConnectionClosed
        } else {
            Error::Io(err)
        }
    }
}

impl From<HandshakeError> for Error {
    fn from(err: HandshakeError) -> Self {
        Error::Handshake(err)
    }
}

/// Handshake-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// C0/S0 carried a version this side refuses
    InvalidVersion(u8),
    /// Echoed timestamp does not match the one we sent
    TimestampMismatch { expected: u32, actual: u32 },
    /// Echoed random payload differs, at the first differing byte offset
    RandomMismatch { offset: usize },
    /// Operation not valid in the current stage
    InvalidState,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::InvalidVersion(v) => write!(f, "Invalid RTMP version: {}", v),
            HandshakeError::TimestampMismatch { expected, actual } => write!(
                f,
                "Echoed timestamp mismatch: expected {}, got {}",
                expected, actual
            ),
            HandshakeError::RandomMismatch { offset } => {
                write!(f, "Echoed random data mismatch at byte {}", offset)
            }
            HandshakeError::InvalidState => write!(f, "Invalid handshake state"),
        }
    }
}

impl std::error::Error for HandshakeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_error_display() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "connection reset");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error"));

        let err = Error::Handshake(HandshakeError::InvalidVersion(6));
        assert!(err.to_string().contains("Handshake error"));
        assert!(err.to_string().contains("6"));

        let err = Error::Bind {
            addr: "127.0.0.1:1935".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:1935"));

        assert!(Error::Timeout.to_string().contains("timed out"));
        assert!(Error::ConnectionClosed.to_string().contains("closed"));
        assert!(Error::Config("bad port".into())
            .to_string()
            .contains("Configuration error"));
    }

    #[test]
    fn test_error_source() {
        let err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(StdError::source(&err).is_some());

        let err = Error::Handshake(HandshakeError::InvalidState);
        assert!(StdError::source(&err).is_some());

        assert!(StdError::source(&Error::Timeout).is_none());
    }

    #[test]
    fn test_from_conversions() {
        let err: Error = io::Error::new(io::ErrorKind::TimedOut, "timeout").into();
        assert!(matches!(err, Error::Io(_)));

        let err: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, Error::ConnectionClosed));

        let err: Error = HandshakeError::RandomMismatch { offset: 3 }.into();
        assert!(matches!(err, Error::Handshake(_)));
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::ConnectionClosed.is_transport());
        assert!(Error::Timeout.is_transport());
        assert!(!Error::ConnectionClosed.is_validation());

        let err: Error = HandshakeError::TimestampMismatch {
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_handshake_error_display() {
        assert!(HandshakeError::InvalidVersion(10)
            .to_string()
            .contains("10"));

        let err = HandshakeError::TimestampMismatch {
            expected: 1000,
            actual: 42,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("42"));

        assert!(HandshakeError::RandomMismatch { offset: 17 }
            .to_string()
            .contains("17"));

        assert!(HandshakeError::InvalidState.to_string().contains("state"));
    }
}
