//! Error types shared by the wire codec and the client.
//!
//! The event loop itself works in `std::io::Result`; codec failures raised
//! while framing inbound data are converted with [`Error::into_io`].

use std::io;
use thiserror::Error;

/// Errors surfaced by the codec and the request/response client.
#[derive(Debug, Error)]
pub enum Error {
    /// Could not establish the TCP connection.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailure {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// An outgoing message exceeds the payload cap.
    #[error("message too large: {len} > {max} bytes")]
    MessageTooLarge { len: usize, max: usize },

    /// A response header announced more than the payload cap.
    #[error("response too large: {len} > {max} bytes")]
    ResponseTooLarge { len: usize, max: usize },

    /// A response body is too short to hold a status code.
    #[error("truncated response: {len} body bytes, need at least 4")]
    TruncatedResponse { len: usize },

    /// The peer went away (or the call was interrupted) mid-transfer.
    #[error("truncated I/O: {0}")]
    TruncatedIo(&'static str),

    /// Malformed or oversized inbound frame.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A socket primitive (socket, bind, listen, accept, poll) failed.
    #[error("{context}: {source}")]
    Resource {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Convert into an `io::Error` for the event loop's error path.
    ///
    /// Framing failures become `InvalidData`, matching how the runtime
    /// reports protocol errors on a connection.
    pub fn into_io(self) -> io::Error {
        match self {
            Error::Io(e) => e,
            Error::Resource { source, .. } | Error::ConnectFailure { source, .. } => source,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_errors_become_invalid_data() {
        let err = Error::MessageTooLarge { len: 5000, max: 4096 }.into_io();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("5000"));
    }

    #[test]
    fn test_io_error_passes_through() {
        let err = Error::from(io::Error::new(io::ErrorKind::TimedOut, "slow")).into_io();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
