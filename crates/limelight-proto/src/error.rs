//! Protocol-level errors.

use thiserror::Error;

/// Errors produced while framing, parsing, or serializing IRC lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An I/O error on the underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A line exceeded the 512-byte limit.
    #[error("line too long: {actual} bytes (limit {limit})")]
    LineTooLong {
        /// Observed length in bytes.
        actual: usize,
        /// Maximum permitted length.
        limit: usize,
    },

    /// An empty line where a message was required.
    #[error("empty message")]
    EmptyMessage,

    /// The command token was missing or malformed.
    #[error("invalid command in line: {0:?}")]
    InvalidCommand(String),

    /// A NUL, CR, or LF byte embedded in message content.
    #[error("illegal character {0:?} in message")]
    IllegalCharacter(char),

    /// A WebSocket-level failure.
    #[error("websocket error: {0}")]
    WebSocket(String),
}
