//! Wire error types.

use thiserror::Error;

/// Errors raised while decoding controller events or emitting commands
#[derive(Error, Debug)]
pub enum WireError {
    /// Event or command line is not valid JSON for the expected shape
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// MAC address text could not be parsed
    #[error("invalid mac address: {0}")]
    InvalidMac(String),

    /// Empty line where a message was expected
    #[error("empty message")]
    Empty,

    /// The command channel towards the switches is gone
    #[error("command channel closed")]
    ChannelClosed,
}
