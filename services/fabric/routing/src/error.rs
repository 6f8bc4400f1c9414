//! Routing error types.

use fabric_wire::WireError;
use thiserror::Error;

/// Construction errors for hops, paths and path options
///
/// The three kinds stay distinct so callers can tell a wrongly shaped input
/// from a well-shaped one with a bad value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Input has the wrong shape
    #[error("invalid type for {field}: expected {expected}, found {found}")]
    InvalidType {
        /// Offending field
        field: String,
        /// What was expected
        expected: &'static str,
        /// What was found
        found: &'static str,
    },

    /// Value is negative or too wide for its protocol field
    #[error("{field} out of range: {value} (allowed 0..={max})")]
    OutOfRange {
        /// Offending field
        field: String,
        /// Value as written
        value: String,
        /// Largest accepted value
        max: u64,
    },

    /// Mandatory field absent
    #[error("missing mandatory field: {0}")]
    MissingField(String),
}

/// Errors surfaced by the router and the resolvers
#[derive(Error, Debug)]
pub enum RoutingError {
    /// Command could not be handed to the transport
    #[error("send failed: {0}")]
    Send(#[from] WireError),

    /// Invalid path description
    #[error("invalid path: {0}")]
    Path(#[from] PathError),

    /// Static path file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Static path file is not JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
