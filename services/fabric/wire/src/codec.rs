//! JSON-lines encoding of controller events and commands.
//!
//! One message per line. Blank lines and lines starting with `#` are
//! skipped so recorded event feeds can carry comments.

use crate::error::WireError;
use crate::event::{ControllerCommand, ControllerEvent};
use tracing::trace;

/// Stateful line decoder; tracks the line number for diagnostics
#[derive(Debug, Default)]
pub struct EventDecoder {
    line_no: u64,
}

impl EventDecoder {
    /// Create a decoder positioned before the first line
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines consumed so far
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    /// Decode one line; `Ok(None)` for blank or comment lines
    pub fn decode_line(&mut self, line: &str) -> Result<Option<ControllerEvent>, WireError> {
        self.line_no += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let event = decode_event(trimmed)?;
        trace!("decoded {} event at line {}", event.kind(), self.line_no);
        Ok(Some(event))
    }
}

/// Decode a single event
pub fn decode_event(text: &str) -> Result<ControllerEvent, WireError> {
    if text.trim().is_empty() {
        return Err(WireError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

/// Encode a single command as one line (no trailing newline)
pub fn encode_command(command: &ControllerCommand) -> Result<String, WireError> {
    Ok(serde_json::to_string(command)?)
}

/// Encode a single event as one line (no trailing newline)
pub fn encode_event(event: &ControllerEvent) -> Result<String, WireError> {
    Ok(serde_json::to_string(event)?)
}
