//! Session identifier line parser.
//!
//! A byte-at-a-time state machine, independent of any transport. Digits accumulate in
//! base 10, every other byte except `\n` is dropped, and `\n` completes the line.

use std::fmt;

use tracing::trace;

use crate::error::{AppResult, LoggerError};

/// Largest identifier a client may send.
pub const MAX_SESSION_ID: u16 = 999;

/// Accepted session (subject) number, always within `0..=999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u16);

impl SessionId {
    /// Numeric value.
    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u32> for SessionId {
    type Error = LoggerError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > u32::from(MAX_SESSION_ID) {
            return Err(LoggerError::SessionIdOutOfRange(value));
        }
        Ok(SessionId(value as u16))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// Result of feeding one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStep {
    /// Line not finished yet
    Pending,
    /// Line-end seen; identifier accepted
    Complete(SessionId),
}

/// Digit accumulator for one identifier line.
#[derive(Debug, Default, Clone)]
pub struct SessionIdParser {
    acc: u32,
    digits: usize,
}

impl SessionIdParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digits accepted so far.
    pub fn digits(&self) -> usize {
        self.digits
    }

    /// Feed one byte.
    ///
    /// The accumulator saturates, so arbitrarily long digit runs still end in the
    /// out-of-range error rather than wrapping. After `Complete` or an error the parser
    /// is reset.
    pub fn feed(&mut self, byte: u8) -> AppResult<ParseStep> {
        match byte {
            b'0'..=b'9' => {
                self.acc = self
                    .acc
                    .saturating_mul(10)
                    .saturating_add(u32::from(byte - b'0'));
                self.digits += 1;
                Ok(ParseStep::Pending)
            }
            b'\n' => {
                let value = std::mem::take(self).acc;
                SessionId::try_from(value).map(ParseStep::Complete)
            }
            other => {
                trace!(byte = other, "Ignoring non-digit byte");
                Ok(ParseStep::Pending)
            }
        }
    }
}

/// Parse a complete byte sequence, stopping at the first line-end.
///
/// Returns `Ok(None)` if no line-end is present.
pub fn parse_line(bytes: &[u8]) -> AppResult<Option<SessionId>> {
    let mut parser = SessionIdParser::new();
    for &byte in bytes {
        if let ParseStep::Complete(id) = parser.feed(byte)? {
            return Ok(Some(id));
        }
    }
    Ok(None)
}
