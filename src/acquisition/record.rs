//! Sample tuple and its text renderings.
//!
//! The persisted log is a header line followed by one line per sample:
//!
//! ```text
//! millis,epoch,sync,f1LV,f2LV,...
//! 1234, 1600000000, 2500, 100, 200, ...
//! ```
//!
//! The header is generated from the channel names, so its column count always equals
//! 3 + N for the N channels actually sampled.

use std::fmt::Write as _;

use super::channel::ChannelValue;
use crate::error::{AppResult, LoggerError};

/// Columns that precede the channel columns.
pub const FIXED_COLUMNS: [&str; 3] = ["millis", "epoch", "sync"];

const HEADER_SEPARATOR: &str = ",";
const RECORD_SEPARATOR: &str = ", ";

/// One acquisition: timestamps, sync line and every channel, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Milliseconds since process start at the sample tick
    pub relative_ms: u64,
    /// Seconds since the Unix epoch from the real-time clock
    pub epoch_seconds: i64,
    /// Range-mapped sync line value
    pub sync: i32,
    /// Channel readings in table order
    pub channels: Vec<ChannelValue>,
}

/// Renders samples against a fixed column schema.
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    channel_names: Vec<String>,
}

impl RecordFormatter {
    /// Formatter for the given channel names, in sampling order.
    pub fn new<I, S>(channel_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channel_names: channel_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Total number of columns (3 + N).
    pub fn column_count(&self) -> usize {
        FIXED_COLUMNS.len() + self.channel_names.len()
    }

    /// Header line, newline-terminated.
    pub fn header(&self) -> String {
        let mut line = FIXED_COLUMNS
            .iter()
            .copied()
            .chain(self.channel_names.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(HEADER_SEPARATOR);
        line.push('\n');
        line
    }

    /// Persisted record line, newline-terminated.
    ///
    /// Fails if the sample does not carry exactly one value per header channel.
    pub fn render(&self, sample: &Sample) -> AppResult<String> {
        self.check_width(sample)?;

        let mut line = String::with_capacity(16 + 8 * sample.channels.len());
        // Writing into a String cannot fail.
        let _ = write!(
            line,
            "{}{RECORD_SEPARATOR}{}{RECORD_SEPARATOR}{}",
            sample.relative_ms, sample.epoch_seconds, sample.sync
        );
        for value in &sample.channels {
            let _ = write!(line, "{RECORD_SEPARATOR}{value}");
        }
        line.push('\n');
        Ok(line)
    }

    /// Human-readable one-liner with the same field values, for the diagnostic echo.
    pub fn render_echo(&self, sample: &Sample) -> AppResult<String> {
        self.check_width(sample)?;

        let mut line = format!(
            "t={}ms epoch={} sync={} |",
            sample.relative_ms, sample.epoch_seconds, sample.sync
        );
        for (name, value) in self.channel_names.iter().zip(&sample.channels) {
            let _ = write!(line, " {name}={value}");
        }
        Ok(line)
    }

    fn check_width(&self, sample: &Sample) -> AppResult<()> {
        let actual = FIXED_COLUMNS.len() + sample.channels.len();
        if actual != self.column_count() {
            return Err(LoggerError::SchemaMismatch {
                expected: self.column_count(),
                actual,
            });
        }
        Ok(())
    }
}
