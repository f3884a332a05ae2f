//! Collision-free log file naming and creation.

use std::sync::Arc;

use tracing::{debug, info};

use super::medium::{LogHandle, StorageMedium};
use crate::acquisition::RecordFormatter;
use crate::error::{AppResult, LoggerError};
use crate::session::SessionId;
use crate::tracing_init::ECHO_TARGET;

/// Highest file index tried for one subject.
pub const MAX_FILE_INDEX: u16 = 999;

/// `S{subject:03}E{index:03}.CSV`
pub fn log_file_name(subject: SessionId, index: u16) -> String {
    format!("S{:03}E{:03}.CSV", subject.get(), index)
}

/// The log file opened for this run, header already written.
pub struct LogFile {
    /// Filename on the medium
    pub name: String,
    /// Selected sequence index
    pub index: u16,
    /// Open append handle
    pub handle: Box<dyn LogHandle>,
}

impl std::fmt::Debug for LogFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFile")
            .field("name", &self.name)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Picks the first free file index for a subject and creates the file.
pub struct LogFileAllocator {
    medium: Arc<dyn StorageMedium>,
}

impl LogFileAllocator {
    pub fn new(medium: Arc<dyn StorageMedium>) -> Self {
        Self { medium }
    }

    /// Smallest index in `0..=999` whose name is not on the medium.
    pub async fn find_free_index(&self, subject: SessionId) -> AppResult<u16> {
        for index in 0..=MAX_FILE_INDEX {
            let name = log_file_name(subject, index);
            let taken = self
                .medium
                .exists(&name)
                .await
                .map_err(|e| LoggerError::Storage(format!("{e:#}")))?;
            if !taken {
                return Ok(index);
            }
            debug!(%name, "Log file name taken");
        }
        Err(LoggerError::FileIndexExhausted {
            subject: subject.get(),
            attempts: u32::from(MAX_FILE_INDEX) + 1,
        })
    }

    /// Create the log file for `subject` and write the header.
    ///
    /// The header is synced immediately so even a session without samples leaves a
    /// valid file behind.
    pub async fn allocate(
        &self,
        subject: SessionId,
        formatter: &RecordFormatter,
    ) -> AppResult<LogFile> {
        let index = self.find_free_index(subject).await?;
        let name = log_file_name(subject, index);

        let mut handle =
            self.medium
                .create_exclusive(&name)
                .await
                .map_err(|e| LoggerError::FileCreate {
                    name: name.clone(),
                    message: format!("{e:#}"),
                })?;

        let header = formatter.header();
        let written = match handle.append(&header).await {
            Ok(()) => handle.sync().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| LoggerError::Write(format!("{e:#}")))?;

        info!(%name, "Logging to file");
        info!(target: ECHO_TARGET, "{}", header.trim_end());
        Ok(LogFile {
            name,
            index,
            handle,
        })
    }
}
