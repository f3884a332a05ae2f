//! Storage medium seam.
//!
//! Mirrors the storage-writer split used elsewhere in the crate family: the medium owns
//! initialization and the namespace, and a handle owns one open file. All methods return
//! `anyhow::Result`; the allocator and scheduler fold failures into `LoggerError`.

use anyhow::Result;
use async_trait::async_trait;

/// Removable medium holding the log files.
#[async_trait]
pub trait StorageMedium: Send + Sync {
    /// Bring the medium up. Called once at startup; failure is fatal.
    async fn init(&self) -> Result<()>;

    /// Whether a file called `name` is already present.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Create `name`, failing if it already exists, and open it for appending.
    async fn create_exclusive(&self, name: &str) -> Result<Box<dyn LogHandle>>;
}

/// An open, append-only log file.
///
/// # Contract
/// - `append` is a buffered write; nothing is guaranteed durable until `sync`
/// - `sync` persists everything appended so far and is idempotent: calling it with
///   nothing new buffered leaves the file unchanged
#[async_trait]
pub trait LogHandle: Send {
    /// Buffer `line` for writing. `line` already carries its terminator.
    async fn append(&mut self, line: &str) -> Result<()>;

    /// Flush buffered data to the medium.
    async fn sync(&mut self) -> Result<()>;
}
