//! In-memory storage medium.
//!
//! Keeps buffered and durable contents apart so tests can observe exactly what a power
//! loss would have kept. Clones share the same files.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::medium::{LogHandle, StorageMedium};

#[derive(Debug, Default)]
struct MemoryFile {
    durable: String,
    pending: String,
    syncs: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, MemoryFile>,
    fail_init: bool,
    fail_create: bool,
    fail_writes: bool,
}

/// Medium whose files exist only in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `name` is already on the medium.
    pub fn insert_existing(&self, name: &str) {
        self.state
            .lock()
            .files
            .insert(name.to_string(), MemoryFile::default());
    }

    /// Make `init` fail.
    pub fn fail_init(&self) {
        self.state.lock().fail_init = true;
    }

    /// Make `create_exclusive` fail even for free names.
    pub fn fail_create(&self) {
        self.state.lock().fail_create = true;
    }

    /// Make every append and sync on open handles fail.
    pub fn fail_writes(&self) {
        self.state.lock().fail_writes = true;
    }

    /// Names present on the medium, sorted.
    pub fn file_names(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }

    /// Contents of `name` that survived the last sync.
    pub fn durable_contents(&self, name: &str) -> Option<String> {
        self.state.lock().files.get(name).map(|f| f.durable.clone())
    }

    /// Bytes of `name` appended but not yet synced.
    pub fn pending_len(&self, name: &str) -> usize {
        self.state
            .lock()
            .files
            .get(name)
            .map_or(0, |f| f.pending.len())
    }

    /// Number of syncs issued on `name`.
    pub fn sync_count(&self, name: &str) -> u32 {
        self.state.lock().files.get(name).map_or(0, |f| f.syncs)
    }
}

#[async_trait]
impl StorageMedium for MemoryMedium {
    async fn init(&self) -> Result<()> {
        if self.state.lock().fail_init {
            bail!("card not present");
        }
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().files.contains_key(name))
    }

    async fn create_exclusive(&self, name: &str) -> Result<Box<dyn LogHandle>> {
        let mut state = self.state.lock();
        if state.fail_create {
            bail!("medium full");
        }
        if state.files.contains_key(name) {
            bail!("{} already exists", name);
        }
        state.files.insert(name.to_string(), MemoryFile::default());
        Ok(Box::new(MemoryLogHandle {
            name: name.to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryLogHandle {
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLogHandle {
    fn with_file<T>(&self, f: impl FnOnce(&mut MemoryFile) -> T) -> Result<T> {
        let mut state = self.state.lock();
        if state.fail_writes {
            bail!("write to {} failed", self.name);
        }
        let file = state
            .files
            .get_mut(&self.name)
            .ok_or_else(|| anyhow!("{} vanished", self.name))?;
        Ok(f(file))
    }
}

#[async_trait]
impl LogHandle for MemoryLogHandle {
    async fn append(&mut self, line: &str) -> Result<()> {
        self.with_file(|file| file.pending.push_str(line))
    }

    async fn sync(&mut self) -> Result<()> {
        self.with_file(|file| {
            let pending = std::mem::take(&mut file.pending);
            file.durable.push_str(&pending);
            file.syncs += 1;
        })
    }
}
