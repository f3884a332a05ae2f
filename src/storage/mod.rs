//! Log storage: the medium seam, its implementations, and file allocation.

pub mod allocator;
pub mod directory;
pub mod medium;
pub mod memory;

pub use allocator::{log_file_name, LogFile, LogFileAllocator, MAX_FILE_INDEX};
pub use directory::DirectoryMedium;
pub use medium::{LogHandle, StorageMedium};
pub use memory::MemoryMedium;
