//! Backend adapter
//!
//! The primitive operations every storage stack provides. Everything above
//! this trait is backend-agnostic.

use std::fmt;

use crate::config::SpiConfig;
use crate::error::{FormatError, MountError, StorageError};
use crate::storage::path::CanonicalPath;

/// Card classes reported after a mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardType {
    Sd,
    Sdhc,
    Sdxc,
    Mmc,
    Unknown,
    #[default]
    None,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Sd => "SD",
            CardType::Sdhc => "SDHC",
            CardType::Sdxc => "SDXC",
            CardType::Mmc => "MMC",
            CardType::Unknown => "UNKNOWN",
            CardType::None => "NONE",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem layout requested from a destructive format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatType {
    /// Let the backend pick from the medium size
    #[default]
    Auto,
    Fat12,
    Fat16,
    Fat32,
}

/// Options consumed on every mount
#[derive(Debug, Clone)]
pub struct MountOptions {
    pub spi: SpiConfig,
    pub format_if_mount_failed: bool,
    pub allocation_unit_size: u32,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            spi: SpiConfig::default(),
            format_if_mount_failed: false,
            allocation_unit_size: 16 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create or truncate
    Truncate,
    /// Create or append at the end
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One directory entry as enumerated by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// A low-level storage stack.
///
/// Implementations open a file handle per call and release it before
/// returning, on success and failure alike. Calls are only made while the
/// stack is mounted; the mount manager enforces that.
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Initialize the device and mount its filesystem
    fn begin(&mut self, options: &MountOptions) -> Result<CardType, MountError>;

    /// Unmount; failures are logged, never returned
    fn end(&mut self);

    fn supports_format(&self) -> bool {
        false
    }

    /// Erase the medium and lay down a fresh filesystem. Leaves the backend
    /// unmounted.
    fn format(
        &mut self,
        _format_type: FormatType,
        _options: &MountOptions,
    ) -> Result<(), FormatError> {
        Err(FormatError::FormatUnsupported)
    }

    fn write_file(
        &mut self,
        path: &CanonicalPath,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), StorageError>;

    fn read_file(&mut self, path: &CanonicalPath) -> Result<Vec<u8>, StorageError>;

    fn remove_file(&mut self, path: &CanonicalPath) -> Result<(), StorageError>;

    fn stat(&mut self, path: &CanonicalPath) -> Result<Option<EntryKind>, StorageError>;

    fn create_dir(&mut self, path: &CanonicalPath) -> Result<(), StorageError>;

    fn remove_dir(&mut self, path: &CanonicalPath) -> Result<(), StorageError>;

    /// Entries in backend-native order, without `.` and `..`
    fn list_dir(&mut self, path: &CanonicalPath) -> Result<Vec<DirEntry>, StorageError>;

    fn total_bytes(&mut self) -> Result<u64, StorageError>;

    fn free_bytes(&mut self) -> Result<u64, StorageError>;
}
