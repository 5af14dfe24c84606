//! Error types
//!
//! Defines the error taxonomy of the storage layer. Every error is returned to
//! the immediate caller; none are retried or escalated.

use std::fmt;
use std::io;

/// Mount lifecycle errors
#[derive(Debug)]
pub enum MountError {
    /// Medium absent or unresponsive
    DeviceInitFailure(String),
    /// Medium present but carries no usable filesystem
    FilesystemMountFailure(String),
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountError::DeviceInitFailure(msg) => {
                write!(f, "Failed to initialize the card: {}", msg)
            }
            MountError::FilesystemMountFailure(msg) => {
                write!(f, "Failed to mount filesystem: {}", msg)
            }
        }
    }
}

impl std::error::Error for MountError {}

/// Destructive format errors
#[derive(Debug)]
pub enum FormatError {
    /// The compiled backend cannot format the medium
    FormatUnsupported,
    FormatFailed(String),
    Remount(MountError),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::FormatUnsupported => write!(f, "Backend does not support formatting"),
            FormatError::FormatFailed(msg) => write!(f, "Format failed: {}", msg),
            FormatError::Remount(e) => write!(f, "Remount after format failed: {}", e),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<MountError> for FormatError {
    fn from(error: MountError) -> Self {
        FormatError::Remount(error)
    }
}

/// File and directory operation errors
#[derive(Debug)]
pub enum StorageError {
    NotMounted,
    OpenFailure(String),
    NotFound(String),
    InsufficientSpace { requested: u64, free: u64 },
    AlreadyExists(String),
    NotAFile(String),
    NotADirectory(String),
    /// The mount root itself cannot be removed
    RootDirectory,
    IoError(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotMounted => write!(f, "Card not mounted"),
            StorageError::OpenFailure(p) => write!(f, "Failed to open file: {}", p),
            StorageError::NotFound(p) => write!(f, "Not found: {}", p),
            StorageError::InsufficientSpace { requested, free } => write!(
                f,
                "Insufficient space: {} bytes requested, {} bytes free",
                requested, free
            ),
            StorageError::AlreadyExists(p) => write!(f, "Already exists: {}", p),
            StorageError::NotAFile(p) => write!(f, "Not a file: {}", p),
            StorageError::NotADirectory(p) => write!(f, "Not a directory: {}", p),
            StorageError::RootDirectory => write!(f, "Refusing to remove the mount root"),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

impl StorageError {
    /// Map a backend I/O error on `path`, keeping "absent" distinguishable.
    pub fn from_io(error: io::Error, path: &str) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.to_string()),
            _ => StorageError::IoError(error),
        }
    }
}

/// Top-level error for the logger process
#[derive(Debug)]
pub enum SdLoggerError {
    Mount(MountError),
    Format(FormatError),
    Storage(StorageError),
    Config(config::ConfigError),
}

impl fmt::Display for SdLoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdLoggerError::Mount(e) => write!(f, "Mount error: {}", e),
            SdLoggerError::Format(e) => write!(f, "Format error: {}", e),
            SdLoggerError::Storage(e) => write!(f, "Storage error: {}", e),
            SdLoggerError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for SdLoggerError {}

impl From<MountError> for SdLoggerError {
    fn from(error: MountError) -> Self {
        SdLoggerError::Mount(error)
    }
}

impl From<FormatError> for SdLoggerError {
    fn from(error: FormatError) -> Self {
        SdLoggerError::Format(error)
    }
}

impl From<StorageError> for SdLoggerError {
    fn from(error: StorageError) -> Self {
        SdLoggerError::Storage(error)
    }
}

impl From<config::ConfigError> for SdLoggerError {
    fn from(error: config::ConfigError) -> Self {
        SdLoggerError::Config(error)
    }
}
