//! SD logger storage layer
//!
//! A small file store over a removable SD card, for persisting log records
//! from a resource-constrained device.

pub mod config;
pub mod error;
pub mod storage;
pub mod utils;

pub use config::LoggerConfig;
pub use error::{FormatError, MountError, SdLoggerError, StorageError};
pub use storage::{ActiveBackend, Backend, CanonicalPath, Diagnostics, SdLogger};
