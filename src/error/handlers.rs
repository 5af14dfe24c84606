//! Error handlers
//!
//! Reports failures on the diagnostic channel (the log).

use crate::error::types::{FormatError, MountError, StorageError};
use log::{error, warn};

/// Report a failed file operation.
///
/// Expected conditions (unmounted card, full card, missing file) are warnings;
/// anything else is an error.
pub fn report_storage_error(operation: &str, path: &str, err: &StorageError) {
    match err {
        StorageError::NotMounted
        | StorageError::InsufficientSpace { .. }
        | StorageError::NotFound(_) => {
            warn!("{} {} failed: {}", operation, path, err);
        }
        _ => {
            error!("{} {} failed: {}", operation, path, err);
        }
    }
}

/// Report a failed mount attempt
pub fn report_mount_error(err: &MountError) {
    match err {
        MountError::FilesystemMountFailure(_) => error!("Failed to mount filesystem. {}", err),
        MountError::DeviceInitFailure(_) => error!("Card Mount Failed. {}", err),
    }
}

/// Report a failed format request
pub fn report_format_error(err: &FormatError) {
    match err {
        FormatError::FormatUnsupported => warn!("Format requested: {}", err),
        _ => error!("Format and remount failed: {}", err),
    }
}
