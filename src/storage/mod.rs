//! Card storage management
//!
//! Mount lifecycle, path normalization, capacity accounting and file
//! operations over one of two interchangeable storage stacks.

pub mod backend;
pub mod capacity;
pub mod card;
pub mod diagnostics;
pub mod mount;
pub mod operations;
pub mod path;
pub mod results;
pub mod vfs_fat;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Backend, CardType, DirEntry, EntryKind, FormatType, MountOptions, WriteMode};
pub use card::CardBackend;
pub use mount::{MountManager, MountState};
pub use operations::{DEFAULT_MOUNT_POINT, SdLogger};
pub use path::{CanonicalPath, MAX_PATH_LEN, normalize};
pub use results::{CapacitySnapshot, Diagnostics};
pub use vfs_fat::VfsFatBackend;

use crate::config::LoggerConfig;

/// Storage stack deployed by this build
#[cfg(feature = "card-backend")]
pub type ActiveBackend = CardBackend;

/// Storage stack deployed by this build
#[cfg(not(feature = "card-backend"))]
pub type ActiveBackend = VfsFatBackend;

#[cfg(feature = "card-backend")]
fn active_backend(config: &LoggerConfig) -> ActiveBackend {
    CardBackend::from_config(&config.card)
}

#[cfg(not(feature = "card-backend"))]
fn active_backend(config: &LoggerConfig) -> ActiveBackend {
    VfsFatBackend::from_config(&config.vfs_fat)
}

impl SdLogger<ActiveBackend> {
    /// Logger over the build's storage stack, unmounted
    pub fn from_config(config: &LoggerConfig) -> Self {
        SdLogger::new(active_backend(config), config.mount_options())
            .with_mount_point(config.mount.mount_point.clone())
    }
}
