//! Storage operations
//!
//! The file operations facade: write, append, read, delete, directory
//! management and lookups. Every call normalizes its path, refuses to touch
//! the backend while the card is unmounted, and reports failures before
//! returning them.

use log::{debug, info, warn};

use crate::error::handlers::report_storage_error;
use crate::error::{FormatError, MountError, StorageError};
use crate::storage::backend::{Backend, EntryKind, FormatType, MountOptions, WriteMode};
use crate::storage::mount::{MountManager, MountState};
use crate::storage::path::{CanonicalPath, normalize};
use crate::storage::results::CapacitySnapshot;

pub const DEFAULT_MOUNT_POINT: &str = "/sdcard";

/// Backend-agnostic file store on a removable card.
///
/// Single writer: callers serialize every call. Operations block for the
/// duration of the backend I/O and cannot be cancelled.
pub struct SdLogger<B: Backend> {
    mount: MountManager<B>,
    mount_point: String,
}

impl<B: Backend> SdLogger<B> {
    pub fn new(backend: B, options: MountOptions) -> Self {
        Self {
            mount: MountManager::new(backend, options),
            mount_point: DEFAULT_MOUNT_POINT.to_string(),
        }
    }

    pub fn with_mount_point(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = mount_point.into();
        self
    }

    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    // --------------------
    // Mount lifecycle
    // --------------------

    pub fn mount(&mut self) -> Result<MountState, MountError> {
        self.mount.mount()
    }

    pub fn unmount(&mut self) {
        self.mount.unmount();
    }

    /// Erase the card and remount it. Destructive; never called implicitly.
    pub fn format_and_remount(&mut self, format_type: FormatType) -> Result<(), FormatError> {
        self.mount.format_and_remount(format_type)
    }

    pub fn state(&self) -> MountState {
        self.mount.state()
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_mounted()
    }

    // --------------------
    // Capacity
    // --------------------

    pub fn capacity(&mut self) -> Result<CapacitySnapshot, StorageError> {
        self.mount.capacity()
    }

    pub fn has_enough_space(&mut self, requested_bytes: u64) -> bool {
        self.mount.has_enough_space(requested_bytes)
    }

    // --------------------
    // File operations
    // --------------------

    /// Replace `filename` with `payload`, creating it if needed
    pub fn write(&mut self, filename: &str, payload: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(filename);
        let result = self.store(&path, payload, WriteMode::Truncate);
        self.finish("write", &path, result)
    }

    /// Append `payload` to `filename`, creating it if needed
    pub fn append(&mut self, filename: &str, payload: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(filename);
        let result = self.store(&path, payload, WriteMode::Append);
        self.finish("append", &path, result)
    }

    /// Full content of `filename`, byte for byte
    pub fn read(&mut self, filename: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(filename);
        let result = self.backend(&path).and_then(|backend| backend.read_file(&path));
        if let Ok(content) = &result {
            debug!("Read {} bytes from {}", content.len(), path.under(&self.mount_point));
        }
        self.finish("read", &path, result)
    }

    /// Remove `filename`; a missing file is an error
    pub fn delete(&mut self, filename: &str) -> Result<(), StorageError> {
        let path = self.resolve(filename);
        let result = self.backend(&path).and_then(|backend| backend.remove_file(&path));
        if result.is_ok() {
            info!("Deleted file {}", path.under(&self.mount_point));
        }
        self.finish("delete", &path, result)
    }

    pub fn create_directory(&mut self, dir: &str) -> Result<(), StorageError> {
        let path = self.resolve(dir);
        let result = self.backend(&path).and_then(|backend| backend.create_dir(&path));
        if result.is_ok() {
            info!("Created directory {}", path.under(&self.mount_point));
        }
        self.finish("mkdir", &path, result)
    }

    /// Remove an empty directory; contents are not removed recursively.
    /// The mount root is never removed.
    pub fn remove_directory(&mut self, dir: &str) -> Result<(), StorageError> {
        let path = self.resolve(dir);
        let result = self.backend(&path).and_then(|backend| {
            if path.is_root() {
                return Err(StorageError::RootDirectory);
            }
            backend.remove_dir(&path)
        });
        if result.is_ok() {
            info!("Removed directory {}", path.under(&self.mount_point));
        }
        self.finish("rmdir", &path, result)
    }

    /// True only for an existing regular file on a mounted card
    pub fn file_exists(&mut self, filename: &str) -> bool {
        let path = self.resolve(filename);
        if !self.is_mounted() {
            return false;
        }
        match self.mount.backend_mut().stat(&path) {
            Ok(kind) => kind == Some(EntryKind::File),
            Err(e) => {
                report_storage_error("stat", &path.under(&self.mount_point), &e);
                false
            }
        }
    }

    /// Path of the first regular file in `dir`, in the backend's own
    /// enumeration order. Subdirectories are skipped.
    pub fn first_file_in_directory(&mut self, dir: &str) -> Result<CanonicalPath, StorageError> {
        let path = self.resolve(dir);
        let result = self
            .backend(&path)
            .and_then(|backend| backend.list_dir(&path))
            .and_then(|entries| {
                entries
                    .into_iter()
                    .find(|entry| entry.is_file())
                    .map(|entry| path.join(&entry.name))
                    .ok_or_else(|| StorageError::NotFound(path.to_string()))
            });
        self.finish("first file in", &path, result)
    }

    /// [`first_file_in_directory`](Self::first_file_in_directory) on the root
    pub fn first_file(&mut self) -> Result<CanonicalPath, StorageError> {
        self.first_file_in_directory("/")
    }

    // --------------------
    // Helpers
    // --------------------

    pub(crate) fn mount_manager(&mut self) -> &mut MountManager<B> {
        &mut self.mount
    }

    fn resolve(&self, name: &str) -> CanonicalPath {
        let path = normalize(name);
        if path.exceeds_backend_limit() {
            warn!(
                "Path {} is {} bytes, beyond what the card stack accepts",
                path,
                path.as_str().len()
            );
        }
        path
    }

    /// The backend, or `NotMounted` without touching it
    fn backend(&mut self, path: &CanonicalPath) -> Result<&mut B, StorageError> {
        if !self.mount.is_mounted() {
            debug!("Rejecting access to {}: card not mounted", path);
            return Err(StorageError::NotMounted);
        }
        Ok(self.mount.backend_mut())
    }

    fn store(
        &mut self,
        path: &CanonicalPath,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        if !self.mount.is_mounted() {
            return Err(StorageError::NotMounted);
        }
        self.mount.check_space(payload.len() as u64)?;
        self.mount.backend_mut().write_file(path, payload, mode)?;
        debug!(
            "Stored {} bytes to {} ({:?})",
            payload.len(),
            path.under(&self.mount_point),
            mode
        );
        Ok(())
    }

    fn finish<T>(
        &self,
        operation: &str,
        path: &CanonicalPath,
        result: Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        if let Err(e) = &result {
            report_storage_error(operation, &path.under(&self.mount_point), e);
        }
        result
    }
}
