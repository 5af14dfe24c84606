//! Capacity accounting
//!
//! Free/total space straight from the backend, plus the admission check run
//! before every write. Space is not reserved: a write can still fail after
//! passing the check when filesystem overhead exceeds the raw byte count.

use log::debug;

use crate::error::StorageError;
use crate::storage::backend::Backend;
use crate::storage::mount::MountManager;
use crate::storage::results::CapacitySnapshot;

impl<B: Backend> MountManager<B> {
    /// Fresh capacity figures for the mounted card
    pub fn capacity(&mut self) -> Result<CapacitySnapshot, StorageError> {
        if !self.is_mounted() {
            return Err(StorageError::NotMounted);
        }

        let backend = self.backend_mut();
        let total_bytes = backend.total_bytes()?;
        let free_bytes = backend.free_bytes()?;
        Ok(CapacitySnapshot {
            total_bytes,
            free_bytes,
        })
    }

    /// Whether `requested_bytes` fit in the current free space.
    ///
    /// Always false while unmounted or when free space cannot be read.
    pub fn has_enough_space(&mut self, requested_bytes: u64) -> bool {
        self.check_space(requested_bytes).is_ok()
    }

    /// Admission check with the reason for a refusal
    pub(crate) fn check_space(&mut self, requested_bytes: u64) -> Result<(), StorageError> {
        let snapshot = self.capacity()?;
        debug!(
            "Admission check: {} requested, {} free",
            requested_bytes, snapshot.free_bytes
        );
        if snapshot.fits(requested_bytes) {
            Ok(())
        } else {
            Err(StorageError::InsufficientSpace {
                requested: requested_bytes,
                free: snapshot.free_bytes,
            })
        }
    }
}
