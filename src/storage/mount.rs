//! Mount lifecycle
//!
//! Owns the backend and the single record of whether the card is usable.

use log::{info, warn};

use crate::error::handlers::{report_format_error, report_mount_error};
use crate::error::{FormatError, MountError};
use crate::storage::backend::{Backend, CardType, FormatType, MountOptions};

/// Whether the card is usable, and what it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MountState {
    pub card_mounted: bool,
    pub card_type: CardType,
}

impl MountState {
    pub fn unmounted() -> Self {
        Self::default()
    }
}

pub struct MountManager<B: Backend> {
    backend: B,
    options: MountOptions,
    state: MountState,
}

impl<B: Backend> MountManager<B> {
    pub fn new(backend: B, options: MountOptions) -> Self {
        Self {
            backend,
            options,
            state: MountState::unmounted(),
        }
    }

    /// Initialize the card and mount its filesystem.
    ///
    /// A failure leaves the card unmounted with type `NONE`. Nothing is
    /// retried; the caller decides.
    pub fn mount(&mut self) -> Result<MountState, MountError> {
        info!("Initializing SD card ({} backend)...", self.backend.name());

        if self.state.card_mounted {
            self.backend.end();
        }
        self.state = MountState::unmounted();

        let card_type = match self.backend.begin(&self.options) {
            Ok(card_type) => card_type,
            Err(e) => {
                report_mount_error(&e);
                return Err(e);
            }
        };

        self.state = MountState {
            card_mounted: true,
            card_type,
        };

        info!("SD Card mounted successfully");
        info!("Card Type: {}", card_type);
        match self.backend.total_bytes() {
            Ok(total) => info!("Card Size: {}MB", total / (1024 * 1024)),
            Err(e) => warn!("Card size unavailable: {}", e),
        }

        Ok(self.state)
    }

    pub fn unmount(&mut self) {
        if self.state.card_mounted {
            self.backend.end();
            info!("SD Card unmounted");
        }
        self.state = MountState::unmounted();
    }

    /// Erase the card and mount the fresh filesystem.
    ///
    /// Destructive; only ever called on explicit request. Backends without a
    /// format capability refuse up front and the mount is left untouched.
    pub fn format_and_remount(&mut self, format_type: FormatType) -> Result<(), FormatError> {
        if !self.backend.supports_format() {
            let err = FormatError::FormatUnsupported;
            report_format_error(&err);
            return Err(err);
        }

        warn!("Formatting SD card as {:?}, all data will be lost", format_type);
        self.unmount();

        if let Err(e) = self.backend.format(format_type, &self.options) {
            report_format_error(&e);
            return Err(e);
        }

        let mut options = self.options.clone();
        options.format_if_mount_failed = true;
        match self.backend.begin(&options) {
            Ok(card_type) => {
                self.state = MountState {
                    card_mounted: true,
                    card_type,
                };
                info!("SD Card formatted and remounted ({})", card_type);
                Ok(())
            }
            Err(e) => {
                let err = FormatError::from(e);
                report_format_error(&err);
                Err(err)
            }
        }
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.state.card_mounted
    }

    /// The backend, for callers that have already checked the mount state
    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: Backend> Drop for MountManager<B> {
    fn drop(&mut self) {
        self.unmount();
    }
}
