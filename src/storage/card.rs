//! High-level card backend
//!
//! Drives a card whose library already exposes a hierarchical filesystem.
//! On a host the card's filesystem is a directory and its raw capacity is
//! declared in configuration.

use log::{debug, error};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::CardConfig;
use crate::error::{MountError, StorageError};
use crate::storage::backend::{
    Backend, CardType, DirEntry, EntryKind, MountOptions, WriteMode,
};
use crate::storage::path::CanonicalPath;

const SDSC_MAX_BYTES: u64 = 2 * 1024 * 1024 * 1024;
const SDHC_MAX_BYTES: u64 = 32 * 1024 * 1024 * 1024;

pub struct CardBackend {
    root: PathBuf,
    capacity_bytes: u64,
    mounted: bool,
}

impl CardBackend {
    pub fn new(root: impl Into<PathBuf>, capacity_bytes: u64) -> Self {
        Self {
            root: root.into(),
            capacity_bytes,
            mounted: false,
        }
    }

    pub fn from_config(config: &CardConfig) -> Self {
        Self::new(config.root_path(), config.capacity_bytes())
    }

    fn real_path(&self, path: &CanonicalPath) -> PathBuf {
        self.root.join(path.relative())
    }

    fn ensure_mounted(&self) -> Result<(), StorageError> {
        if self.mounted {
            Ok(())
        } else {
            Err(StorageError::NotMounted)
        }
    }

    fn used_bytes(&self) -> Result<u64, StorageError> {
        dir_usage(&self.root).map_err(StorageError::from)
    }
}

/// Card class from raw capacity, the way the card library reports it
pub fn card_type_for_capacity(capacity_bytes: u64) -> CardType {
    match capacity_bytes {
        0 => CardType::None,
        n if n <= SDSC_MAX_BYTES => CardType::Sd,
        n if n <= SDHC_MAX_BYTES => CardType::Sdhc,
        _ => CardType::Sdxc,
    }
}

/// Bytes held by regular files below `dir`
fn dir_usage(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            total += dir_usage(&entry.path())?;
        } else if metadata.is_file() {
            total += metadata.len();
        }
    }
    Ok(total)
}

impl Backend for CardBackend {
    fn name(&self) -> &'static str {
        "card"
    }

    fn begin(&mut self, options: &MountOptions) -> Result<CardType, MountError> {
        self.mounted = false;
        debug!(
            "Starting card on CS pin {} at {} kHz",
            options.spi.cs_pin, options.spi.max_freq_khz
        );

        let metadata = fs::metadata(&self.root).map_err(|e| {
            MountError::DeviceInitFailure(format!("{}: {}", self.root.display(), e))
        })?;
        if !metadata.is_dir() {
            return Err(MountError::FilesystemMountFailure(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        let card_type = card_type_for_capacity(self.capacity_bytes);
        if card_type == CardType::None {
            return Err(MountError::DeviceInitFailure("No SD card attached".into()));
        }

        self.mounted = true;
        Ok(card_type)
    }

    fn end(&mut self) {
        self.mounted = false;
    }

    fn write_file(
        &mut self,
        path: &CanonicalPath,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        self.ensure_mounted()?;
        let real_path = self.real_path(path);

        let mut options = OpenOptions::new();
        match mode {
            WriteMode::Truncate => options.write(true).create(true).truncate(true),
            WriteMode::Append => options.append(true).create(true),
        };

        let mut file = match options.open(&real_path) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to open {} (real: {}): {}", path, real_path.display(), e);
                return Err(StorageError::OpenFailure(path.to_string()));
            }
        };

        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    fn read_file(&mut self, path: &CanonicalPath) -> Result<Vec<u8>, StorageError> {
        self.ensure_mounted()?;
        let real_path = self.real_path(path);

        match fs::metadata(&real_path) {
            Ok(metadata) if metadata.is_file() => {}
            _ => return Err(StorageError::NotFound(path.to_string())),
        }

        fs::read(&real_path).map_err(|e| StorageError::from_io(e, path.as_str()))
    }

    fn remove_file(&mut self, path: &CanonicalPath) -> Result<(), StorageError> {
        self.ensure_mounted()?;
        let real_path = self.real_path(path);

        match fs::metadata(&real_path) {
            Ok(metadata) if metadata.is_dir() => {
                return Err(StorageError::NotAFile(path.to_string()));
            }
            Ok(_) => {}
            Err(e) => return Err(StorageError::from_io(e, path.as_str())),
        }

        fs::remove_file(&real_path).map_err(|e| StorageError::from_io(e, path.as_str()))
    }

    fn stat(&mut self, path: &CanonicalPath) -> Result<Option<EntryKind>, StorageError> {
        self.ensure_mounted()?;
        match fs::metadata(self.real_path(path)) {
            Ok(metadata) if metadata.is_dir() => Ok(Some(EntryKind::Directory)),
            Ok(_) => Ok(Some(EntryKind::File)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from(e)),
        }
    }

    fn create_dir(&mut self, path: &CanonicalPath) -> Result<(), StorageError> {
        self.ensure_mounted()?;
        fs::create_dir(self.real_path(path)).map_err(|e| StorageError::from_io(e, path.as_str()))
    }

    fn remove_dir(&mut self, path: &CanonicalPath) -> Result<(), StorageError> {
        self.ensure_mounted()?;
        if path.is_root() {
            return Err(StorageError::RootDirectory);
        }
        let real_path = self.real_path(path);

        match fs::metadata(&real_path) {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(StorageError::NotADirectory(path.to_string()));
            }
            Ok(_) => {}
            Err(e) => return Err(StorageError::from_io(e, path.as_str())),
        }

        fs::remove_dir(&real_path).map_err(|e| StorageError::from_io(e, path.as_str()))
    }

    fn list_dir(&mut self, path: &CanonicalPath) -> Result<Vec<DirEntry>, StorageError> {
        self.ensure_mounted()?;
        let real_path = self.real_path(path);

        let entries =
            fs::read_dir(&real_path).map_err(|e| StorageError::from_io(e, path.as_str()))?;

        let mut listing = Vec::new();
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let kind = if metadata.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            listing.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                kind,
            });
        }

        Ok(listing)
    }

    fn total_bytes(&mut self) -> Result<u64, StorageError> {
        self.ensure_mounted()?;
        Ok(self.capacity_bytes)
    }

    fn free_bytes(&mut self) -> Result<u64, StorageError> {
        self.ensure_mounted()?;
        let used = self.used_bytes()?;
        Ok(self.capacity_bytes.saturating_sub(used))
    }
}
