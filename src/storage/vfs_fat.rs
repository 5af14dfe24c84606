//! VFS/FAT backend
//!
//! Mounts a FAT volume that lives on a raw block device, here an image file
//! standing in for the card, and performs file I/O through `fatfs`.

use fatfs::{FatType, FileSystem, FormatVolumeOptions, FsOptions};
use log::{debug, error, info, warn};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::config::VfsFatConfig;
use crate::error::{FormatError, MountError, StorageError};
use crate::storage::backend::{
    Backend, CardType, DirEntry, EntryKind, FormatType, MountOptions, WriteMode,
};
use crate::storage::path::CanonicalPath;

/// Cards above this size carry the high-capacity bit
const SDSC_MAX_BYTES: u64 = 2 * 1024 * 1024 * 1024;

pub struct VfsFatBackend {
    image_path: PathBuf,
    fs: Option<FileSystem<File>>,
}

impl VfsFatBackend {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            fs: None,
        }
    }

    pub fn from_config(config: &VfsFatConfig) -> Self {
        Self::new(config.image_path())
    }

    fn open_device(&self) -> Result<File, MountError> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.image_path)
            .map_err(|e| {
                MountError::DeviceInitFailure(format!("{}: {}", self.image_path.display(), e))
            })
    }

    fn volume(&self) -> Result<&FileSystem<File>, StorageError> {
        self.fs.as_ref().ok_or(StorageError::NotMounted)
    }

    /// Find `path` by walking its parent directory; FAT names compare
    /// case-insensitively.
    fn lookup(&self, path: &CanonicalPath) -> Result<Option<EntryKind>, StorageError> {
        let fs = self.volume()?;
        if path.is_root() {
            return Ok(Some(EntryKind::Directory));
        }

        let (parent, name) = path.split_last();
        let root = fs.root_dir();
        let dir = if parent.is_root() {
            root
        } else {
            match root.open_dir(parent.relative()) {
                Ok(dir) => dir,
                Err(_) => return Ok(None),
            }
        };

        for entry in dir.iter() {
            let entry = entry?;
            if entry.file_name().eq_ignore_ascii_case(name) {
                let kind = if entry.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }

    fn format_options(format_type: FormatType, allocation_unit_size: u32) -> FormatVolumeOptions {
        let options = FormatVolumeOptions::new().bytes_per_cluster(allocation_unit_size);
        match format_type {
            FormatType::Auto => options,
            FormatType::Fat12 => options.fat_type(FatType::Fat12),
            FormatType::Fat16 => options.fat_type(FatType::Fat16),
            FormatType::Fat32 => options.fat_type(FatType::Fat32),
        }
    }

    fn format_device(
        &self,
        format_type: FormatType,
        allocation_unit_size: u32,
    ) -> Result<(), FormatError> {
        let mut device = self
            .open_device()
            .map_err(|e| FormatError::FormatFailed(e.to_string()))?;
        device
            .seek(SeekFrom::Start(0))
            .map_err(|e| FormatError::FormatFailed(e.to_string()))?;
        fatfs::format_volume(
            &mut device,
            Self::format_options(format_type, allocation_unit_size),
        )
        .map_err(|e| FormatError::FormatFailed(e.to_string()))?;
        device
            .sync_all()
            .map_err(|e| FormatError::FormatFailed(e.to_string()))
    }
}

impl Backend for VfsFatBackend {
    fn name(&self) -> &'static str {
        "vfs-fat"
    }

    fn begin(&mut self, options: &MountOptions) -> Result<CardType, MountError> {
        self.end();
        debug!(
            "Mounting FAT volume from {} (SPI mosi={} miso={} sclk={} cs={}, {} kHz)",
            self.image_path.display(),
            options.spi.mosi_pin,
            options.spi.miso_pin,
            options.spi.clk_pin,
            options.spi.cs_pin,
            options.spi.max_freq_khz
        );

        let device = self.open_device()?;
        let capacity = device
            .metadata()
            .map_err(|e| MountError::DeviceInitFailure(e.to_string()))?
            .len();

        let fs = match FileSystem::new(device, FsOptions::new()) {
            Ok(fs) => fs,
            Err(e) if options.format_if_mount_failed => {
                warn!("No valid FAT volume ({}), formatting", e);
                self.format_device(FormatType::Auto, options.allocation_unit_size)
                    .map_err(|e| MountError::FilesystemMountFailure(e.to_string()))?;
                FileSystem::new(self.open_device()?, FsOptions::new())
                    .map_err(|e| MountError::FilesystemMountFailure(e.to_string()))?
            }
            Err(e) => return Err(MountError::FilesystemMountFailure(e.to_string())),
        };

        debug!("FAT type {:?}", fs.fat_type());
        self.fs = Some(fs);

        Ok(if capacity > SDSC_MAX_BYTES {
            CardType::Sdhc
        } else {
            CardType::Sd
        })
    }

    fn end(&mut self) {
        if let Some(fs) = self.fs.take() {
            if let Err(e) = fs.unmount() {
                error!("Failed to unmount FAT volume cleanly: {}", e);
            }
        }
    }

    fn supports_format(&self) -> bool {
        true
    }

    fn format(
        &mut self,
        format_type: FormatType,
        options: &MountOptions,
    ) -> Result<(), FormatError> {
        self.end();
        info!(
            "Formatting {} as {:?} ({} byte clusters)",
            self.image_path.display(),
            format_type,
            options.allocation_unit_size
        );
        self.format_device(format_type, options.allocation_unit_size)
    }

    fn write_file(
        &mut self,
        path: &CanonicalPath,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        let fs = self.volume()?;

        let mut file = match fs.root_dir().create_file(path.relative()) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to open {} on FAT volume: {}", path, e);
                return Err(StorageError::OpenFailure(path.to_string()));
            }
        };

        match mode {
            WriteMode::Truncate => file.truncate()?,
            WriteMode::Append => {
                file.seek(SeekFrom::End(0))?;
            }
        }
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    fn read_file(&mut self, path: &CanonicalPath) -> Result<Vec<u8>, StorageError> {
        if self.lookup(path)? != Some(EntryKind::File) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let fs = self.volume()?;
        let mut file = fs
            .root_dir()
            .open_file(path.relative())
            .map_err(|e| StorageError::from_io(e, path.as_str()))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        Ok(content)
    }

    fn remove_file(&mut self, path: &CanonicalPath) -> Result<(), StorageError> {
        match self.lookup(path)? {
            None => return Err(StorageError::NotFound(path.to_string())),
            Some(EntryKind::Directory) => return Err(StorageError::NotAFile(path.to_string())),
            Some(EntryKind::File) => {}
        }

        self.volume()?
            .root_dir()
            .remove(path.relative())
            .map_err(|e| StorageError::from_io(e, path.as_str()))
    }

    fn stat(&mut self, path: &CanonicalPath) -> Result<Option<EntryKind>, StorageError> {
        self.lookup(path)
    }

    fn create_dir(&mut self, path: &CanonicalPath) -> Result<(), StorageError> {
        if self.lookup(path)?.is_some() {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        let (parent, _) = path.split_last();
        if self.lookup(&parent)? != Some(EntryKind::Directory) {
            return Err(StorageError::NotFound(parent.to_string()));
        }

        self.volume()?
            .root_dir()
            .create_dir(path.relative())
            .map(|_| ())
            .map_err(|e| StorageError::from_io(e, path.as_str()))
    }

    fn remove_dir(&mut self, path: &CanonicalPath) -> Result<(), StorageError> {
        if path.is_root() {
            return Err(StorageError::RootDirectory);
        }
        match self.lookup(path)? {
            None => return Err(StorageError::NotFound(path.to_string())),
            Some(EntryKind::File) => return Err(StorageError::NotADirectory(path.to_string())),
            Some(EntryKind::Directory) => {}
        }

        // fatfs refuses non-empty directories
        self.volume()?
            .root_dir()
            .remove(path.relative())
            .map_err(StorageError::from)
    }

    fn list_dir(&mut self, path: &CanonicalPath) -> Result<Vec<DirEntry>, StorageError> {
        if self.lookup(path)? != Some(EntryKind::Directory) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let fs = self.volume()?;
        let root = fs.root_dir();
        let dir = if path.is_root() {
            root
        } else {
            root.open_dir(path.relative())
                .map_err(|e| StorageError::from_io(e, path.as_str()))?
        };

        let mut listing = Vec::new();
        for entry in dir.iter() {
            let entry = entry?;
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let kind = if entry.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            listing.push(DirEntry { name, kind });
        }

        Ok(listing)
    }

    fn total_bytes(&mut self) -> Result<u64, StorageError> {
        let stats = self.volume()?.stats()?;
        Ok(u64::from(stats.cluster_size()) * u64::from(stats.total_clusters()))
    }

    fn free_bytes(&mut self) -> Result<u64, StorageError> {
        let stats = self.volume()?.stats()?;
        Ok(u64::from(stats.cluster_size()) * u64::from(stats.free_clusters()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::path::normalize;

    const IMAGE_BYTES: u64 = 8 * 1024 * 1024;

    fn blank_image() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("card.img");
        File::create(&image).unwrap().set_len(IMAGE_BYTES).unwrap();
        (dir, image)
    }

    fn options() -> MountOptions {
        MountOptions {
            allocation_unit_size: 1024,
            ..MountOptions::default()
        }
    }

    fn mounted() -> (tempfile::TempDir, VfsFatBackend) {
        let (dir, image) = blank_image();
        let mut backend = VfsFatBackend::new(&image);
        backend.format(FormatType::Auto, &options()).unwrap();
        backend.begin(&options()).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_missing_image_is_device_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = VfsFatBackend::new(dir.path().join("absent.img"));
        let err = backend.begin(&options()).unwrap_err();
        assert!(matches!(err, MountError::DeviceInitFailure(_)));
    }

    #[test]
    fn test_blank_image_is_filesystem_failure() {
        let (_dir, image) = blank_image();
        let mut backend = VfsFatBackend::new(&image);
        let err = backend.begin(&options()).unwrap_err();
        assert!(matches!(err, MountError::FilesystemMountFailure(_)));
    }

    #[test]
    fn test_format_if_mount_failed() {
        let (_dir, image) = blank_image();
        let mut backend = VfsFatBackend::new(&image);
        let mount_options = MountOptions {
            format_if_mount_failed: true,
            ..options()
        };
        assert_eq!(backend.begin(&mount_options).unwrap(), CardType::Sd);
        assert!(backend.total_bytes().unwrap() > 0);
        assert!(backend.total_bytes().unwrap() <= IMAGE_BYTES);
    }

    #[test]
    fn test_lookup_ignores_case() {
        let (_dir, mut backend) = mounted();
        backend
            .write_file(&normalize("LOG.TXT"), b"x", WriteMode::Truncate)
            .unwrap();
        assert_eq!(
            backend.stat(&normalize("log.txt")).unwrap(),
            Some(EntryKind::File)
        );
        assert_eq!(backend.stat(&normalize("other.txt")).unwrap(), None);
        assert_eq!(backend.stat(&normalize("")).unwrap(), Some(EntryKind::Directory));
    }

    #[test]
    fn test_append_extends_and_truncate_resets() {
        let (_dir, mut backend) = mounted();
        let path = normalize("data.bin");
        backend.write_file(&path, b"abc", WriteMode::Truncate).unwrap();
        backend.write_file(&path, b"def", WriteMode::Append).unwrap();
        assert_eq!(backend.read_file(&path).unwrap(), b"abcdef");

        backend.write_file(&path, b"z", WriteMode::Truncate).unwrap();
        assert_eq!(backend.read_file(&path).unwrap(), b"z");
    }

    #[test]
    fn test_list_dir_skips_dot_entries() {
        let (_dir, mut backend) = mounted();
        backend.create_dir(&normalize("logs")).unwrap();
        backend
            .write_file(&normalize("logs/a.txt"), b"1", WriteMode::Truncate)
            .unwrap();

        let listing = backend.list_dir(&normalize("logs")).unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing[0].name.eq_ignore_ascii_case("a.txt"));
        assert!(listing[0].is_file());
    }

    #[test]
    fn test_create_dir_needs_parent() {
        let (_dir, mut backend) = mounted();
        let err = backend.create_dir(&normalize("a/b")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(p) if p == "/a"));
    }

    #[test]
    fn test_remove_non_empty_dir_fails() {
        let (_dir, mut backend) = mounted();
        backend.create_dir(&normalize("logs")).unwrap();
        backend
            .write_file(&normalize("logs/a.txt"), b"1", WriteMode::Truncate)
            .unwrap();

        assert!(backend.remove_dir(&normalize("logs")).is_err());
        assert_eq!(
            backend.stat(&normalize("logs")).unwrap(),
            Some(EntryKind::Directory)
        );
    }

    #[test]
    fn test_volume_survives_remount() {
        let (_dir, mut backend) = mounted();
        backend
            .write_file(&normalize("keep.txt"), b"persisted", WriteMode::Truncate)
            .unwrap();
        backend.end();
        assert!(matches!(
            backend.read_file(&normalize("keep.txt")),
            Err(StorageError::NotMounted)
        ));

        backend.begin(&options()).unwrap();
        assert_eq!(backend.read_file(&normalize("keep.txt")).unwrap(), b"persisted");
    }
}
