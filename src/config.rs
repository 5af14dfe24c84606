//! Configuration management for the SD logger
//!
//! Peripheral wiring, mount behaviour and backend locations are loaded once at
//! startup from `config.toml` with environment overrides.

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::MountOptions;

/// Complete logger configuration
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggerConfig {
    pub spi: SpiConfig,
    pub mount: MountConfig,
    pub card: CardConfig,
    pub vfs_fat: VfsFatConfig,
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
}

/// SPI wiring owned by the peripheral collaborator.
///
/// Consumed once per mount; a pin of `-1` means "not connected".
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SpiConfig {
    pub mosi_pin: i32,
    pub miso_pin: i32,
    pub clk_pin: i32,
    pub cs_pin: i32,
    pub max_freq_khz: u32,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            mosi_pin: -1,
            miso_pin: -1,
            clk_pin: -1,
            cs_pin: 5,
            max_freq_khz: 20_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MountConfig {
    /// Root under which every managed path lives
    pub mount_point: String,

    /// Format the medium when no valid filesystem is found (destructive)
    pub format_if_mount_failed: bool,

    /// Cluster size used when formatting
    pub allocation_unit_size: u32,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            mount_point: "/sdcard".to_string(),
            format_if_mount_failed: false,
            allocation_unit_size: 16 * 1024,
        }
    }
}

/// Host directory standing in for the card of the high-level card backend
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CardConfig {
    pub root_dir: String,
    pub capacity_mb: u64,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            root_dir: "./sdcard".to_string(),
            capacity_mb: 1024,
        }
    }
}

/// Block image carrying the FAT volume of the VFS/FAT backend
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VfsFatConfig {
    pub image_path: String,
}

impl Default for VfsFatConfig {
    fn default() -> Self {
        Self {
            image_path: "./sdcard.img".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub interval_secs: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggerConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        // Installed layout first, then the working directory
        let config_paths = ["sd-logger/config", "config"];

        let mut last_error = None;

        for config_path in &config_paths {
            match Config::builder()
                .add_source(File::with_name(config_path))
                .add_source(
                    Environment::with_prefix("SD_LOGGER")
                        .prefix_separator("_")
                        .separator("__"),
                )
                .build()
            {
                Ok(settings) => {
                    let config: LoggerConfig = settings.try_deserialize()?;
                    config.validate()?;
                    return Ok(config);
                }
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            config::ConfigError::Message(format!(
                "No configuration found. Tried: {config_paths:?}"
            ))
        }))
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        let config: LoggerConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.mount.mount_point.is_empty() || !self.mount.mount_point.starts_with('/') {
            return Err(config::ConfigError::Message(format!(
                "mount_point must be an absolute path, got {:?}",
                self.mount.mount_point
            )));
        }

        let unit = self.mount.allocation_unit_size;
        if !unit.is_power_of_two() || !(512..=32 * 1024).contains(&unit) {
            return Err(config::ConfigError::Message(format!(
                "allocation_unit_size must be a power of two between 512 and 32768, got {unit}"
            )));
        }

        if self.spi.cs_pin < 0 {
            return Err(config::ConfigError::Message(
                "cs_pin must be connected".into(),
            ));
        }

        if self.diagnostics.interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "diagnostics interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Mount options handed to the storage layer
    pub fn mount_options(&self) -> MountOptions {
        MountOptions {
            spi: self.spi.clone(),
            format_if_mount_failed: self.mount.format_if_mount_failed,
            allocation_unit_size: self.mount.allocation_unit_size,
        }
    }
}

impl CardConfig {
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.root_dir)
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_mb * 1024 * 1024
    }
}

impl VfsFatConfig {
    pub fn image_path(&self) -> PathBuf {
        PathBuf::from(&self.image_path)
    }
}

impl DiagnosticsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
