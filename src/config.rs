//! Archive configuration
//!
//! [`ArchiveConfig`] is stored as `config.json` in the archive directory next
//! to the store file. It fixes the identity of the two system directories once,
//! when the archive is initialized; everything that needs them receives the
//! resolved [`SystemDirectories`] explicitly.
//!
//! ## Example
//!
//! ```rust,no_run
//! use folio::config::{ArchiveBuilder, StoreFormat};
//! use folio::sort::SortOrder;
//!
//! # fn main() -> folio::Result<()> {
//! let config = ArchiveBuilder::new()
//!     .store_format(StoreFormat::Bincode)
//!     .default_sort(SortOrder::by_creation_date())
//!     .main_name("Library")
//!     .build("./my_archive")?;
//! println!("store file: {}", config.store_file("./my_archive").display());
//! # Ok(())
//! # }
//! ```

use crate::error::{ArchiveError, Result};
use crate::sort::SortOrder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Name of the configuration file inside an archive directory
pub const CONFIG_FILE: &str = "config.json";

/// On-disk encoding of the record file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// Compact bincode
    Bincode,
}

impl StoreFormat {
    /// Default file name for this format
    pub fn default_file_name(&self) -> &'static str {
        match self {
            StoreFormat::Json => "archive.json",
            StoreFormat::Bincode => "archive.bin",
        }
    }
}

/// Identity of the well-known root directories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemDirectories {
    /// Main directory id
    pub main: Uuid,
    /// Trash directory id
    pub trash: Uuid,
    /// Display name of the main directory
    pub main_name: String,
    /// Display name of the trash directory
    pub trash_name: String,
}

impl Default for SystemDirectories {
    fn default() -> Self {
        Self {
            main: Uuid::new_v4(),
            trash: Uuid::new_v4(),
            main_name: "Main".to_string(),
            trash_name: "Trash".to_string(),
        }
    }
}

/// Archive settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Store file, relative to the archive directory
    pub store_path: PathBuf,
    /// Store file encoding
    pub store_format: StoreFormat,
    /// System directory identity
    pub system: SystemDirectories,
    /// Criterion for newly created directories
    pub default_sort: SortOrder,
    /// Description attached to automatic captures
    pub auto_capture_description: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        let store_format = StoreFormat::default();
        Self {
            store_path: PathBuf::from(store_format.default_file_name()),
            store_format,
            system: SystemDirectories::default(),
            default_sort: SortOrder::default(),
            auto_capture_description: String::new(),
        }
    }
}

impl ArchiveConfig {
    /// Absolute store file path for an archive directory
    pub fn store_file(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(&self.store_path)
    }

    /// Check the settings for consistency
    pub fn validate(&self) -> Result<()> {
        if self.system.main == self.system.trash {
            return Err(ArchiveError::InvalidConfiguration(
                "main and trash directories share an id".to_string(),
            ));
        }
        if self.system.main_name.is_empty() || self.system.trash_name.is_empty() {
            return Err(ArchiveError::InvalidConfiguration(
                "system directory names must not be empty".to_string(),
            ));
        }
        if self.system.main_name == self.system.trash_name {
            return Err(ArchiveError::InvalidConfiguration(
                "main and trash directories share a name".to_string(),
            ));
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(ArchiveError::InvalidConfiguration("empty store path".to_string()));
        }
        Ok(())
    }

    /// Load `config.json` from an archive directory
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE);
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Write `config.json` into an archive directory
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(CONFIG_FILE), json)?;
        Ok(())
    }

    /// Load the config, or write a default one if the directory has none
    pub fn load_or_init(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.join(CONFIG_FILE).exists() {
            Self::load(dir)
        } else {
            info!("Initializing archive config in {:?}", dir);
            let config = Self::default();
            config.save(dir)?;
            Ok(config)
        }
    }
}

/// Builder for a fresh [`ArchiveConfig`]
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    config: ArchiveConfig,
    custom_store_path: bool,
}

impl ArchiveBuilder {
    /// Builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store file encoding
    ///
    /// Unless a store path was set explicitly, the file name follows the
    /// format.
    pub fn store_format(mut self, format: StoreFormat) -> Self {
        self.config.store_format = format;
        if !self.custom_store_path {
            self.config.store_path = PathBuf::from(format.default_file_name());
        }
        self
    }

    /// Set the store file path, relative to the archive directory
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store_path = path.into();
        self.custom_store_path = true;
        self
    }

    /// Criterion for new directories
    pub fn default_sort(mut self, sort: SortOrder) -> Self {
        self.config.default_sort = sort;
        self
    }

    /// Display name of the main directory
    pub fn main_name(mut self, name: impl Into<String>) -> Self {
        self.config.system.main_name = name.into();
        self
    }

    /// Display name of the trash directory
    pub fn trash_name(mut self, name: impl Into<String>) -> Self {
        self.config.system.trash_name = name.into();
        self
    }

    /// Description attached to automatic captures
    pub fn auto_capture_description(mut self, description: impl Into<String>) -> Self {
        self.config.auto_capture_description = description.into();
        self
    }

    /// Validate the settings without writing anything
    pub fn finish(self) -> Result<ArchiveConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Validate and write the config into `dir`
    pub fn build(self, dir: impl AsRef<Path>) -> Result<ArchiveConfig> {
        let config = self.finish()?;
        config.save(dir)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_and_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = ArchiveBuilder::new()
            .store_format(StoreFormat::Bincode)
            .trash_name("Bin")
            .auto_capture_description("autosave")
            .build(dir.path())
            .unwrap();

        assert_eq!(config.store_path, PathBuf::from("archive.bin"));
        let loaded = ArchiveConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_init_is_stable() {
        let dir = TempDir::new().unwrap();
        let first = ArchiveConfig::load_or_init(dir.path()).unwrap();
        let second = ArchiveConfig::load_or_init(dir.path()).unwrap();
        assert_eq!(first.system, second.system);
    }

    #[test]
    fn test_validation() {
        let result = ArchiveBuilder::new().main_name("Same").trash_name("Same").finish();
        assert!(matches!(result, Err(ArchiveError::InvalidConfiguration(_))));

        let mut config = ArchiveConfig::default();
        config.system.trash = config.system.main;
        assert!(config.validate().is_err());
    }
}
