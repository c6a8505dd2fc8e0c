//! Application configuration

use app_fs::{ListOptions, SortBy, SortOrder, VfsConfig};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pinned folder paths, in pin order
    pub pinned_folders: Vec<String>,
    pub filer: FilerConfig,
    pub vfs: VfsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilerConfig {
    pub show_hidden_files: bool,
    pub show_file_extensions: bool,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub directories_first: bool,
}

impl Default for FilerConfig {
    fn default() -> Self {
        Self {
            show_hidden_files: false,
            show_file_extensions: true,
            sort_by: SortBy::Name,
            sort_order: SortOrder::Ascending,
            directories_first: true,
        }
    }
}

impl FilerConfig {
    /// Listing options matching these preferences
    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            show_hidden: self.show_hidden_files,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            directories_first: self.directories_first,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::info!("Configuration loaded from {:?}", path);
            Ok(config)
        } else {
            tracing::info!("Using default configuration");
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("com", "Files", "Files")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }
}
