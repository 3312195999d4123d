//! Configuration management for the composition engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (composer.toml)
//! - Environment variables (COMPOSER__*)
//!
//! ## Example config file (composer.toml):
//! ```toml
//! [storage]
//! snapshot_path = "./data/composer.json"
//!
//! [sections]
//! reorder_policy = "renumber"
//! validate_props = true
//! max_depth = 8
//!
//! [versions]
//! allow_v_prefix = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Section tree settings
    #[serde(default)]
    pub sections: SectionConfig,

    /// Component version settings
    #[serde(default)]
    pub versions: VersionConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON snapshot backing the in-memory store
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// How `reorder` treats siblings missing from the supplied list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReorderPolicy {
    /// Supplied ids first, omitted siblings appended in their previous order
    #[default]
    Renumber,
    /// The list must be exactly the sibling set
    Strict,
}

/// Section tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    #[serde(default)]
    pub reorder_policy: ReorderPolicy,

    /// Validate merged props against the component schema on write
    #[serde(default = "default_true")]
    pub validate_props: bool,

    /// Deepest nesting allowed, counting roots as depth 1
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Component version configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionConfig {
    /// Accept "v1.2.3" when creating versions (stored as "1.2.3")
    #[serde(default)]
    pub allow_v_prefix: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            reorder_policy: ReorderPolicy::Renumber,
            validate_props: true,
            max_depth: None,
        }
    }
}

impl ComposerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["composer.toml", ".composer.toml", "config/composer.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "composer") {
            let xdg_config = config_dir.config_dir().join("composer.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // COMPOSER__SECTIONS__REORDER_POLICY=strict
        builder = builder.add_source(
            Environment::with_prefix("COMPOSER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
