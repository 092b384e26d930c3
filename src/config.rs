//! Engine configuration
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (pipeline-schemas.toml)
//! - Environment variables (PIPELINE_SCHEMAS__*)
//!
//! ## Example config file (pipeline-schemas.toml):
//! ```toml
//! [registry]
//! schema_dir = "./schemas"
//! use_embedded = false
//!
//! [catalog]
//! default_warehouse = "Snowflake"
//!
//! [logging]
//! filter = "pipeline_schemas=debug"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use config_crate::ConfigError;

use crate::catalog::WarehouseId;
use crate::registry::SchemaRegistry;
use crate::source::{DirectorySource, MemorySource};

/// Main configuration for the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Where schema documents come from
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Field catalog settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory laid out as `<package>/<version>.json`
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,

    /// Serve the bundled schemas when no directory is set
    #[serde(default = "default_true")]
    pub use_embedded: bool,
}

/// Catalog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Target warehouse used when none is given explicitly
    #[serde(default)]
    pub default_warehouse: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_true() -> bool {
    true
}

fn default_filter() -> String {
    "warn".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            schema_dir: None,
            use_embedded: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "pipeline-schemas.toml",
            ".pipeline-schemas.toml",
            "config/pipeline-schemas.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "familiar", "pipeline-schemas") {
            let xdg_config = dirs.config_dir().join("pipeline-schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // PIPELINE_SCHEMAS__REGISTRY__SCHEMA_DIR=... and friends
        builder = builder.add_source(
            Environment::with_prefix("PIPELINE_SCHEMAS")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Schema directory, resolved against the working directory
    pub fn schema_dir(&self) -> Option<PathBuf> {
        self.registry.schema_dir.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                std::env::current_dir().unwrap_or_default().join(p)
            }
        })
    }

    /// Build the registry this configuration describes.
    ///
    /// A configured directory wins over the bundle. With neither, the
    /// registry has an empty source and finds nothing.
    pub fn registry(&self) -> SchemaRegistry {
        match self.schema_dir() {
            Some(dir) => SchemaRegistry::new(DirectorySource::new(dir)),
            None if self.registry.use_embedded => SchemaRegistry::embedded(),
            None => SchemaRegistry::new(MemorySource::new()),
        }
    }

    /// Configured default warehouse, if any
    pub fn default_warehouse(&self) -> Option<WarehouseId> {
        self.catalog.default_warehouse.as_deref().map(WarehouseId::from)
    }
}
