//! Lens Configuration System
//!
//! Provides configuration management for the value-presentation core:
//! - Global user configuration (~/.lens/config.toml)
//! - Project configuration (lens.toml)
//! - Environment variable overrides (LENS_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.lens/config.toml)
//! 2. Project config (./lens.toml, searched upwards)
//! 3. Environment variables (LENS_*)
//! 4. Per-request inspection flags (handled by caller)
//!
//! # Example
//!
//! ```no_run
//! use lens_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("max depth: {}", config.max_depth());
//! ```

pub mod loader;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{Config, ConfigLoader};
pub use settings::{CategorySettings, DynamicSetting, RenderSettings, Settings};
