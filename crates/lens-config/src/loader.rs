//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::settings::{DynamicSetting, RenderSettings, Settings};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "lens.toml";

/// Default maximum render depth
pub const DEFAULT_MAX_DEPTH: u32 = 8;

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.lens/config.toml) - lowest priority
/// 2. Project config (./lens.toml) - overrides global
/// 3. Environment variables (LENS_*) - overrides project
/// 4. Per-request flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global settings as loaded
    pub global: Settings,

    /// Project settings as loaded
    pub project: Settings,

    /// Project root directory (where lens.toml was found)
    pub project_root: Option<PathBuf>,

    /// Effective settings after merging every layer
    merged: Settings,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config path instead of ~/.lens/config.toml
    pub fn with_global_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find lens.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project) = self.find_project_config(start_dir)?;
        let global = self.load_global_config()?;
        Config::assemble(global, project, project_root)
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project = Settings::load_from_file(config_path)?;
        let global = self.load_global_config()?;
        let project_root = config_path.parent().map(|p| p.to_path_buf());
        Config::assemble(global, project, project_root)
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(&self, start_dir: &Path) -> ConfigResult<(Option<PathBuf>, Settings)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "loading project settings");
                let settings = Settings::load_from_file(&config_path)?;
                return Ok((Some(current), settings));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, Settings::default())),
            }
        }
    }

    /// Load global configuration from ~/.lens/config.toml
    ///
    /// A missing file or missing home directory yields empty settings; a
    /// present but malformed file is an error.
    fn load_global_config(&mut self) -> ConfigResult<Settings> {
        if self.global_config_path.is_none() {
            match Settings::global_config_path() {
                Ok(path) => self.global_config_path = Some(path),
                Err(ConfigError::HomeNotFound) => return Ok(Settings::default()),
                Err(e) => return Err(e),
            }
        }

        let Some(path) = self.global_config_path.as_ref() else {
            return Ok(Settings::default());
        };

        if !path.exists() {
            return Ok(Settings::default());
        }

        tracing::debug!(path = %path.display(), "loading global settings");
        Settings::load_from_file(path)
    }

    /// Get the global configuration directory (~/.lens)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".lens"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Read environment overrides
///
/// Environment variables follow the pattern: LENS_<KEY>
/// Example: LENS_POINTER_DEPTH=2
fn env_overrides() -> ConfigResult<RenderSettings> {
    let mut render = RenderSettings::default();

    if let Ok(depth) = env::var("LENS_MAX_DEPTH") {
        render.max_depth = Some(parse_env_number("LENS_MAX_DEPTH", &depth)?);
    }
    if let Ok(depth) = env::var("LENS_POINTER_DEPTH") {
        render.pointer_depth = Some(parse_env_number("LENS_POINTER_DEPTH", &depth)?);
    }
    if let Ok(mode) = env::var("LENS_DYNAMIC") {
        render.dynamic = Some(mode.parse::<DynamicSetting>()?);
    }
    if let Ok(synthetic) = env::var("LENS_SYNTHETIC") {
        render.synthetic = Some(parse_env_bool(&synthetic));
    }
    if let Ok(raw) = env::var("LENS_RAW") {
        render.raw = Some(parse_env_bool(&raw));
    }

    Ok(render)
}

fn parse_env_number(field: &str, value: &str) -> ConfigResult<u32> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("expected a non-negative integer, got '{}'", value),
    })
}

fn parse_env_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

impl Config {
    fn assemble(
        global: Settings,
        project: Settings,
        project_root: Option<PathBuf>,
    ) -> ConfigResult<Self> {
        let mut merged = global.clone();
        merged.merge(&project);
        merged.merge(&Settings {
            render: Some(env_overrides()?),
            categories: None,
        });
        merged.validate()?;

        Ok(Self {
            global,
            project,
            project_root,
            merged,
        })
    }

    /// Build a config from in-memory settings (no files, no environment)
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            global: Settings::default(),
            project: settings.clone(),
            project_root: None,
            merged: settings,
        }
    }

    /// Effective maximum render depth
    pub fn max_depth(&self) -> u32 {
        self.merged
            .render
            .as_ref()
            .and_then(|r| r.max_depth)
            .unwrap_or(DEFAULT_MAX_DEPTH)
    }

    /// Effective pointer expansion depth
    pub fn pointer_depth(&self) -> u32 {
        self.merged
            .render
            .as_ref()
            .and_then(|r| r.pointer_depth)
            .unwrap_or(0)
    }

    /// Effective dynamic resolution mode
    pub fn dynamic(&self) -> DynamicSetting {
        self.merged
            .render
            .as_ref()
            .and_then(|r| r.dynamic)
            .unwrap_or_default()
    }

    /// Whether synthetic providers are used
    pub fn synthetic(&self) -> bool {
        self.merged
            .render
            .as_ref()
            .and_then(|r| r.synthetic)
            .unwrap_or(true)
    }

    /// Whether the dynamic type tag is attached to rendered headers
    pub fn show_dynamic_type(&self) -> bool {
        self.merged
            .render
            .as_ref()
            .and_then(|r| r.show_dynamic_type)
            .unwrap_or(false)
    }

    /// Whether raw mode is on by default
    pub fn raw(&self) -> bool {
        self.merged
            .render
            .as_ref()
            .and_then(|r| r.raw)
            .unwrap_or(false)
    }

    /// Categories that start disabled (project list replaces the global one)
    pub fn disabled_categories(&self) -> &[String] {
        self.merged.disabled_categories()
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if a project file was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(PROJECT_CONFIG_FILE);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn isolated_loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::with_global_path(dir.join("no-global.toml"))
    }

    #[test]
    #[serial]
    fn test_load_project_config() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[render]
max_depth = 3
"#,
        );

        let mut loader = isolated_loader(temp_dir.path());
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert_eq!(config.max_depth(), 3);
        assert!(config.is_project());
    }

    #[test]
    #[serial]
    fn test_defaults_without_files() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = isolated_loader(temp_dir.path());
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert!(!config.is_project());
        assert_eq!(config.max_depth(), DEFAULT_MAX_DEPTH);
        assert_eq!(config.pointer_depth(), 0);
        assert_eq!(config.dynamic(), DynamicSetting::NoDynamic);
        assert!(config.synthetic());
        assert!(!config.raw());
    }

    #[test]
    #[serial]
    fn test_env_override_pointer_depth() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "[render]\npointer_depth = 1\n");

        env::set_var("LENS_POINTER_DEPTH", "3");
        let mut loader = isolated_loader(temp_dir.path());
        let config = loader.load_from_directory(temp_dir.path());
        env::remove_var("LENS_POINTER_DEPTH");

        assert_eq!(config.unwrap().pointer_depth(), 3);
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var("LENS_MAX_DEPTH", "deep");
        let mut loader = isolated_loader(temp_dir.path());
        let result = loader.load_from_directory(temp_dir.path());
        env::remove_var("LENS_MAX_DEPTH");

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            render: Some(RenderSettings {
                raw: Some(true),
                ..Default::default()
            }),
            categories: None,
        };
        let config = Config::from_settings(settings);
        assert!(config.raw());
        assert_eq!(config.max_depth(), DEFAULT_MAX_DEPTH);
    }
}
