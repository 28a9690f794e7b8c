//! Settings file schema (config.toml / lens.toml)
//!
//! The global file and the project file share one schema; the loader merges
//! them field by field.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Upper bound accepted for `render.max_depth`
pub const MAX_RENDER_DEPTH: u32 = 64;

/// Settings loaded from a single TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Render defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderSettings>,

    /// Category enablement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<CategorySettings>,
}

/// Default inspection flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RenderSettings {
    /// Maximum child nesting depth (default: 8)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,

    /// Number of pointer levels expanded into children (default: 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer_depth: Option<u32>,

    /// Dynamic type resolution mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicSetting>,

    /// Use synthetic children providers (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<bool>,

    /// Attach the resolved dynamic type to the rendered header (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_dynamic_type: Option<bool>,

    /// Bypass every formatting rule (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,
}

/// Category enablement overrides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CategorySettings {
    /// Categories that start out disabled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled: Vec<String>,
}

/// Dynamic type resolution mode as spelled in configuration files
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DynamicSetting {
    /// Static type only
    #[default]
    NoDynamic,
    /// Resolve from already-loaded runtime state
    CurrentFrame,
    /// May run code in the target
    RunTarget,
}

impl FromStr for DynamicSetting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "no-dynamic" | "no-dynamic-values" | "none" => Ok(Self::NoDynamic),
            "current-frame" | "no-run-target" => Ok(Self::CurrentFrame),
            "run-target" => Ok(Self::RunTarget),
            other => Err(ConfigError::InvalidValue {
                field: "render.dynamic".to_string(),
                reason: format!(
                    "must be 'no-dynamic', 'current-frame', or 'run-target', got '{}'",
                    other
                ),
            }),
        }
    }
}

impl Settings {
    /// Load settings from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::parse(&content, path)
    }

    /// Parse settings from TOML text; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &Path) -> ConfigResult<Self> {
        let settings: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: origin.to_path_buf(),
            error: e,
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(render) = &self.render {
            if let Some(depth) = render.max_depth {
                if depth == 0 || depth > MAX_RENDER_DEPTH {
                    return Err(ConfigError::InvalidValue {
                        field: "render.max_depth".to_string(),
                        reason: format!("must be between 1 and {}, got {}", MAX_RENDER_DEPTH, depth),
                    });
                }
            }
            if let Some(depth) = render.pointer_depth {
                if depth > MAX_RENDER_DEPTH {
                    return Err(ConfigError::InvalidValue {
                        field: "render.pointer_depth".to_string(),
                        reason: format!("must be at most {}, got {}", MAX_RENDER_DEPTH, depth),
                    });
                }
            }
        }

        if let Some(categories) = &self.categories {
            if let Some(empty) = categories.disabled.iter().find(|c| c.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: "categories.disabled".to_string(),
                    reason: format!("category names must not be empty, got '{}'", empty),
                });
            }
        }

        Ok(())
    }

    /// Get the global settings file path (~/.lens/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".lens").join("config.toml"))
    }

    /// Merge another settings value into this one.
    /// Other settings take precedence for non-None values.
    pub fn merge(&mut self, other: &Settings) {
        match (&mut self.render, &other.render) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            (None, Some(theirs)) => self.render = Some(theirs.clone()),
            _ => {}
        }
        if other.categories.is_some() {
            self.categories = other.categories.clone();
        }
    }

    /// Render settings, or empty defaults
    pub fn render(&self) -> RenderSettings {
        self.render.clone().unwrap_or_default()
    }

    /// Names of categories that start disabled
    pub fn disabled_categories(&self) -> &[String] {
        self.categories
            .as_ref()
            .map(|c| c.disabled.as_slice())
            .unwrap_or(&[])
    }
}

impl RenderSettings {
    /// Field-level merge; `other` wins where it is set
    pub fn merge(&mut self, other: &RenderSettings) {
        if other.max_depth.is_some() {
            self.max_depth = other.max_depth;
        }
        if other.pointer_depth.is_some() {
            self.pointer_depth = other.pointer_depth;
        }
        if other.dynamic.is_some() {
            self.dynamic = other.dynamic;
        }
        if other.synthetic.is_some() {
            self.synthetic = other.synthetic;
        }
        if other.show_dynamic_type.is_some() {
            self.show_dynamic_type = other.show_dynamic_type;
        }
        if other.raw.is_some() {
            self.raw = other.raw;
        }
    }
}
