//! Per-request inspection flags

use lens_config::Config;
use serde::{Deserialize, Serialize};

use crate::dynamic::DynamicMode;

/// Synthetic children shown per value unless overridden
pub const DEFAULT_MAX_CHILDREN: usize = 256;

/// Flags for one inspection request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Nesting levels expanded below the root
    pub max_depth: u32,
    /// Pointer levels whose pointee is expanded
    pub pointer_depth: u32,
    /// Synthetic children rendered per value; the rest are elided
    pub max_children: usize,
    pub dynamic: DynamicMode,
    /// Use synthetic providers
    pub synthetic: bool,
    /// Show the dynamic type next to the static one
    pub show_dynamic_type: bool,
    /// Bypass every rule and dynamic resolution
    pub raw: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_depth: lens_config::loader::DEFAULT_MAX_DEPTH,
            pointer_depth: 0,
            max_children: DEFAULT_MAX_CHILDREN,
            dynamic: DynamicMode::NoDynamic,
            synthetic: true,
            show_dynamic_type: false,
            raw: false,
        }
    }
}

impl RenderOptions {
    /// Defaults taken from merged configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_depth: config.max_depth(),
            pointer_depth: config.pointer_depth(),
            dynamic: config.dynamic().into(),
            synthetic: config.synthetic(),
            show_dynamic_type: config.show_dynamic_type(),
            raw: config.raw(),
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_pointer_depth(mut self, depth: u32) -> Self {
        self.pointer_depth = depth;
        self
    }

    pub fn with_max_children(mut self, count: usize) -> Self {
        self.max_children = count;
        self
    }

    pub fn with_dynamic(mut self, mode: DynamicMode) -> Self {
        self.dynamic = mode;
        self
    }

    pub fn with_synthetic(mut self, enabled: bool) -> Self {
        self.synthetic = enabled;
        self
    }

    pub fn with_dynamic_type_shown(mut self, shown: bool) -> Self {
        self.show_dynamic_type = shown;
        self
    }

    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }
}
