//! Error taxonomy for the value-presentation core.
//!
//! Every per-value failure is contained to that value's subtree: the renderer
//! turns these into fallbacks or inline markers instead of aborting a render.
//! Cycles and depth exhaustion are not errors at all and never appear here.

use thiserror::Error;

use crate::rule::FormatKind;

/// Errors produced by the registry, template parser, providers and resolvers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatterError {
    /// Delete/list referenced a rule that does not exist
    #[error("no {kind} rule named '{name}' in category '{category}'")]
    NotFound {
        kind: FormatKind,
        category: String,
        name: String,
    },

    /// Referenced category was never registered
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    /// Malformed summary template, rejected at add time
    #[error("invalid summary template '{template}' at offset {offset}: {reason}")]
    Parse {
        template: String,
        offset: usize,
        reason: String,
    },

    /// Malformed type-name pattern, rejected at add time
    #[error("invalid type pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Synthetic provider failed during update or enumeration
    #[error("synthetic provider '{provider}' failed: {reason}")]
    Provider { provider: String, reason: String },

    /// Child index outside `[0, count)`
    #[error("child index {index} out of range (count {count})")]
    Index { index: usize, count: usize },

    /// Dynamic type could not be determined
    #[error("cannot resolve dynamic type: {0}")]
    Resolution(String),

    /// Memory outside the snapshot, or a null dereference
    #[error("cannot read {len} bytes at 0x{address:x}")]
    MemoryRead { address: u64, len: usize },

    /// Value does not support the requested operation
    #[error("invalid operation on '{value}': {reason}")]
    InvalidValue { value: String, reason: String },

    /// Scripted summary or provider reported an error
    #[error("script '{name}' failed: {reason}")]
    Script { name: String, reason: String },
}

impl FormatterError {
    /// Shorthand for a provider failure
    pub fn provider(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an invalid-operation failure
    pub fn invalid_value(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// True for failures that callers treat as silent no-ops
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::UnknownCategory(_))
    }
}

/// Result alias used throughout the crate
pub type FormatterResult<T> = Result<T, FormatterError>;
