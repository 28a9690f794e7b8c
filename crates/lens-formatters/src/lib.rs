//! Lens Formatters - value presentation core for a debugger
//!
//! This library decides how a program value is shown to the user:
//! - Formatter registry: categorized, ordered rules keyed by type name
//! - Type matching with pointer hops, cascading and regex patterns
//! - Summary templates (`${var.field}`) and native/scripted summaries
//! - Synthetic children providers with per-stop caching
//! - Dynamic (runtime) type resolution
//! - Recursive rendering with cycle and depth guards

/// Lens formatters version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod builtins;
pub mod commands;
pub mod dynamic;
pub mod error;
pub mod matcher;
pub mod registry;
pub mod render;
pub mod rule;
pub mod snapshot;
pub mod summary;
pub mod synthetic;
pub mod target;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use commands::{AddCommand, CommandOutput, RuleSpec, TypeCommand};
pub use dynamic::{DynamicMode, DynamicTypeResolver};
pub use error::{FormatterError, FormatterResult};
pub use matcher::{MatchedRule, RuleSet, TypeMatcher};
pub use registry::{
    Category, FormatterRegistry, ListedRule, RuleList, DEFAULT_CATEGORY, SYSTEM_CATEGORY,
};
pub use render::{
    RenderMode, RenderOptions, RenderedValue, Truncation, ValueRenderer, DEFAULT_MAX_CHILDREN,
};
pub use rule::{FormatKind, FormatRule, RuleContent, RuleOptions, TypePattern, ValueFormat};
pub use snapshot::{ClassState, MemorySnapshot};
pub use summary::{NativeSummaryFn, SummaryRenderer, SummarySource, SummaryTemplate};
pub use synthetic::{
    ProviderCache, ProviderFactory, ScriptHandle, ScriptInterpreter, SharedProvider,
    SyntheticProvider,
};
pub use target::{StopId, Target};
pub use types::{Field, TypeDescriptor, TypeKind};
pub use value::{Scalar, Value, ValueData, ValueId};
