//! Synthetic children: providers that present a value through a fabricated
//! child structure instead of its physical field layout.
//!
//! Providers come in two variants behind one call contract. Native providers
//! are compiled-in constructors; scripted providers are instantiated by an
//! external [`ScriptInterpreter`]. Either way the renderer only ever talks to
//! a `Box<dyn SyntheticProvider>`.

mod cache;
mod cfstring;
mod vector;

pub use cache::{ProviderCache, SharedProvider};
pub use cfstring::{cfstring_summary, read_cfstring, CfStringContents, CfStringProvider};
pub use vector::{VectorProvider, VECTOR_PATTERN};

use std::fmt;
use std::sync::Arc;

use crate::error::{FormatterError, FormatterResult};
use crate::target::Target;
use crate::value::Value;

/// A fabricated child set bound to one value.
///
/// `update` must run before the first query and again after every process
/// state change; the cache takes care of that.
pub trait SyntheticProvider: Send {
    /// Re-read whatever the children depend on
    fn update(&mut self, target: &dyn Target) -> FormatterResult<()>;

    /// Number of children as of the last `update`
    fn child_count(&self) -> usize;

    /// Child at `index`; out of range is an `Index` error
    fn child_at(&self, index: usize, target: &dyn Target) -> FormatterResult<Value>;

    /// Index of the child called `name`, without enumerating the rest
    fn index_of_child_named(&self, name: &str) -> Option<usize>;
}

/// Constructor of a native provider
pub type ProviderConstructor = fn(&Value) -> Box<dyn SyntheticProvider>;

/// How a synthetic rule produces its provider
#[derive(Clone)]
pub enum ProviderFactory {
    Native {
        name: &'static str,
        create: ProviderConstructor,
    },
    Scripted(ScriptHandle),
}

impl ProviderFactory {
    pub fn native(name: &'static str, create: ProviderConstructor) -> Self {
        ProviderFactory::Native { name, create }
    }

    pub fn name(&self) -> &str {
        match self {
            ProviderFactory::Native { name, .. } => name,
            ProviderFactory::Scripted(handle) => handle.name(),
        }
    }

    /// New provider bound to `value` (not yet updated)
    pub fn instantiate(&self, value: &Value) -> FormatterResult<Box<dyn SyntheticProvider>> {
        match self {
            ProviderFactory::Native { create, .. } => Ok(create(value)),
            ProviderFactory::Scripted(handle) => handle.create_synthetic(value),
        }
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFactory::Native { name, .. } => f.debug_tuple("Native").field(name).finish(),
            ProviderFactory::Scripted(handle) => f.debug_tuple("Scripted").field(handle).finish(),
        }
    }
}

/// External interpreter hosting user scripts
pub trait ScriptInterpreter: Send + Sync {
    /// Instantiate script class `class_name` as a provider for `value`
    fn create_synthetic(
        &self,
        class_name: &str,
        value: &Value,
    ) -> FormatterResult<Box<dyn SyntheticProvider>>;

    /// Call summary function `function_name` on `value`
    fn call_summary(
        &self,
        function_name: &str,
        value: &Value,
        target: &dyn Target,
    ) -> FormatterResult<String>;
}

/// Named entry point inside a script interpreter
#[derive(Clone)]
pub struct ScriptHandle {
    name: String,
    interpreter: Arc<dyn ScriptInterpreter>,
}

impl ScriptHandle {
    pub fn new(name: impl Into<String>, interpreter: Arc<dyn ScriptInterpreter>) -> Self {
        Self {
            name: name.into(),
            interpreter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_synthetic(&self, value: &Value) -> FormatterResult<Box<dyn SyntheticProvider>> {
        self.interpreter
            .create_synthetic(&self.name, value)
            .map_err(|e| self.script_error(e))
    }

    pub fn call_summary(&self, value: &Value, target: &dyn Target) -> FormatterResult<String> {
        self.interpreter
            .call_summary(&self.name, value, target)
            .map_err(|e| self.script_error(e))
    }

    fn script_error(&self, error: FormatterError) -> FormatterError {
        match error {
            FormatterError::Script { .. } => error,
            other => FormatterError::Script {
                name: self.name.clone(),
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Debug for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Parse `[N]` child names
pub(crate) fn parse_index_name(name: &str) -> Option<usize> {
    name.strip_prefix('[')?.strip_suffix(']')?.parse().ok()
}
