//! Dynamic type resolution for object values.
//!
//! Object instances carry their class pointer in the first word. Resolving
//! the dynamic type means mapping that pointer to a class name, either from
//! runtime state the debugger already has or by running code in the target.
//! Every failure degrades to the static type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lens_config::DynamicSetting;

use crate::error::{FormatterError, FormatterResult};
use crate::target::Target;
use crate::types::{TypeDescriptor, TypeKind};
use crate::value::Value;

/// How far the resolver may go to find a dynamic type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DynamicMode {
    /// Static type only
    #[default]
    NoDynamic,
    /// Already-loaded runtime state only
    CurrentFrame,
    /// May evaluate code in the target
    RunTarget,
}

impl DynamicMode {
    pub fn name(&self) -> &'static str {
        match self {
            DynamicMode::NoDynamic => "no-dynamic",
            DynamicMode::CurrentFrame => "current-frame",
            DynamicMode::RunTarget => "run-target",
        }
    }
}

impl FromStr for DynamicMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-dynamic" | "no-dynamic-values" => Ok(DynamicMode::NoDynamic),
            "current-frame" | "no-run-target" => Ok(DynamicMode::CurrentFrame),
            "run-target" => Ok(DynamicMode::RunTarget),
            other => Err(format!("unknown dynamic mode '{}'", other)),
        }
    }
}

impl fmt::Display for DynamicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<DynamicSetting> for DynamicMode {
    fn from(setting: DynamicSetting) -> Self {
        match setting {
            DynamicSetting::NoDynamic => DynamicMode::NoDynamic,
            DynamicSetting::CurrentFrame => DynamicMode::CurrentFrame,
            DynamicSetting::RunTarget => DynamicMode::RunTarget,
        }
    }
}

/// Resolves the effective runtime type of object values
pub struct DynamicTypeResolver<'a> {
    target: &'a dyn Target,
}

impl<'a> DynamicTypeResolver<'a> {
    pub fn new(target: &'a dyn Target) -> Self {
        Self { target }
    }

    /// Dynamic type of `value`, or `None` when it is the static type or
    /// cannot be determined under `mode`
    pub fn resolve(&self, value: &Value, mode: DynamicMode) -> Option<Arc<TypeDescriptor>> {
        if mode == DynamicMode::NoDynamic {
            return None;
        }
        let static_ty = value.type_descriptor();
        let (address, through_pointer) = object_location(value)?;

        let class = match self.class_name(address, mode) {
            Ok(class) => class,
            Err(error) => {
                tracing::debug!(
                    value = %value.expression_path(),
                    mode = %mode,
                    %error,
                    "dynamic type unavailable; using static type"
                );
                return None;
            }
        };

        let object = self.target.lookup_type(&class).unwrap_or_else(|| {
            let size = static_ty
                .pointee()
                .map_or(static_ty.byte_size(), |p| p.byte_size());
            Arc::new(TypeDescriptor::object(class.clone(), size, Vec::new()))
        });
        let resolved = if through_pointer {
            TypeDescriptor::pointer_to(&object)
        } else {
            object
        };

        if resolved.name() == static_ty.name() {
            return None;
        }
        tracing::debug!(
            value = %value.expression_path(),
            static_type = static_ty.name(),
            dynamic_type = resolved.name(),
            "dynamic type resolved"
        );
        Some(resolved)
    }

    /// Class name of the object at `address`
    pub fn class_name(&self, address: u64, mode: DynamicMode) -> FormatterResult<String> {
        let loaded = || -> FormatterResult<String> {
            let isa = self.target.read_u64(address)?;
            self.target.loaded_class_name(isa).ok_or_else(|| {
                FormatterError::Resolution(format!("class 0x{:x} not loaded", isa))
            })
        };
        match mode {
            DynamicMode::NoDynamic => Err(FormatterError::Resolution(
                "dynamic resolution disabled".to_string(),
            )),
            DynamicMode::CurrentFrame => loaded(),
            DynamicMode::RunTarget => loaded().or_else(|_| self.target.evaluate_class_name(address)),
        }
    }

    /// `value` viewed as `dynamic`; objects are re-read with the dynamic layout
    pub fn retype(&self, value: &Value, dynamic: &Arc<TypeDescriptor>) -> FormatterResult<Value> {
        if dynamic.is_pointer_like() {
            return Ok(value.retyped(dynamic));
        }
        let address = value.address().ok_or_else(|| {
            FormatterError::Resolution(format!("'{}' has no address", value.expression_path()))
        })?;
        Ok(self
            .target
            .value_at(value.name(), dynamic, address)?
            .with_parent_of(value))
    }
}

/// Object address behind `value`, and whether it was reached through a pointer
fn object_location(value: &Value) -> Option<(u64, bool)> {
    let ty = value.type_descriptor();
    if ty.is_object_pointer() {
        return value.pointer_target().filter(|a| *a != 0).map(|a| (a, true));
    }
    if ty.kind() == TypeKind::Object {
        return value.address().map(|a| (a, false));
    }
    None
}
