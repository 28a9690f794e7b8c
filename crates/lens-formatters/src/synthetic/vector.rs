//! `std::vector<T>` (libstdc++-style and libc++ `std::__1::`) element view.

use std::sync::Arc;

use super::{parse_index_name, ProviderFactory, SyntheticProvider};
use crate::error::{FormatterError, FormatterResult};
use crate::target::Target;
use crate::types::TypeDescriptor;
use crate::value::Value;

/// Type names handled by [`VectorProvider`]
pub const VECTOR_PATTERN: &str = r"^std::(__1::)?vector<.+>$";

/// Upper bound on reported elements
const MAX_ELEMENTS: u64 = 1 << 20;

const PROVIDER_NAME: &str = "std::vector";

#[derive(Debug, Clone)]
struct VectorLayout {
    /// The vector object itself, parent of every element
    vector: Value,
    element: Arc<TypeDescriptor>,
    begin: u64,
    count: usize,
}

/// Children `[0]..[n-1]` read from the `__begin_` / `__end_` pointers
pub struct VectorProvider {
    value: Value,
    layout: Option<VectorLayout>,
}

impl VectorProvider {
    pub fn create(value: &Value) -> Box<dyn SyntheticProvider> {
        Box::new(Self {
            value: value.clone(),
            layout: None,
        })
    }

    pub fn factory() -> ProviderFactory {
        ProviderFactory::native(PROVIDER_NAME, Self::create)
    }

    /// The vector object as of the current stop
    fn current_vector(&self, target: &dyn Target) -> FormatterResult<Value> {
        if self.value.type_descriptor().is_pointer_like() {
            return self.value.dereference(target);
        }
        match self.value.address() {
            Some(address) => Ok(target
                .value_at(self.value.name(), self.value.type_descriptor(), address)?
                .with_parent_of(&self.value)),
            None => Ok(self.value.clone()),
        }
    }

    fn layout(&self, target: &dyn Target) -> FormatterResult<VectorLayout> {
        let vector = self.current_vector(target)?;
        let field = |name: &str| {
            vector.field_named(name).ok_or_else(|| {
                FormatterError::provider(PROVIDER_NAME, format!("missing field '{}'", name))
            })
        };
        let begin_field = field("__begin_")?;
        let end_field = field("__end_")?;

        let element = begin_field
            .type_descriptor()
            .pointee()
            .cloned()
            .ok_or_else(|| FormatterError::provider(PROVIDER_NAME, "'__begin_' is not a pointer"))?;
        let size = element.byte_size();
        if size == 0 {
            return Err(FormatterError::provider(PROVIDER_NAME, "zero-sized element type"));
        }

        let begin = begin_field.pointer_target().unwrap_or(0);
        let end = end_field.pointer_target().unwrap_or(0);
        if end < begin || (end - begin) % size != 0 {
            return Err(FormatterError::provider(
                PROVIDER_NAME,
                format!("inconsistent storage: begin 0x{:x}, end 0x{:x}, element size {}", begin, end, size),
            ));
        }
        let count = (end - begin) / size;
        if count > MAX_ELEMENTS {
            return Err(FormatterError::provider(
                PROVIDER_NAME,
                format!("implausible element count {}", count),
            ));
        }
        if count > 0 && begin == 0 {
            return Err(FormatterError::provider(PROVIDER_NAME, "null storage with elements"));
        }

        Ok(VectorLayout {
            vector,
            element,
            begin,
            count: count as usize,
        })
    }
}

impl SyntheticProvider for VectorProvider {
    fn update(&mut self, target: &dyn Target) -> FormatterResult<()> {
        self.layout = None;
        self.layout = Some(self.layout(target)?);
        Ok(())
    }

    fn child_count(&self) -> usize {
        self.layout.as_ref().map_or(0, |l| l.count)
    }

    fn child_at(&self, index: usize, target: &dyn Target) -> FormatterResult<Value> {
        let layout = self.layout.as_ref().ok_or(FormatterError::Index { index, count: 0 })?;
        if index >= layout.count {
            return Err(FormatterError::Index {
                index,
                count: layout.count,
            });
        }
        let address = (index as u64)
            .checked_mul(layout.element.byte_size())
            .and_then(|offset| layout.begin.checked_add(offset))
            .ok_or(FormatterError::Index {
                index,
                count: layout.count,
            })?;
        let element = target.value_at(&format!("[{}]", index), &layout.element, address)?;
        Ok(element.with_parent(&layout.vector))
    }

    fn index_of_child_named(&self, name: &str) -> Option<usize> {
        parse_index_name(name).filter(|i| *i < self.child_count())
    }
}
