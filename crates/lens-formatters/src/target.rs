//! The process-side collaborator consumed by the formatting core.
//!
//! Memory I/O, debug-info lookup and in-target evaluation all live behind
//! this trait. Every call is made against a frozen-at-stop snapshot; the
//! `stop_id` generation changes whenever the process resumes and stops again.

use std::sync::Arc;

use crate::error::{FormatterError, FormatterResult};
use crate::types::TypeDescriptor;
use crate::value::Value;

/// Process-state generation; bumped on every stop/resume transition
pub type StopId = u64;

/// Access to a stopped process
pub trait Target: Send + Sync {
    /// Current process-state generation
    fn stop_id(&self) -> StopId;

    /// Read `len` bytes of memory at `address`
    fn read_memory(&self, address: u64, len: usize) -> FormatterResult<Vec<u8>>;

    /// Look up a type by fully-qualified name in debug info
    fn lookup_type(&self, name: &str) -> Option<Arc<TypeDescriptor>>;

    /// Class name for a class pointer, using only already-loaded runtime state
    fn loaded_class_name(&self, isa: u64) -> Option<String>;

    /// Class name of the object at `address`, computed by running code in the target
    fn evaluate_class_name(&self, address: u64) -> FormatterResult<String>;

    /// Description string of the object at `address` (runs code in the target)
    fn object_description(&self, address: u64) -> FormatterResult<String>;

    /// Materialize a value of type `ty` at `address`
    fn value_at(&self, name: &str, ty: &Arc<TypeDescriptor>, address: u64) -> FormatterResult<Value> {
        let bytes = self.read_memory(address, ty.byte_size() as usize)?;
        Value::decode(name, ty, address, &bytes)
    }

    /// Read a pointer-sized word
    fn read_u64(&self, address: u64) -> FormatterResult<u64> {
        let bytes = self.read_memory(address, 8)?;
        let word = bytes
            .get(..8)
            .ok_or(FormatterError::MemoryRead { address, len: 8 })?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(word);
        Ok(u64::from_le_bytes(buf))
    }
}
