//! In-memory `Target`: a frozen copy of process memory plus the runtime
//! metadata (types, class table, description strings) a render needs.
//!
//! Used by tests and by front ends that capture a snapshot at stop time and
//! render from it afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{FormatterError, FormatterResult};
use crate::target::{StopId, Target};
use crate::types::TypeDescriptor;

/// Whether a class is already known to the runtime's loaded state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    /// Resolvable from the current frame without running code
    Loaded,
    /// Only resolvable by running code in the target
    Lazy,
}

#[derive(Debug, Default)]
struct SnapshotState {
    /// Start address -> contiguous bytes; regions never overlap
    regions: BTreeMap<u64, Vec<u8>>,
    types: HashMap<String, Arc<TypeDescriptor>>,
    classes: HashMap<u64, (String, ClassState)>,
    descriptions: HashMap<u64, String>,
}

/// Frozen process snapshot
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    state: RwLock<SnapshotState>,
    stop_id: AtomicU64,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SnapshotState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SnapshotState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `bytes` at `address`, merging with touching regions
    pub fn write_bytes(&self, address: u64, bytes: &[u8]) {
        let end = address + bytes.len() as u64;
        let mut state = self.write();

        let touching: Vec<u64> = state
            .regions
            .range(..=end)
            .filter(|(start, region)| **start + region.len() as u64 >= address)
            .map(|(start, _)| *start)
            .collect();

        let mut lo = address;
        let mut hi = end;
        for start in &touching {
            if let Some(region) = state.regions.get(start) {
                lo = lo.min(*start);
                hi = hi.max(*start + region.len() as u64);
            }
        }

        let mut merged = vec![0u8; (hi - lo) as usize];
        for start in touching {
            if let Some(region) = state.regions.remove(&start) {
                let offset = (start - lo) as usize;
                merged[offset..offset + region.len()].copy_from_slice(&region);
            }
        }
        let offset = (address - lo) as usize;
        merged[offset..offset + bytes.len()].copy_from_slice(bytes);
        state.regions.insert(lo, merged);
    }

    pub fn write_u64(&self, address: u64, value: u64) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    pub fn write_u32(&self, address: u64, value: u32) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    pub fn write_i32(&self, address: u64, value: i32) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    pub fn write_u8(&self, address: u64, value: u8) {
        self.write_bytes(address, &[value]);
    }

    /// Make a type visible to `lookup_type`
    pub fn register_type(&self, ty: &Arc<TypeDescriptor>) {
        self.write()
            .types
            .insert(ty.name().to_string(), Arc::clone(ty));
    }

    /// Record the class behind class pointer `isa`
    pub fn register_class(&self, isa: u64, name: impl Into<String>, state: ClassState) {
        self.write().classes.insert(isa, (name.into(), state));
    }

    /// Description string returned for the object at `address`
    pub fn set_description(&self, address: u64, description: impl Into<String>) {
        self.write()
            .descriptions
            .insert(address, description.into());
    }

    /// The process ran and stopped again
    pub fn resume_and_stop(&self) -> StopId {
        self.stop_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Target for MemorySnapshot {
    fn stop_id(&self) -> StopId {
        self.stop_id.load(Ordering::SeqCst)
    }

    fn read_memory(&self, address: u64, len: usize) -> FormatterResult<Vec<u8>> {
        let state = self.read();
        let fail = FormatterError::MemoryRead { address, len };
        let (start, region) = state.regions.range(..=address).next_back().ok_or(fail.clone())?;
        let offset = (address - start) as usize;
        let end = offset.checked_add(len).ok_or(fail.clone())?;
        region
            .get(offset..end)
            .map(<[u8]>::to_vec)
            .ok_or(fail)
    }

    fn lookup_type(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.read().types.get(name).cloned()
    }

    fn loaded_class_name(&self, isa: u64) -> Option<String> {
        match self.read().classes.get(&isa) {
            Some((name, ClassState::Loaded)) => Some(name.clone()),
            _ => None,
        }
    }

    fn evaluate_class_name(&self, address: u64) -> FormatterResult<String> {
        let isa = self.read_u64(address)?;
        self.read()
            .classes
            .get(&isa)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| {
                FormatterError::Resolution(format!(
                    "no class for isa 0x{:x} of object at 0x{:x}",
                    isa, address
                ))
            })
    }

    fn object_description(&self, address: u64) -> FormatterResult<String> {
        if let Some(description) = self.read().descriptions.get(&address) {
            return Ok(description.clone());
        }
        let class = self.evaluate_class_name(address)?;
        Ok(format!("<{}: 0x{:x}>", class, address))
    }
}
