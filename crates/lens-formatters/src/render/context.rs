//! Per-request render state: depth, cycle guard, pointer budget.

use std::collections::HashSet;

use super::options::RenderOptions;
use crate::dynamic::DynamicMode;

/// Identity of an expanded object on the current path.
///
/// The type name is part of the key so a base subobject sharing its
/// derived object's address is not mistaken for a revisit.
pub(crate) type VisitKey = (u64, String);

/// State of one top-level render; never outlives the call
#[derive(Debug)]
pub struct RenderContext {
    depth: u32,
    max_depth: u32,
    max_children: usize,
    pointer_budget: u32,
    /// Objects expanded on the current path only
    visited: HashSet<VisitKey>,
    dynamic: DynamicMode,
    synthetic: bool,
    show_dynamic_type: bool,
    raw: bool,
}

impl RenderContext {
    pub fn new(options: &RenderOptions) -> Self {
        Self {
            depth: 0,
            max_depth: options.max_depth,
            max_children: options.max_children,
            pointer_budget: options.pointer_depth,
            visited: HashSet::new(),
            dynamic: options.dynamic,
            synthetic: options.synthetic,
            show_dynamic_type: options.show_dynamic_type,
            raw: options.raw,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// No further level may be expanded
    pub fn depth_exhausted(&self) -> bool {
        self.depth >= self.max_depth
    }

    /// Synthetic children rendered per value
    pub fn max_children(&self) -> usize {
        self.max_children
    }

    pub fn pointer_budget(&self) -> u32 {
        self.pointer_budget
    }

    pub fn dynamic(&self) -> DynamicMode {
        if self.raw {
            DynamicMode::NoDynamic
        } else {
            self.dynamic
        }
    }

    pub fn synthetic(&self) -> bool {
        self.synthetic && !self.raw
    }

    pub fn show_dynamic_type(&self) -> bool {
        self.show_dynamic_type
    }

    pub fn raw(&self) -> bool {
        self.raw
    }

    /// Put `key` on the current path; false if it is already there
    pub(crate) fn enter(&mut self, key: VisitKey) -> bool {
        self.visited.insert(key)
    }

    pub(crate) fn leave(&mut self, key: &VisitKey) {
        self.visited.remove(key);
    }

    pub(crate) fn descend(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Spend one pointer level; false when none is left
    pub(crate) fn take_pointer(&mut self) -> bool {
        if self.pointer_budget == 0 {
            return false;
        }
        self.pointer_budget -= 1;
        true
    }

    pub(crate) fn return_pointer(&mut self) {
        self.pointer_budget += 1;
    }
}
