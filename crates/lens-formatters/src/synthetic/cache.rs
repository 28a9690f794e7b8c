//! Per-value provider cache
//!
//! Providers are created lazily on first match and kept per value identity
//! until the next state change. A process stop or resume, a registry
//! mutation or a different rule for the same value evicts the entry; the
//! next lookup builds a new provider and runs `update()` before any children
//! are handed out. The cache therefore never outlives one stop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::SyntheticProvider;
use crate::error::{FormatterError, FormatterResult};
use crate::rule::{FormatRule, RuleContent};
use crate::target::{StopId, Target};
use crate::value::{Value, ValueId};

/// Provider shared between the cache and an in-flight render
pub type SharedProvider = Arc<Mutex<Box<dyn SyntheticProvider>>>;

struct CacheEntry {
    rule: Arc<FormatRule>,
    provider: SharedProvider,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<ValueId, CacheEntry>,
    /// Stop id every cached entry was updated under
    stop_id: Option<StopId>,
    /// Registry generation the entries were matched under
    registry_generation: Option<u64>,
    stats: CacheStats,
}

impl CacheState {
    fn evict_all(&mut self, reason: &'static str) {
        if self.entries.is_empty() {
            return;
        }
        let count = self.entries.len();
        self.entries.clear();
        self.stats.evicted += count as u64;
        tracing::trace!(count, reason, "synthetic providers evicted");
    }
}

/// Cache performance statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached provider reused as is
    pub hits: u64,
    /// New provider instantiated
    pub misses: u64,
    /// Entries dropped by a state change or a replaced rule
    pub evicted: u64,
    /// Provider dropped after a failed update
    pub discarded: u64,
}

/// Synthetic providers keyed by value identity
#[derive(Default)]
pub struct ProviderCache {
    state: Mutex<CacheState>,
}

impl ProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Updated provider for `value` under synthetic rule `rule`.
    ///
    /// A failed update discards the provider; the caller falls back to the
    /// physical layout.
    pub fn provider_for(
        &self,
        value: &Value,
        rule: &Arc<FormatRule>,
        target: &dyn Target,
    ) -> FormatterResult<SharedProvider> {
        let RuleContent::Synthetic(factory) = rule.content() else {
            return Err(FormatterError::invalid_value(
                rule.name(),
                "rule does not carry a synthetic provider",
            ));
        };

        let id = value.id();
        let stop_id = target.stop_id();

        {
            let mut state = self.lock();
            if state.stop_id != Some(stop_id) {
                state.evict_all("new stop");
                state.stop_id = Some(stop_id);
            }
            match state.entries.get(&id) {
                Some(entry) if Arc::ptr_eq(&entry.rule, rule) => {
                    let provider = Arc::clone(&entry.provider);
                    state.stats.hits += 1;
                    tracing::trace!(value = %value.expression_path(), "synthetic provider cache hit");
                    return Ok(provider);
                }
                Some(_) => {
                    state.entries.remove(&id);
                    state.stats.evicted += 1;
                }
                None => {}
            }
            state.stats.misses += 1;
        }

        // Provider code runs without the cache lock held
        let created = factory.instantiate(value).and_then(|mut provider| {
            provider.update(target)?;
            Ok(provider)
        });
        let provider = match created {
            Ok(provider) => provider,
            Err(error) => {
                self.lock().stats.discarded += 1;
                tracing::warn!(
                    value = %value.expression_path(),
                    provider = factory.name(),
                    %error,
                    "synthetic provider failed; falling back to raw layout"
                );
                return Err(error);
            }
        };
        tracing::trace!(
            value = %value.expression_path(),
            provider = factory.name(),
            stop_id,
            "synthetic provider updated"
        );

        let provider: SharedProvider = Arc::new(Mutex::new(provider));
        let mut state = self.lock();
        // A state change while the provider ran makes this result stale
        if state.stop_id == Some(stop_id) {
            state.entries.insert(
                id,
                CacheEntry {
                    rule: Arc::clone(rule),
                    provider: Arc::clone(&provider),
                },
            );
        }
        Ok(provider)
    }

    /// Drop every cached provider after a process state transition
    pub fn invalidate_all(&self) {
        let mut state = self.lock();
        state.evict_all("process state changed");
        state.stop_id = None;
    }

    /// Drop every cached provider when the registry changed since the last
    /// call, so entries never pin rules that were replaced or deleted
    pub fn sync_registry(&self, generation: u64) {
        let mut state = self.lock();
        if state.registry_generation != Some(generation) {
            state.evict_all("registry changed");
            state.registry_generation = Some(generation);
        }
    }

    /// Drop every cached provider
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }
}
