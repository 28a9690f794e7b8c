//! Categorized, ranked storage of formatting rules.
//!
//! The registry is process-wide state shared by every render. Matching takes
//! the read lock only long enough to clone the winning `Arc<FormatRule>`;
//! mutations hold the write lock for the structural change only.
//!
//! Ranks come from one global counter. A rule keeps its rank when replaced
//! by a rule of the same name in the same (category, kind) and gets a fresh
//! one when deleted and added again.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lens_config::Config;

use crate::error::{FormatterError, FormatterResult};
use crate::rule::{FormatKind, FormatRule};

/// Category every unqualified command targets
pub const DEFAULT_CATEGORY: &str = "default";

/// Category holding the built-in formatters
pub const SYSTEM_CATEGORY: &str = "system";

/// A rule together with its registration rank
#[derive(Debug, Clone)]
pub(crate) struct RankedRule {
    pub(crate) rule: Arc<FormatRule>,
    pub(crate) rank: u64,
}

/// One kind's rules, split by pattern type, each in ascending rank order
#[derive(Debug, Clone, Default)]
pub(crate) struct KindRules {
    pub(crate) exact: Vec<RankedRule>,
    pub(crate) regex: Vec<RankedRule>,
}

impl KindRules {
    fn len(&self) -> usize {
        self.exact.len() + self.regex.len()
    }

    fn position(&self, name: &str) -> Option<(bool, usize)> {
        if let Some(i) = self.exact.iter().position(|r| r.rule.name() == name) {
            return Some((false, i));
        }
        self.regex
            .iter()
            .position(|r| r.rule.name() == name)
            .map(|i| (true, i))
    }

    fn remove(&mut self, name: &str) -> Option<RankedRule> {
        match self.position(name)? {
            (false, i) => Some(self.exact.remove(i)),
            (true, i) => Some(self.regex.remove(i)),
        }
    }

    fn insert(&mut self, ranked: RankedRule) {
        let list = if ranked.rule.pattern().is_regex() {
            &mut self.regex
        } else {
            &mut self.exact
        };
        let at = list.partition_point(|r| r.rank < ranked.rank);
        list.insert(at, ranked);
    }

    /// All rules in ascending rank order
    fn ordered(&self) -> Vec<RankedRule> {
        let mut all: Vec<RankedRule> = self.exact.iter().chain(&self.regex).cloned().collect();
        all.sort_by_key(|r| r.rank);
        all
    }
}

/// A named, toggleable group of rules
#[derive(Debug, Clone)]
pub struct Category {
    name: String,
    enabled: bool,
    kinds: [KindRules; 3],
}

fn slot(kind: FormatKind) -> usize {
    match kind {
        FormatKind::Format => 0,
        FormatKind::Summary => 1,
        FormatKind::Synthetic => 2,
    }
}

impl Category {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            kinds: Default::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Rules of `kind` in ascending rank order
    pub fn rules(&self, kind: FormatKind) -> Vec<Arc<FormatRule>> {
        self.kinds[slot(kind)]
            .ordered()
            .into_iter()
            .map(|r| r.rule)
            .collect()
    }

    /// Number of rules across all kinds
    pub fn len(&self) -> usize {
        self.kinds.iter().map(KindRules::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn kind_rules(&self, kind: FormatKind) -> &KindRules {
        &self.kinds[slot(kind)]
    }

    fn kind_rules_mut(&mut self, kind: FormatKind) -> &mut KindRules {
        &mut self.kinds[slot(kind)]
    }
}

/// One entry of a listing
#[derive(Debug, Clone)]
pub struct ListedRule {
    pub category: String,
    pub kind: FormatKind,
    pub rank: u64,
    pub rule: Arc<FormatRule>,
}

impl fmt::Display for ListedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rule)
    }
}

/// Snapshot of the rules matching a listing query.
///
/// Iteration can be restarted any number of times; later registry changes
/// are not reflected.
#[derive(Debug, Clone, Default)]
pub struct RuleList {
    entries: Vec<ListedRule>,
}

impl RuleList {
    pub fn iter(&self) -> std::slice::Iter<'_, ListedRule> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rule names in listing order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.rule.name()).collect()
    }

    /// Whether any listed rule is called `name`
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.rule.name() == name)
    }
}

impl<'a> IntoIterator for &'a RuleList {
    type Item = &'a ListedRule;
    type IntoIter = std::slice::Iter<'a, ListedRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for RuleList {
    type Item = ListedRule;
    type IntoIter = std::vec::IntoIter<ListedRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[derive(Debug)]
struct RegistryState {
    /// Registration order is matching order
    categories: Vec<Category>,
    next_rank: u64,
    generation: u64,
}

impl RegistryState {
    fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    fn category_mut(&mut self, name: &str) -> Option<&mut Category> {
        self.categories.iter_mut().find(|c| c.name == name)
    }

    fn category_or_create(&mut self, name: &str) -> &mut Category {
        let index = match self.categories.iter().position(|c| c.name == name) {
            Some(i) => i,
            None => {
                tracing::debug!(category = name, "creating category");
                self.categories.push(Category::new(name));
                self.categories.len() - 1
            }
        };
        &mut self.categories[index]
    }
}

/// Process-wide rule registry
#[derive(Debug)]
pub struct FormatterRegistry {
    state: RwLock<RegistryState>,
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatterRegistry {
    /// Registry holding only the empty `default` category
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                categories: vec![Category::new(DEFAULT_CATEGORY)],
                next_rank: 0,
                generation: 0,
            }),
        }
    }

    /// Registry with the `system` category of built-in formatters
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::builtins::register(&registry);
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` over the categories under the read lock
    pub(crate) fn with_categories<R>(&self, f: impl FnOnce(&[Category]) -> R) -> R {
        f(&self.read().categories)
    }

    /// Register a category at the end of the matching order; false if it exists
    pub fn add_category(&self, name: &str) -> bool {
        let mut state = self.write();
        if state.category(name).is_some() {
            return false;
        }
        state.categories.push(Category::new(name));
        state.generation += 1;
        true
    }

    /// Add or replace a rule, returning its rank.
    ///
    /// A missing category is created. A rule with the same name in the same
    /// (category, kind) is replaced in place and its rank kept.
    pub fn add_rule(&self, category: &str, rule: FormatRule) -> u64 {
        let kind = rule.kind();
        let name = rule.name().to_string();
        let mut state = self.write();
        let fresh_rank = state.next_rank;

        let rules = state.category_or_create(category).kind_rules_mut(kind);
        let (rank, replaced) = match rules.remove(&name) {
            Some(previous) => (previous.rank, true),
            None => (fresh_rank, false),
        };
        rules.insert(RankedRule {
            rule: Arc::new(rule),
            rank,
        });

        if !replaced {
            state.next_rank += 1;
        }
        state.generation += 1;
        tracing::debug!(category, %kind, name = %name, rank, replaced, "rule registered");
        rank
    }

    /// Remove one rule
    pub fn delete_rule(&self, category: &str, kind: FormatKind, name: &str) -> FormatterResult<()> {
        let mut state = self.write();
        let cat = state
            .category_mut(category)
            .ok_or_else(|| FormatterError::UnknownCategory(category.to_string()))?;
        if cat.kind_rules_mut(kind).remove(name).is_none() {
            return Err(FormatterError::NotFound {
                kind,
                category: category.to_string(),
                name: name.to_string(),
            });
        }
        state.generation += 1;
        tracing::debug!(category, %kind, name, "rule deleted");
        Ok(())
    }

    /// Remove `name` from every category; returns the categories it was in
    pub fn delete_rule_everywhere(&self, kind: FormatKind, name: &str) -> FormatterResult<Vec<String>> {
        let mut state = self.write();
        let mut removed_from = Vec::new();
        for cat in state.categories.iter_mut() {
            if cat.kind_rules_mut(kind).remove(name).is_some() {
                removed_from.push(cat.name.clone());
            }
        }
        if removed_from.is_empty() {
            return Err(FormatterError::NotFound {
                kind,
                category: "*".to_string(),
                name: name.to_string(),
            });
        }
        state.generation += 1;
        Ok(removed_from)
    }

    /// Rules by category (registration order) then rank, optionally filtered
    pub fn list_rules(
        &self,
        category: Option<&str>,
        kind: Option<FormatKind>,
    ) -> FormatterResult<RuleList> {
        let state = self.read();
        if let Some(name) = category {
            if state.category(name).is_none() {
                return Err(FormatterError::UnknownCategory(name.to_string()));
            }
        }

        let kinds: Vec<FormatKind> = match kind {
            Some(k) => vec![k],
            None => FormatKind::ALL.to_vec(),
        };
        let mut entries = Vec::new();
        for cat in state
            .categories
            .iter()
            .filter(|c| category.map_or(true, |name| c.name == name))
        {
            for kind in &kinds {
                entries.extend(cat.kind_rules(*kind).ordered().into_iter().map(|r| ListedRule {
                    category: cat.name.clone(),
                    kind: *kind,
                    rank: r.rank,
                    rule: r.rule,
                }));
            }
        }
        Ok(RuleList { entries })
    }

    /// Remove every matching rule; categories themselves stay. Returns the count.
    pub fn clear(&self, category: Option<&str>, kind: Option<FormatKind>) -> FormatterResult<usize> {
        let mut state = self.write();
        if let Some(name) = category {
            if state.category(name).is_none() {
                return Err(FormatterError::UnknownCategory(name.to_string()));
            }
        }

        let mut removed = 0;
        for cat in state
            .categories
            .iter_mut()
            .filter(|c| category.map_or(true, |name| c.name == name))
        {
            for k in FormatKind::ALL {
                if kind.map_or(true, |wanted| wanted == k) {
                    let rules = cat.kind_rules_mut(k);
                    removed += rules.len();
                    *rules = KindRules::default();
                }
            }
        }
        state.generation += 1;
        tracing::debug!(?category, ?kind, removed, "rules cleared");
        Ok(removed)
    }

    /// Toggle a category; its rules and ranks are untouched
    pub fn set_category_enabled(&self, name: &str, enabled: bool) -> FormatterResult<()> {
        let mut state = self.write();
        let cat = state
            .category_mut(name)
            .ok_or_else(|| FormatterError::UnknownCategory(name.to_string()))?;
        cat.enabled = enabled;
        state.generation += 1;
        tracing::debug!(category = name, enabled, "category toggled");
        Ok(())
    }

    pub fn category_enabled(&self, name: &str) -> Option<bool> {
        self.read().category(name).map(|c| c.enabled)
    }

    /// Category names in matching order
    pub fn categories(&self) -> Vec<String> {
        self.read().categories.iter().map(|c| c.name.clone()).collect()
    }

    /// Snapshot of one category
    pub fn category(&self, name: &str) -> Option<Category> {
        self.read().category(name).cloned()
    }

    /// Drop every rule and category, leaving an empty `default`
    pub fn reset(&self) {
        let mut state = self.write();
        state.categories = vec![Category::new(DEFAULT_CATEGORY)];
        state.generation += 1;
    }

    /// Counter bumped by every mutation
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Disable the categories listed in `config`; unknown names are skipped
    pub fn apply_config(&self, config: &Config) {
        for name in config.disabled_categories() {
            if let Err(error) = self.set_category_enabled(name, false) {
                tracing::warn!(category = %name, %error, "cannot disable category from config");
            }
        }
    }
}
