//! Rule lookup for a type.
//!
//! Enabled categories are scanned in registration order. Within a category
//! each candidate is tried in turn: the type's own name, its superclasses,
//! then each pointee level followed by that level's superclasses. For a
//! candidate, exact-name rules are tried newest first, then regex rules
//! newest first. The first rule that accepts the candidate wins, so an
//! earlier category beats a later one even across pointer hops.

use std::sync::Arc;

use crate::registry::{Category, FormatterRegistry, RankedRule};
use crate::rule::{FormatKind, FormatRule};
use crate::types::TypeDescriptor;

/// The winning rule and where it was found
#[derive(Debug, Clone)]
pub struct MatchedRule {
    pub rule: Arc<FormatRule>,
    pub category: String,
    pub rank: u64,
    /// Candidate name the rule matched
    pub matched_type: String,
    /// Pointer hops taken to reach the candidate
    pub hops: u32,
    /// Matched through a superclass
    pub derived: bool,
}

/// Best rule of each kind for one type
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub format: Option<MatchedRule>,
    pub summary: Option<MatchedRule>,
    pub synthetic: Option<MatchedRule>,
}

impl RuleSet {
    pub fn get(&self, kind: FormatKind) -> Option<&MatchedRule> {
        match kind {
            FormatKind::Format => self.format.as_ref(),
            FormatKind::Summary => self.summary.as_ref(),
            FormatKind::Synthetic => self.synthetic.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.format.is_none() && self.summary.is_none() && self.synthetic.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate<'t> {
    name: &'t str,
    hops: u32,
    derived: bool,
}

fn candidates(ty: &TypeDescriptor) -> Vec<Candidate<'_>> {
    let mut out = Vec::new();
    out.push(Candidate {
        name: ty.name(),
        hops: 0,
        derived: false,
    });
    out.extend(ty.superclasses().iter().map(|s| Candidate {
        name: s.as_str(),
        hops: 0,
        derived: true,
    }));
    for (i, level) in ty.pointee_chain().enumerate() {
        let hops = i as u32 + 1;
        out.push(Candidate {
            name: level.name(),
            hops,
            derived: false,
        });
        out.extend(level.superclasses().iter().map(|s| Candidate {
            name: s.as_str(),
            hops,
            derived: true,
        }));
    }
    out
}

/// Matches types against a registry
pub struct TypeMatcher<'a> {
    registry: &'a FormatterRegistry,
}

impl<'a> TypeMatcher<'a> {
    pub fn new(registry: &'a FormatterRegistry) -> Self {
        Self { registry }
    }

    /// Best rule of `kind` for `ty`, if any
    pub fn find(&self, ty: &TypeDescriptor, kind: FormatKind) -> Option<MatchedRule> {
        let candidates = candidates(ty);
        let found = self
            .registry
            .with_categories(|categories| search(categories, &candidates, kind));
        if let Some(m) = &found {
            tracing::debug!(
                type_name = ty.name(),
                %kind,
                rule = m.rule.name(),
                category = %m.category,
                hops = m.hops,
                derived = m.derived,
                "rule matched"
            );
        }
        found
    }

    /// Best rule of every kind, under a single read lock
    pub fn find_all(&self, ty: &TypeDescriptor) -> RuleSet {
        let candidates = candidates(ty);
        self.registry.with_categories(|categories| RuleSet {
            format: search(categories, &candidates, FormatKind::Format),
            summary: search(categories, &candidates, FormatKind::Summary),
            synthetic: search(categories, &candidates, FormatKind::Synthetic),
        })
    }
}

fn search(categories: &[Category], candidates: &[Candidate<'_>], kind: FormatKind) -> Option<MatchedRule> {
    for category in categories.iter().filter(|c| c.is_enabled()) {
        let rules = category.kind_rules(kind);
        for candidate in candidates {
            let hit = newest_accepting(&rules.exact, candidate)
                .or_else(|| newest_accepting(&rules.regex, candidate));
            if let Some(ranked) = hit {
                return Some(MatchedRule {
                    rule: Arc::clone(&ranked.rule),
                    category: category.name().to_string(),
                    rank: ranked.rank,
                    matched_type: candidate.name.to_string(),
                    hops: candidate.hops,
                    derived: candidate.derived,
                });
            }
        }
    }
    None
}

fn newest_accepting<'r>(rules: &'r [RankedRule], candidate: &Candidate<'_>) -> Option<&'r RankedRule> {
    rules
        .iter()
        .rev()
        .find(|r| r.rule.accepts(candidate.name, candidate.hops, candidate.derived))
}
