//! Typed administrative commands (`type format|summary|synth ...`).
//!
//! The command-line front end parses user input into these; execution
//! validates every pattern and template before touching the registry, so a
//! rejected command leaves it unchanged.

use std::fmt::Write as _;

use crate::error::{FormatterError, FormatterResult};
use crate::registry::{FormatterRegistry, DEFAULT_CATEGORY};
use crate::rule::{FormatKind, FormatRule, RuleContent, RuleOptions, TypePattern, ValueFormat};
use crate::summary::{SummarySource, SummaryTemplate};
use crate::synthetic::ProviderFactory;

/// What an added rule does
#[derive(Debug, Clone)]
pub enum RuleSpec {
    Format(ValueFormat),
    /// Summary template text, parsed at execution
    Template(String),
    /// Native or scripted summary function
    Summary(SummarySource),
    Synthetic(ProviderFactory),
}

impl RuleSpec {
    pub fn kind(&self) -> FormatKind {
        match self {
            RuleSpec::Format(_) => FormatKind::Format,
            RuleSpec::Template(_) | RuleSpec::Summary(_) => FormatKind::Summary,
            RuleSpec::Synthetic(_) => FormatKind::Synthetic,
        }
    }
}

/// `type <kind> add`
#[derive(Debug, Clone)]
pub struct AddCommand {
    pub spec: RuleSpec,
    /// One rule is added per name
    pub type_names: Vec<String>,
    /// Treat names as regular expressions
    pub regex: bool,
    /// Target category; `default` when absent
    pub category: Option<String>,
    pub options: RuleOptions,
}

impl AddCommand {
    pub fn new(spec: RuleSpec, type_name: impl Into<String>) -> Self {
        Self {
            spec,
            type_names: vec![type_name.into()],
            regex: false,
            category: None,
            options: RuleOptions::default(),
        }
    }

    pub fn regex(mut self) -> Self {
        self.regex = true;
        self
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_cascade(mut self, cascade: bool) -> Self {
        self.options.cascade = cascade;
        self
    }

    pub fn with_skip_pointers(mut self, hops: u32) -> Self {
        self.options.skip_pointers = hops;
        self
    }

    pub fn also(mut self, type_name: impl Into<String>) -> Self {
        self.type_names.push(type_name.into());
        self
    }

    /// Build every rule, failing on the first bad pattern or template
    fn rules(&self) -> FormatterResult<Vec<FormatRule>> {
        if self.type_names.is_empty() {
            return Err(FormatterError::invalid_value(
                format!("type {} add", self.spec.kind()),
                "at least one type name is required",
            ));
        }
        // Parsed once; every rule shares the result
        let content = match &self.spec {
            RuleSpec::Format(format) => RuleContent::Format(*format),
            RuleSpec::Template(text) => {
                RuleContent::Summary(SummarySource::Template(SummaryTemplate::parse(text)?))
            }
            RuleSpec::Summary(source) => RuleContent::Summary(source.clone()),
            RuleSpec::Synthetic(factory) => RuleContent::Synthetic(factory.clone()),
        };

        self.type_names
            .iter()
            .map(|name| {
                let pattern = if self.regex {
                    TypePattern::regex(name)?
                } else {
                    TypePattern::exact(name.trim())
                };
                Ok(FormatRule::new(pattern, content.clone()).with_options(self.options))
            })
            .collect()
    }
}

/// One administrative request
#[derive(Debug, Clone)]
pub enum TypeCommand {
    Add(AddCommand),
    /// Without a category, the name is removed from every category
    Delete {
        kind: FormatKind,
        type_name: String,
        category: Option<String>,
    },
    /// Rule listing; `filter` keeps names containing it
    List {
        kind: Option<FormatKind>,
        category: Option<String>,
        filter: Option<String>,
    },
    Clear {
        kind: Option<FormatKind>,
        category: Option<String>,
    },
    EnableCategory(String),
    DisableCategory(String),
}

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    Added { category: String, ranks: Vec<u64> },
    Deleted { categories: Vec<String> },
    Listing(String),
    Cleared(usize),
    CategoryToggled { name: String, enabled: bool },
}

impl TypeCommand {
    pub fn execute(&self, registry: &FormatterRegistry) -> FormatterResult<CommandOutput> {
        match self {
            TypeCommand::Add(add) => {
                let rules = add.rules()?;
                let category = add.category.as_deref().unwrap_or(DEFAULT_CATEGORY);
                let ranks = rules
                    .into_iter()
                    .map(|rule| registry.add_rule(category, rule))
                    .collect();
                Ok(CommandOutput::Added {
                    category: category.to_string(),
                    ranks,
                })
            }
            TypeCommand::Delete {
                kind,
                type_name,
                category,
            } => {
                let categories = match category {
                    Some(category) => {
                        registry.delete_rule(category, *kind, type_name)?;
                        vec![category.clone()]
                    }
                    None => registry.delete_rule_everywhere(*kind, type_name)?,
                };
                Ok(CommandOutput::Deleted { categories })
            }
            TypeCommand::List {
                kind,
                category,
                filter,
            } => list(registry, *kind, category.as_deref(), filter.as_deref()).map(CommandOutput::Listing),
            TypeCommand::Clear { kind, category } => registry
                .clear(category.as_deref(), *kind)
                .map(CommandOutput::Cleared),
            TypeCommand::EnableCategory(name) => toggle(registry, name, true),
            TypeCommand::DisableCategory(name) => toggle(registry, name, false),
        }
    }
}

fn toggle(registry: &FormatterRegistry, name: &str, enabled: bool) -> FormatterResult<CommandOutput> {
    registry.set_category_enabled(name, enabled)?;
    Ok(CommandOutput::CategoryToggled {
        name: name.to_string(),
        enabled,
    })
}

/// Text listing grouped by category, in matching order
fn list(
    registry: &FormatterRegistry,
    kind: Option<FormatKind>,
    category: Option<&str>,
    filter: Option<&str>,
) -> FormatterResult<String> {
    let rules = registry.list_rules(category, kind)?;
    let mut out = String::new();
    for name in registry.categories() {
        let in_category: Vec<_> = rules
            .iter()
            .filter(|e| e.category == name)
            .filter(|e| filter.map_or(true, |f| e.rule.name().contains(f)))
            .collect();
        if in_category.is_empty() {
            continue;
        }
        let state = match registry.category_enabled(&name) {
            Some(false) => "disabled",
            _ => "enabled",
        };
        let _ = writeln!(out, "Category: {} ({})", name, state);
        for entry in in_category {
            let _ = writeln!(out, "  [{}] {}", entry.kind, entry.rule);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::CfStringProvider;
    use pretty_assertions::assert_eq;

    fn summary(template: &str, name: &str) -> TypeCommand {
        TypeCommand::Add(AddCommand::new(RuleSpec::Template(template.to_string()), name))
    }

    #[test]
    fn test_add_then_list() {
        let registry = FormatterRegistry::new();
        summary("a test", "MyClass").execute(&registry).unwrap();
        TypeCommand::Add(
            AddCommand::new(RuleSpec::Format(ValueFormat::Hex), "int").with_skip_pointers(0),
        )
        .execute(&registry)
        .unwrap();

        let listing = TypeCommand::List {
            kind: None,
            category: None,
            filter: None,
        }
        .execute(&registry)
        .unwrap();
        assert_eq!(
            listing,
            CommandOutput::Listing(
                "Category: default (enabled)\n  [format] int: hex (skip pointers: 0)\n  [summary] MyClass: `a test`\n"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_bad_pattern_leaves_registry_unchanged() {
        let registry = FormatterRegistry::new();
        let command = TypeCommand::Add(
            AddCommand::new(RuleSpec::Format(ValueFormat::Hex), "^ok$")
                .also("(broken")
                .regex(),
        );
        let err = command.execute(&registry).unwrap_err();
        assert!(matches!(err, FormatterError::InvalidPattern { .. }));
        assert!(registry.list_rules(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_bad_template_rejected() {
        let registry = FormatterRegistry::new();
        let err = summary("${var", "MyClass").execute(&registry).unwrap_err();
        assert!(matches!(err, FormatterError::Parse { .. }));
        assert!(registry.list_rules(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_without_category() {
        let registry = FormatterRegistry::new();
        let synth = |category: &str| {
            TypeCommand::Add(
                AddCommand::new(RuleSpec::Synthetic(CfStringProvider::factory()), "NSString")
                    .in_category(category),
            )
        };
        synth("default").execute(&registry).unwrap();
        synth("objc").execute(&registry).unwrap();

        let delete = TypeCommand::Delete {
            kind: FormatKind::Synthetic,
            type_name: "NSString".to_string(),
            category: None,
        };
        assert_eq!(
            delete.execute(&registry).unwrap(),
            CommandOutput::Deleted {
                categories: vec!["default".to_string(), "objc".to_string()]
            }
        );
        assert!(delete.execute(&registry).unwrap_err().is_not_found());
    }

    #[test]
    fn test_filter_and_disabled_category() {
        let registry = FormatterRegistry::new();
        summary("one", "Alpha").execute(&registry).unwrap();
        TypeCommand::Add(
            AddCommand::new(RuleSpec::Template("two".to_string()), "Beta").in_category("extra"),
        )
        .execute(&registry)
        .unwrap();
        TypeCommand::DisableCategory("extra".to_string())
            .execute(&registry)
            .unwrap();

        let CommandOutput::Listing(text) = TypeCommand::List {
            kind: Some(FormatKind::Summary),
            category: None,
            filter: Some("Bet".to_string()),
        }
        .execute(&registry)
        .unwrap() else {
            panic!("expected a listing");
        };
        assert_eq!(text, "Category: extra (disabled)\n  [summary] Beta: `two`\n");
    }

    #[test]
    fn test_unknown_category_toggle() {
        let registry = FormatterRegistry::new();
        let err = TypeCommand::EnableCategory("nope".to_string())
            .execute(&registry)
            .unwrap_err();
        assert_eq!(err, FormatterError::UnknownCategory("nope".to_string()));
    }
}
