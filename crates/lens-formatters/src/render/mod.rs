//! Per-request orchestration: resolve, match, render, recurse.
//!
//! Each value goes through the same steps. The dynamic type is resolved
//! first, then the best format, summary and synthetic rules are looked up in
//! one pass over the registry. The value text comes from the format rule. A
//! synthetic provider, when one matches and synthetic children are on,
//! supplies the children and suppresses the summary; otherwise the summary
//! is expanded and children come from the physical layout. Per-value
//! failures stay inside that value's subtree.

mod context;
mod options;
mod output;

pub use context::RenderContext;
pub use options::{RenderOptions, DEFAULT_MAX_CHILDREN};
pub use output::{RenderMode, RenderedValue, Truncation};

use std::sync::{Arc, PoisonError};

use crate::dynamic::DynamicTypeResolver;
use crate::error::{FormatterError, FormatterResult};
use crate::matcher::{RuleSet, TypeMatcher};
use crate::registry::FormatterRegistry;
use crate::rule::{RuleContent, ValueFormat};
use crate::summary::SummaryRenderer;
use crate::synthetic::{ProviderCache, SharedProvider};
use crate::target::Target;
use crate::value::{quote_bytes, Value};

use context::VisitKey;

/// Renders values against a shared registry and one target
pub struct ValueRenderer {
    registry: Arc<FormatterRegistry>,
    target: Arc<dyn Target>,
    providers: ProviderCache,
}

/// Value after dynamic resolution and rule lookup
struct Prepared {
    value: Value,
    dynamic_type: Option<String>,
    rules: RuleSet,
}

impl ValueRenderer {
    pub fn new(registry: Arc<FormatterRegistry>, target: Arc<dyn Target>) -> Self {
        Self {
            registry,
            target,
            providers: ProviderCache::new(),
        }
    }

    pub fn registry(&self) -> &Arc<FormatterRegistry> {
        &self.registry
    }

    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    pub fn providers(&self) -> &ProviderCache {
        &self.providers
    }

    /// The process resumed and stopped; cached providers must update again
    pub fn process_state_changed(&self) {
        self.providers.invalidate_all();
    }

    /// Render `value` and its children
    pub fn render(&self, value: &Value, options: &RenderOptions) -> RenderedValue {
        self.providers.sync_registry(self.registry.generation());
        let mut ctx = RenderContext::new(options);
        self.render_value(value, &mut ctx)
    }

    /// Child of `value` called `name`, through its synthetic provider when
    /// one applies, otherwise through its (dereferenced) physical layout
    pub fn child_named(&self, value: &Value, name: &str, options: &RenderOptions) -> FormatterResult<Value> {
        self.providers.sync_registry(self.registry.generation());
        let ctx = RenderContext::new(options);
        let prepared = self.prepare(value, &ctx);
        let target = self.target.as_ref();

        if let Some(provider) = self.provider(&prepared, &ctx) {
            let provider = provider.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = provider.index_of_child_named(name) {
                return provider.child_at(index, target);
            }
        }

        let base = &prepared.value;
        if let Some(child) = base.field_named(name) {
            return Ok(child);
        }
        if base.type_descriptor().is_pointer_like() {
            if let Some(child) = base.dereference(target)?.field_named(name) {
                return Ok(child.with_parent(base));
            }
        }
        Err(FormatterError::invalid_value(
            base.expression_path(),
            format!("no child named '{}'", name),
        ))
    }

    /// Render the child of `value` called `name`
    pub fn render_child_named(
        &self,
        value: &Value,
        name: &str,
        options: &RenderOptions,
    ) -> FormatterResult<RenderedValue> {
        let child = self.child_named(value, name, options)?;
        Ok(self.render(&child, options))
    }

    fn prepare(&self, value: &Value, ctx: &RenderContext) -> Prepared {
        let target = self.target.as_ref();
        let resolver = DynamicTypeResolver::new(target);

        let (effective, dynamic_type) = match resolver.resolve(value, ctx.dynamic()) {
            Some(dynamic) => match resolver.retype(value, &dynamic) {
                Ok(retyped) => (retyped, Some(dynamic.name().to_string())),
                Err(error) => {
                    tracing::debug!(
                        value = %value.expression_path(),
                        %error,
                        "cannot view value as its dynamic type"
                    );
                    (value.clone(), None)
                }
            },
            None => (value.clone(), None),
        };

        let rules = if ctx.raw() {
            RuleSet::default()
        } else {
            TypeMatcher::new(&self.registry).find_all(effective.type_descriptor())
        };

        Prepared {
            value: effective,
            dynamic_type,
            rules,
        }
    }

    fn provider(&self, prepared: &Prepared, ctx: &RenderContext) -> Option<SharedProvider> {
        if !ctx.synthetic() {
            return None;
        }
        let matched = prepared.rules.synthetic.as_ref()?;
        // Failures are logged by the cache; the value falls back to raw layout
        self.providers
            .provider_for(&prepared.value, &matched.rule, self.target.as_ref())
            .ok()
    }

    fn summary(&self, prepared: &Prepared) -> Option<String> {
        let matched = prepared.rules.summary.as_ref()?;
        let RuleContent::Summary(source) = matched.rule.content() else {
            return None;
        };
        match SummaryRenderer::new(self.target.as_ref()).render(source, &prepared.value) {
            Ok(text) => Some(text),
            Err(error) => {
                tracing::warn!(
                    value = %prepared.value.expression_path(),
                    rule = matched.rule.name(),
                    %error,
                    "summary failed"
                );
                None
            }
        }
    }

    fn value_text(prepared: &Prepared) -> Option<String> {
        let value = &prepared.value;
        if let Some(bytes) = value.c_string_bytes() {
            return Some(quote_bytes(&bytes));
        }
        let format = prepared
            .rules
            .format
            .as_ref()
            .and_then(|m| match m.rule.content() {
                RuleContent::Format(format) => Some(*format),
                _ => None,
            })
            .unwrap_or(ValueFormat::Default);
        format.apply(value)
    }

    fn render_value(&self, value: &Value, ctx: &mut RenderContext) -> RenderedValue {
        let prepared = self.prepare(value, ctx);
        let mut out = RenderedValue::new(value.name(), value.type_name());
        out.dynamic_type = prepared.dynamic_type.clone();
        out.show_dynamic_type = ctx.show_dynamic_type();
        out.value = Self::value_text(&prepared);

        if let Some(provider) = self.provider(&prepared, ctx) {
            out.mode = RenderMode::Synthetic;
            self.synthetic_children(&prepared.value, &provider, ctx, &mut out);
            return out;
        }

        if let Some(summary) = self.summary(&prepared) {
            out.summary = Some(summary);
            out.mode = RenderMode::Summary;
        }
        self.physical_children(&prepared.value, ctx, &mut out);
        out
    }

    fn synthetic_children(
        &self,
        value: &Value,
        provider: &SharedProvider,
        ctx: &mut RenderContext,
        out: &mut RenderedValue,
    ) {
        let target = self.target.as_ref();
        // Children are fetched before recursing so the provider lock is not
        // held while other providers run
        let (children, elided) = {
            let provider = provider.lock().unwrap_or_else(PoisonError::into_inner);
            let count = provider.child_count();
            if count == 0 {
                return;
            }
            if ctx.depth_exhausted() {
                out.truncation = Some(Truncation::Depth);
                return;
            }
            let shown = count.min(ctx.max_children());
            let children: Vec<(usize, FormatterResult<Value>)> =
                (0..shown).map(|i| (i, provider.child_at(i, target))).collect();
            (children, shown < count)
        };

        let key = visit_key(value);
        if let Some(key) = &key {
            if !ctx.enter(key.clone()) {
                out.truncation = Some(Truncation::Cycle);
                return;
            }
        }
        ctx.descend();
        for (index, child) in children {
            out.children.push(match child {
                Ok(child) => self.render_value(&child, ctx),
                Err(error) => {
                    tracing::warn!(value = %value.expression_path(), index, %error, "synthetic child unavailable");
                    RenderedValue::failed(format!("[{}]", index), error)
                }
            });
        }
        ctx.ascend();
        if let Some(key) = &key {
            ctx.leave(key);
        }
        if elided {
            out.truncation = Some(Truncation::Children);
        }
    }

    fn physical_children(&self, value: &Value, ctx: &mut RenderContext, out: &mut RenderedValue) {
        let ty = value.type_descriptor();
        if ty.is_char_array() {
            return;
        }

        let (children, spent_pointer, key) = if ty.is_pointer_like() {
            if value.pointer_target().unwrap_or(0) == 0 || ctx.pointer_budget() == 0 {
                return;
            }
            if ctx.depth_exhausted() {
                out.truncation = Some(Truncation::Depth);
                return;
            }
            let pointee = match value.dereference(self.target.as_ref()) {
                Ok(pointee) => pointee,
                Err(error) => {
                    out.error = Some(error.to_string());
                    return;
                }
            };
            let key = visit_key(&pointee);
            let children = if pointee.type_descriptor().is_aggregate() && !pointee.type_descriptor().is_char_array() {
                pointee.children()
            } else {
                vec![pointee.clone()]
            };
            (children, true, key)
        } else {
            let children = value.children();
            if children.is_empty() {
                return;
            }
            if ctx.depth_exhausted() {
                out.truncation = Some(Truncation::Depth);
                return;
            }
            (children, false, visit_key(value))
        };

        if let Some(key) = &key {
            if !ctx.enter(key.clone()) {
                out.truncation = Some(Truncation::Cycle);
                return;
            }
        }
        if spent_pointer {
            ctx.take_pointer();
        }
        ctx.descend();
        for child in &children {
            let rendered = self.render_value(child, ctx);
            out.children.push(rendered);
        }
        ctx.ascend();
        if spent_pointer {
            ctx.return_pointer();
        }
        if let Some(key) = &key {
            ctx.leave(key);
        }
    }
}

/// Cycle-guard identity of an expanded value; detached values have none
fn visit_key(value: &Value) -> Option<VisitKey> {
    value
        .address()
        .map(|address| (address, value.type_name().to_string()))
}
