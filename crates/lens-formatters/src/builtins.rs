//! Built-in formatters, registered into the `system` category.

use crate::registry::{FormatterRegistry, SYSTEM_CATEGORY};
use crate::rule::{FormatRule, TypePattern};
use crate::summary::SummarySource;
use crate::synthetic::{cfstring_summary, VectorProvider, VECTOR_PATTERN};

/// Type the CFString summary is attached to; subclasses match through cascade
pub const STRING_CLASS: &str = "NSString";

/// Native summary source for CFString-style objects
pub fn cfstring_summary_source() -> SummarySource {
    SummarySource::Native {
        name: "cfstring",
        function: cfstring_summary,
    }
}

/// Register the built-ins; the category is created after any existing ones
pub fn register(registry: &FormatterRegistry) {
    registry.add_category(SYSTEM_CATEGORY);

    match TypePattern::regex(VECTOR_PATTERN) {
        Ok(pattern) => {
            registry.add_rule(
                SYSTEM_CATEGORY,
                FormatRule::synthetic(pattern, VectorProvider::factory()),
            );
        }
        Err(error) => tracing::error!(%error, "built-in vector pattern rejected"),
    }

    registry.add_rule(
        SYSTEM_CATEGORY,
        FormatRule::summary_from(TypePattern::exact(STRING_CLASS), cfstring_summary_source()),
    );

    tracing::debug!(category = SYSTEM_CATEGORY, "built-in formatters registered");
}
