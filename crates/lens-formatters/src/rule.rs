//! Formatting rules: what to match and what to do with a match.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{FormatterError, FormatterResult};
use crate::summary::{SummarySource, SummaryTemplate};
use crate::synthetic::ProviderFactory;
use crate::value::{escape_byte, Scalar, Value, ValueData};

/// Rule kind; each category keeps one ordered list per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Format,
    Summary,
    Synthetic,
}

impl FormatKind {
    pub const ALL: [FormatKind; 3] = [FormatKind::Format, FormatKind::Summary, FormatKind::Synthetic];
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FormatKind::Format => "format",
            FormatKind::Summary => "summary",
            FormatKind::Synthetic => "synth",
        })
    }
}

/// Collapse whitespace and drop spaces before `*` / `&`
pub fn normalize_type_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" *", "*")
        .replace(" &", "&")
}

/// Type-name predicate of a rule
#[derive(Debug, Clone)]
pub enum TypePattern {
    /// Matches one fully-qualified name
    Exact(String),
    /// Matches every name the expression finds a match in
    Regex(Regex),
}

impl TypePattern {
    pub fn exact(name: impl Into<String>) -> Self {
        TypePattern::Exact(name.into())
    }

    /// Compile a regex pattern; failures are add-time parse errors
    pub fn regex(pattern: &str) -> FormatterResult<Self> {
        Regex::new(pattern)
            .map(TypePattern::Regex)
            .map_err(|e| FormatterError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// Pattern text; also the rule's name within its (category, kind) list
    pub fn as_str(&self) -> &str {
        match self {
            TypePattern::Exact(name) => name,
            TypePattern::Regex(re) => re.as_str(),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, TypePattern::Regex(_))
    }

    pub fn matches(&self, type_name: &str) -> bool {
        match self {
            TypePattern::Exact(name) => normalize_type_name(name) == normalize_type_name(type_name),
            TypePattern::Regex(re) => re.is_match(type_name),
        }
    }
}

/// Display format for scalar and pointer values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    #[default]
    Default,
    Decimal,
    Unsigned,
    Hex,
    Octal,
    Binary,
    Char,
    Boolean,
    Float,
    Bytes,
    Pointer,
}

impl ValueFormat {
    /// Text for `value`, or `None` for aggregates
    pub fn apply(&self, value: &Value) -> Option<String> {
        let size = value.type_descriptor().byte_size().clamp(1, 8) as u32;
        let (scalar, is_pointer) = match value.data() {
            ValueData::Scalar(s) => (*s, false),
            ValueData::Pointer(p) => (Scalar::Unsigned(*p), true),
            ValueData::Aggregate(_) => return None,
        };
        let mask = if size >= 8 {
            u64::MAX
        } else {
            (1u64 << (size * 8)) - 1
        };
        let bits = scalar.as_u64() & mask;

        Some(match self {
            ValueFormat::Default if is_pointer => format!("0x{:016x}", bits),
            ValueFormat::Default => scalar.to_string(),
            ValueFormat::Decimal => match scalar {
                Scalar::Float(v) => format!("{}", v as i64),
                other => other.as_i64().to_string(),
            },
            ValueFormat::Unsigned => bits.to_string(),
            ValueFormat::Hex => format!("0x{:0width$x}", bits, width = (size * 2) as usize),
            ValueFormat::Octal => format!("0{:o}", bits),
            ValueFormat::Binary => format!("0b{:0width$b}", bits, width = (size * 8) as usize),
            ValueFormat::Char => format!("'{}'", escape_byte(bits as u8)),
            ValueFormat::Boolean => (bits != 0).to_string(),
            ValueFormat::Float => match scalar {
                Scalar::Float(v) => v.to_string(),
                _ if size == 4 => f32::from_bits(bits as u32).to_string(),
                _ => f64::from_bits(bits).to_string(),
            },
            ValueFormat::Bytes => bits.to_le_bytes()[..size as usize]
                .iter()
                .map(|b| format!("0x{:02x}", b))
                .collect::<Vec<_>>()
                .join(" "),
            ValueFormat::Pointer => format!("0x{:016x}", bits),
        })
    }

    /// Long name
    pub fn name(&self) -> &'static str {
        match self {
            ValueFormat::Default => "default",
            ValueFormat::Decimal => "decimal",
            ValueFormat::Unsigned => "unsigned",
            ValueFormat::Hex => "hex",
            ValueFormat::Octal => "octal",
            ValueFormat::Binary => "binary",
            ValueFormat::Char => "char",
            ValueFormat::Boolean => "boolean",
            ValueFormat::Float => "float",
            ValueFormat::Bytes => "bytes",
            ValueFormat::Pointer => "pointer",
        }
    }
}

impl FromStr for ValueFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Single letters are case-sensitive: `b` is binary, `B` boolean.
        match s {
            "default" => Ok(ValueFormat::Default),
            "d" | "decimal" => Ok(ValueFormat::Decimal),
            "u" | "unsigned" => Ok(ValueFormat::Unsigned),
            "x" | "hex" => Ok(ValueFormat::Hex),
            "o" | "octal" => Ok(ValueFormat::Octal),
            "b" | "binary" => Ok(ValueFormat::Binary),
            "c" | "char" => Ok(ValueFormat::Char),
            "B" | "boolean" => Ok(ValueFormat::Boolean),
            "f" | "float" => Ok(ValueFormat::Float),
            "y" | "bytes" => Ok(ValueFormat::Bytes),
            "p" | "pointer" => Ok(ValueFormat::Pointer),
            other => Err(format!("unknown value format '{}'", other)),
        }
    }
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-rule flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleOptions {
    /// Apply through pointer hops and to subclasses of the matched type
    pub cascade: bool,
    /// Pointer hops the rule may be applied through (needs `cascade`)
    pub skip_pointers: u32,
    /// Per-instance enabled bit
    pub enabled: bool,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            cascade: true,
            skip_pointers: 1,
            enabled: true,
        }
    }
}

/// What a rule does once matched
#[derive(Debug, Clone)]
pub enum RuleContent {
    Format(ValueFormat),
    Summary(SummarySource),
    Synthetic(ProviderFactory),
}

/// A registered formatting rule
#[derive(Debug, Clone)]
pub struct FormatRule {
    pattern: TypePattern,
    content: RuleContent,
    options: RuleOptions,
}

impl FormatRule {
    pub fn new(pattern: TypePattern, content: RuleContent) -> Self {
        Self {
            pattern,
            content,
            options: RuleOptions::default(),
        }
    }

    /// Value-format rule
    pub fn format(pattern: TypePattern, format: ValueFormat) -> Self {
        Self::new(pattern, RuleContent::Format(format))
    }

    /// Summary rule from template text; malformed templates are rejected
    pub fn summary(pattern: TypePattern, template: &str) -> FormatterResult<Self> {
        let template = SummaryTemplate::parse(template)?;
        Ok(Self::new(
            pattern,
            RuleContent::Summary(SummarySource::Template(template)),
        ))
    }

    /// Summary rule from any source
    pub fn summary_from(pattern: TypePattern, source: SummarySource) -> Self {
        Self::new(pattern, RuleContent::Summary(source))
    }

    /// Synthetic-children rule
    pub fn synthetic(pattern: TypePattern, factory: ProviderFactory) -> Self {
        Self::new(pattern, RuleContent::Synthetic(factory))
    }

    pub fn with_cascade(mut self, cascade: bool) -> Self {
        self.options.cascade = cascade;
        self
    }

    pub fn with_skip_pointers(mut self, hops: u32) -> Self {
        self.options.skip_pointers = hops;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.options.enabled = enabled;
        self
    }

    pub fn with_options(mut self, options: RuleOptions) -> Self {
        self.options = options;
        self
    }

    pub fn kind(&self) -> FormatKind {
        match self.content {
            RuleContent::Format(_) => FormatKind::Format,
            RuleContent::Summary(_) => FormatKind::Summary,
            RuleContent::Synthetic(_) => FormatKind::Synthetic,
        }
    }

    /// Unique name within (category, kind)
    pub fn name(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn pattern(&self) -> &TypePattern {
        &self.pattern
    }

    pub fn content(&self) -> &RuleContent {
        &self.content
    }

    pub fn options(&self) -> RuleOptions {
        self.options
    }

    /// Whether this rule applies to a candidate type name reached through
    /// `hops` pointer dereferences, possibly as a superclass (`derived`)
    pub fn accepts(&self, type_name: &str, hops: u32, derived: bool) -> bool {
        if !self.options.enabled {
            return false;
        }
        if derived && !self.options.cascade {
            return false;
        }
        if hops > self.options.skip_pointers {
            return false;
        }
        self.pattern.matches(type_name)
    }
}

impl fmt::Display for FormatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pattern.is_regex() {
            write!(f, "regex {}: ", self.pattern.as_str())?;
        } else {
            write!(f, "{}: ", self.pattern.as_str())?;
        }
        match &self.content {
            RuleContent::Format(format) => write!(f, "{}", format)?,
            RuleContent::Summary(source) => write!(f, "{}", source)?,
            RuleContent::Synthetic(factory) => write!(f, "provider {}", factory.name())?,
        }

        let mut flags = Vec::new();
        if !self.options.cascade {
            flags.push("not cascading".to_string());
        }
        if self.options.skip_pointers != 1 {
            flags.push(format!("skip pointers: {}", self.options.skip_pointers));
        }
        if !self.options.enabled {
            flags.push("disabled".to_string());
        }
        if !flags.is_empty() {
            write!(f, " ({})", flags.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDescriptor;
    use rstest::rstest;

    fn int(v: i64) -> Value {
        Value::scalar("v", &TypeDescriptor::int(), Scalar::Signed(v))
    }

    #[rstest]
    #[case(ValueFormat::Default, "-1")]
    #[case(ValueFormat::Decimal, "-1")]
    #[case(ValueFormat::Unsigned, "4294967295")]
    #[case(ValueFormat::Hex, "0xffffffff")]
    #[case(ValueFormat::Octal, "037777777777")]
    #[case(ValueFormat::Boolean, "true")]
    #[case(ValueFormat::Bytes, "0xff 0xff 0xff 0xff")]
    fn test_format_negative_int(#[case] format: ValueFormat, #[case] expected: &str) {
        assert_eq!(format.apply(&int(-1)).unwrap(), expected);
    }

    #[test]
    fn test_format_char_and_binary() {
        assert_eq!(ValueFormat::Char.apply(&int(65)).unwrap(), "'A'");
        assert_eq!(
            ValueFormat::Binary.apply(&int(5)).unwrap(),
            "0b00000000000000000000000000000101"
        );
    }

    #[test]
    fn test_format_pointer_default() {
        let ptr_ty = TypeDescriptor::pointer_to(&TypeDescriptor::int());
        let ptr = Value::pointer("p", &ptr_ty, 0x1000);
        assert_eq!(ValueFormat::Default.apply(&ptr).unwrap(), "0x0000000000001000");
    }

    #[test]
    fn test_format_aggregate_is_none() {
        let value = Value::char_array("s", b"abc");
        assert!(ValueFormat::Hex.apply(&value).is_none());
    }

    #[rstest]
    #[case("x", ValueFormat::Hex)]
    #[case("hex", ValueFormat::Hex)]
    #[case("b", ValueFormat::Binary)]
    #[case("B", ValueFormat::Boolean)]
    #[case("y", ValueFormat::Bytes)]
    fn test_parse_format(#[case] text: &str, #[case] expected: ValueFormat) {
        assert_eq!(text.parse::<ValueFormat>().unwrap(), expected);
    }

    #[test]
    fn test_exact_pattern_normalizes_spacing() {
        let pattern = TypePattern::exact("MyClass*");
        assert!(pattern.matches("MyClass *"));
        assert!(pattern.matches("MyClass  *"));
        assert!(!pattern.matches("MyClass"));
    }

    #[test]
    fn test_regex_pattern() {
        let pattern = TypePattern::regex("^std::vector<.+>$").unwrap();
        assert!(pattern.matches("std::vector<int>"));
        assert!(!pattern.matches("std::vector<int> *"));
        assert!(TypePattern::regex("(unclosed").is_err());
    }

    #[test]
    fn test_accepts_respects_cascade() {
        let rule = FormatRule::format(TypePattern::exact("MyClass"), ValueFormat::Hex);
        assert!(rule.accepts("MyClass", 0, false));
        assert!(rule.accepts("MyClass", 1, false));
        assert!(rule.accepts("MyClass", 0, true));
        assert!(!rule.accepts("MyClass", 2, false));

        let rule = rule.with_cascade(false);
        assert!(rule.accepts("MyClass", 0, false));
        assert!(rule.accepts("MyClass", 1, false));
        assert!(!rule.accepts("MyClass", 0, true));
        assert!(!rule.accepts("MyClass", 1, true));
    }

    #[test]
    fn test_disabled_rule_never_accepts() {
        let rule =
            FormatRule::format(TypePattern::exact("int"), ValueFormat::Hex).with_enabled(false);
        assert!(!rule.accepts("int", 0, false));
    }

    #[test]
    fn test_display() {
        let rule = FormatRule::summary(TypePattern::exact("MyClass"), "a test")
            .unwrap()
            .with_cascade(false);
        assert_eq!(rule.to_string(), "MyClass: `a test` (not cascading)");
        let rule = FormatRule::format(TypePattern::regex("^u?int$").unwrap(), ValueFormat::Hex)
            .with_skip_pointers(0);
        assert_eq!(rule.to_string(), "regex ^u?int$: hex (skip pointers: 0)");
    }
}
