//! Summary templates and their expansion.
//!
//! A template is literal text with `${var<path>[%directive]}` placeholders.
//! Templates are parsed once, when the rule is added; expansion never fails
//! as a whole. A placeholder that cannot be resolved expands to
//! `<unavailable: PATH>` and the rest of the summary is still produced.

use std::fmt;
use std::str::FromStr;

use crate::error::{FormatterError, FormatterResult};
use crate::rule::ValueFormat;
use crate::synthetic::ScriptHandle;
use crate::target::Target;
use crate::value::{quote_bytes, Value, ValueData};

/// Longest C string fetched by `%s`
pub const MAX_CSTRING_LEN: usize = 512;

// ── Template AST ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq)]
struct Placeholder {
    steps: Vec<PathStep>,
    directive: Option<Directive>,
    /// Path as written, used in the failure marker
    path: String,
}

#[derive(Debug, Clone, PartialEq)]
enum PathStep {
    Field(String),
    Arrow(String),
    Index(u64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Directive {
    Describe,
    CString,
    Length,
    TypeName,
    Location,
    Value,
    Format(ValueFormat),
}

/// A parsed summary template
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl SummaryTemplate {
    /// Parse template text
    pub fn parse(source: &str) -> FormatterResult<Self> {
        Parser::new(source).parse()
    }

    /// Template text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of `${...}` placeholders
    pub fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Placeholder(_)))
            .count()
    }
}

impl FromStr for SummaryTemplate {
    type Err = FormatterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    segments: Vec<Segment>,
    literal: String,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            segments: Vec::new(),
            literal: String::new(),
        }
    }

    fn error(&self, offset: usize, reason: impl Into<String>) -> FormatterError {
        FormatterError::Parse {
            template: self.source.to_string(),
            offset,
            reason: reason.into(),
        }
    }

    fn parse(mut self) -> FormatterResult<SummaryTemplate> {
        while let Some((offset, c)) = self.chars.next() {
            match c {
                '\\' => {
                    let escaped = match self.chars.next() {
                        Some((_, '$')) => '$',
                        Some((_, '{')) => '{',
                        Some((_, '}')) => '}',
                        Some((_, '\\')) => '\\',
                        Some((_, 'n')) => '\n',
                        Some((_, 't')) => '\t',
                        Some((at, other)) => {
                            return Err(self.error(at, format!("unknown escape '\\{}'", other)))
                        }
                        None => return Err(self.error(offset, "dangling '\\' at end of template")),
                    };
                    self.literal.push(escaped);
                }
                '$' if matches!(self.chars.peek(), Some((_, '{'))) => {
                    self.chars.next();
                    self.flush_literal();
                    let placeholder = self.placeholder(offset)?;
                    self.segments.push(Segment::Placeholder(placeholder));
                }
                other => self.literal.push(other),
            }
        }
        self.flush_literal();

        Ok(SummaryTemplate {
            source: self.source.to_string(),
            segments: self.segments,
        })
    }

    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            self.segments
                .push(Segment::Literal(std::mem::take(&mut self.literal)));
        }
    }

    /// Parse the body of `${...}`; `start` is the offset of `$`
    fn placeholder(&mut self, start: usize) -> FormatterResult<Placeholder> {
        let body_start = start + 2;
        let mut body_end = None;
        for (offset, c) in self.chars.by_ref() {
            if c == '}' {
                body_end = Some(offset);
                break;
            }
        }
        let body_end = body_end.ok_or_else(|| self.error(start, "unterminated placeholder"))?;
        let body = &self.source[body_start..body_end];

        let (path, directive) = match body.split_once('%') {
            Some((path, directive)) => (path.trim(), Some(directive.trim())),
            None => (body.trim(), None),
        };
        if path.is_empty() {
            return Err(self.error(body_start, "empty placeholder path"));
        }
        let Some(rest) = path.strip_prefix("var") else {
            return Err(self.error(body_start, format!("unknown path root in '{}'", path)));
        };

        let steps = parse_steps(rest).map_err(|reason| self.error(body_start, reason))?;
        let directive = directive
            .map(|d| parse_directive(d).map_err(|reason| self.error(body_start, reason)))
            .transpose()?;

        Ok(Placeholder {
            steps,
            directive,
            path: path.to_string(),
        })
    }
}

fn parse_steps(mut rest: &str) -> Result<Vec<PathStep>, String> {
    let mut steps = Vec::new();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("->") {
            let (ident, tail) = split_identifier(after)?;
            steps.push(PathStep::Arrow(ident.to_string()));
            rest = tail;
        } else if let Some(after) = rest.strip_prefix('.') {
            let (ident, tail) = split_identifier(after)?;
            steps.push(PathStep::Field(ident.to_string()));
            rest = tail;
        } else if let Some(after) = rest.strip_prefix('[') {
            let (index, tail) = after
                .split_once(']')
                .ok_or_else(|| "unterminated '[' in path".to_string())?;
            let index = index
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("invalid index '{}'", index))?;
            steps.push(PathStep::Index(index));
            rest = tail;
        } else {
            return Err(format!("unexpected '{}' in path", rest));
        }
    }
    Ok(steps)
}

fn split_identifier(s: &str) -> Result<(&str, &str), String> {
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if end == 0 {
        return Err("expected field name".to_string());
    }
    Ok(s.split_at(end))
}

fn parse_directive(text: &str) -> Result<Directive, String> {
    match text {
        "@" => Ok(Directive::Describe),
        "s" => Ok(Directive::CString),
        "#" => Ok(Directive::Length),
        "T" => Ok(Directive::TypeName),
        "L" => Ok(Directive::Location),
        "V" => Ok(Directive::Value),
        other => other
            .parse::<ValueFormat>()
            .map(Directive::Format)
            .map_err(|_| format!("unknown directive '%{}'", other)),
    }
}

// ── Summary sources ──────────────────────────────────────────────────────────

/// Native summary function
pub type NativeSummaryFn = fn(&Value, &dyn Target) -> FormatterResult<String>;

/// Where a summary comes from
#[derive(Clone)]
pub enum SummarySource {
    /// Template string
    Template(SummaryTemplate),
    /// Compiled-in function
    Native {
        name: &'static str,
        function: NativeSummaryFn,
    },
    /// Function in an external script interpreter
    Script(ScriptHandle),
}

impl fmt::Debug for SummarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummarySource::Template(template) => f.debug_tuple("Template").field(template).finish(),
            SummarySource::Native { name, .. } => f.debug_tuple("Native").field(name).finish(),
            SummarySource::Script(handle) => f.debug_tuple("Script").field(handle).finish(),
        }
    }
}

impl fmt::Display for SummarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummarySource::Template(template) => write!(f, "`{}`", template.source()),
            SummarySource::Native { name, .. } => write!(f, "native {}", name),
            SummarySource::Script(handle) => write!(f, "script {}", handle.name()),
        }
    }
}

// ── Rendering ────────────────────────────────────────────────────────────────

/// Expands summary sources against values; read-only over the target
pub struct SummaryRenderer<'a> {
    target: &'a dyn Target,
}

impl<'a> SummaryRenderer<'a> {
    pub fn new(target: &'a dyn Target) -> Self {
        Self { target }
    }

    /// Produce the summary for `value`.
    ///
    /// Templates always succeed; native and scripted functions may fail.
    pub fn render(&self, source: &SummarySource, value: &Value) -> FormatterResult<String> {
        match source {
            SummarySource::Template(template) => Ok(self.expand(template, value)),
            SummarySource::Native { function, .. } => function(value, self.target),
            SummarySource::Script(handle) => handle.call_summary(value, self.target),
        }
    }

    /// Expand a template, substituting failure markers for unresolved placeholders
    pub fn expand(&self, template: &SummaryTemplate, value: &Value) -> String {
        let mut out = String::new();
        for segment in &template.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(placeholder) => {
                    match self
                        .resolve(value, &placeholder.steps)
                        .and_then(|v| self.apply(&v, placeholder.directive))
                    {
                        Ok(text) => out.push_str(&text),
                        Err(e) => {
                            tracing::debug!(
                                path = %placeholder.path,
                                value = %value.expression_path(),
                                error = %e,
                                "summary placeholder unresolved"
                            );
                            out.push_str(&format!("<unavailable: {}>", placeholder.path));
                        }
                    }
                }
            }
        }
        out
    }

    fn resolve(&self, value: &Value, steps: &[PathStep]) -> FormatterResult<Value> {
        let mut current = value.clone();
        for step in steps {
            current = match step {
                PathStep::Field(name) => {
                    let base = if current.type_descriptor().is_pointer_like() {
                        current.dereference(self.target)?
                    } else {
                        current
                    };
                    base.field_named(name).ok_or_else(|| {
                        FormatterError::invalid_value(base.expression_path(), format!("no field '{}'", name))
                    })?
                }
                PathStep::Arrow(name) => {
                    if !current.type_descriptor().is_pointer_like() {
                        return Err(FormatterError::invalid_value(
                            current.expression_path(),
                            "'->' applied to a non-pointer",
                        ));
                    }
                    let base = current.dereference(self.target)?;
                    base.field_named(name).ok_or_else(|| {
                        FormatterError::invalid_value(base.expression_path(), format!("no field '{}'", name))
                    })?
                }
                PathStep::Index(index) => self.index(&current, *index)?,
            };
        }
        Ok(current)
    }

    fn index(&self, value: &Value, index: u64) -> FormatterResult<Value> {
        let ty = value.type_descriptor();
        if let Some(pointee) = ty.pointee() {
            let base = value.pointer_target().unwrap_or(0);
            if base == 0 {
                return Err(FormatterError::MemoryRead {
                    address: 0,
                    len: pointee.byte_size() as usize,
                });
            }
            let address = index
                .checked_mul(pointee.byte_size())
                .and_then(|offset| base.checked_add(offset))
                .ok_or(FormatterError::MemoryRead {
                    address: base,
                    len: pointee.byte_size() as usize,
                })?;
            let element = self
                .target
                .value_at(&format!("[{}]", index), pointee, address)?;
            return Ok(element.with_parent(value));
        }
        let count = value.child_count();
        value
            .child_at(index as usize)
            .ok_or(FormatterError::Index {
                index: index as usize,
                count,
            })
    }

    fn apply(&self, value: &Value, directive: Option<Directive>) -> FormatterResult<String> {
        match directive {
            None | Some(Directive::Value) => Ok(plain_text(value)),
            Some(Directive::Describe) => {
                let address = object_address(value).ok_or_else(|| {
                    FormatterError::invalid_value(value.expression_path(), "no object to describe")
                })?;
                self.target.object_description(address)
            }
            Some(Directive::CString) => self.c_string(value),
            Some(Directive::Length) => {
                if value.type_descriptor().is_pointer_like() {
                    Ok(value.dereference(self.target)?.child_count().to_string())
                } else if let ValueData::Aggregate(fields) = value.data() {
                    Ok(fields.len().to_string())
                } else {
                    Err(FormatterError::invalid_value(
                        value.expression_path(),
                        "'%#' needs an aggregate or pointer",
                    ))
                }
            }
            Some(Directive::TypeName) => Ok(value.type_name().to_string()),
            Some(Directive::Location) => value
                .address()
                .map(|a| format!("0x{:016x}", a))
                .ok_or_else(|| {
                    FormatterError::invalid_value(value.expression_path(), "value has no location")
                }),
            Some(Directive::Format(format)) => format.apply(value).ok_or_else(|| {
                FormatterError::invalid_value(
                    value.expression_path(),
                    format!("format '{}' needs a scalar", format),
                )
            }),
        }
    }

    fn c_string(&self, value: &Value) -> FormatterResult<String> {
        if let Some(bytes) = value.c_string_bytes() {
            return Ok(quote_bytes(&bytes));
        }
        let address = match value.pointer_target() {
            Some(a) if a != 0 => a,
            _ => {
                return Err(FormatterError::invalid_value(
                    value.expression_path(),
                    "'%s' needs a char array or a non-null pointer",
                ))
            }
        };
        let mut bytes = Vec::new();
        while bytes.len() < MAX_CSTRING_LEN {
            let next = address
                .checked_add(bytes.len() as u64)
                .ok_or(FormatterError::MemoryRead { address, len: bytes.len() + 1 })?;
            let byte = self.target.read_memory(next, 1)?;
            match byte.first() {
                Some(0) | None => break,
                Some(b) => bytes.push(*b),
            }
        }
        Ok(quote_bytes(&bytes))
    }
}

/// Address of the object a value denotes: pointer target, or own location
fn object_address(value: &Value) -> Option<u64> {
    if value.type_descriptor().is_pointer_like() {
        value.pointer_target().filter(|a| *a != 0)
    } else {
        value.address()
    }
}

/// Default text for a value inside a template
fn plain_text(value: &Value) -> String {
    if let Some(bytes) = value.c_string_bytes() {
        return quote_bytes(&bytes);
    }
    ValueFormat::Default
        .apply(value)
        .unwrap_or_else(|| "{...}".to_string())
}
