//! Rendered value tree and its text form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a subtree stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truncation {
    /// The object is already being expanded higher up the path
    Cycle,
    /// Depth budget exhausted
    Depth,
    /// More synthetic children than the per-value limit
    Children,
}

impl Truncation {
    pub fn marker(&self) -> &'static str {
        match self {
            Truncation::Cycle => "<cycle>",
            Truncation::Depth => "{...}",
            Truncation::Children => "...",
        }
    }
}

/// Where the displayed presentation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Physical layout
    Raw,
    Summary,
    Synthetic,
}

/// Display string plus child tree for one value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedValue {
    pub name: String,
    /// Static type name
    pub type_name: String,
    /// Resolved dynamic type, when it differs from the static one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_type: Option<String>,
    /// Show both types in the header instead of just the dynamic one
    #[serde(default)]
    pub show_dynamic_type: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Failure producing this child
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
    pub mode: RenderMode,
}

impl RenderedValue {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            dynamic_type: None,
            show_dynamic_type: false,
            value: None,
            summary: None,
            error: None,
            children: Vec::new(),
            truncation: None,
            mode: RenderMode::Raw,
        }
    }

    /// Placeholder for a child that could not be produced
    pub fn failed(name: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(name, "")
        }
    }

    /// Type shown in the header
    pub fn type_label(&self) -> String {
        match (&self.dynamic_type, self.show_dynamic_type) {
            (Some(dynamic), true) => format!("{}, dynamic type: {}", self.type_name, dynamic),
            (Some(dynamic), false) => dynamic.clone(),
            (None, _) => self.type_name.clone(),
        }
    }

    /// Direct child by name
    pub fn child(&self, name: &str) -> Option<&RenderedValue> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Descendant reached through successive child names
    pub fn descendant(&self, path: &[&str]) -> Option<&RenderedValue> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    /// Whether this node or any descendant is truncated
    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some() || self.children.iter().any(RenderedValue::is_truncated)
    }

    /// JSON form for front ends
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn head(&self) -> String {
        let mut head = if self.type_name.is_empty() && self.dynamic_type.is_none() {
            self.name.clone()
        } else {
            format!("({}) {}", self.type_label(), self.name)
        };
        let mut parts: Vec<String> = Vec::new();
        if let Some(value) = &self.value {
            parts.push(value.clone());
        }
        if let Some(summary) = &self.summary {
            parts.push(summary.clone());
        }
        if let Some(error) = &self.error {
            parts.push(format!("<error: {}>", error));
        }
        // Elided children are marked after the last shown child
        if let Some(truncation) = self.truncation.filter(|t| *t != Truncation::Children) {
            parts.push(truncation.marker().to_string());
        }
        if !self.children.is_empty() {
            parts.push("{".to_string());
        }
        if !parts.is_empty() {
            head.push_str(" = ");
            head.push_str(&parts.join(" "));
        }
        head
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.head(), indent = indent)?;
        if !self.children.is_empty() {
            for child in &self.children {
                writeln!(f)?;
                child.write_indented(f, indent + 2)?;
            }
            if self.truncation == Some(Truncation::Children) {
                write!(f, "\n{:indent$}{}", "", Truncation::Children.marker(), indent = indent + 2)?;
            }
            write!(f, "\n{:indent$}}}", "", indent = indent)?;
        }
        Ok(())
    }
}

impl fmt::Display for RenderedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
