//! View rendering
//!
//! Templating is a collaborator of the REST adapter, not part of it: the
//! HTML formatter only needs to ask whether a template exists and to render
//! one with a JSON value. `MemoryViews` is a minimal renderer holding
//! templates in memory with `{{name}}` placeholders.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("The requested view {0} could not be found")]
    NotFound(String),

    #[error("Undefined variable {name} in view {template}")]
    UndefinedVariable { template: String, name: String },

    #[error("Syntax error in view {template}: {detail}")]
    Syntax { template: String, detail: String },
}

/// Renders named templates with data
pub trait ViewRenderer {
    fn exists(&self, template: &str) -> bool;

    fn render(&self, template: &str, data: &Value) -> Result<String, ViewError>;
}

/// In-memory templates
///
/// `{{key}}` is replaced by the top-level field `key` of the data object.
/// Strings are HTML-escaped; other values are written as JSON.
#[derive(Debug, Clone, Default)]
pub struct MemoryViews {
    templates: HashMap<String, String>,
}

impl MemoryViews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template
    pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) -> &mut Self {
        self.templates.insert(name.into(), template.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.insert(name, template);
        self
    }
}

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

impl ViewRenderer for MemoryViews {
    fn exists(&self, template: &str) -> bool {
        self.templates.contains_key(template)
    }

    fn render(&self, template: &str, data: &Value) -> Result<String, ViewError> {
        let source = self
            .templates
            .get(template)
            .ok_or_else(|| ViewError::NotFound(template.to_string()))?;

        let mut out = String::with_capacity(source.len());
        let mut rest = source.as_str();
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| ViewError::Syntax {
                template: template.to_string(),
                detail: "unclosed '{{'".to_string(),
            })?;

            let name = after[..end].trim();
            match data.get(name) {
                Some(Value::String(s)) => escape_html(s, &mut out),
                Some(value) => escape_html(&value.to_string(), &mut out),
                None => {
                    return Err(ViewError::UndefinedVariable {
                        template: template.to_string(),
                        name: name.to_string(),
                    })
                }
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
