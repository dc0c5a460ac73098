//! Response body formatters
//!
//! Formatters are looked up by format name in a `FormatterRegistry` and
//! built for one request. `json`, `xml` and `html` ship built in.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::view::ViewRenderer;
use crate::config::RestConfig;
use crate::error::{Error, Result};
use crate::request::Request;

/// Renders a body value as text
pub trait Formatter {
    fn format(&self, body: &Value) -> Result<String>;
}

/// What a formatter may know about the request it formats for
pub struct FormatContext<'a> {
    pub request: &'a Request,
    pub config: &'a RestConfig,
    pub views: &'a Rc<dyn ViewRenderer>,
}

type FormatterFactory = Box<dyn Fn(&FormatContext<'_>) -> Result<Box<dyn Formatter>>>;

/// Format name to formatter constructor
#[derive(Default)]
pub struct FormatterRegistry {
    factories: BTreeMap<String, FormatterFactory>,
}

impl FormatterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `json`, `xml` and `html`
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register("json", |_| Ok(Box::new(JsonFormatter)))
            .register("xml", |cx| Ok(Box::new(XmlFormatter::new(&cx.config.xml_root))))
            .register("html", |cx| Ok(Box::new(HtmlFormatter::new(cx))));
        registry
    }

    /// Register a formatter under a case-insensitive name
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&FormatContext<'_>) -> Result<Box<dyn Formatter>> + 'static,
    {
        self.factories
            .insert(name.to_ascii_lowercase(), Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the formatter for a format name
    pub fn factory(&self, name: &str, cx: &FormatContext<'_>) -> Result<Box<dyn Formatter>> {
        let factory = self.factories.get(&name.to_ascii_lowercase()).ok_or_else(|| {
            Error::Configuration(format!("No formatter available for format: {}", name))
        })?;
        factory(cx)
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterRegistry")
            .field("formats", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Plain serde_json serialization
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, body: &Value) -> Result<String> {
        serde_json::to_string(body).map_err(|e| Error::Format(e.to_string()))
    }
}

/// XML document with one element per key
///
/// List entries and keys that are not valid element names are written as
/// `item` elements.
#[derive(Debug, Clone)]
pub struct XmlFormatter {
    root: String,
}

impl XmlFormatter {
    pub fn new(root: &str) -> Self {
        let root = if is_element_name(root) { root } else { "response" };
        XmlFormatter {
            root: root.to_string(),
        }
    }
}

fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.to_ascii_lowercase().starts_with("xml")
}

fn escape_xml(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
}

fn write_element(out: &mut String, name: &str, value: &Value) {
    let tag = if is_element_name(name) { name } else { "item" };
    match value {
        Value::Null => {
            out.push_str(&format!("<{}/>", tag));
            return;
        }
        _ => out.push_str(&format!("<{}>", tag)),
    }

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                write_element(out, key, child);
            }
        }
        Value::Array(items) => {
            for child in items {
                write_element(out, "item", child);
            }
        }
        Value::String(s) => escape_xml(s, out),
        other => out.push_str(&other.to_string()),
    }
    out.push_str(&format!("</{}>", tag));
}

impl Formatter for XmlFormatter {
    fn format(&self, body: &Value) -> Result<String> {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        write_element(&mut out, &self.root, body);
        Ok(out)
    }
}

/// Renders the body through a view
///
/// The template is `directory/controller` when it exists, otherwise
/// `directory/controller/action`.
pub struct HtmlFormatter {
    views: Rc<dyn ViewRenderer>,
    candidates: [String; 2],
}

impl HtmlFormatter {
    pub fn new(cx: &FormatContext<'_>) -> Self {
        let (directory, controller, action) = match cx.request.route() {
            Some(route) => (route.directory.as_str(), route.controller.as_str(), route.action.as_str()),
            None => ("", "", ""),
        };

        let mut base: Vec<&str> = directory.split('/').filter(|s| !s.is_empty()).collect();
        base.push(controller);
        let controller_view = base.join("/").to_ascii_lowercase();
        let action_view = format!("{}/{}", controller_view, action.to_ascii_lowercase());

        HtmlFormatter {
            views: Rc::clone(cx.views),
            candidates: [controller_view, action_view],
        }
    }

    /// Template that will be rendered, if any exists
    pub fn template(&self) -> Option<&str> {
        self.candidates
            .iter()
            .find(|name| self.views.exists(name))
            .map(String::as_str)
    }
}

impl Formatter for HtmlFormatter {
    fn format(&self, body: &Value) -> Result<String> {
        // Rendering the action view reports a missing template as well
        let template = self.template().unwrap_or(&self.candidates[1]);
        self.views
            .render(template, body)
            .map_err(|e| Error::Format(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::view::MemoryViews;
    use crate::route::RouteMatch;
    use serde_json::json;

    fn format_with(name: &str, views: MemoryViews, body: Value) -> Result<String> {
        let request = Request::builder()
            .uri("/api/users/show")
            .route(RouteMatch::new("api", "Users", "show"))
            .build();
        let config = RestConfig::default();
        let views: Rc<dyn ViewRenderer> = Rc::new(views);
        let cx = FormatContext {
            request: &request,
            config: &config,
            views: &views,
        };
        FormatterRegistry::with_builtin().factory(name, &cx)?.format(&body)
    }

    #[test]
    fn test_json() {
        let out = format_with("JSON", MemoryViews::new(), json!({"id": 1, "tags": ["a"]})).unwrap();
        assert_eq!(out, r#"{"id":1,"tags":["a"]}"#);
    }

    #[test]
    fn test_xml() {
        let body = json!({"name": "<b>&", "tags": ["x", "y"], "2fa": true, "empty": null});
        let out = format_with("xml", MemoryViews::new(), body).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<response><item>true</item><empty/>\
             <name>&lt;b&gt;&amp;</name><tags><item>x</item><item>y</item></tags></response>"
        );
    }

    #[test]
    fn test_unknown_format() {
        let err = format_with("yaml", MemoryViews::new(), json!({})).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("yaml")));
    }

    #[test]
    fn test_html_prefers_controller_view() {
        let views = MemoryViews::new()
            .with("api/users", "list {{name}}")
            .with("api/users/show", "show {{name}}");
        assert_eq!(format_with("html", views, json!({"name": "ann"})).unwrap(), "list ann");
    }

    #[test]
    fn test_html_falls_back_to_action_view() {
        let views = MemoryViews::new().with("api/users/show", "show {{name}}");
        assert_eq!(format_with("html", views, json!({"name": "ann"})).unwrap(), "show ann");
    }

    #[test]
    fn test_html_render_failure_is_format_error() {
        let err = format_with("html", MemoryViews::new(), json!({})).unwrap_err();
        assert!(matches!(err, Error::Format(_)));

        let views = MemoryViews::new().with("api/users", "{{missing}}");
        let err = format_with("html", views, json!({})).unwrap_err();
        assert!(matches!(err, Error::Format(msg) if msg.contains("missing")));
    }
}
