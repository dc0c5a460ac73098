//! REST adapter
//!
//! `RestController` wraps a `Resource` and maps the request method onto a
//! fixed action:
//!
//! | Method   | Action   |
//! |----------|----------|
//! | `GET`    | `index`  |
//! | `PUT`    | `update` |
//! | `POST`   | `create` |
//! | `DELETE` | `delete` |
//!
//! Clients limited to GET and POST may name the intended method in the
//! `method` query parameter or the `X-HTTP-Method-Override` header. The
//! resource returns a JSON value, which is wrapped into an object when it is
//! not one already and rendered by the formatter for the route's `format`
//! parameter, else the best match for `Accept`, else the configured default.

pub mod formatter;
pub mod view;

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::RestConfig;
use crate::dispatch::{Context, Controller};
use crate::error::{Error, Result};
use crate::exception::HttpException;
use crate::http::Method;
use crate::request::Request;

pub use formatter::{FormatContext, Formatter, FormatterRegistry, HtmlFormatter, JsonFormatter, XmlFormatter};
pub use view::{MemoryViews, ViewError, ViewRenderer};

/// Methods with an action
pub const MAPPED_METHODS: [Method; 4] = [Method::Get, Method::Put, Method::Post, Method::Delete];

/// Header carrying a method override
pub const OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

/// Query parameter carrying a method override
pub const OVERRIDE_PARAM: &str = "method";

/// A REST resource
///
/// Actions not implemented answer `405 Method Not Allowed`.
pub trait Resource {
    /// Methods listed in `Allow` when an action is not supported
    fn allowed(&self) -> Vec<Method> {
        MAPPED_METHODS.to_vec()
    }

    fn index(&mut self, _cx: &mut Context<'_>) -> Result<Value> {
        Err(method_not_allowed(&self.allowed()))
    }

    fn create(&mut self, _cx: &mut Context<'_>) -> Result<Value> {
        Err(method_not_allowed(&self.allowed()))
    }

    fn update(&mut self, _cx: &mut Context<'_>) -> Result<Value> {
        Err(method_not_allowed(&self.allowed()))
    }

    fn delete(&mut self, _cx: &mut Context<'_>) -> Result<Value> {
        Err(method_not_allowed(&self.allowed()))
    }
}

fn method_not_allowed(allowed: &[Method]) -> Error {
    HttpException::new(405).allowed(allowed).into()
}

/// Method the request asks for, after applying an override
///
/// Only GET and POST requests may be overridden. An override naming an
/// unknown method is a `400 Bad Request`.
pub fn effective_method(request: &Request) -> Result<Method> {
    let method = request.method();
    if !matches!(method, Method::Get | Method::Post) {
        return Ok(method);
    }

    let requested = request
        .query(OVERRIDE_PARAM)
        .or_else(|| request.header(OVERRIDE_HEADER));
    match requested {
        Some(value) => Method::from_str(value.trim()).map_err(|_| {
            HttpException::factory(400, Some("Invalid method override: :method"), &[(":method", value)])
                .into()
        }),
        None => Ok(method),
    }
}

/// Action name for a method, if it has one
pub fn action_for(method: Method) -> Option<&'static str> {
    match method {
        Method::Get => Some("index"),
        Method::Put => Some("update"),
        Method::Post => Some("create"),
        Method::Delete => Some("delete"),
        _ => None,
    }
}

/// Wrap anything that is not a JSON object as `{ key: value }`
pub fn wrap_body(body: Value, key: &str) -> Value {
    match body {
        Value::Object(_) => body,
        other => {
            let mut map = Map::new();
            map.insert(key.to_string(), other);
            Value::Object(map)
        }
    }
}

/// Format for the response body
///
/// The route's `format` parameter decides when present. Otherwise the
/// `Accept` header picks among the registered formats that have a MIME type,
/// with ties going to `default_format`.
pub fn negotiate_format(request: &Request, rest: &RestConfig, formatters: &FormatterRegistry) -> String {
    if let Some(format) = request.param("format") {
        return format.to_ascii_lowercase();
    }
    let default = rest.default_format.to_ascii_lowercase();
    if !request.headers().contains("Accept") {
        return default;
    }

    let mut offered: Vec<(&str, &str)> = Vec::new();
    if let Some(mime) = rest.mime(&default) {
        offered.push((default.as_str(), mime));
    }
    for name in formatters.names() {
        if name == default {
            continue;
        }
        if let Some(mime) = rest.mime(name) {
            offered.push((name, mime));
        }
    }

    let mimes: Vec<&str> = offered.iter().map(|(_, mime)| *mime).collect();
    let chosen = request
        .headers()
        .preferred_accept(&mimes)
        .and_then(|mime| offered.iter().find(|(_, m)| *m == mime))
        .map(|(name, _)| name.to_string());
    debug!(format = ?chosen, "negotiated from Accept");
    chosen.unwrap_or(default)
}

/// Controller adapting a `Resource` to REST semantics
pub struct RestController<R> {
    resource: R,
    body: Value,
}

impl<R: Resource> RestController<R> {
    pub fn new(resource: R) -> Self {
        RestController {
            resource,
            body: Value::Null,
        }
    }
}

impl<R: Resource> Controller for RestController<R> {
    fn before(&mut self, cx: &mut Context<'_>) -> Result<()> {
        let method = effective_method(cx.request())?;
        let action = action_for(method).ok_or_else(|| method_not_allowed(&MAPPED_METHODS))?;
        debug!(method = %method, action, "mapped REST action");
        cx.set_action(action);
        Ok(())
    }

    fn action(&mut self, action: &str, cx: &mut Context<'_>) -> Result<()> {
        self.body = match action {
            "index" => self.resource.index(cx)?,
            "create" => self.resource.create(cx)?,
            "update" => self.resource.update(cx)?,
            "delete" => self.resource.delete(cx)?,
            _ => return Err(cx.action_not_found()),
        };
        Ok(())
    }

    fn after(&mut self, cx: &mut Context<'_>) -> Result<()> {
        let rest = &cx.config().rest;
        let format = negotiate_format(cx.request(), rest, cx.app().formatters());
        let body = wrap_body(std::mem::take(&mut self.body), &rest.body_key);

        let app = cx.app();
        let format_cx = FormatContext {
            request: cx.request(),
            config: rest,
            views: app.views(),
        };
        let text = app.formatters().factory(&format, &format_cx)?.format(&body)?;

        let content_type = match rest.mime(&format) {
            Some(mime) => format!("{}; charset=utf-8", mime),
            None => "application/octet-stream".to_string(),
        };
        cx.response_mut()
            .set_header("Content-Type", content_type)
            .set_body(text);
        Ok(())
    }
}
