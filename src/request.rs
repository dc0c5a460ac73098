//! Request value
//!
//! A `Request` is either inbound (parsed off the wire) or built by
//! application code as a sub-request. Its URI decides which client runs it:
//! anything with a scheme (`://`) goes to the external client, everything
//! else is routed to in-process controllers.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::config::SiteConfig;
use crate::cookie::parse_cookie_header;
use crate::http::chunked::decode_chunked_body;
use crate::http::parser::{find_head_end, parse_request_line};
use crate::http::{self, Headers, Method, Version};
use crate::route::RouteMatch;

/// Which client dispatches a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// Routed to a controller in this process
    Internal,
    /// Sent over the network to a remote origin
    External,
}

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: String,
    protocol: Version,
    headers: Headers,
    query: Vec<(String, String)>,
    post: Vec<(String, String)>,
    cookies: BTreeMap<String, String>,
    body: Bytes,
    route: Option<RouteMatch>,
    client: ClientKind,
}

/// Split `uri?query` and decode the query pairs
fn split_query(uri: &str) -> (String, Vec<(String, String)>) {
    match uri.split_once('?') {
        Some((path, query)) => (
            path.to_string(),
            serde_urlencoded::from_str(query).unwrap_or_default(),
        ),
        None => (uri.to_string(), Vec::new()),
    }
}

/// Internal URIs are stored as `/segment/segment`
fn normalize_internal(path: &str) -> String {
    format!("/{}", path.trim_matches('/'))
}

impl Request {
    /// Create a request for a URI
    ///
    /// A query string is split off into query parameters. URIs containing
    /// `://` are bound to the external client.
    pub fn factory(uri: &str) -> Self {
        Self::builder().uri(uri).build()
    }

    /// Create a builder for constructing requests
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Parse an inbound HTTP/1.1 request
    ///
    /// Inbound requests are always internal. The body is cut at
    /// `Content-Length` or decoded from chunks; cookies come from the
    /// `Cookie` header and form bodies are decoded into POST parameters.
    pub fn from_wire(raw: &[u8]) -> http::Result<Self> {
        let (len, term) = find_head_end(raw).ok_or(http::Error::ConnectionClosed)?;
        let head = String::from_utf8_lossy(&raw[..len]).into_owned();
        let (request_line, header_block) = head.split_once('\n').unwrap_or((head.as_str(), ""));
        let (method, target, version) = parse_request_line(request_line.trim_end())?;
        let headers = Headers::parse(header_block);

        let rest = &raw[len + term..];
        let chunked = headers
            .get("Transfer-Encoding")
            .map_or(false, |te| te.to_ascii_lowercase().contains("chunked"));
        let body = match headers.get("Content-Length") {
            _ if chunked => Bytes::from(decode_chunked_body(rest)?),
            Some(cl) => {
                let length = cl
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| http::Error::Parse(format!("Invalid Content-Length: {}", cl)))?;
                if rest.len() < length {
                    return Err(http::Error::ConnectionClosed);
                }
                Bytes::copy_from_slice(&rest[..length])
            }
            None => Bytes::new(),
        };

        // Absolute-form targets still address this application
        let target = match target.split_once("://") {
            Some((_, after_scheme)) => match after_scheme.find('/') {
                Some(slash) => after_scheme[slash..].to_string(),
                None => "/".to_string(),
            },
            None => target,
        };
        let (path, query) = split_query(&target);

        let cookies = headers
            .get_all("Cookie")
            .into_iter()
            .flat_map(parse_cookie_header)
            .collect();

        let is_form = headers
            .get("Content-Type")
            .map_or(false, |ct| ct.starts_with("application/x-www-form-urlencoded"));
        let post = if is_form {
            serde_urlencoded::from_bytes(&body).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Request {
            method,
            uri: normalize_internal(&path),
            protocol: version,
            headers,
            query,
            post,
            cookies,
            body,
            route: None,
            client: ClientKind::Internal,
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Request URI without the query string
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn protocol(&self) -> Version {
        self.protocol
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// First value of a request header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// First query parameter named `key`
    pub fn query(&self, key: &str) -> Option<&str> {
        lookup(&self.query, key)
    }

    /// Encoded query string, without the leading `?`
    pub fn query_string(&self) -> String {
        serde_urlencoded::to_string(&self.query).unwrap_or_default()
    }

    pub fn post_pairs(&self) -> &[(String, String)] {
        &self.post
    }

    /// First POST parameter named `key`
    pub fn post(&self, key: &str) -> Option<&str> {
        lookup(&self.post, key)
    }

    /// Raw cookie value; see `CookieJar::get` for signed cookies
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Routing result, once resolved
    pub fn route(&self) -> Option<&RouteMatch> {
        self.route.as_ref()
    }

    pub fn set_route(&mut self, route: RouteMatch) {
        self.route = Some(route);
    }

    /// Route parameter, once resolved
    pub fn param(&self, key: &str) -> Option<&str> {
        self.route.as_ref().and_then(|r| r.param(key))
    }

    pub fn client(&self) -> ClientKind {
        self.client
    }

    pub fn is_external(&self) -> bool {
        self.client == ClientKind::External
    }

    pub fn referrer(&self) -> Option<&str> {
        self.header("Referer")
    }

    /// Requested via XMLHttpRequest
    pub fn is_ajax(&self) -> bool {
        self.header("X-Requested-With")
            .map_or(false, |v| v.eq_ignore_ascii_case("xmlhttprequest"))
    }

    /// Absolute URL of this request, including the query string
    pub fn url(&self, site: &SiteConfig) -> String {
        let mut url = site.url(&self.uri);
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&self.query_string());
        }
        url
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Builder for requests
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    uri: Option<String>,
    version: Option<Version>,
    headers: Headers,
    query: Vec<(String, String)>,
    post: Vec<(String, String)>,
    cookies: BTreeMap<String, String>,
    body: Bytes,
    route: Option<RouteMatch>,
}

impl RequestBuilder {
    /// Set the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the URI, optionally carrying a query string
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the HTTP version
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Add a header value
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Add a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a POST parameter
    pub fn post(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.post.push((key.into(), value.into()));
        self
    }

    /// Add a cookie
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Set the raw body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Skip routing and dispatch straight to a known handler
    pub fn route(mut self, route: RouteMatch) -> Self {
        self.route = Some(route);
        self
    }

    /// Build the request
    pub fn build(self) -> Request {
        let uri = self.uri.unwrap_or_else(|| "/".to_string());
        let (path, mut query) = split_query(&uri);
        query.extend(self.query);

        let client = if path.contains("://") {
            ClientKind::External
        } else {
            ClientKind::Internal
        };
        let uri = match client {
            ClientKind::External => path,
            ClientKind::Internal => normalize_internal(&path),
        };

        Request {
            method: self.method.unwrap_or_default(),
            uri,
            protocol: self.version.unwrap_or_default(),
            headers: self.headers,
            query,
            post: self.post,
            cookies: self.cookies,
            body: self.body,
            route: self.route,
            client,
        }
    }
}
