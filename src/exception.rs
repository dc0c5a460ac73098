//! HTTP exceptions
//!
//! An `HttpException` is a status code plus the response that status should
//! produce. Two families exist:
//!
//! - *expected* exceptions are intentional, non-error exits: redirects,
//!   `304 Not Modified`, `401 Unauthorized` with its challenge and
//!   `405 Method Not Allowed` with its `Allow` list. They own a pre-built
//!   response whose headers callers fill in before raising them.
//! - *error* exceptions (every other status) render a plain-text body
//!   carrying the exception message.
//!
//! Some expected exceptions have required headers. `check` enforces them and
//! `get_response` refuses to produce a response while they are missing; that
//! failure is a `Configuration` error, not an HTTP one.

use std::fmt;

use crate::config::SiteConfig;
use crate::error::{Error, Result};
use crate::http::{Method, Status};
use crate::response::Response;

/// Which expected exit an exception models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// 300, 301, 302, 303, 305, 307, 308; requires `Location`
    Redirect,
    /// 304
    NotModified,
    /// 401; requires `WWW-Authenticate`
    Unauthorized,
    /// 405; carries `Allow`
    MethodNotAllowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Expected(Expectation),
    Error,
}

impl ExceptionKind {
    fn for_status(code: u16) -> Self {
        match code {
            300 | 301 | 302 | 303 | 305 | 307 | 308 => {
                ExceptionKind::Expected(Expectation::Redirect)
            }
            304 => ExceptionKind::Expected(Expectation::NotModified),
            401 => ExceptionKind::Expected(Expectation::Unauthorized),
            405 => ExceptionKind::Expected(Expectation::MethodNotAllowed),
            _ => ExceptionKind::Error,
        }
    }
}

/// An HTTP status raised as an error value
#[derive(Debug, Clone)]
pub struct HttpException {
    status: Status,
    message: String,
    kind: ExceptionKind,
    response: Response,
    uri: Option<String>,
}

impl HttpException {
    /// Create the exception for a status code
    ///
    /// Placeholders from `vars` are replaced in `message`. Codes outside the
    /// valid status range fall back to a 500 error carrying the message.
    pub fn factory(code: u16, message: Option<&str>, vars: &[(&str, &str)]) -> Self {
        let status = Status::new(code).unwrap_or(Status::INTERNAL_SERVER_ERROR);
        let mut message = message.unwrap_or("").to_string();
        for (placeholder, value) in vars {
            message = message.replace(placeholder, value);
        }

        HttpException {
            status,
            message,
            kind: ExceptionKind::for_status(status.code()),
            response: Response::new(status),
            uri: None,
        }
    }

    /// Exception for a status code with no message
    pub fn new(code: u16) -> Self {
        Self::factory(code, None, &[])
    }

    /// 404 for a URI nobody handles
    pub fn not_found(uri: &str) -> Self {
        Self::factory(
            404,
            Some("The requested URL :uri was not found on this server."),
            &[(":uri", uri)],
        )
        .with_request_uri(uri)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    pub fn is_expected(&self) -> bool {
        matches!(self.kind, ExceptionKind::Expected(_))
    }

    /// URI of the request that raised this exception, if recorded
    pub fn request_uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Record the URI of the request that raised this exception
    pub fn with_request_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Read a header of the owned response
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.header(name)
    }

    /// Set a header on the owned response
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.set_header(name, value);
        self
    }

    /// Current redirect target
    pub fn location(&self) -> Option<&str> {
        self.header("Location")
    }

    /// Set the redirect target
    ///
    /// Relative URIs are resolved against the site base URL; anything
    /// containing `://` is stored unchanged.
    pub fn with_location(self, uri: &str, site: &SiteConfig) -> Self {
        let location = site.url(uri);
        self.with_header("Location", location)
    }

    /// Set the `WWW-Authenticate` challenge of a 401
    pub fn authenticate(self, challenge: impl Into<String>) -> Self {
        self.with_header("WWW-Authenticate", challenge)
    }

    /// Set the `Allow` list of a 405
    pub fn allowed(self, methods: &[Method]) -> Self {
        let allow = methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        self.with_header("Allow", allow)
    }

    /// Validate the exception before it turns into a response
    pub fn check(&self) -> Result<()> {
        match self.kind {
            ExceptionKind::Expected(Expectation::Redirect) if self.location().is_none() => {
                Err(Error::Configuration(format!(
                    "A 'location' must be specified for a redirect ({})",
                    self.status.code()
                )))
            }
            ExceptionKind::Expected(Expectation::Unauthorized)
                if self.header("WWW-Authenticate").is_none() =>
            {
                Err(Error::Configuration(
                    "A 'WWW-Authenticate' header must be specified for a HTTP 401 Unauthorized"
                        .to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// The response this exception stands for
    pub fn get_response(&self) -> Result<Response> {
        self.check()?;
        Ok(self.render())
    }

    /// Consume the exception into its response
    pub fn into_response(self) -> Result<Response> {
        self.check()?;
        Ok(self.render())
    }

    fn render(&self) -> Response {
        let mut response = self.response.clone();
        if self.kind == ExceptionKind::Error {
            let body = if self.message.is_empty() {
                self.status.reason_phrase().to_string()
            } else {
                self.message.clone()
            };
            response.set_header("Content-Type", "text/plain; charset=utf-8");
            response.set_body(body);
        }
        response
    }
}

impl fmt::Display for HttpException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "HTTP {}", self.status)
        } else {
            write!(f, "HTTP {}: {}", self.status, self.message)
        }
    }
}

impl std::error::Error for HttpException {}

/// Build the error that redirects to `uri`
///
/// ```
/// use ko7_dispatch::config::SiteConfig;
/// use ko7_dispatch::exception::redirect;
/// use ko7_dispatch::Error;
///
/// let site = SiteConfig { base_url: "https://example.com/".into(), index_file: String::new() };
/// let Error::Http(e) = redirect("login", 302, &site) else { panic!() };
/// assert_eq!(e.location(), Some("https://example.com/login"));
/// ```
pub fn redirect(uri: &str, code: u16, site: &SiteConfig) -> Error {
    Error::Http(HttpException::new(code).with_location(uri, site))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REDIRECTS: [u16; 7] = [300, 301, 302, 303, 305, 307, 308];

    fn site(base: &str) -> SiteConfig {
        SiteConfig {
            base_url: base.to_string(),
            index_file: String::new(),
        }
    }

    #[test]
    fn test_factory_selects_kind() {
        for code in REDIRECTS {
            assert_eq!(
                HttpException::new(code).kind(),
                ExceptionKind::Expected(Expectation::Redirect)
            );
        }
        assert_eq!(
            HttpException::new(304).kind(),
            ExceptionKind::Expected(Expectation::NotModified)
        );
        assert_eq!(HttpException::new(404).kind(), ExceptionKind::Error);
        assert_eq!(HttpException::new(503).kind(), ExceptionKind::Error);
        assert!(HttpException::new(401).is_expected());
    }

    #[test]
    fn test_unknown_code_keeps_status() {
        let e = HttpException::new(418);
        assert_eq!(e.status().code(), 418);
        assert_eq!(e.kind(), ExceptionKind::Error);

        let e = HttpException::factory(999, Some("broken"), &[]);
        assert_eq!(e.status().code(), 500);
        assert_eq!(e.message(), "broken");
    }

    #[test]
    fn test_message_vars() {
        let e = HttpException::factory(404, Some("No :thing at :uri"), &[(":thing", "page"), (":uri", "/x")]);
        assert_eq!(e.message(), "No page at /x");
        assert_eq!(e.to_string(), "HTTP 404 Not Found: No page at /x");
    }

    #[test]
    fn test_relative_location_is_resolved() {
        let e = HttpException::new(302).with_location("account/login", &site("https://example.com/app/"));
        assert_eq!(e.location(), Some("https://example.com/app/account/login"));

        let response = e.get_response().unwrap();
        assert_eq!(response.status().code(), 302);
        assert_eq!(response.header("Location"), Some("https://example.com/app/account/login"));
    }

    #[test]
    fn test_absolute_location_is_kept() {
        let e = HttpException::new(301).with_location("https://other.test/x?y=1", &site("https://example.com/"));
        assert_eq!(e.location(), Some("https://other.test/x?y=1"));
    }

    #[test]
    fn test_redirect_without_location_fails_check() {
        for code in REDIRECTS {
            let e = HttpException::new(code);
            assert!(matches!(e.check(), Err(Error::Configuration(_))));
            assert!(matches!(e.get_response(), Err(Error::Configuration(_))), "code {}", code);
        }
    }

    #[test]
    fn test_unauthorized_requires_challenge() {
        assert!(matches!(HttpException::new(401).get_response(), Err(Error::Configuration(_))));

        let response = HttpException::new(401)
            .authenticate("Basic realm=\"app\"")
            .get_response()
            .unwrap();
        assert_eq!(response.header("WWW-Authenticate"), Some("Basic realm=\"app\""));
    }

    #[test]
    fn test_method_not_allowed_lists_methods() {
        let response = HttpException::new(405)
            .allowed(&[Method::Get, Method::Post])
            .get_response()
            .unwrap();
        assert_eq!(response.status().code(), 405);
        assert_eq!(response.header("Allow"), Some("GET, POST"));
    }

    #[test]
    fn test_error_response_body() {
        let response = HttpException::not_found("/missing/page").into_response().unwrap();
        assert_eq!(response.status().code(), 404);
        assert!(String::from_utf8_lossy(response.body()).contains("/missing/page"));
        assert_eq!(response.header("Content-Type"), Some("text/plain; charset=utf-8"));

        let response = HttpException::new(503).into_response().unwrap();
        assert_eq!(response.body(), b"Service Unavailable".as_slice());
    }

    #[test]
    fn test_expected_header_proxy() {
        let e = HttpException::new(304).with_header("ETag", "\"abc\"");
        assert_eq!(e.header("etag"), Some("\"abc\""));
        assert!(e.get_response().unwrap().body().is_empty());
    }

    #[test]
    fn test_redirect_helper() {
        match redirect("welcome", 303, &site("http://localhost/")) {
            Error::Http(e) => {
                assert_eq!(e.status().code(), 303);
                assert_eq!(e.location(), Some("http://localhost/welcome"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
