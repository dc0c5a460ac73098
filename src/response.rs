//! Outbound response value
//!
//! A `Response` is produced by a client as the result of dispatch, or built
//! up front inside an expected HTTP exception. Cookies are kept apart from
//! the header map and emitted as `Set-Cookie` lines when serialized.

use bytes::Bytes;
use sha1::{Digest, Sha1};

use crate::cookie::Cookie;
use crate::exception::HttpException;
use crate::http::{self, Headers, ResponseHead, Status, Version, CRLF};
use crate::request::Request;

#[derive(Debug, Clone, Default)]
pub struct Response {
    status: Status,
    protocol: Version,
    headers: Headers,
    cookies: Vec<Cookie>,
    body: Bytes,
}

impl Response {
    /// Create an empty response with a status
    pub fn new(status: Status) -> Self {
        Response {
            status,
            ..Response::default()
        }
    }

    /// Build a response from a parsed wire message
    pub fn from_parts(head: ResponseHead, body: impl Into<Bytes>) -> Self {
        Response {
            status: head.status,
            protocol: head.version,
            headers: head.headers,
            cookies: Vec::new(),
            body: body.into(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) -> &mut Self {
        self.status = status;
        self
    }

    /// Set the status from a raw code, rejecting codes outside 100..=599
    pub fn set_status_code(&mut self, code: u16) -> http::Result<&mut Self> {
        self.status = Status::new(code)?;
        Ok(self)
    }

    pub fn protocol(&self) -> Version {
        self.protocol
    }

    pub fn set_protocol(&mut self, protocol: Version) -> &mut Self {
        self.protocol = protocol;
        self
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// First value of a header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Replace a header
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, replacing invalid UTF-8
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Look up a cookie queued on this response
    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Queue a cookie, replacing one with the same name
    pub fn set_cookie(&mut self, cookie: Cookie) -> &mut Self {
        self.cookies.retain(|c| c.name != cookie.name);
        self.cookies.push(cookie);
        self
    }

    /// Queue removal of a cookie on the client
    pub fn delete_cookie(&mut self, name: &str) -> &mut Self {
        self.set_cookie(Cookie::removal(name))
    }

    /// Length of the body in bytes
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Strong ETag for the current body
    pub fn generate_etag(&self) -> String {
        format!("\"{}\"", hex::encode(Sha1::digest(&self.body)))
    }

    /// Conditional GET support
    ///
    /// Sets `ETag` (the given one, or one generated from the body) and makes
    /// sure `Cache-Control` contains `must-revalidate`. When the request's
    /// `If-None-Match` equals the ETag exactly, a `304 Not Modified`
    /// exception carrying the same ETag is returned instead.
    pub fn check_cache(&mut self, request: &Request, etag: Option<&str>) -> Result<(), HttpException> {
        let etag = match etag {
            Some(etag) => etag.to_string(),
            None => self.generate_etag(),
        };

        self.set_header("ETag", etag.clone());

        let cache_control = match self.headers.get_joined("Cache-Control") {
            Some(existing) if existing.contains("must-revalidate") => existing,
            Some(existing) if !existing.trim().is_empty() => format!("{}, must-revalidate", existing),
            _ => "must-revalidate".to_string(),
        };
        self.set_header("Cache-Control", cache_control);

        if request.header("If-None-Match") == Some(etag.as_str()) {
            return Err(HttpException::new(304).with_header("ETag", etag));
        }

        Ok(())
    }

    /// Status line and headers, including `Content-Length` and cookies
    ///
    /// A stored `Transfer-Encoding` or `Content-Length` never reaches the
    /// wire; the length always describes `body`.
    pub fn head_to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(
            format!(
                "{} {} {}{}",
                self.protocol,
                self.status.code(),
                self.status.reason_phrase(),
                CRLF
            )
            .as_bytes(),
        );

        // The body is always held whole, so it is framed by length
        let mut headers = self.headers.clone();
        headers.remove("Transfer-Encoding");
        if self.status.is_bodiless() {
            headers.remove("Content-Length");
        } else {
            headers.set("Content-Length", self.body.len().to_string());
        }
        for cookie in &self.cookies {
            headers.append("Set-Cookie", cookie.to_header_value());
        }
        buf.extend_from_slice(headers.to_string().as_bytes());
        buf.extend_from_slice(CRLF.as_bytes());

        buf
    }

    /// Convert the response to wire format
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = self.head_to_wire();
        if !self.status.is_bodiless() {
            buf.extend_from_slice(&self.body);
        }
        buf
    }
}
