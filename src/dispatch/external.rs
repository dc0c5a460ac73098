//! Outbound dispatch
//!
//! The external client serializes a request for a remote origin, sends it
//! through the configured transport and copies the remote answer into the
//! response it was handed. Remote error statuses are ordinary responses;
//! only failing to talk to the origin at all is an error.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, info, warn};
use url::{Host, Url};

use super::{App, Client};
use crate::config::{ClientConfig, TransportKind};
use crate::error::Result;
use crate::http::connection::HttpConnection;
use crate::http::session::{self, FdSessionOps};
use crate::http::tls::TlsSessionOps;
use crate::http::{self, Headers, Method, CRLF};
use crate::request::Request;
use crate::response::Response;

/// Remote headers that describe the remote connection, not the message.
/// The body arrives de-chunked, so its framing is recomputed on the way out.
const HOP_BY_HOP: [&str; 6] = [
    "Connection",
    "Keep-Alive",
    "Transfer-Encoding",
    "Content-Length",
    "Proxy-Connection",
    "Upgrade",
];

/// A request ready to go on the wire
#[derive(Debug, Clone)]
pub struct Outbound {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Bytes,
}

impl Outbound {
    /// Prepare a request for sending
    ///
    /// Query pairs are appended to the URL, cookies become one `Cookie`
    /// header and POST pairs are form-encoded into the body.
    pub fn from_request(request: &Request, config: &ClientConfig) -> http::Result<Self> {
        let mut url =
            Url::parse(request.uri()).map_err(|e| http::Error::InvalidUrl(format!("{}: {}", request.uri(), e)))?;
        if !request.query_pairs().is_empty() {
            url.query_pairs_mut().extend_pairs(request.query_pairs());
        }

        let mut headers = request.headers().clone();

        let mut body = Bytes::copy_from_slice(request.body());
        if !request.post_pairs().is_empty() {
            let encoded = serde_urlencoded::to_string(request.post_pairs())
                .map_err(|e| http::Error::Protocol(format!("cannot encode form body: {}", e)))?;
            body = Bytes::from(encoded);
            headers.set("Content-Type", "application/x-www-form-urlencoded");
        }

        if !request.cookies().is_empty() {
            let cookie = request
                .cookies()
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            headers.set("Cookie", cookie);
        }

        let mut outbound = Outbound {
            method: request.method(),
            url,
            headers,
            body,
        };
        outbound.finalize_headers(config);
        Ok(outbound)
    }

    /// Fill in the headers every request carries
    fn finalize_headers(&mut self, config: &ClientConfig) {
        let host = match (self.url.host_str(), self.url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        self.headers.set("Host", host);

        if !self.headers.contains("User-Agent") {
            self.headers.set("User-Agent", config.user_agent.clone());
        }
        self.headers.set("Connection", "close");

        if !self.body.is_empty() || self.method.allows_body() {
            self.headers.set("Content-Length", self.body.len().to_string());
        } else {
            self.headers.remove("Content-Length");
        }
    }

    /// Path and query as sent in the request line
    pub fn target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256 + self.body.len());
        buf.extend_from_slice(
            format!("{} {} HTTP/1.1{}", self.method, self.target(), CRLF).as_bytes(),
        );
        buf.extend_from_slice(self.headers.to_string().as_bytes());
        buf.extend_from_slice(CRLF.as_bytes());
        buf.extend_from_slice(&self.body);
        buf
    }

    /// Next request of a redirect chain, or `None` when `response` is not
    /// a redirect worth following
    fn redirected(&self, response: &Response, config: &ClientConfig) -> http::Result<Option<Outbound>> {
        let code = response.status().code();
        let method = match code {
            201 | 303 => Method::Get,
            301 | 302 if !config.strict_redirect => Method::Get,
            301 | 302 | 307 | 308 => self.method,
            _ => return Ok(None),
        };
        let Some(location) = response.header("Location") else {
            return Ok(None);
        };

        let url = self
            .url
            .join(location)
            .map_err(|e| http::Error::InvalidUrl(format!("{}: {}", location, e)))?;

        let mut headers = Headers::new();
        for name in &config.follow_headers {
            for value in self.headers.get_all(name) {
                headers.append(name.as_str(), value);
            }
        }

        let body = if method == self.method { self.body.clone() } else { Bytes::new() };
        if !body.is_empty() {
            if let Some(content_type) = self.headers.get("Content-Type") {
                headers.set("Content-Type", content_type);
            }
        }

        let mut next = Outbound {
            method,
            url,
            headers,
            body,
        };
        next.finalize_headers(config);
        Ok(Some(next))
    }
}

/// Something that can carry an outbound request to its origin
pub trait Transport {
    fn send(&self, outbound: &Outbound, config: &ClientConfig) -> http::Result<Response>;
}

/// Blocking sockets, with OpenSSL for `https`
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamTransport;

impl Transport for StreamTransport {
    fn send(&self, outbound: &Outbound, config: &ClientConfig) -> http::Result<Response> {
        let url = &outbound.url;
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(http::Error::UnsupportedScheme(scheme.to_string()));
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(http::Error::InvalidUrl(format!("{}: missing host", url))),
        };
        let port = url
            .port_or_known_default()
            .unwrap_or(if scheme == "https" { http::DEFAULT_HTTPS_PORT } else { http::DEFAULT_HTTP_PORT });

        debug!(%host, port, scheme, "connecting");
        let stream = session::connect(&host, port, config.connect_timeout())?;
        stream.set_read_timeout(config.timeout())?;
        stream.set_write_timeout(config.timeout())?;

        let wire = outbound.to_wire();
        let head_request = outbound.method == Method::Head;
        let (head, body) = if scheme == "https" {
            let tls = TlsSessionOps::connect(stream, &host, config.verify_peer)?;
            HttpConnection::new(tls, config.timeout()).round_trip(&wire, head_request)?
        } else {
            HttpConnection::new(FdSessionOps::new(stream), config.timeout()).round_trip(&wire, head_request)?
        };

        Ok(Response::from_parts(head, body))
    }
}

/// Client for requests addressed to remote origins
pub struct ExternalClient {
    config: ClientConfig,
    transport: Box<dyn Transport>,
}

impl ExternalClient {
    /// Client using the transport named in the configuration
    pub fn new(config: ClientConfig) -> Self {
        let transport: Box<dyn Transport> = match config.transport {
            TransportKind::Stream => Box::new(StreamTransport),
        };
        ExternalClient { config, transport }
    }

    /// Client with a caller-supplied transport
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        ExternalClient {
            config,
            transport: Box::new(transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request, following redirects when configured to
    pub fn send(&self, request: &Request) -> http::Result<Response> {
        let mut outbound = Outbound::from_request(request, &self.config)?;
        let mut redirects = 0;

        loop {
            info!(method = %outbound.method, url = %outbound.url, "sending external request");
            let response = self.transport.send(&outbound, &self.config)?;

            if !self.config.follow {
                return Ok(response);
            }
            let Some(next) = outbound.redirected(&response, &self.config)? else {
                return Ok(response);
            };

            redirects += 1;
            if redirects > self.config.max_redirects {
                warn!(limit = self.config.max_redirects, "redirect limit reached");
                return Err(http::Error::TooManyRedirects(self.config.max_redirects));
            }
            debug!(
                status = response.status().code(),
                location = %next.url,
                method = %next.method,
                "following redirect"
            );
            outbound = next;
        }
    }
}

impl fmt::Debug for ExternalClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client for ExternalClient {
    /// Fills `response` with the remote status, headers and body. Cookies
    /// already queued on it are kept.
    fn execute(&self, _app: &App, request: &Request, mut response: Response) -> Result<Response> {
        let remote = self.send(request)?;

        response
            .set_status(remote.status())
            .set_protocol(remote.protocol())
            .set_body(Bytes::copy_from_slice(remote.body()));
        let mut headers = remote.headers().clone();
        for name in HOP_BY_HOP {
            headers.remove(name);
        }
        *response.headers_mut() = headers;
        Ok(response)
    }
}
