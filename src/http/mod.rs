//! HTTP/1.1 wire layer
//!
//! This module provides the message model (headers, methods, status codes)
//! and the blocking transport plumbing the external client uses to talk to
//! remote origins.
//!
//! # Architecture
//!
//! The transport uses a session operations abstraction so the same HTTP code
//! runs over plain TCP and TLS:
//!
//! - `SessionOps` trait defines operations (poll, read, write, close)
//! - `FdSessionOps` implements them for a plain `TcpStream`
//! - `TlsSessionOps` implements them over an OpenSSL client stream
//! - `HttpConnection` writes a serialized request and parses the response
//!
//! # Examples
//!
//! ```
//! use ko7_dispatch::http::Headers;
//!
//! let headers = Headers::parse("content-type: text/plain\r\nx-long: a\r\n b\r\n");
//! assert_eq!(headers.get("Content-Type"), Some("text/plain"));
//! assert_eq!(headers.get("x-long"), Some("a b"));
//! assert_eq!(headers.to_string(), "Content-Type: text/plain\r\nX-Long: a b\r\n");
//! ```

pub mod chunked;
pub mod connection;
pub mod headers;
pub mod message;
pub mod parser;
pub mod session;
pub mod tls;

pub use connection::HttpConnection;
pub use headers::Headers;
pub use message::{Method, Status, StatusClass, Version};
pub use parser::{ResponseHead, ResponseParser};
pub use session::{HttpSession, SessionOps};

/// Result type for HTTP wire operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP wire and transport errors
///
/// These describe failures to talk to a remote peer at all. A peer that
/// answers with an error status is not an `Error`; it is a response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to resolve host: {0}")]
    Resolve(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),

    #[error("Message exceeds {0} bytes")]
    TooLarge(usize),

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
