//! Configuration types
//!
//! Every section falls back to defaults, so an empty JSON object is a valid
//! configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the application lives, for absolute URL generation
    pub site: SiteConfig,

    /// External client behaviour
    pub client: ClientConfig,

    /// REST format negotiation
    pub rest: RestConfig,

    /// Uncaught error rendering
    pub errors: ErrorConfig,

    /// Cookie defaults and signing
    pub cookie: CookieConfig,
}

impl Config {
    /// Parse configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}

/// Site settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL of the application, e.g. `https://example.com/app/`
    pub base_url: String,

    /// Front controller file inserted after the base URL, empty for none
    pub index_file: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "/".to_string(),
            index_file: String::new(),
        }
    }
}

impl SiteConfig {
    /// Base URL with a trailing slash, plus the index file when set
    pub fn base(&self) -> String {
        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        if !self.index_file.is_empty() {
            base.push_str(self.index_file.trim_matches('/'));
            base.push('/');
        }
        base
    }

    /// Resolve a URI against the site
    ///
    /// URIs that already carry a scheme (`://`) come back unchanged.
    pub fn url(&self, uri: &str) -> String {
        if uri.contains("://") {
            return uri.to_string();
        }
        format!("{}{}", self.base(), uri.trim_start_matches('/'))
    }
}

/// Transport used by the external client
///
/// This is an explicit choice; nothing is detected from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Blocking sockets with OpenSSL for `https://`
    #[default]
    Stream,
}

/// External client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub transport: TransportKind,

    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Per read/write timeout in milliseconds
    pub timeout_ms: u64,

    /// Follow `Location` headers on redirect responses
    pub follow: bool,

    /// Request headers carried over to followed requests
    pub follow_headers: Vec<String>,

    /// Keep the original method on 301/302 instead of switching to GET
    pub strict_redirect: bool,

    /// Upper bound on followed redirects per request
    pub max_redirects: usize,

    /// Sent when the request has no `User-Agent` of its own
    pub user_agent: String,

    /// Verify TLS certificates
    pub verify_peer: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stream,
            connect_timeout_ms: 10_000,
            timeout_ms: 30_000,
            follow: false,
            follow_headers: vec!["Authorization".to_string()],
            strict_redirect: true,
            max_redirects: 5,
            user_agent: concat!("ko7-dispatch/", env!("CARGO_PKG_VERSION")).to_string(),
            verify_peer: true,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// REST adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Format used when the route carries no `format` parameter
    pub default_format: String,

    /// Root element name of XML output
    pub xml_root: String,

    /// Key used to wrap bodies that are not JSON objects
    pub body_key: String,

    /// Format name to MIME types; the first entry is sent as `Content-Type`
    pub mimes: BTreeMap<String, Vec<String>>,
}

impl Default for RestConfig {
    fn default() -> Self {
        let mimes = [
            ("json", "application/json"),
            ("xml", "text/xml"),
            ("html", "text/html"),
            ("txt", "text/plain"),
        ]
        .into_iter()
        .map(|(ext, mime)| (ext.to_string(), vec![mime.to_string()]))
        .collect();

        Self {
            default_format: "json".to_string(),
            xml_root: "response".to_string(),
            body_key: "body".to_string(),
            mimes,
        }
    }
}

impl RestConfig {
    /// MIME type for a format name
    pub fn mime(&self, format: &str) -> Option<&str> {
        self.mimes
            .get(&format.to_ascii_lowercase())
            .and_then(|list| list.first())
            .map(String::as_str)
    }
}

/// Error rendering settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorConfig {
    /// Put the error description in 500 response bodies
    pub expose: bool,
}

/// Cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Signing salt; cookies are unsigned when absent
    pub salt: Option<String>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub httponly: bool,

    /// Lifetime in seconds, 0 for a session cookie
    pub expiration: u64,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            salt: None,
            path: "/".to_string(),
            domain: None,
            secure: false,
            httponly: false,
            expiration: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.site.base_url, "/");
        assert_eq!(config.client.transport, TransportKind::Stream);
        assert_eq!(config.client.max_redirects, 5);
        assert_eq!(config.rest.default_format, "json");
        assert!(!config.errors.expose);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_json_str(
            r#"{"site": {"base_url": "https://example.com/app/"}, "client": {"transport": "stream", "follow": true}}"#,
        )
        .unwrap();
        assert_eq!(config.site.base_url, "https://example.com/app/");
        assert!(config.client.follow);
        assert_eq!(config.client.timeout_ms, 30_000);
    }

    #[test]
    fn test_unknown_transport_is_rejected() {
        let result = Config::from_json_str(r#"{"client": {"transport": "carrier-pigeon"}}"#);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"rest": {{"default_format": "xml"}}, "errors": {{"expose": true}}}}"#).unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.rest.default_format, "xml");
        assert!(config.errors.expose);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_site_url() {
        let site = SiteConfig {
            base_url: "https://example.com/app/".to_string(),
            index_file: String::new(),
        };
        assert_eq!(site.url("account/login"), "https://example.com/app/account/login");
        assert_eq!(site.url("/account"), "https://example.com/app/account");
        assert_eq!(site.url("http://other.test/x"), "http://other.test/x");

        let site = SiteConfig {
            base_url: "/".to_string(),
            index_file: "index.php".to_string(),
        };
        assert_eq!(site.url("welcome"), "/index.php/welcome");
    }

    #[test]
    fn test_rest_mime() {
        let rest = RestConfig::default();
        assert_eq!(rest.mime("json"), Some("application/json"));
        assert_eq!(rest.mime("XML"), Some("text/xml"));
        assert_eq!(rest.mime("yaml"), None);
    }
}
