//! Cookies
//!
//! Outgoing cookies become `Set-Cookie` headers. When a salt is configured
//! every value is signed: the stored form is `signature~value`, where the
//! signature is the SHA-1 of the lowercased user agent, the cookie name, the
//! value and the salt. Cookies whose signature does not verify are treated
//! as absent.

use sha1::{Digest, Sha1};
use tracing::warn;

use crate::config::CookieConfig;
use crate::request::Request;

/// Length of a hex SHA-1 signature
const SIGNATURE_LEN: usize = 40;

/// An outgoing cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lifetime in seconds; `None` for a session cookie
    pub max_age: Option<u64>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub httponly: bool,
}

impl Cookie {
    /// Session cookie with no attributes
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Cookie {
            name: name.into(),
            value: value.into(),
            max_age: None,
            path: None,
            domain: None,
            secure: false,
            httponly: false,
        }
    }

    /// Cookie that tells the client to drop `name`
    pub fn removal(name: impl Into<String>) -> Self {
        Cookie {
            max_age: Some(0),
            ..Cookie::new(name, "")
        }
    }

    /// Value of the `Set-Cookie` header for this cookie
    pub fn to_header_value(&self) -> String {
        let mut header = format!("{}={}", self.name, self.value);
        if let Some(max_age) = self.max_age {
            header.push_str(&format!("; Max-Age={}", max_age));
        }
        if let Some(path) = &self.path {
            header.push_str(&format!("; Path={}", path));
        }
        if let Some(domain) = &self.domain {
            header.push_str(&format!("; Domain={}", domain));
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.httponly {
            header.push_str("; HttpOnly");
        }
        header
    }
}

/// Parse a `Cookie` request header into (name, value) pairs
pub fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Signature for a cookie value
pub fn salt(name: &str, value: &str, user_agent: &str, salt: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(user_agent.to_lowercase().as_bytes());
    hasher.update(name.as_bytes());
    hasher.update(value.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cookie factory applying configured defaults and signing
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    config: CookieConfig,
}

impl CookieJar {
    pub fn new(config: CookieConfig) -> Self {
        CookieJar { config }
    }

    /// Build a cookie with the configured attributes, signed when a salt is set
    pub fn make(&self, name: &str, value: &str, user_agent: &str) -> Cookie {
        let stored = match &self.config.salt {
            Some(key) => format!("{}~{}", salt(name, value, user_agent, key), value),
            None => value.to_string(),
        };

        Cookie {
            name: name.to_string(),
            value: stored,
            max_age: (self.config.expiration > 0).then_some(self.config.expiration),
            path: Some(self.config.path.clone()),
            domain: self.config.domain.clone(),
            secure: self.config.secure,
            httponly: self.config.httponly,
        }
    }

    /// Removal cookie carrying the configured path and domain
    pub fn removal(&self, name: &str) -> Cookie {
        Cookie {
            path: Some(self.config.path.clone()),
            domain: self.config.domain.clone(),
            ..Cookie::removal(name)
        }
    }

    /// Read a cookie from a request, verifying its signature
    ///
    /// Without a configured salt the raw value is returned.
    pub fn get(&self, request: &Request, name: &str) -> Option<String> {
        let raw = request.cookie(name)?;
        let Some(key) = &self.config.salt else {
            return Some(raw.to_string());
        };

        let user_agent = request.header("User-Agent").unwrap_or("");
        if raw.len() > SIGNATURE_LEN && raw.as_bytes()[SIGNATURE_LEN] == b'~' {
            let (signature, value) = (&raw[..SIGNATURE_LEN], &raw[SIGNATURE_LEN + 1..]);
            if salt(name, value, user_agent, key) == signature {
                return Some(value.to_string());
            }
        }

        warn!(cookie = name, "dropping cookie with invalid signature");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn salted_jar() -> CookieJar {
        CookieJar::new(CookieConfig {
            salt: Some("pepper".to_string()),
            httponly: true,
            expiration: 3600,
            ..CookieConfig::default()
        })
    }

    #[test]
    fn test_header_value() {
        let cookie = Cookie {
            max_age: Some(60),
            path: Some("/".to_string()),
            secure: true,
            httponly: true,
            ..Cookie::new("session", "abc")
        };
        assert_eq!(cookie.to_header_value(), "session=abc; Max-Age=60; Path=/; Secure; HttpOnly");
        assert_eq!(Cookie::removal("session").to_header_value(), "session=; Max-Age=0");
    }

    #[test]
    fn test_parse_cookie_header() {
        let pairs = parse_cookie_header("a=1; b = two ;broken; c=x=y");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two".to_string()),
                ("c".to_string(), "x=y".to_string()),
            ]
        );
    }

    #[test]
    fn test_signed_cookie_round_trip() {
        let jar = salted_jar();
        let cookie = jar.make("user", "42", "Agent/1.0");
        assert_eq!(cookie.value.len(), SIGNATURE_LEN + 1 + 2);
        assert_eq!(cookie.max_age, Some(3600));

        let request = Request::builder()
            .uri("/")
            .header("User-Agent", "Agent/1.0")
            .cookie("user", cookie.value.clone())
            .build();
        assert_eq!(jar.get(&request, "user").as_deref(), Some("42"));
    }

    #[test]
    fn test_tampered_cookie_is_rejected() {
        let jar = salted_jar();
        let cookie = jar.make("user", "42", "Agent/1.0");
        let tampered = cookie.value.replace("~42", "~43");

        let request = Request::builder()
            .uri("/")
            .header("User-Agent", "Agent/1.0")
            .cookie("user", tampered)
            .build();
        assert_eq!(jar.get(&request, "user"), None);

        // Same value, different browser
        let request = Request::builder()
            .uri("/")
            .header("User-Agent", "Other/2.0")
            .cookie("user", cookie.value)
            .build();
        assert_eq!(jar.get(&request, "user"), None);
    }

    #[test]
    fn test_unsigned_jar_returns_raw_value() {
        let jar = CookieJar::default();
        let request = Request::builder().uri("/").cookie("theme", "dark").build();
        assert_eq!(jar.get(&request, "theme").as_deref(), Some("dark"));
        assert_eq!(jar.get(&request, "missing"), None);
    }
}
