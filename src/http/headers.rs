//! HTTP headers handling
//!
//! This module provides an ordered header map with case-insensitive lookups.
//! Repeated header names collapse under one key that owns every value, so
//! `Set-Cookie` style headers keep all of their values in arrival order.

use std::fmt;

use super::CRLF;

/// Header names whose canonical spelling is not plain word capitalization
const IRREGULAR_NAMES: &[&str] = &[
    "ETag",
    "WWW-Authenticate",
    "Content-MD5",
    "DNT",
    "TE",
    "X-XSS-Protection",
    "X-UA-Compatible",
    "X-HTTP-Method-Override",
];

/// HTTP headers collection
///
/// Headers are stored in insertion order and support:
/// - Case-insensitive header name lookups
/// - Multiple values for the same header name, kept under a single key
/// - Lenient parsing of raw header blocks, including folded lines
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Create a new empty headers collection
    pub fn new() -> Self {
        Headers {
            entries: Vec::new(),
        }
    }

    /// Parse a raw header block
    ///
    /// Lines may end in CRLF or a bare LF. Lines starting with a space or tab
    /// continue the previous header value. Lines without a colon are skipped.
    /// Parsing stops at the first empty line; a missing blank line at the end
    /// of the block is fine.
    pub fn parse(raw: &str) -> Self {
        let mut headers = Headers::new();
        let mut pending: Option<(String, String)> = None;

        for line in raw.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = pending.as_mut() {
                    let folded = line.trim();
                    if !folded.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(folded);
                    }
                }
                continue;
            }

            if let Some((name, value)) = pending.take() {
                headers.append(name, value);
            }

            pending = Self::parse_header_line(line);
        }

        if let Some((name, value)) = pending {
            headers.append(name, value);
        }

        headers
    }

    /// Split a single `Name: value` line
    ///
    /// Returns `None` when there is no colon or the name is empty.
    pub fn parse_header_line(line: &str) -> Option<(String, String)> {
        let (name, value) = line.split_once(':')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), value.trim().to_string()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Get the first value for a header (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|i| self.entries[i].1.first())
            .map(String::as_str)
    }

    /// Get all values for a header (case-insensitive)
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        match self.position(name) {
            Some(i) => self.entries[i].1.iter().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }

    /// Get all values for a header joined with `", "`
    pub fn get_joined(&self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.entries[i].1.join(", "))
    }

    /// Replace every value of a header with a single value
    ///
    /// An existing header keeps its position; a new one is appended.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = vec![value],
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Add a value to a header, keeping existing values
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Remove a header and all of its values, returning how many were dropped
    pub fn remove(&mut self, name: &str) -> usize {
        match self.position(name) {
            Some(i) => self.entries.remove(i).1.len(),
            None => 0,
        }
    }

    /// Check if a header exists
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all headers
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over header names with their values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Iterate over every (name, value) pair, one item per value
    pub fn iter_flat(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(n, values)| values.iter().map(move |v| (n.as_str(), v.as_str())))
    }

    /// Quality the `Accept` header assigns to a media type
    ///
    /// A missing `Accept` header accepts everything at quality 1.0.
    pub fn accept_quality(&self, media_type: &str) -> f32 {
        let Some(accept) = self.get_joined("Accept") else {
            return 1.0;
        };
        let list = parse_quality_list(&accept);
        let media_type = media_type.to_ascii_lowercase();
        let wildcard = media_type
            .split_once('/')
            .map(|(major, _)| format!("{}/*", major));

        let lookup = |token: &str| list.iter().find(|(t, _)| t == token).map(|(_, q)| *q);

        lookup(&media_type)
            .or_else(|| wildcard.as_deref().and_then(lookup))
            .or_else(|| lookup("*/*"))
            .unwrap_or(0.0)
    }

    /// Pick the candidate media type the client prefers
    ///
    /// Ties go to the earlier candidate. Returns `None` when every candidate
    /// is refused.
    pub fn preferred_accept<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        let mut best: Option<(&'a str, f32)> = None;
        for candidate in candidates {
            let quality = self.accept_quality(candidate);
            if quality <= 0.0 {
                continue;
            }
            if best.map_or(true, |(_, q)| quality > q) {
                best = Some((*candidate, quality));
            }
        }
        best.map(|(c, _)| c)
    }
}

/// Canonical spelling of a header name
///
/// Known irregular names map to their registered spelling, everything else
/// gets each dash-separated word capitalized.
pub fn canonical_name(name: &str) -> String {
    if let Some(known) = IRREGULAR_NAMES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(name))
    {
        return (*known).to_string();
    }

    name.split('-')
        .map(|word| {
            // ASCII-only case mapping keeps non-ASCII names byte-for-byte
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => std::iter::once(first.to_ascii_uppercase())
                    .chain(chars.map(|c| c.to_ascii_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Parse an `Accept`-style list into (token, quality) pairs
///
/// Tokens are lowercased; the result is sorted by descending quality with
/// the original order kept for equal qualities.
pub fn parse_quality_list(value: &str) -> Vec<(String, f32)> {
    let mut list: Vec<(String, f32)> = value
        .split(',')
        .filter_map(|item| {
            let mut parts = item.split(';');
            let token = parts.next()?.trim().to_ascii_lowercase();
            if token.is_empty() {
                return None;
            }
            let quality = parts
                .filter_map(|param| param.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((token, quality.clamp(0.0, 1.0)))
        })
        .collect();

    list.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    list
}

impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((a, av), (b, bv))| a.eq_ignore_ascii_case(b) && av == bv)
    }
}

impl Eq for Headers {}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, values) in &self.entries {
            let name = canonical_name(name);
            for value in values {
                write!(f, "{}: {}{}", name, value, CRLF)?;
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/html");
        headers.set("Content-Length", "42");

        assert_eq!(headers.get("Content-Type"), Some("text/html"));
        assert_eq!(headers.get("Content-Length"), Some("42"));
        assert_eq!(headers.get("Missing"), None);

        headers.set("content-type", "application/json");
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_case_insensitive() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/html");

        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
        assert!(headers.contains("CoNtEnT-TyPe"));
    }

    #[test]
    fn test_multiple_values_share_one_key() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("set-cookie", "b=2");
        headers.append("Set-Cookie", "c=3");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_all("Set-Cookie"), vec!["a=1", "b=2", "c=3"]);
        assert_eq!(headers.get("Set-Cookie"), Some("a=1"));
        assert_eq!(headers.get_joined("Set-Cookie").as_deref(), Some("a=1, b=2, c=3"));
    }

    #[test]
    fn test_remove() {
        let mut headers = Headers::new();
        headers.append("X-Remove", "value1");
        headers.append("X-Keep", "value2");
        headers.append("X-Remove", "value3");

        assert_eq!(headers.remove("x-remove"), 2);
        assert_eq!(headers.get("X-Remove"), None);
        assert_eq!(headers.get("X-Keep"), Some("value2"));
        assert_eq!(headers.remove("X-Remove"), 0);
    }

    #[test]
    fn test_parse_folds_continuation_lines() {
        let raw = "Content-Type: text/plain\r\nX-Folded: first\r\n  second\r\n\tthird\r\nAccept: */*\r\n\r\n";
        let headers = Headers::parse(raw);

        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("x-folded"), Some("first second third"));
        assert_eq!(headers.get("Accept"), Some("*/*"));
    }

    #[test]
    fn test_parse_accepts_bare_lf_and_no_trailing_blank_line() {
        let headers = Headers::parse("Host: example.com\nX-One: 1");
        assert_eq!(headers.get("Host"), Some("example.com"));
        assert_eq!(headers.get("X-One"), Some("1"));
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let headers = Headers::parse("HTTP/1.1 200 OK\r\nno colon here\r\n: empty name\r\nX-Good: yes\r\n");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-Good"), Some("yes"));
    }

    #[test]
    fn test_parse_stops_at_blank_line() {
        let headers = Headers::parse("X-A: 1\r\n\r\nX-B: 2\r\n");
        assert!(headers.contains("X-A"));
        assert!(!headers.contains("X-B"));
    }

    #[test]
    fn test_parse_collects_repeated_headers() {
        let headers = Headers::parse("Set-Cookie: a=1\r\nset-cookie: b=2\r\n");
        assert_eq!(headers.get_all("Set-Cookie"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_display_canonicalizes_names() {
        let headers = Headers::parse("content-type: text/html\r\netag: \"x\"\r\nwww-authenticate: Basic\r\nset-cookie: a=1\r\nset-cookie: b=2\r\n");
        assert_eq!(
            headers.to_string(),
            "Content-Type: text/html\r\nETag: \"x\"\r\nWWW-Authenticate: Basic\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\n"
        );
    }

    #[test]
    fn test_round_trip_is_stable() {
        let raws = [
            "x-folded: one\r\n two\r\ncontent-length: 3\r\n",
            "Set-Cookie: a=1\nset-cookie: b=2\nVary: Accept\n  , Origin",
            "garbage\r\nX-Empty:\r\nX-Colon: a:b:c\r\n\r\nignored: yes",
        ];
        for raw in raws {
            let parsed = Headers::parse(raw);
            let reparsed = Headers::parse(&parsed.to_string());
            assert_eq!(parsed, reparsed, "round trip changed {:?}", raw);
        }
    }

    #[test]
    fn test_non_ascii_names_survive_a_round_trip() {
        let headers = Headers::parse("ßtraße: 1\r\nx-ärger: 2\r\n");
        assert_eq!(canonical_name("ßtraße"), "ßtraße");
        assert_eq!(canonical_name("x-ärger"), "X-ärger");

        let reparsed = Headers::parse(&headers.to_string());
        assert_eq!(reparsed, headers);
        assert_eq!(reparsed.get("ßtraße"), Some("1"));
        assert_eq!(reparsed.get("X-ÄRGER"), None);
        assert_eq!(reparsed.get("X-ärger"), Some("2"));
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("content-type"), "Content-Type");
        assert_eq!(canonical_name("X-FORWARDED-FOR"), "X-Forwarded-For");
        assert_eq!(canonical_name("etag"), "ETag");
        assert_eq!(canonical_name("x-http-method-override"), "X-HTTP-Method-Override");
    }

    #[test]
    fn test_parse_quality_list() {
        let list = parse_quality_list("text/html;q=0.5, application/json, */*;q=0.1");
        assert_eq!(list[0], ("application/json".to_string(), 1.0));
        assert_eq!(list[1], ("text/html".to_string(), 0.5));
        assert_eq!(list[2], ("*/*".to_string(), 0.1));
    }

    #[test]
    fn test_preferred_accept() {
        let mut headers = Headers::new();
        headers.set("Accept", "text/html;q=0.8, application/*;q=0.9");

        assert_eq!(
            headers.preferred_accept(&["text/html", "application/xml"]),
            Some("application/xml")
        );
        assert_eq!(headers.accept_quality("image/png"), 0.0);
        assert_eq!(headers.preferred_accept(&["image/png"]), None);

        let empty = Headers::new();
        assert_eq!(empty.preferred_accept(&["text/html", "application/json"]), Some("text/html"));
    }
}
