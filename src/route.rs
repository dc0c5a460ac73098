//! URI routing
//!
//! A route pattern is literal text with `<name>` captures and parenthesized
//! optional groups, e.g. `(<controller>(/<action>(/<id>)))(.<format>)`.
//! A capture matches one segment: a non-empty run of characters other than
//! `/ . , ; ?`. Captures named `directory`, `controller` and `action` select
//! the handler; every other capture becomes a route parameter.
//!
//! ```
//! use ko7_dispatch::route::Router;
//!
//! let router = Router::with_default_route();
//! let matched = router.resolve("/users/edit/7.json").unwrap();
//! assert_eq!(matched.controller, "users");
//! assert_eq!(matched.action, "edit");
//! assert_eq!(matched.param("id"), Some("7"));
//! assert_eq!(matched.param("format"), Some("json"));
//! ```

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use tracing::debug;

/// Characters that end a single-segment capture
const SEGMENT_STOP: &[char] = &['/', '.', ',', ';', '?', '\n'];

/// Pattern of the catch-all route
pub const DEFAULT_PATTERN: &str = "(<controller>(/<action>(/<id>)))(.<format>)";

/// Action used when neither the URI nor the route defaults name one
pub const DEFAULT_ACTION: &str = "index";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Capture(String),
    Optional(Vec<Token>),
}

/// Parse a pattern into tokens
///
/// Parsing is lenient: a stray `)` is dropped, an unclosed group ends with
/// the pattern and a `<` without a closing `>` is literal text.
fn parse_pattern(pattern: &str) -> Vec<Token> {
    let mut stack: Vec<Vec<Token>> = vec![Vec::new()];
    let mut literal = String::new();
    let mut chars = pattern.char_indices().peekable();

    fn flush(literal: &mut String, stack: &mut [Vec<Token>]) {
        if !literal.is_empty() {
            if let Some(top) = stack.last_mut() {
                top.push(Token::Literal(std::mem::take(literal)));
            }
        }
    }

    while let Some((i, c)) = chars.next() {
        match c {
            '(' => {
                flush(&mut literal, &mut stack);
                stack.push(Vec::new());
            }
            ')' => {
                if stack.len() > 1 {
                    flush(&mut literal, &mut stack);
                    if let Some(group) = stack.pop() {
                        if let Some(top) = stack.last_mut() {
                            top.push(Token::Optional(group));
                        }
                    }
                }
            }
            '<' => match pattern[i + 1..].find('>') {
                Some(end) if end > 0 => {
                    flush(&mut literal, &mut stack);
                    let name = &pattern[i + 1..i + 1 + end];
                    if let Some(top) = stack.last_mut() {
                        top.push(Token::Capture(name.to_string()));
                    }
                    // Skip the name and the closing '>'
                    while let Some((j, _)) = chars.peek() {
                        if *j > i + end + 1 {
                            break;
                        }
                        chars.next();
                    }
                }
                _ => literal.push(c),
            },
            _ => literal.push(c),
        }
    }
    flush(&mut literal, &mut stack);

    while stack.len() > 1 {
        if let Some(group) = stack.pop() {
            if let Some(top) = stack.last_mut() {
                top.push(Token::Optional(group));
            }
        }
    }
    stack.pop().unwrap_or_default()
}

type Captures = Vec<(String, String)>;

/// Backtracking matcher over the token list
///
/// `next` is called with the unmatched remainder once `tokens` are
/// consumed; it decides whether the overall match succeeds.
fn match_tokens(
    tokens: &[Token],
    input: &str,
    rest_captures: &[String],
    captures: &mut Captures,
    next: &mut dyn FnMut(&str, &mut Captures) -> bool,
) -> bool {
    let Some((token, rest)) = tokens.split_first() else {
        return next(input, captures);
    };

    match token {
        Token::Literal(literal) => match input.strip_prefix(literal.as_str()) {
            Some(remainder) => match_tokens(rest, remainder, rest_captures, captures, next),
            None => false,
        },
        Token::Capture(name) if rest_captures.contains(name) => {
            // Greedy capture across segments, shrinking until the rest fits
            let mut ends: Vec<usize> = input.char_indices().map(|(i, _)| i).skip(1).collect();
            ends.push(input.len());
            for end in ends.into_iter().rev() {
                if end == 0 {
                    continue;
                }
                captures.push((name.clone(), input[..end].to_string()));
                if match_tokens(rest, &input[end..], rest_captures, captures, next) {
                    return true;
                }
                captures.pop();
            }
            false
        }
        Token::Capture(name) => {
            let end = input.find(SEGMENT_STOP).unwrap_or(input.len());
            if end == 0 {
                return false;
            }
            captures.push((name.clone(), input[..end].to_string()));
            if match_tokens(rest, &input[end..], rest_captures, captures, next) {
                return true;
            }
            captures.pop();
            false
        }
        Token::Optional(group) => {
            let mark = captures.len();
            let mut then_rest =
                |after: &str, caps: &mut Captures| match_tokens(rest, after, rest_captures, caps, next);
            if match_tokens(group, input, rest_captures, captures, &mut then_rest) {
                return true;
            }
            captures.truncate(mark);
            match_tokens(rest, input, rest_captures, captures, next)
        }
    }
}

/// Handler selected for a request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteMatch {
    /// Name of the route that matched
    pub route: String,
    pub directory: String,
    pub controller: String,
    pub action: String,
    pub params: BTreeMap<String, String>,
}

impl RouteMatch {
    /// Match naming a handler directly, bypassing the router
    pub fn new(directory: &str, controller: &str, action: &str) -> Self {
        RouteMatch {
            route: String::new(),
            directory: directory.to_string(),
            controller: controller.to_string(),
            action: action.to_string(),
            params: BTreeMap::new(),
        }
    }

    /// Add a route parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// A named URI pattern with defaults
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    pattern: String,
    tokens: Vec<Token>,
    defaults: BTreeMap<String, String>,
    rest_captures: Vec<String>,
}

impl Route {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Route {
            name: name.into(),
            tokens: parse_pattern(&pattern),
            pattern,
            defaults: BTreeMap::new(),
            rest_captures: Vec::new(),
        }
    }

    /// Value used when a capture is absent from the URI
    pub fn default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Let a capture span several segments, e.g. a file path
    pub fn capture_rest(mut self, name: impl Into<String>) -> Self {
        self.rest_captures.push(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match a URI against this route
    ///
    /// Leading and trailing slashes are ignored. Captured values are
    /// percent-decoded.
    pub fn matches(&self, uri: &str) -> Option<RouteMatch> {
        let path = uri.trim_matches('/');
        let mut captures = Captures::new();
        let matched = match_tokens(
            &self.tokens,
            path,
            &self.rest_captures,
            &mut captures,
            &mut |remainder: &str, _: &mut Captures| remainder.is_empty(),
        );
        if !matched {
            return None;
        }

        let mut values = self.defaults.clone();
        for (key, value) in captures {
            let decoded = percent_decode_str(&value).decode_utf8_lossy().into_owned();
            values.insert(key, decoded);
        }

        let controller = values.remove("controller")?;
        let action = values
            .remove("action")
            .unwrap_or_else(|| DEFAULT_ACTION.to_string());
        let directory = values.remove("directory").unwrap_or_default();

        Some(RouteMatch {
            route: self.name.clone(),
            directory,
            controller,
            action,
            params: values,
        })
    }
}

/// Ordered route table; the first matching route wins
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router holding only the catch-all `default` route
    ///
    /// The empty URI maps to `welcome/index`.
    pub fn with_default_route() -> Self {
        let mut router = Router::new();
        router.add(Route::new("default", DEFAULT_PATTERN).default("controller", "welcome"));
        router
    }

    /// Append a route
    pub fn add(&mut self, route: Route) -> &mut Self {
        self.routes.push(route);
        self
    }

    /// Route by name
    pub fn get(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == name)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the first route matching a URI
    pub fn resolve(&self, uri: &str) -> Option<RouteMatch> {
        let matched = self.routes.iter().find_map(|route| route.matches(uri));
        match &matched {
            Some(m) => debug!(
                uri,
                route = %m.route,
                directory = %m.directory,
                controller = %m.controller,
                action = %m.action,
                "route resolved"
            ),
            None => debug!(uri, "no route matched"),
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern() {
        let tokens = parse_pattern("api/<controller>(/<id>)");
        assert_eq!(
            tokens,
            vec![
                Token::Literal("api/".to_string()),
                Token::Capture("controller".to_string()),
                Token::Optional(vec![
                    Token::Literal("/".to_string()),
                    Token::Capture("id".to_string()),
                ]),
            ]
        );
    }

    #[test]
    fn test_lenient_pattern() {
        assert_eq!(
            parse_pattern("a<b)c(d"),
            vec![
                Token::Literal("a<bc".to_string()),
                Token::Optional(vec![Token::Literal("d".to_string())]),
            ]
        );
    }

    #[test]
    fn test_default_route() {
        let router = Router::with_default_route();

        let m = router.resolve("/").unwrap();
        assert_eq!((m.controller.as_str(), m.action.as_str()), ("welcome", "index"));

        let m = router.resolve("/welcome").unwrap();
        assert_eq!((m.controller.as_str(), m.action.as_str()), ("welcome", "index"));
        assert!(m.params.is_empty());

        let m = router.resolve("blog/show/12/").unwrap();
        assert_eq!(m.controller, "blog");
        assert_eq!(m.action, "show");
        assert_eq!(m.param("id"), Some("12"));
        assert_eq!(m.route, "default");
    }

    #[test]
    fn test_format_suffix() {
        let router = Router::with_default_route();
        let m = router.resolve("/items.xml").unwrap();
        assert_eq!(m.controller, "items");
        assert_eq!(m.action, "index");
        assert_eq!(m.param("format"), Some("xml"));
    }

    #[test]
    fn test_no_match() {
        let router = Router::with_default_route();
        assert!(router.resolve("/a/b/c/d").is_none());
        assert!(Router::new().resolve("/welcome").is_none());
    }

    #[test]
    fn test_directory_and_order() {
        let mut router = Router::new();
        router
            .add(Route::new("api", "api/<controller>(/<id>)(.<format>)").default("directory", "api"))
            .add(Route::new("default", DEFAULT_PATTERN).default("controller", "welcome"));

        let m = router.resolve("/api/users/3.json").unwrap();
        assert_eq!(m.route, "api");
        assert_eq!(m.directory, "api");
        assert_eq!(m.controller, "users");
        assert_eq!(m.action, "index");
        assert_eq!(m.param("id"), Some("3"));
        assert_eq!(m.param("format"), Some("json"));

        let m = router.resolve("/users").unwrap();
        assert_eq!(m.route, "default");
        assert_eq!(m.directory, "");
    }

    #[test]
    fn test_capture_rest_and_decoding() {
        let route = Route::new("media", "media/<file>")
            .default("controller", "media")
            .default("action", "serve")
            .capture_rest("file");

        let m = route.matches("/media/img/logo%20big.png").unwrap();
        assert_eq!(m.action, "serve");
        assert_eq!(m.param("file"), Some("img/logo big.png"));
        assert!(route.matches("/media/").is_none());
    }

    #[test]
    fn test_missing_controller_does_not_match() {
        let route = Route::new("bare", "(<id>)");
        assert!(route.matches("/5").is_none());
    }
}
