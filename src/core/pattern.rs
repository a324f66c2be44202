//! Route path templates compiled into anchored matchers.
//!
//! A template is a literal path that may contain:
//! * `:name` segments, matching one or more characters other than `/`, `#` and `?`
//! * `**` wildcards, matching zero or more characters other than `#` and `?` (spans segments)
//!
//! The compiled expression always covers the whole path and tolerates one trailing `/`.
use std::{collections::HashMap, fmt, sync::LazyLock};

use regex::Regex;
use thiserror::Error;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":[^/#?()\.\\]+|\*\*").expect("route token expression is valid")
});

/// Error raised while compiling a route template.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PatternError {
    #[error("route pattern must start with '/': {0}")]
    MissingLeadingSlash(String),

    #[error("invalid route pattern '{pattern}': {source}")]
    InvalidExpression {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Named segment values captured from a matched path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    /// Value of a `:name` segment, or of the n-th `**` wildcard as `_n`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A compiled route template.
#[derive(Clone)]
pub struct RoutePattern {
    template: String,
    regex: Regex,
}

impl RoutePattern {
    /// Compile a template. Malformed templates are rejected here so that they surface at
    /// registration time rather than while dispatching.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        if !template.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(template.to_string()));
        }

        let mut expression = String::with_capacity(template.len() * 2 + 8);
        expression.push('^');

        let mut wildcard_index = 0usize;
        let mut last = 0usize;
        for token in TOKEN_RE.find_iter(template) {
            expression.push_str(&regex::escape(&template[last..token.start()]));
            let text = token.as_str();
            if text == "**" {
                wildcard_index += 1;
                expression.push_str(&format!("(?P<_{wildcard_index}>[^#?]*)"));
            } else {
                expression.push_str(&format!("(?P<{}>[^/#?]+)", &text[1..]));
            }
            last = token.end();
        }
        expression.push_str(&regex::escape(&template[last..]));
        expression.push_str("/?$");

        let regex = Regex::new(&expression).map_err(|source| PatternError::InvalidExpression {
            pattern: template.to_string(),
            source,
        })?;

        Ok(Self {
            template: template.to_string(),
            regex,
        })
    }

    /// The template this matcher was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// True only when the whole path is matched.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match the whole path and return the captured segments.
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.captures(path)?;
        let params = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Some(PathParams(params))
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutePattern")
            .field("template", &self.template)
            .field("expression", &self.regex.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(template: &str) -> RoutePattern {
        RoutePattern::compile(template).unwrap()
    }

    #[test]
    fn test_literal_pattern_is_exact() {
        let p = pattern("/hello/world");
        assert!(p.matches("/hello/world"));
        assert!(p.matches("/hello/world/"));
        assert!(!p.matches("/hello/worl"));
        assert!(!p.matches("/hello/worlds"));
        assert!(!p.matches("/prefix/hello/world"));
    }

    #[test]
    fn test_literal_text_is_not_a_regex() {
        let p = pattern("/file.json");
        assert!(p.matches("/file.json"));
        assert!(!p.matches("/fileXjson"));
    }

    #[test]
    fn test_named_segment() {
        let p = pattern("/demo/:id");
        assert!(p.matches("/demo/42"));
        assert!(p.matches("/demo/42/"));
        assert!(!p.matches("/demo/42/extra"));
        assert!(!p.matches("/demo"));
        assert!(!p.matches("/demo/"));
    }

    #[test]
    fn test_wildcard_spans_segments() {
        let p = pattern("/api/v1/**");
        assert!(p.matches("/api/v1/access/abc/24323/"));
        assert!(p.matches("/api/v1/"));
        assert!(!p.matches("/api/v2/x"));
    }

    #[test]
    fn test_captures() {
        let p = pattern("/users/:user/files/**");
        let params = p.captures("/users/ann/files/a/b.txt").unwrap();
        assert_eq!(params.get("user"), Some("ann"));
        assert_eq!(params.get("_1"), Some("a/b.txt"));
        assert!(p.captures("/users/ann").is_none());
    }

    #[test]
    fn test_malformed_patterns_fail_at_compile_time() {
        assert!(matches!(
            RoutePattern::compile("demo/:id"),
            Err(PatternError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            RoutePattern::compile("/demo/:1id"),
            Err(PatternError::InvalidExpression { .. })
        ));
        assert!(matches!(
            RoutePattern::compile("/demo/:id/:id"),
            Err(PatternError::InvalidExpression { .. })
        ));
    }
}
