//! Path pattern matching.
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/static/` matches `/static/` and everything below it
//! - `/health` matches only `/health`
//! - No wildcards or path templates

use std::fmt;

use crate::http::error::ServerError;

/// A registered path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathPattern {
    /// Matches one path exactly.
    Exact(String),
    /// Matches the prefix and every path below it. Always ends in `/`.
    Subtree(String),
}

impl PathPattern {
    /// Parse a pattern, rejecting anything that is not an absolute path.
    pub fn parse(pattern: &str) -> Result<Self, ServerError> {
        let invalid = |reason| ServerError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if !pattern.starts_with('/') {
            return Err(invalid("pattern must start with '/'"));
        }
        if pattern.contains(['?', '#']) {
            return Err(invalid("pattern must not contain a query or fragment"));
        }

        if pattern.ends_with('/') {
            Ok(PathPattern::Subtree(pattern.to_string()))
        } else {
            Ok(PathPattern::Exact(pattern.to_string()))
        }
    }

    /// The pattern text as registered.
    pub fn as_str(&self) -> &str {
        match self {
            PathPattern::Exact(p) | PathPattern::Subtree(p) => p,
        }
    }

    /// Returns true if the request path is covered by this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => path == p,
            PathPattern::Subtree(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
