//! Handler lookup and dispatch table.
//!
//! # Responsibilities
//! - Store registered patterns with their handlers
//! - Look up the handler for a request path
//! - Return matched handler or explicit no-match
//!
//! # Design Decisions
//! - Exact patterns in a HashMap (O(1) lookup)
//! - Subtree patterns kept sorted longest-first; first hit wins
//! - Immutable once the server starts serving

use std::collections::HashMap;

use crate::http::error::ServerError;
use crate::routing::matcher::PathPattern;

/// Table of path patterns and the handlers registered for them.
#[derive(Debug)]
pub struct HandlerRegistry<H> {
    exact: HashMap<String, H>,
    /// Sorted by prefix length, longest first.
    subtrees: Vec<(String, H)>,
}

impl<H> HandlerRegistry<H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            exact: HashMap::new(),
            subtrees: Vec::new(),
        }
    }

    /// Register a handler for a pattern.
    pub fn insert(&mut self, pattern: &str, handler: H) -> Result<PathPattern, ServerError> {
        let parsed = PathPattern::parse(pattern)?;
        let duplicate = || ServerError::DuplicatePattern {
            pattern: pattern.to_string(),
        };

        match &parsed {
            PathPattern::Exact(path) => {
                if self.exact.contains_key(path) {
                    return Err(duplicate());
                }
                self.exact.insert(path.clone(), handler);
            }
            PathPattern::Subtree(prefix) => {
                if self.subtrees.iter().any(|(p, _)| p == prefix) {
                    return Err(duplicate());
                }
                let at = self
                    .subtrees
                    .iter()
                    .position(|(p, _)| p.len() < prefix.len())
                    .unwrap_or(self.subtrees.len());
                self.subtrees.insert(at, (prefix.clone(), handler));
            }
        }

        Ok(parsed)
    }

    /// Find the handler for a request path.
    ///
    /// An exact pattern wins over any subtree; among subtrees the longest
    /// matching prefix wins.
    pub fn lookup(&self, path: &str) -> Option<(&str, &H)> {
        if let Some((pattern, handler)) = self.exact.get_key_value(path) {
            return Some((pattern.as_str(), handler));
        }

        self.subtrees
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(prefix, handler)| (prefix.as_str(), handler))
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.exact.len() + self.subtrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
