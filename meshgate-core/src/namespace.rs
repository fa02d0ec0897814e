//! Permission namespaces.
//!
//! A namespace is a dot-delimited path of entity-type segments and instance
//! keys, e.g. `org.5.network.9.poc_set.private`. Children always extend
//! their parent's path, so a grant on a prefix covers everything below it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment that matches any single segment in a [`NamespacePattern`].
pub const WILDCARD: &str = "*";

/// A concrete namespace path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Namespace {
    segments: Vec<String>,
}

impl Namespace {
    /// Root namespace for a single segment/instance pair, e.g. `org.5`.
    pub fn root(segment: &str, instance: impl fmt::Display) -> Self {
        Self {
            segments: vec![segment.to_string(), instance.to_string()],
        }
    }

    /// Parse a dotted path. Empty segments are discarded.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Extend with a segment/instance pair.
    pub fn child(&self, segment: &str, instance: impl fmt::Display) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        segments.push(instance.to_string());
        Self { segments }
    }

    /// Extend with a single segment (field-level namespaces).
    pub fn join(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `self` is a strict prefix of `other`.
    pub fn is_strict_prefix_of(&self, other: &Namespace) -> bool {
        self.segments.len() < other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.to_string()
    }
}

impl From<String> for Namespace {
    fn from(path: String) -> Self {
        Namespace::parse(&path)
    }
}

/// A namespace pattern with optional `*` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct NamespacePattern {
    segments: Vec<String>,
}

impl NamespacePattern {
    pub fn parse(pattern: &str) -> Self {
        Self {
            segments: pattern
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn segment_matches(pattern: &str, segment: &str) -> bool {
        pattern == WILDCARD || pattern == segment
    }

    /// Pattern covers `ns` or one of its ancestors.
    pub fn covers(&self, ns: &Namespace) -> bool {
        self.segments.len() <= ns.len()
            && self
                .segments
                .iter()
                .zip(ns.segments().iter())
                .all(|(p, s)| Self::segment_matches(p, s))
    }

    /// Pattern names `ns` itself, segment for segment.
    pub fn matches_exactly(&self, ns: &Namespace) -> bool {
        self.segments.len() == ns.len() && self.covers(ns)
    }

    /// Ordering key: longer patterns first, then fewer wildcards.
    pub fn specificity(&self) -> (usize, usize) {
        let literal = self.segments.iter().filter(|s| *s != WILDCARD).count();
        (self.segments.len(), literal)
    }
}

impl fmt::Display for NamespacePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<NamespacePattern> for String {
    fn from(p: NamespacePattern) -> Self {
        p.to_string()
    }
}

impl From<String> for NamespacePattern {
    fn from(pattern: String) -> Self {
        NamespacePattern::parse(&pattern)
    }
}
