//! Node domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Atomic unit of work from the source pipeline
///
/// Owned by the external pipeline-description framework. Names are unique
/// within one pipeline and nodes are never mutated during a generation pass.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl Node {
    /// Create a node with no tags and no datasets
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Add tags to the node
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Tags starting with `prefix`
    pub fn tags_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a String> {
        self.tags.iter().filter(move |t| t.starts_with(prefix))
    }
}
