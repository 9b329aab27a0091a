//! Pipeline dependency graph
//!
//! The read-only input of a generation pass: every node of one named pipeline
//! together with the set of parent nodes that must complete before it runs.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::node::Node;

/// Errors raised while assembling a dependency graph
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node '{0}' is declared more than once")]
    DuplicateNode(String),

    #[error("Node '{node}' depends on unknown node '{parent}'")]
    UnknownParent { node: String, parent: String },
}

/// Mapping from node to the set of its parent nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineDependencyGraph {
    nodes: BTreeMap<String, Node>,
    parents: BTreeMap<String, BTreeSet<String>>,
}

impl PipelineDependencyGraph {
    /// Build a graph from nodes and the names of their parents
    ///
    /// Parents may be listed before or after the nodes that reference them.
    ///
    /// # Errors
    /// Returns an error if a node name repeats or a parent is not declared.
    pub fn try_from_parts<I, P, S>(parts: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (Node, P)>,
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut nodes = BTreeMap::new();
        let mut parents = BTreeMap::new();

        for (node, node_parents) in parts {
            let name = node.name.clone();
            if nodes.insert(name.clone(), node).is_some() {
                return Err(GraphError::DuplicateNode(name));
            }
            let set: BTreeSet<String> = node_parents.into_iter().map(Into::into).collect();
            parents.insert(name, set);
        }

        for (node, node_parents) in &parents {
            if let Some(parent) = node_parents.iter().find(|p| !nodes.contains_key(*p)) {
                return Err(GraphError::UnknownParent {
                    node: node.clone(),
                    parent: parent.clone(),
                });
            }
        }

        Ok(Self { nodes, parents })
    }

    /// All nodes keyed by name
    pub fn nodes(&self) -> &BTreeMap<String, Node> {
        &self.nodes
    }

    /// Look up a node by name
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Parent names of a node (empty for unknown nodes)
    pub fn parents(&self, name: &str) -> impl Iterator<Item = &String> {
        self.parents.get(name).into_iter().flatten()
    }

    /// Iterate over `(node, parent names)` pairs in node-name order
    pub fn iter(&self) -> impl Iterator<Item = (&Node, &BTreeSet<String>)> {
        self.nodes
            .iter()
            .filter_map(|(name, node)| self.parents.get(name).map(|p| (node, p)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
