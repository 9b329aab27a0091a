//! Node grouping
//!
//! Partitions a pipeline's dependency graph into execution units ("groups")
//! and derives the dependency graph between those groups.
//!
//! Strategies implement [`NodeGrouper`]; they are looked up by identifier in a
//! [`GrouperRegistry`] and handed to the generator explicitly. Every
//! [`Grouping`] is validated when it is constructed, so a value of this type is
//! always a partition of the input nodes with an acyclic group graph.

mod identity;
pub mod registry;
mod tag;

pub use identity::IdentityNodeGrouper;
pub use registry::{GrouperFactory, GrouperRegistry, GroupingConfig};
pub use tag::{DEFAULT_TAG_PREFIX, TagNodeGrouper};

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::domain::{Node, PipelineDependencyGraph};

/// Group name → member nodes
pub type NodesMapping = BTreeMap<String, BTreeSet<Node>>;

/// Group name → names of the groups it depends on
pub type GroupDependencies = BTreeMap<String, BTreeSet<String>>;

/// Errors raised while grouping nodes
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupingError {
    /// A node carries more than one grouping tag
    #[error("Inconsistent tagging for grouping: node '{node}' has multiple grouping tags: {}", .tags.join(", "))]
    Ambiguous { node: String, tags: Vec<String> },

    /// The group graph contains a cycle after merging
    #[error(
        "Grouping has failed because of a cyclic dependency after merging nodes, check your group settings. Groups involved: {}",
        .groups.join(", ")
    )]
    Cycle { groups: Vec<String> },

    /// A tag-derived group name equals the name of a node outside that group
    #[error("Group name '{group}' collides with node '{node}', which is not a member of that group")]
    NameCollision { group: String, node: String },

    /// A grouping tag has nothing after the prefix
    #[error("Grouping tag '{tag}' on node '{node}' does not name a group")]
    EmptyGroupName { node: String, tag: String },

    /// A dependency refers to a group that has no members
    #[error("Group '{group}' references unknown group '{unknown}'")]
    UnknownGroup { group: String, unknown: String },

    /// A node was assigned to two groups
    #[error("Node '{node}' belongs to both '{first}' and '{second}'")]
    DuplicateMember {
        node: String,
        first: String,
        second: String,
    },
}

/// Result of partitioning a pipeline's nodes into groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    nodes_mapping: NodesMapping,
    dependencies: GroupDependencies,
}

impl Grouping {
    /// Build and validate a grouping
    ///
    /// Groups absent from `dependencies` are given an empty dependency set.
    ///
    /// # Errors
    /// Returns an error if a dependency names an unknown group, a node sits in
    /// more than one group, or the group graph is cyclic.
    pub fn new(
        nodes_mapping: NodesMapping,
        mut dependencies: GroupDependencies,
    ) -> Result<Self, GroupingError> {
        for (group, deps) in &dependencies {
            if !nodes_mapping.contains_key(group) {
                return Err(GroupingError::UnknownGroup {
                    group: group.clone(),
                    unknown: group.clone(),
                });
            }
            if let Some(unknown) = deps.iter().find(|d| !nodes_mapping.contains_key(*d)) {
                return Err(GroupingError::UnknownGroup {
                    group: group.clone(),
                    unknown: unknown.clone(),
                });
            }
        }

        for group in nodes_mapping.keys() {
            dependencies.entry(group.clone()).or_default();
        }

        let mut owner: BTreeMap<&str, &str> = BTreeMap::new();
        for (group, members) in &nodes_mapping {
            for node in members {
                if let Some(first) = owner.insert(&node.name, group) {
                    return Err(GroupingError::DuplicateMember {
                        node: node.name.clone(),
                        first: first.to_string(),
                        second: group.clone(),
                    });
                }
            }
        }

        topological_levels(&dependencies).map_err(|groups| GroupingError::Cycle { groups })?;

        Ok(Self {
            nodes_mapping,
            dependencies,
        })
    }

    /// Group name → member nodes
    pub fn nodes_mapping(&self) -> &NodesMapping {
        &self.nodes_mapping
    }

    /// Group name → groups it must run after
    pub fn dependencies(&self) -> &GroupDependencies {
        &self.dependencies
    }

    /// Members of one group
    pub fn members(&self, group: &str) -> Option<&BTreeSet<Node>> {
        self.nodes_mapping.get(group)
    }

    /// Union of the tags of all members of a group
    pub fn group_tags(&self, group: &str) -> BTreeSet<String> {
        self.members(group)
            .into_iter()
            .flatten()
            .flat_map(|node| node.tags.iter().cloned())
            .collect()
    }

    /// Groups arranged in levels; each level only depends on earlier ones
    pub fn levels(&self) -> Vec<Vec<String>> {
        // Acyclicity was checked in `new`
        topological_levels(&self.dependencies).unwrap_or_default()
    }

    /// Groups in a valid execution order
    pub fn topological_order(&self) -> Vec<String> {
        self.levels().into_iter().flatten().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes_mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes_mapping.is_empty()
    }
}

/// Strategy that partitions a dependency graph into groups
///
/// Strategies are purely algorithmic: no I/O and no shared state, so a single
/// instance can serve any number of generation passes.
pub trait NodeGrouper: Send + Sync {
    /// Identifier of this strategy
    fn name(&self) -> &str;

    /// Partition `graph` into a validated grouping
    fn group(&self, graph: &PipelineDependencyGraph) -> Result<Grouping, GroupingError>;
}

/// Kahn-style level sort of a dependency map
///
/// On failure returns the groups that sit on, or between, cycles.
pub(crate) fn topological_levels(dependencies: &GroupDependencies) -> Result<Vec<Vec<String>>, Vec<String>> {
    let mut remaining: BTreeSet<&String> = dependencies.keys().collect();
    let mut processed: BTreeSet<&String> = BTreeSet::new();
    let mut levels = Vec::new();

    while !remaining.is_empty() {
        let level: Vec<&String> = remaining
            .iter()
            .copied()
            .filter(|group| {
                dependencies[*group]
                    .iter()
                    .all(|dep| processed.contains(dep) || !dependencies.contains_key(dep))
            })
            .collect();

        if level.is_empty() {
            return Err(cycle_members(dependencies, remaining));
        }

        for group in &level {
            remaining.remove(*group);
            processed.insert(*group);
        }
        levels.push(level.into_iter().cloned().collect());
    }

    Ok(levels)
}

/// Strip groups that merely hang off a cycle
///
/// A group nothing else in `remaining` depends on cannot be part of a cycle.
fn cycle_members(dependencies: &GroupDependencies, mut remaining: BTreeSet<&String>) -> Vec<String> {
    loop {
        let leaves: Vec<&String> = remaining
            .iter()
            .copied()
            .filter(|candidate| {
                !remaining
                    .iter()
                    .any(|other| dependencies[*other].contains(*candidate))
            })
            .collect();

        if leaves.is_empty() {
            return remaining.into_iter().cloned().collect();
        }
        for leaf in leaves {
            remaining.remove(leaf);
        }
    }
}
