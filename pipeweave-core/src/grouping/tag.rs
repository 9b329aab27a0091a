//! Tag-based grouping
//!
//! Nodes tagged `<prefix><group>` collapse into the group named by the tag
//! suffix. Untagged nodes stay in a singleton group named after themselves.

use std::collections::BTreeMap;

use super::{GroupDependencies, Grouping, GroupingError, NodeGrouper, NodesMapping};
use crate::domain::PipelineDependencyGraph;

/// Tag prefix used when none is configured
pub const DEFAULT_TAG_PREFIX: &str = "group.";

/// Strategy that merges nodes sharing a grouping tag
///
/// Only one tag with the configured prefix is allowed per node.
#[derive(Debug, Clone)]
pub struct TagNodeGrouper {
    tag_prefix: String,
}

impl TagNodeGrouper {
    pub const NAME: &'static str = "tag";

    pub fn new(tag_prefix: impl Into<String>) -> Self {
        Self {
            tag_prefix: tag_prefix.into(),
        }
    }

    pub fn tag_prefix(&self) -> &str {
        &self.tag_prefix
    }

    /// Node name → explicitly tagged group, if any
    fn tagged_groups<'g>(
        &self,
        graph: &'g PipelineDependencyGraph,
    ) -> Result<BTreeMap<&'g str, Option<String>>, GroupingError> {
        let mut tagged = BTreeMap::new();

        for (name, node) in graph.nodes() {
            let grouping_tags: Vec<&String> = node.tags_with_prefix(&self.tag_prefix).collect();

            let target = match grouping_tags.as_slice() {
                [] => None,
                [tag] => {
                    let group = &tag[self.tag_prefix.len()..];
                    if group.is_empty() {
                        return Err(GroupingError::EmptyGroupName {
                            node: name.clone(),
                            tag: (*tag).clone(),
                        });
                    }
                    Some(group.to_string())
                }
                many => {
                    return Err(GroupingError::Ambiguous {
                        node: name.clone(),
                        tags: many.iter().map(|t| (*t).clone()).collect(),
                    });
                }
            };
            tagged.insert(name.as_str(), target);
        }

        Ok(tagged)
    }
}

impl Default for TagNodeGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_TAG_PREFIX)
    }
}

impl NodeGrouper for TagNodeGrouper {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn group(&self, graph: &PipelineDependencyGraph) -> Result<Grouping, GroupingError> {
        let tagged = self.tagged_groups(graph)?;

        // A tag-derived group may not share its name with an untagged node
        for group in tagged.values().flatten() {
            if let Some(None) = tagged.get(group.as_str()) {
                return Err(GroupingError::NameCollision {
                    group: group.clone(),
                    node: group.clone(),
                });
            }
        }

        let belonging: BTreeMap<&str, &str> = tagged
            .iter()
            .map(|(node, target)| (*node, target.as_deref().unwrap_or(*node)))
            .collect();

        let mut nodes_mapping = NodesMapping::new();
        let mut dependencies = GroupDependencies::new();

        for (node, parents) in graph.iter() {
            let group = belonging[node.name.as_str()];
            nodes_mapping
                .entry(group.to_string())
                .or_default()
                .insert(node.clone());

            let group_deps = dependencies.entry(group.to_string()).or_default();
            for parent in parents {
                let parent_group = belonging[parent.as_str()];
                if parent_group != group {
                    group_deps.insert(parent_group.to_string());
                }
            }
        }

        tracing::debug!(
            nodes = graph.len(),
            groups = nodes_mapping.len(),
            prefix = %self.tag_prefix,
            "Grouped nodes by tag"
        );

        Grouping::new(nodes_mapping, dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Node;
    use std::collections::BTreeSet;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn member_names(grouping: &Grouping, group: &str) -> BTreeSet<String> {
        grouping.nodes_mapping()[group]
            .iter()
            .map(|n| n.name.clone())
            .collect()
    }

    /// node1 -> {node1a, node2}, node2 -> node3
    fn tagged_pipeline() -> PipelineDependencyGraph {
        PipelineDependencyGraph::try_from_parts(vec![
            (
                Node::new("node1").with_tags([
                    "foo",
                    "group.group",
                    "g1.group",
                    "g2.group",
                    "ig1.group",
                    "g5.group",
                ]),
                vec![],
            ),
            (
                Node::new("node1a").with_tags([
                    "bar",
                    "group.group",
                    "g1.group",
                    "g3.group",
                    "g4.group",
                    "g5.group",
                ]),
                vec!["node1"],
            ),
            (
                Node::new("node2").with_tags([
                    "baz",
                    "group.group",
                    "g2.group",
                    "g4.group",
                    "g5.group2",
                ]),
                vec!["node1"],
            ),
            (
                Node::new("node3").with_tags([
                    "wag",
                    "group.group",
                    "g3.group",
                    "ig1.group",
                    "g5.group2",
                ]),
                vec!["node2"],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_legal_prefixes() {
        let graph = tagged_pipeline();

        for prefix in ["g1", "g2", "g3", "g4", "g5", "group"] {
            let grouping = TagNodeGrouper::new(format!("{prefix}."))
                .group(&graph)
                .unwrap_or_else(|e| panic!("prefix {prefix}: {e}"));

            assert!(grouping.dependencies().len() < 4, "prefix {prefix}");
            assert!(grouping.dependencies().contains_key("group"), "prefix {prefix}");

            if prefix == "group" {
                assert_eq!(grouping.len(), 1);
                assert!(grouping.dependencies()["group"].is_empty());
                assert_eq!(grouping.nodes_mapping()["group"].len(), 4);
            } else {
                assert_eq!(grouping.nodes_mapping()["group"].len(), 2, "prefix {prefix}");
            }
        }
    }

    #[test]
    fn test_g1_dependencies() {
        let grouping = TagNodeGrouper::new("g1.").group(&tagged_pipeline()).unwrap();

        assert_eq!(member_names(&grouping, "group"), set(&["node1", "node1a"]));
        assert!(grouping.dependencies()["group"].is_empty());
        assert_eq!(grouping.dependencies()["node2"], set(&["group"]));
        assert_eq!(grouping.dependencies()["node3"], set(&["node2"]));
    }

    #[test]
    fn test_merge_around_middle_node_is_a_cycle() {
        // ig1 merges node1 and node3 around node2: group -> node2 -> group
        let result = TagNodeGrouper::new("ig1.").group(&tagged_pipeline());
        assert_eq!(
            result,
            Err(GroupingError::Cycle {
                groups: vec!["group".into(), "node2".into()]
            })
        );
    }

    #[test]
    fn test_multiple_grouping_tags_rejected() {
        let graph = PipelineDependencyGraph::try_from_parts(vec![(
            Node::new("a").with_tags(["group.x", "group.y"]),
            Vec::<String>::new(),
        )])
        .unwrap();
        let result = TagNodeGrouper::default().group(&graph);
        assert_eq!(
            result,
            Err(GroupingError::Ambiguous {
                node: "a".into(),
                tags: vec!["group.x".into(), "group.y".into()],
            })
        );
    }

    #[test]
    fn test_chain_merge_and_self_loop_elimination() {
        let graph = PipelineDependencyGraph::try_from_parts(vec![
            (Node::new("A"), vec![]),
            (Node::new("B").with_tags(["group.bc"]), vec!["A"]),
            (Node::new("C").with_tags(["group.bc"]), vec!["B"]),
        ])
        .unwrap();

        let grouping = TagNodeGrouper::default().group(&graph).unwrap();

        assert_eq!(member_names(&grouping, "A"), set(&["A"]));
        assert_eq!(member_names(&grouping, "bc"), set(&["B", "C"]));
        assert!(!grouping.nodes_mapping().contains_key("B"));
        assert!(!grouping.nodes_mapping().contains_key("C"));
        assert!(grouping.dependencies()["A"].is_empty());
        assert_eq!(grouping.dependencies()["bc"], set(&["A"]));
    }

    #[test]
    fn test_merged_dependencies_are_unioned() {
        let graph = PipelineDependencyGraph::try_from_parts(vec![
            (Node::new("x"), vec![]),
            (Node::new("y"), vec![]),
            (Node::new("p").with_tags(["group.g"]), vec!["x"]),
            (Node::new("q").with_tags(["group.g"]), vec!["y"]),
        ])
        .unwrap();

        let grouping = TagNodeGrouper::default().group(&graph).unwrap();
        assert_eq!(grouping.dependencies()["g"], set(&["x", "y"]));
    }

    #[test]
    fn test_cross_group_cycle_rejected() {
        // a1 -> b1 -> a2 with a1, a2 in "a" and b1 in "b"
        let graph = PipelineDependencyGraph::try_from_parts(vec![
            (Node::new("a1").with_tags(["group.a"]), vec![]),
            (Node::new("b1").with_tags(["group.b"]), vec!["a1"]),
            (Node::new("a2").with_tags(["group.a"]), vec!["b1"]),
        ])
        .unwrap();

        let result = TagNodeGrouper::default().group(&graph);
        assert_eq!(
            result,
            Err(GroupingError::Cycle {
                groups: vec!["a".into(), "b".into()]
            })
        );
    }

    #[test]
    fn test_group_name_colliding_with_untagged_node() {
        let graph = PipelineDependencyGraph::try_from_parts(vec![
            (Node::new("bc"), vec![]),
            (Node::new("b").with_tags(["group.bc"]), vec!["bc"]),
        ])
        .unwrap();

        let result = TagNodeGrouper::default().group(&graph);
        assert_eq!(
            result,
            Err(GroupingError::NameCollision {
                group: "bc".into(),
                node: "bc".into(),
            })
        );
    }

    #[test]
    fn test_group_name_freed_by_node_moving_elsewhere() {
        let graph = PipelineDependencyGraph::try_from_parts(vec![
            (Node::new("bc").with_tags(["group.x"]), vec![]),
            (Node::new("b").with_tags(["group.bc"]), vec!["bc"]),
        ])
        .unwrap();

        let grouping = TagNodeGrouper::default().group(&graph).unwrap();
        assert_eq!(member_names(&grouping, "x"), set(&["bc"]));
        assert_eq!(member_names(&grouping, "bc"), set(&["b"]));
        assert_eq!(grouping.dependencies()["bc"], set(&["x"]));
    }

    #[test]
    fn test_node_may_join_group_named_after_itself() {
        let graph = PipelineDependencyGraph::try_from_parts(vec![
            (Node::new("bc").with_tags(["group.bc"]), vec![]),
            (Node::new("b").with_tags(["group.bc"]), vec!["bc"]),
        ])
        .unwrap();

        let grouping = TagNodeGrouper::default().group(&graph).unwrap();
        assert_eq!(member_names(&grouping, "bc"), set(&["b", "bc"]));
        assert!(grouping.dependencies()["bc"].is_empty());
    }

    #[test]
    fn test_empty_group_suffix_rejected() {
        let graph = PipelineDependencyGraph::try_from_parts(vec![(
            Node::new("a").with_tags(["group."]),
            Vec::<String>::new(),
        )])
        .unwrap();

        let result = TagNodeGrouper::default().group(&graph);
        assert!(matches!(result, Err(GroupingError::EmptyGroupName { .. })));
    }
}
