//! Identity grouping: one group per node

use std::collections::BTreeSet;

use super::{GroupDependencies, Grouping, GroupingError, NodeGrouper, NodesMapping};
use crate::domain::PipelineDependencyGraph;

/// Default strategy which puts each node into its own group
///
/// Group names equal node names and group dependencies equal parent names,
/// so the group graph is the input graph.
#[derive(Debug, Clone, Default)]
pub struct IdentityNodeGrouper;

impl IdentityNodeGrouper {
    pub const NAME: &'static str = "identity";
}

impl NodeGrouper for IdentityNodeGrouper {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn group(&self, graph: &PipelineDependencyGraph) -> Result<Grouping, GroupingError> {
        let nodes_mapping: NodesMapping = graph
            .nodes()
            .iter()
            .map(|(name, node)| (name.clone(), BTreeSet::from([node.clone()])))
            .collect();

        let dependencies: GroupDependencies = graph
            .iter()
            .map(|(node, parents)| (node.name.clone(), parents.clone()))
            .collect();

        Grouping::new(nodes_mapping, dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Node;

    #[test]
    fn test_identity_grouping_mirrors_graph() {
        let graph = PipelineDependencyGraph::try_from_parts(vec![
            (Node::new("node1"), vec![]),
            (Node::new("node1a").with_tags(["group.group"]), vec!["node1"]),
            (Node::new("node2"), vec!["node1"]),
            (Node::new("node3"), vec!["node2"]),
        ])
        .unwrap();

        let grouping = IdentityNodeGrouper.group(&graph).unwrap();

        assert_eq!(grouping.len(), 4);
        for (name, members) in grouping.nodes_mapping() {
            assert_eq!(members.len(), 1);
            assert_eq!(&members.iter().next().unwrap().name, name);
        }
        assert!(grouping.dependencies()["node1"].is_empty());
        assert_eq!(
            grouping.dependencies()["node1a"],
            BTreeSet::from(["node1".to_string()])
        );
        assert_eq!(
            grouping.dependencies()["node3"],
            BTreeSet::from(["node2".to_string()])
        );
    }

    #[test]
    fn test_identity_grouping_of_empty_graph() {
        let grouping = IdentityNodeGrouper
            .group(&PipelineDependencyGraph::default())
            .unwrap();
        assert!(grouping.is_empty());
    }
}
