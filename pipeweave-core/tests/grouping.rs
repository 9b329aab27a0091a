use std::collections::{BTreeMap, BTreeSet};

use pipeweave_core::domain::{Node, PipelineDependencyGraph};
use pipeweave_core::grouping::{
    Grouping, GroupingError, IdentityNodeGrouper, NodeGrouper, TagNodeGrouper,
};

/// Diamond with a tail: a -> {b, c} -> d -> e
fn diamond(tags: &[(&str, &str)]) -> PipelineDependencyGraph {
    let tag_of: BTreeMap<&str, &str> = tags.iter().copied().collect();
    let node = |name: &str| match tag_of.get(name) {
        Some(tag) => Node::new(name).with_tags([*tag]),
        None => Node::new(name),
    };

    PipelineDependencyGraph::try_from_parts(vec![
        (node("a"), vec![]),
        (node("b"), vec!["a"]),
        (node("c"), vec!["a"]),
        (node("d"), vec!["b", "c"]),
        (node("e"), vec!["d"]),
    ])
    .unwrap()
}

fn node_names(graph: &PipelineDependencyGraph) -> BTreeSet<String> {
    graph.nodes().keys().cloned().collect()
}

/// Every node lands in exactly one group
fn assert_partition(graph: &PipelineDependencyGraph, grouping: &Grouping) {
    let mut seen = BTreeSet::new();
    for members in grouping.nodes_mapping().values() {
        for node in members {
            assert!(seen.insert(node.name.clone()), "{} grouped twice", node.name);
        }
    }
    assert_eq!(seen, node_names(graph));
}

/// Every node edge either stays inside a group or shows up as a group edge
fn assert_edges_preserved(graph: &PipelineDependencyGraph, grouping: &Grouping) {
    let owner: BTreeMap<String, String> = grouping
        .nodes_mapping()
        .iter()
        .flat_map(|(group, members)| members.iter().map(move |n| (n.name.clone(), group.clone())))
        .collect();

    for (node, parents) in graph.iter() {
        let group = &owner[&node.name];
        for parent in parents {
            let parent_group = &owner[parent];
            if parent_group != group {
                assert!(
                    grouping.dependencies()[group].contains(parent_group),
                    "edge {parent} -> {} lost",
                    node.name
                );
            }
        }
    }
}

/// Order respects group edges
fn assert_order_valid(grouping: &Grouping) {
    let order = grouping.topological_order();
    let position: BTreeMap<&str, usize> = order.iter().enumerate().map(|(i, g)| (g.as_str(), i)).collect();
    assert_eq!(order.len(), grouping.len());

    for (group, deps) in grouping.dependencies() {
        for dep in deps {
            assert!(position[dep.as_str()] < position[group.as_str()], "{dep} after {group}");
        }
    }
}

#[test]
fn identity_grouping_is_the_graph() {
    let graph = diamond(&[]);
    let grouping = IdentityNodeGrouper.group(&graph).unwrap();

    assert_partition(&graph, &grouping);
    assert_edges_preserved(&graph, &grouping);
    assert_order_valid(&grouping);
    for (node, parents) in graph.iter() {
        assert_eq!(&grouping.dependencies()[&node.name], parents);
    }
}

#[test]
fn merging_parallel_branches_keeps_order() {
    let graph = diamond(&[("b", "group.mid"), ("c", "group.mid")]);
    let grouping = TagNodeGrouper::default().group(&graph).unwrap();

    assert_partition(&graph, &grouping);
    assert_edges_preserved(&graph, &grouping);
    assert_order_valid(&grouping);
    assert_eq!(grouping.topological_order(), vec!["a", "mid", "d", "e"]);
}

#[test]
fn merging_consecutive_nodes_drops_internal_edge() {
    let graph = diamond(&[("d", "group.tail"), ("e", "group.tail")]);
    let grouping = TagNodeGrouper::default().group(&graph).unwrap();

    assert_partition(&graph, &grouping);
    assert_edges_preserved(&graph, &grouping);
    assert_eq!(
        grouping.dependencies()["tail"],
        BTreeSet::from(["b".to_string(), "c".to_string()])
    );
}

#[test]
fn merging_around_a_node_is_a_cycle() {
    // a and d wrap b and c
    let graph = diamond(&[("a", "group.ends"), ("d", "group.ends")]);
    let result = TagNodeGrouper::default().group(&graph);

    match result {
        Err(GroupingError::Cycle { groups }) => {
            assert!(groups.contains(&"ends".to_string()));
            assert!(!groups.contains(&"e".to_string()));
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn whole_pipeline_in_one_group() {
    let tags: Vec<(&str, &str)> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|n| (*n, "group.all"))
        .collect();
    let graph = diamond(&tags);
    let grouping = TagNodeGrouper::default().group(&graph).unwrap();

    assert_eq!(grouping.len(), 1);
    assert!(grouping.dependencies()["all"].is_empty());
    assert_eq!(grouping.members("all").unwrap().len(), 5);
}

#[test]
fn group_tags_are_unioned() {
    let graph = PipelineDependencyGraph::try_from_parts(vec![
        (Node::new("x").with_tags(["group.g", "gpu"]), Vec::<String>::new()),
        (Node::new("y").with_tags(["group.g", "highmem"]), vec!["x".to_string()]),
    ])
    .unwrap();

    let grouping = TagNodeGrouper::default().group(&graph).unwrap();
    assert_eq!(
        grouping.group_tags("g"),
        BTreeSet::from(["group.g".to_string(), "gpu".to_string(), "highmem".to_string()])
    );
}
