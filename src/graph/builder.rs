use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::graph::{DependencyGraph, Node, NodeId, NodeInfo};
use crate::stats::StatsIndex;

/// Builds the subgraph induced by `selected`.
///
/// Parents outside the selection are dropped; they never stop a node from
/// being a root.
pub fn build_graph<I, P>(
    selected: &HashSet<NodeId>,
    get_info: I,
    get_parents: P,
) -> DependencyGraph
where
    I: Fn(&NodeId) -> NodeInfo,
    P: Fn(&NodeId) -> Vec<NodeId>,
{
    let mut nodes: HashMap<NodeId, Node> = selected
        .iter()
        .map(|id| (id.clone(), Node::new(id.clone(), get_info(id))))
        .collect();
    let mut roots: BTreeSet<NodeId> = selected.iter().cloned().collect();

    for id in selected {
        for parent in get_parents(id) {
            if !selected.contains(&parent) {
                continue;
            }
            if let Some(parent_node) = nodes.get_mut(&parent) {
                parent_node.dependencies.insert(id.clone());
            }
            if let Some(node) = nodes.get_mut(id) {
                node.reasons.insert(parent);
            }
            roots.remove(id);
        }
    }

    let graph = DependencyGraph { nodes, roots };
    debug!(
        nodes = graph.len(),
        edges = graph.edge_count(),
        roots = graph.roots().len(),
        "built dependency graph"
    );
    graph
}

pub fn build_from_stats(index: &StatsIndex, selected: &HashSet<NodeId>) -> DependencyGraph {
    build_graph(selected, |id| index.get_info(id), |id| index.get_parents(id))
}
