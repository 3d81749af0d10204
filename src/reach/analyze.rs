use std::collections::{BTreeSet, HashMap};

use crate::graph::{DependencyGraph, NodeId};
use crate::reach::cut::CutStore;

/// Reachability multiplicity per node. Unreachable nodes are absent.
pub type Multiplicities = HashMap<NodeId, u32>;

type Children<'g> = std::iter::Flatten<std::option::IntoIter<&'g BTreeSet<NodeId>>>;

struct Frame<'g> {
    id: &'g NodeId,
    children: Children<'g>,
}

impl<'g> Frame<'g> {
    fn new(graph: &'g DependencyGraph, id: &'g NodeId) -> Self {
        Self {
            id,
            children: graph.dependencies_of(id).into_iter().flatten(),
        }
    }
}

pub fn analyze(graph: &DependencyGraph, cuts: &CutStore) -> Multiplicities {
    analyze_with(graph, cuts, |_| false)
}

/// Depth-first walk from every root, skipping cut nodes, cut edges and
/// anything `is_excluded` rejects.
///
/// A node's multiplicity is one per root designation plus one per live edge
/// arriving from a visited node, including edges into nodes that were already
/// visited. Cycles are walked once.
pub fn analyze_with<F>(graph: &DependencyGraph, cuts: &CutStore, is_excluded: F) -> Multiplicities
where
    F: Fn(&NodeId) -> bool,
{
    let blocked = |id: &NodeId| cuts.is_node_cut(id) || is_excluded(id);
    let mut visited = Multiplicities::new();

    for root in graph.roots() {
        if blocked(root) {
            continue;
        }
        visit(graph, root, cuts, &blocked, &mut visited);
        *visited.entry(root.clone()).or_insert(0) += 1;
    }

    visited
}

fn visit<'g, B>(
    graph: &'g DependencyGraph,
    start: &'g NodeId,
    cuts: &CutStore,
    blocked: &B,
    visited: &mut Multiplicities,
) where
    B: Fn(&NodeId) -> bool,
{
    if visited.contains_key(start) {
        return;
    }
    // Marked before descending so a cycle back to `start` stops here.
    visited.insert(start.clone(), 0);
    let mut stack = vec![Frame::new(graph, start)];

    while let Some(frame) = stack.last_mut() {
        let Some(child) = frame.children.next() else {
            stack.pop();
            continue;
        };
        if blocked(child) || cuts.is_edge_cut(frame.id, child) {
            continue;
        }
        // Counts are only read once the walk is over, so the increment owed
        // after the child's subtree can be taken as soon as the edge is seen.
        let first_visit = !visited.contains_key(child);
        *visited.entry(child.clone()).or_insert(0) += 1;
        if first_visit {
            stack.push(Frame::new(graph, child));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use crate::graph::builder::build_graph;
    use crate::graph::{DependencyGraph, NodeId, NodeInfo};
    use crate::reach::analyze::{analyze, analyze_with, Multiplicities};
    use crate::reach::cut::{Cut, CutStore};

    /// `edges` are `(parent, child)` pairs.
    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        let mut parents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (parent, child) in edges {
            parents
                .entry(NodeId::from(*child))
                .or_default()
                .push(NodeId::from(*parent));
        }
        let selected: HashSet<NodeId> = nodes.iter().map(|id| NodeId::from(*id)).collect();
        build_graph(
            &selected,
            |_| NodeInfo::default(),
            |id| parents.get(id).cloned().unwrap_or_default(),
        )
    }

    fn counts(result: &Multiplicities) -> Vec<(String, u32)> {
        let mut out: Vec<(String, u32)> = result
            .iter()
            .map(|(id, count)| (id.as_str().to_string(), *count))
            .collect();
        out.sort();
        out
    }

    fn expect(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
        pairs.iter().map(|(id, c)| (id.to_string(), *c)).collect()
    }

    fn diamond() -> DependencyGraph {
        graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        )
    }

    #[test]
    fn diamond_counts_each_incoming_edge() {
        let result = analyze(&diamond(), &CutStore::new());
        assert_eq!(
            counts(&result),
            expect(&[("a", 1), ("b", 1), ("c", 1), ("d", 2)])
        );
    }

    #[test]
    fn cutting_edges_and_nodes_shrinks_the_result() {
        let graph = diamond();
        let mut cuts = CutStore::new();

        cuts.toggle(Cut::edge("a", "b"));
        assert_eq!(
            counts(&analyze(&graph, &cuts)),
            expect(&[("a", 1), ("c", 1), ("d", 1)])
        );

        cuts.toggle(Cut::node("c"));
        assert_eq!(counts(&analyze(&graph, &cuts)), expect(&[("a", 1)]));
    }

    #[test]
    fn cycles_terminate_and_count_the_back_edge() {
        let graph = DependencyGraph::from_parts(&[("a", "b"), ("b", "a")], &["a"]);
        let result = analyze(&graph, &CutStore::new());

        // b -> a is a live edge into a visited node, plus a's root unit.
        assert_eq!(counts(&result), expect(&[("a", 2), ("b", 1)]));
    }

    #[test]
    fn cycle_without_entry_point_is_unreachable() {
        let graph = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);

        assert!(graph.roots().is_empty());
        assert!(analyze(&graph, &CutStore::new()).is_empty());
    }

    #[test]
    fn self_loop_counts_once_per_visit() {
        let graph = graph(&["r", "a"], &[("r", "a"), ("a", "a")]);
        let result = analyze(&graph, &CutStore::new());
        assert_eq!(counts(&result), expect(&[("a", 2), ("r", 1)]));
    }

    #[test]
    fn node_cut_dominates_edge_cuts() {
        let graph = diamond();
        let mut cuts = CutStore::new();
        cuts.toggle(Cut::edge("b", "d"));
        cuts.toggle(Cut::node("d"));

        let result = analyze(&graph, &cuts);
        assert!(!result.contains_key(&NodeId::from("d")));
        assert_eq!(
            counts(&result),
            expect(&[("a", 1), ("b", 1), ("c", 1)])
        );

        // Dropping the edge marker changes nothing while the node is cut.
        cuts.toggle(Cut::edge("b", "d"));
        assert_eq!(counts(&analyze(&graph, &cuts)), counts(&result));
    }

    #[test]
    fn cut_root_removes_everything_below_it() {
        let graph = diamond();
        let mut cuts = CutStore::new();
        cuts.toggle(Cut::node("a"));

        assert!(analyze(&graph, &cuts).is_empty());
    }

    #[test]
    fn root_designation_adds_one_unit() {
        let edges = [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")];

        let only_a = analyze(&DependencyGraph::from_parts(&edges, &["a"]), &CutStore::new());
        assert_eq!(only_a.get(&NodeId::from("d")), Some(&2));

        let also_d = analyze(
            &DependencyGraph::from_parts(&edges, &["a", "d"]),
            &CutStore::new(),
        );
        assert_eq!(also_d.get(&NodeId::from("d")), Some(&3));
    }

    #[test]
    fn excluded_nodes_behave_like_node_cuts() {
        let graph = diamond();
        let result = analyze_with(&graph, &CutStore::new(), |id| id.as_str() == "b");

        assert_eq!(
            counts(&result),
            expect(&[("a", 1), ("c", 1), ("d", 1)])
        );
    }

    #[test]
    fn empty_graph_yields_empty_result() {
        assert!(analyze(&DependencyGraph::new(), &CutStore::new()).is_empty());
    }

    #[test]
    fn deep_chains_do_not_exhaust_the_stack() {
        let depth = 100_000;
        let names: Vec<String> = (0..depth).map(|i| format!("n{i}")).collect();
        let selected: HashSet<NodeId> = names.iter().map(|n| NodeId::new(n.clone())).collect();
        let graph = build_graph(
            &selected,
            |_| NodeInfo::default(),
            |id| {
                let index: usize = id.as_str()[1..].parse().expect("numeric suffix");
                if index == 0 {
                    Vec::new()
                } else {
                    vec![NodeId::new(format!("n{}", index - 1))]
                }
            },
        );

        let result = analyze(&graph, &CutStore::new());
        assert_eq!(result.len(), depth);
        assert!(result.values().all(|count| *count == 1));
    }
}
