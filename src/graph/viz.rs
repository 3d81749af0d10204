use std::collections::HashSet;
use std::iter::Peekable;
use std::vec;

use crate::graph::{DependencyGraph, NodeId};
use crate::reach::{Cut, ReachabilityEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Reachable(u32),
    NodeCut,
    EdgeCut,
    Unreachable,
}

impl Status {
    fn is_live(self) -> bool {
        matches!(self, Self::Reachable(_))
    }

    fn suffix(self) -> String {
        match self {
            Self::Reachable(count) => format!(" x{count}"),
            Self::NodeCut => " (cut)".to_string(),
            Self::EdgeCut => " (edge cut)".to_string(),
            Self::Unreachable => " (unreachable)".to_string(),
        }
    }
}

struct Frame {
    id: NodeId,
    /// Whether this node is the last of its siblings.
    last: bool,
    children: Peekable<vec::IntoIter<(NodeId, Status)>>,
}

struct Walk<'a> {
    engine: &'a ReachabilityEngine,
    graph: &'a DependencyGraph,
    show_unreachable: bool,
    on_path: HashSet<NodeId>,
    expanded: HashSet<NodeId>,
}

impl<'a> Walk<'a> {
    fn new(engine: &'a ReachabilityEngine, show_unreachable: bool) -> Option<Self> {
        Some(Self {
            engine,
            graph: engine.graph()?,
            show_unreachable,
            on_path: HashSet::new(),
            expanded: HashSet::new(),
        })
    }

    fn status(&self, parent: Option<&NodeId>, id: &NodeId) -> Status {
        if self.engine.is_cut(&Cut::Node(id.clone())) {
            return Status::NodeCut;
        }
        if let Some(parent) = parent {
            if self.engine.cuts().is_edge_cut(parent, id) {
                return Status::EdgeCut;
            }
        }
        match self.engine.reachability().multiplicity(id) {
            0 => Status::Unreachable,
            count => Status::Reachable(count),
        }
    }

    fn visible_roots(&self) -> Vec<(NodeId, Status)> {
        self.graph
            .roots()
            .iter()
            .map(|root| (root.clone(), self.status(None, root)))
            .filter(|(_, status)| self.show_unreachable || status.is_live())
            .collect()
    }

    fn visible_children(&self, node: &NodeId) -> Vec<(NodeId, Status)> {
        self.graph
            .dependencies_of(node)
            .into_iter()
            .flatten()
            .map(|child| (child.clone(), self.status(Some(node), child)))
            .filter(|(_, status)| self.show_unreachable || status.is_live())
            .collect()
    }

    /// Marker for a node that should not be expanded again, if any.
    fn repeat_marker(&self, id: &NodeId) -> Option<&'static str> {
        if self.on_path.contains(id) {
            Some(" (cycle)")
        } else if self.expanded.contains(id) {
            Some(" (shown above)")
        } else {
            None
        }
    }

    fn line(&self, id: &NodeId, status: Status) -> String {
        let mut text = self.graph.label(id);
        text.push_str(&status.suffix());
        text
    }

    /// Walks the visible branches below `root` depth first. `emit` receives
    /// the open frames (root first), whether the line is its parent's last
    /// child, and the line text. Every node is expanded at most once.
    fn descend<F>(&mut self, root: &NodeId, mut emit: F)
    where
        F: FnMut(&[Frame], bool, &str),
    {
        self.on_path.insert(root.clone());
        self.expanded.insert(root.clone());
        let mut stack = vec![Frame {
            id: root.clone(),
            last: true,
            children: self.visible_children(root).into_iter().peekable(),
        }];

        while let Some(frame) = stack.last_mut() {
            let Some((child, status)) = frame.children.next() else {
                if let Some(done) = stack.pop() {
                    self.on_path.remove(&done.id);
                }
                continue;
            };
            let last = frame.children.peek().is_none();

            let mut text = self.line(&child, status);
            let marker = self.repeat_marker(&child);
            if let Some(marker) = marker {
                text.push_str(marker);
            }
            emit(&stack, last, &text);
            if marker.is_some() {
                continue;
            }

            self.on_path.insert(child.clone());
            self.expanded.insert(child.clone());
            let children = self.visible_children(&child).into_iter().peekable();
            stack.push(Frame {
                id: child,
                last,
                children,
            });
        }
    }
}

/// Renders the graph as an ASCII tree, one block per root.
///
/// Cut and unreachable branches are dropped unless `show_unreachable` is set,
/// in which case they are printed with their status and expanded like any
/// other branch.
pub fn render_tree(engine: &ReachabilityEngine, show_unreachable: bool) -> String {
    let mut out = String::new();
    let Some(mut walk) = Walk::new(engine, show_unreachable) else {
        return out;
    };
    for (idx, (root, status)) in walk.visible_roots().into_iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(&walk.line(&root, status));
        out.push('\n');
        walk.descend(&root, |frames, last, text| {
            for frame in frames.iter().skip(1) {
                out.push_str(if frame.last { "    " } else { "|   " });
            }
            out.push_str(if last { "`-- " } else { "|-- " });
            out.push_str(text);
            out.push('\n');
        });
    }
    out
}

/// One line per node, prefixed with its depth below the root. Output stays
/// linear in the number of lines however deep the graph is.
pub fn render_flat(engine: &ReachabilityEngine, show_unreachable: bool) -> String {
    let mut out = String::new();
    let Some(mut walk) = Walk::new(engine, show_unreachable) else {
        return out;
    };
    for (root, status) in walk.visible_roots() {
        out.push_str("0 ");
        out.push_str(&walk.line(&root, status));
        out.push('\n');
        walk.descend(&root, |frames, _, text| {
            out.push_str(&frames.len().to_string());
            out.push(' ');
            out.push_str(text);
            out.push('\n');
        });
    }
    out
}

/// Graphviz rendering of the whole graph. Unreachable nodes are grey, cut
/// nodes and edges red.
pub fn render_dot(engine: &ReachabilityEngine) -> String {
    let mut out = String::from("digraph bobble {\n");
    let Some(graph) = engine.graph() else {
        out.push_str("}\n");
        return out;
    };

    let mut nodes: Vec<&NodeId> = graph.nodes().map(|node| &node.id).collect();
    nodes.sort();
    for id in &nodes {
        let label = escape_dot_label(&graph.label(id));
        let multiplicity = engine.reachability().multiplicity(id);
        let style = if engine.cuts().is_node_cut(id) {
            ", color=red, style=dashed"
        } else if multiplicity == 0 {
            ", color=gray, fontcolor=gray"
        } else {
            ""
        };
        out.push_str(&format!(
            "  \"{}\" [label=\"{} x{}\"{}];\n",
            escape_dot_label(id.as_str()),
            label,
            multiplicity,
            style
        ));
    }
    for id in &nodes {
        for dep in graph.dependencies_of(id).into_iter().flatten() {
            let style = if engine.cuts().is_edge_cut(id, dep) {
                " [color=red, style=dashed]"
            } else {
                ""
            };
            out.push_str(&format!(
                "  \"{}\" -> \"{}\"{};\n",
                escape_dot_label(id.as_str()),
                escape_dot_label(dep.as_str()),
                style
            ));
        }
    }
    out.push_str("}\n");
    out
}

fn escape_dot_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::graph::builder::build_graph;
    use crate::graph::viz::{render_dot, render_flat, render_tree};
    use crate::graph::{DependencyGraph, NodeId, NodeInfo};
    use crate::reach::{Cut, ReachabilityEngine};

    fn engine() -> ReachabilityEngine {
        let mut engine = ReachabilityEngine::new();
        engine.install(DependencyGraph::from_parts(
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
            &["a"],
        ));
        engine
    }

    #[test]
    fn tree_marks_repeated_subtrees() {
        let out = render_tree(&engine(), false);
        assert_eq!(
            out,
            "a x1\n|-- b x1\n|   `-- d x2\n`-- c x1\n    `-- d x2 (shown above)\n"
        );
    }

    #[test]
    fn tree_hides_cut_branches_by_default() {
        let mut engine = engine();
        engine.toggle(Cut::edge("a", "b"));

        assert_eq!(render_tree(&engine, false), "a x1\n`-- c x1\n    `-- d x1\n");
        assert_eq!(
            render_tree(&engine, true),
            "a x1\n|-- b (edge cut)\n|   `-- d x1\n`-- c x1\n    `-- d x1 (shown above)\n"
        );
    }

    #[test]
    fn flat_prefixes_depth_and_flags_cycles() {
        let mut engine = ReachabilityEngine::new();
        engine.install(DependencyGraph::from_parts(&[("a", "b"), ("b", "a")], &["a"]));

        assert_eq!(render_flat(&engine, false), "0 a x2\n1 b x1\n2 a x2 (cycle)\n");
    }

    #[test]
    fn flat_lists_each_root_block_in_turn() {
        let mut engine = ReachabilityEngine::new();
        engine.install(DependencyGraph::from_parts(
            &[("a", "c"), ("b", "c"), ("c", "d")],
            &["a", "b"],
        ));

        assert_eq!(
            render_flat(&engine, false),
            "0 a x1\n1 c x2\n2 d x1\n0 b x1\n1 c x2 (shown above)\n"
        );
    }

    #[test]
    fn deep_chains_render_without_exhausting_the_stack() {
        let depth = 100_000;
        let selected: HashSet<NodeId> = (0..depth)
            .map(|i| NodeId::new(format!("n{i}")))
            .collect();
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
        let mut engine = ReachabilityEngine::new();
        engine.install(graph);
        assert_eq!(engine.reachability().reachable_module_count(), depth);

        let out = render_flat(&engine, false);
        assert_eq!(out.lines().count(), depth);
        assert_eq!(out.lines().next(), Some("0 n0 x1"));
        assert_eq!(out.lines().last(), Some("99999 n99999 x1"));
    }

    #[test]
    fn cut_root_is_only_listed_when_showing_everything() {
        let mut engine = engine();
        engine.toggle(Cut::node("a"));

        assert_eq!(render_tree(&engine, false), "");
        assert!(render_tree(&engine, true).starts_with("a (cut)\n"));
    }

    #[test]
    fn dot_styles_cut_edges_and_unreachable_nodes() {
        let mut engine = engine();
        engine.toggle(Cut::edge("a", "b"));
        let out = render_dot(&engine);

        assert!(out.starts_with("digraph bobble {\n"));
        assert!(out.contains("  \"a\" -> \"b\" [color=red, style=dashed];\n"));
        assert!(out.contains("  \"b\" [label=\"b x0\", color=gray, fontcolor=gray];\n"));
        assert!(out.contains("  \"c\" -> \"d\";\n"));
        assert!(out.ends_with("}\n"));
    }

    #[test]
    fn renders_nothing_without_a_graph() {
        let engine = ReachabilityEngine::new();

        assert_eq!(render_tree(&engine, true), "");
        assert_eq!(render_dot(&engine), "digraph bobble {\n}\n");
    }
}
