use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod builder;
pub mod viz;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Display metadata for a node, as supplied by whoever owns the source records.
#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    pub name: String,
    pub size: Option<u64>,
    /// Original reason list, kept for display only.
    pub raw_reasons: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub size: Option<u64>,
    pub dependencies: BTreeSet<NodeId>,
    pub reasons: BTreeSet<NodeId>,
    pub raw_reasons: Vec<String>,
}

impl Node {
    fn new(id: NodeId, info: NodeInfo) -> Self {
        Self {
            id,
            name: info.name,
            size: info.size,
            dependencies: BTreeSet::new(),
            reasons: BTreeSet::new(),
            raw_reasons: info.raw_reasons,
        }
    }

    pub fn size_or_zero(&self) -> u64 {
        self.size.unwrap_or(0)
    }
}

/// Induced dependency graph over a selected set of nodes.
///
/// Every id held in a `dependencies` or `reasons` set is a key of `nodes`.
/// A graph is never mutated after [`builder::build_graph`] returns it; a new
/// selection produces a new graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<NodeId, Node>,
    roots: BTreeSet<NodeId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn roots(&self) -> &BTreeSet<NodeId> {
        &self.roots
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|node| node.dependencies.len()).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.nodes.values().map(Node::size_or_zero).sum()
    }

    pub fn dependencies_of(&self, id: &NodeId) -> Option<&BTreeSet<NodeId>> {
        self.nodes.get(id).map(|node| &node.dependencies)
    }

    pub fn label(&self, id: &NodeId) -> String {
        match self.nodes.get(id) {
            Some(node) if !node.name.is_empty() => node.name.clone(),
            _ => id.as_str().to_string(),
        }
    }
}

#[cfg(test)]
impl DependencyGraph {
    /// Graph with explicit roots, for shapes the builder never produces.
    pub(crate) fn from_parts(edges: &[(&str, &str)], roots: &[&str]) -> Self {
        let mut nodes: HashMap<NodeId, Node> = HashMap::new();
        for id in roots
            .iter()
            .chain(edges.iter().flat_map(|(parent, child)| [parent, child]))
        {
            let id = NodeId::from(*id);
            nodes
                .entry(id.clone())
                .or_insert_with(|| Node::new(id, NodeInfo::default()));
        }
        for (parent, child) in edges {
            let (parent, child) = (NodeId::from(*parent), NodeId::from(*child));
            if let Some(node) = nodes.get_mut(&parent) {
                node.dependencies.insert(child.clone());
            }
            if let Some(node) = nodes.get_mut(&child) {
                node.reasons.insert(parent);
            }
        }
        Self {
            nodes,
            roots: roots.iter().map(|id| NodeId::from(*id)).collect(),
        }
    }
}
