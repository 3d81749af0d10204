use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::graph::NodeId;

/// Separator between parent and child in the textual form of an edge cut.
pub const EDGE_SEPARATOR: &str = "=>";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cut {
    /// Removes the node and every edge touching it.
    Node(NodeId),
    /// Removes exactly one directed edge.
    Edge { parent: NodeId, child: NodeId },
}

impl Cut {
    pub fn node(id: impl Into<NodeId>) -> Self {
        Self::Node(id.into())
    }

    pub fn edge(parent: impl Into<NodeId>, child: impl Into<NodeId>) -> Self {
        Self::Edge {
            parent: parent.into(),
            child: child.into(),
        }
    }

    /// Textual form accepted back by `FromStr`. Ids that would be ambiguous
    /// there are quoted.
    pub fn key(&self) -> String {
        match self {
            Self::Node(id) => quote_id(id),
            Self::Edge { parent, child } => format!(
                "{} {EDGE_SEPARATOR} {}",
                quote_id(parent),
                quote_id(child)
            ),
        }
    }
}

fn quote_id(id: &NodeId) -> String {
    let raw = id.as_str();
    let needs_quotes = raw.contains(EDGE_SEPARATOR) || raw.starts_with('"') || raw.trim() != raw;
    if !needs_quotes {
        return raw.to_string();
    }
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Splits one id off the front of `input`, which starts at a non-blank
/// character. Unquoted ids run up to the next separator.
fn take_id(input: &str) -> Result<(String, &str), CutParseError> {
    let Some(quoted) = input.strip_prefix('"') else {
        return Ok(match input.find(EDGE_SEPARATOR) {
            Some(pos) => (input[..pos].trim_end().to_string(), &input[pos..]),
            None => (input.trim_end().to_string(), ""),
        });
    };

    let mut id = String::new();
    let mut chars = quoted.char_indices();
    while let Some((pos, ch)) = chars.next() {
        match ch {
            '"' => return Ok((id, &quoted[pos + 1..])),
            '\\' => match chars.next() {
                Some((_, escaped)) => id.push(escaped),
                None => break,
            },
            other => id.push(other),
        }
    }
    Err(CutParseError::UnterminatedQuote(input.to_string()))
}

impl fmt::Display for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CutParseError {
    #[error("empty cut marker")]
    Empty,
    #[error("edge cut '{0}' needs both a parent and a child")]
    IncompleteEdge(String),
    #[error("unterminated quote in cut '{0}'")]
    UnterminatedQuote(String),
    #[error("unexpected text after id in cut '{0}'")]
    TrailingText(String),
}

impl FromStr for Cut {
    type Err = CutParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CutParseError::Empty);
        }

        let (parent, rest) = take_id(trimmed)?;
        let rest = rest.trim_start();
        if rest.is_empty() {
            if parent.is_empty() {
                return Err(CutParseError::Empty);
            }
            return Ok(Self::node(parent.as_str()));
        }
        let Some(rest) = rest.strip_prefix(EDGE_SEPARATOR) else {
            return Err(CutParseError::TrailingText(trimmed.to_string()));
        };

        let rest = rest.trim_start();
        let child = if rest.starts_with('"') {
            let (child, tail) = take_id(rest)?;
            if !tail.trim().is_empty() {
                return Err(CutParseError::TrailingText(trimmed.to_string()));
            }
            child
        } else {
            rest.trim_end().to_string()
        };
        if parent.is_empty() || child.is_empty() {
            return Err(CutParseError::IncompleteEdge(trimmed.to_string()));
        }
        Ok(Self::edge(parent.as_str(), child.as_str()))
    }
}

/// The set of active cuts. Membership means "treat as absent".
#[derive(Debug, Clone, Default)]
pub struct CutStore {
    nodes: HashSet<NodeId>,
    edges: HashMap<NodeId, HashSet<NodeId>>,
}

impl CutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership and returns whether `cut` is present afterwards.
    pub fn toggle(&mut self, cut: Cut) -> bool {
        match cut {
            Cut::Node(id) => {
                if self.nodes.remove(&id) {
                    false
                } else {
                    self.nodes.insert(id);
                    true
                }
            }
            Cut::Edge { parent, child } => {
                let children = self.edges.entry(parent.clone()).or_default();
                if children.remove(&child) {
                    if children.is_empty() {
                        self.edges.remove(&parent);
                    }
                    false
                } else {
                    children.insert(child);
                    true
                }
            }
        }
    }

    pub fn is_cut(&self, cut: &Cut) -> bool {
        match cut {
            Cut::Node(id) => self.is_node_cut(id),
            Cut::Edge { parent, child } => self.is_edge_cut(parent, child),
        }
    }

    pub fn is_node_cut(&self, id: &NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Only answers for the edge marker itself; node cuts on either end are
    /// the caller's concern.
    pub fn is_edge_cut(&self, parent: &NodeId, child: &NodeId) -> bool {
        self.edges
            .get(parent)
            .is_some_and(|children| children.contains(child))
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.values().map(HashSet::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    /// Active cuts ordered by their textual key.
    pub fn iter(&self) -> impl Iterator<Item = Cut> {
        let mut cuts: Vec<Cut> = self.nodes.iter().cloned().map(Cut::Node).collect();
        for (parent, children) in &self.edges {
            for child in children {
                cuts.push(Cut::edge(parent.clone(), child.clone()));
            }
        }
        cuts.sort_by_key(Cut::key);
        cuts.into_iter()
    }
}
