use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::graph::{DependencyGraph, NodeId};
use crate::reach::analyze::analyze;
use crate::reach::cut::CutStore;
use crate::reactive::{Listeners, Observable, SubscriptionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ReachChange {
    Published { id: NodeId, multiplicity: u32 },
    Retracted { id: NodeId },
}

/// Entries that changed in one recompute. Retractions come first, then
/// publications, each sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReachDelta {
    pub changes: Vec<ReachChange>,
}

impl ReachDelta {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn retracted(&self) -> impl Iterator<Item = &NodeId> {
        self.changes.iter().filter_map(|change| match change {
            ReachChange::Retracted { id } => Some(id),
            ReachChange::Published { .. } => None,
        })
    }

    pub fn published(&self) -> impl Iterator<Item = (&NodeId, u32)> {
        self.changes.iter().filter_map(|change| match change {
            ReachChange::Published { id, multiplicity } => Some((id, *multiplicity)),
            ReachChange::Retracted { .. } => None,
        })
    }
}

/// The published reachability map for one installed graph.
#[derive(Debug, Default)]
pub struct ReachabilityCache {
    graph: Option<DependencyGraph>,
    published: HashMap<NodeId, u32>,
    recomputations: Observable<u64>,
    listeners: Listeners<ReachDelta>,
}

impl ReachabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the active graph and recomputes against `cuts`.
    pub fn install(&mut self, graph: DependencyGraph, cuts: &CutStore) -> ReachDelta {
        self.graph = Some(graph);
        self.recompute(cuts)
    }

    /// Re-runs the analysis and publishes only the entries that changed.
    ///
    /// Listeners are notified once with the whole delta, and not at all when
    /// nothing changed. Without an installed graph this does nothing.
    pub fn recompute(&mut self, cuts: &CutStore) -> ReachDelta {
        let Some(graph) = self.graph.as_ref() else {
            return ReachDelta::default();
        };

        let next = analyze(graph, cuts);
        let delta = diff(&self.published, &next);
        for change in &delta.changes {
            match change {
                ReachChange::Retracted { id } => {
                    self.published.remove(id);
                }
                ReachChange::Published { id, multiplicity } => {
                    self.published.insert(id.clone(), *multiplicity);
                }
            }
        }

        debug!(
            changed = delta.len(),
            reachable = self.published.len(),
            "recomputed reachability"
        );
        if !delta.is_empty() {
            self.listeners.notify(&delta);
        }
        self.recomputations.update(|count| *count += 1);
        delta
    }

    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.graph.as_ref()
    }

    pub fn multiplicity(&self, id: &NodeId) -> u32 {
        self.published.get(id).copied().unwrap_or(0)
    }

    pub fn is_reachable(&self, id: &NodeId) -> bool {
        self.multiplicity(id) > 0
    }

    pub fn reachable_module_count(&self) -> usize {
        self.published.len()
    }

    pub fn reachable_size(&self) -> u64 {
        let Some(graph) = self.graph.as_ref() else {
            return 0;
        };
        self.published
            .keys()
            .filter_map(|id| graph.node(id))
            .map(|node| node.size_or_zero())
            .sum()
    }

    pub fn recomputation_count(&self) -> u64 {
        *self.recomputations.get()
    }

    /// Published entries sorted by id.
    pub fn entries(&self) -> Vec<(NodeId, u32)> {
        let mut entries: Vec<(NodeId, u32)> = self
            .published
            .iter()
            .map(|(id, count)| (id.clone(), *count))
            .collect();
        entries.sort();
        entries
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ReachDelta) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn subscribe_recomputations<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&u64) + 'static,
    {
        self.recomputations.subscribe(listener)
    }

    pub fn unsubscribe_recomputations(&mut self, id: SubscriptionId) -> bool {
        self.recomputations.unsubscribe(id)
    }
}

fn diff(published: &HashMap<NodeId, u32>, next: &HashMap<NodeId, u32>) -> ReachDelta {
    let mut retracted: Vec<&NodeId> = published
        .keys()
        .filter(|id| next.get(*id).map_or(true, |count| *count == 0))
        .collect();
    retracted.sort();

    let mut updated: Vec<(&NodeId, u32)> = next
        .iter()
        .filter(|(id, count)| **count > 0 && published.get(*id) != Some(*count))
        .map(|(id, count)| (id, *count))
        .collect();
    updated.sort();

    let mut changes: Vec<ReachChange> = retracted
        .into_iter()
        .map(|id| ReachChange::Retracted { id: id.clone() })
        .collect();
    changes.extend(
        updated
            .into_iter()
            .map(|(id, multiplicity)| ReachChange::Published {
                id: id.clone(),
                multiplicity,
            }),
    );
    ReachDelta { changes }
}
