//! Cut-aware reachability over a [`DependencyGraph`].
//!
//! [`ReachabilityEngine`] ties a [`CutStore`] to a [`ReachabilityCache`]:
//! every toggle recomputes before it returns, so a read that follows a toggle
//! always sees the result for the new cut set.

use tracing::trace;

use crate::graph::DependencyGraph;
use crate::reactive::{Observable, SubscriptionId};

pub mod analyze;
pub mod cache;
pub mod cut;

pub use analyze::{analyze, analyze_with, Multiplicities};
pub use cache::{ReachChange, ReachDelta, ReachabilityCache};
pub use cut::{Cut, CutParseError, CutStore, EDGE_SEPARATOR};

#[derive(Debug, Default)]
pub struct ReachabilityEngine {
    cuts: Observable<CutStore>,
    cache: ReachabilityCache,
}

impl ReachabilityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersedes the active graph. Existing cuts carry over.
    pub fn install(&mut self, graph: DependencyGraph) -> ReachDelta {
        self.cache.install(graph, self.cuts.get())
    }

    pub fn toggle(&mut self, cut: Cut) -> ReachDelta {
        let key = cut.key();
        let now_cut = self.cuts.update(|store| store.toggle(cut));
        trace!(cut = %key, now_cut, "toggled cut");
        self.cache.recompute(self.cuts.get())
    }

    /// Toggles every cut not already present. Returns how many were added.
    pub fn apply_cuts(&mut self, cuts: impl IntoIterator<Item = Cut>) -> usize {
        let mut added = 0;
        for cut in cuts {
            if self.is_cut(&cut) {
                continue;
            }
            self.toggle(cut);
            added += 1;
        }
        added
    }

    pub fn clear_cuts(&mut self) -> ReachDelta {
        self.cuts.update(CutStore::clear);
        self.cache.recompute(self.cuts.get())
    }

    pub fn is_cut(&self, cut: &Cut) -> bool {
        self.cuts.get().is_cut(cut)
    }

    pub fn cuts(&self) -> &CutStore {
        self.cuts.get()
    }

    pub fn reachability(&self) -> &ReachabilityCache {
        &self.cache
    }

    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.cache.graph()
    }

    pub fn subscribe_cuts<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&CutStore) + 'static,
    {
        self.cuts.subscribe(listener)
    }

    pub fn unsubscribe_cuts(&mut self, id: SubscriptionId) -> bool {
        self.cuts.unsubscribe(id)
    }

    pub fn subscribe_reachability<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ReachDelta) + 'static,
    {
        self.cache.subscribe(listener)
    }

    pub fn unsubscribe_reachability(&mut self, id: SubscriptionId) -> bool {
        self.cache.unsubscribe(id)
    }

    pub fn subscribe_recomputations<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&u64) + 'static,
    {
        self.cache.subscribe_recomputations(listener)
    }
}
