use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use regex::Regex;
use serde::Serialize;

use crate::graph::{NodeId, NodeInfo};
use crate::stats::{Module, Result, Stats, StatsError};

#[derive(Debug, Clone)]
struct ModuleRecord {
    name: String,
    size: Option<u64>,
    parents: Vec<NodeId>,
    raw_reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub chunks: usize,
    pub modules: usize,
    pub size: u64,
}

/// Lookup tables over a parsed stats file, keyed by normalised ids.
#[derive(Debug, Clone, Default)]
pub struct StatsIndex {
    modules: HashMap<NodeId, ModuleRecord>,
    chunk_modules: HashMap<String, BTreeSet<NodeId>>,
    groups: BTreeMap<String, Vec<String>>,
}

impl StatsIndex {
    pub fn new(stats: &Stats) -> Self {
        let mut modules = HashMap::new();
        let mut chunk_modules: HashMap<String, BTreeSet<NodeId>> = HashMap::new();

        for module in &stats.modules {
            let Some(raw_id) = module.id.as_ref() else {
                continue;
            };
            let id = NodeId::from(raw_id);
            for chunk in &module.chunks {
                chunk_modules
                    .entry(chunk.to_string())
                    .or_default()
                    .insert(id.clone());
            }
            modules.insert(id, record_for(module));
        }

        for chunk in &stats.chunks {
            let members = chunk_modules.entry(chunk.id.to_string()).or_default();
            for module in &chunk.modules {
                if let Some(id) = module.id() {
                    members.insert(NodeId::from(id));
                }
            }
        }

        let groups = stats
            .named_chunk_groups
            .iter()
            .map(|(name, group)| {
                (
                    name.clone(),
                    group.chunks.iter().map(|chunk| chunk.to_string()).collect(),
                )
            })
            .collect();

        Self {
            modules,
            chunk_modules,
            groups,
        }
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn get_info(&self, id: &NodeId) -> NodeInfo {
        match self.modules.get(id) {
            Some(record) => NodeInfo {
                name: record.name.clone(),
                size: record.size,
                raw_reasons: record.raw_reasons.clone(),
            },
            None => NodeInfo::default(),
        }
    }

    pub fn get_parents(&self, id: &NodeId) -> Vec<NodeId> {
        self.modules
            .get(id)
            .map(|record| record.parents.clone())
            .unwrap_or_default()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn modules_in_group(&self, name: &str) -> Result<HashSet<NodeId>> {
        let chunks = self
            .groups
            .get(name)
            .ok_or_else(|| StatsError::UnknownChunkGroup(name.to_string()))?;
        let mut selected = HashSet::new();
        for chunk in chunks {
            if let Some(members) = self.chunk_modules.get(chunk) {
                selected.extend(members.iter().cloned());
            }
        }
        Ok(selected)
    }

    /// Union of the named groups and every group whose name matches `pattern`.
    ///
    /// With neither given, every module in the stats file is selected.
    pub fn select(&self, groups: &[String], pattern: Option<&str>) -> Result<HashSet<NodeId>> {
        if groups.is_empty() && pattern.is_none() {
            return Ok(self.modules.keys().cloned().collect());
        }

        let mut selected = HashSet::new();
        for group in groups {
            selected.extend(self.modules_in_group(group)?);
        }
        if let Some(pattern) = pattern {
            let re = Regex::new(pattern)?;
            for name in self.groups.keys().filter(|name| re.is_match(name)) {
                selected.extend(self.modules_in_group(name)?);
            }
        }

        if selected.is_empty() {
            return Err(StatsError::EmptySelection);
        }
        Ok(selected)
    }

    pub fn group_summaries(&self) -> Vec<GroupSummary> {
        self.groups
            .iter()
            .map(|(name, chunks)| {
                let members = self.modules_in_group(name).unwrap_or_default();
                let size = members
                    .iter()
                    .filter_map(|id| self.modules.get(id))
                    .filter_map(|record| record.size)
                    .sum();
                GroupSummary {
                    name: name.clone(),
                    chunks: chunks.len(),
                    modules: members.len(),
                    size,
                }
            })
            .collect()
    }
}

fn record_for(module: &Module) -> ModuleRecord {
    let mut parents = Vec::new();
    for reason in &module.reasons {
        if let Some(parent) = reason.module_id.as_ref() {
            parents.push(NodeId::from(parent));
        }
    }
    ModuleRecord {
        name: module.name.clone(),
        size: module.size,
        parents,
        raw_reasons: module.reasons.iter().map(|reason| reason.describe()).collect(),
    }
}
