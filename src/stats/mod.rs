//! The subset of a bundler stats file the reachability engine needs.
//!
//! Only chunk groups, chunks and modules are read; everything else in the
//! file is ignored by serde.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::graph::NodeId;

pub mod index;

pub use index::{GroupSummary, StatsIndex};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("stats file not found: {0}")]
    NotFound(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse stats at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown chunk group '{0}'")]
    UnknownChunkGroup(String),
    #[error("invalid chunk group pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("selection matched no modules")]
    EmptySelection,
}

pub type Result<T> = std::result::Result<T, StatsError>;

/// Bundlers emit ids either as numbers or as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(u64),
    Text(String),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&RawId> for NodeId {
    fn from(value: &RawId) -> Self {
        NodeId::new(value.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default)]
    pub named_chunk_groups: HashMap<String, ChunkGroup>,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkGroup {
    #[serde(default)]
    pub chunks: Vec<RawId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chunk {
    pub id: RawId,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub modules: Vec<ModuleRef>,
}

/// A chunk lists its modules either by id or as full module objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModuleRef {
    Id(RawId),
    Module { id: Option<RawId> },
}

impl ModuleRef {
    pub fn id(&self) -> Option<&RawId> {
        match self {
            Self::Id(id) => Some(id),
            Self::Module { id } => id.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub chunks: Vec<RawId>,
    #[serde(default)]
    pub reasons: Vec<Reason>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reason {
    #[serde(default)]
    pub module_id: Option<RawId>,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl Reason {
    pub fn describe(&self) -> String {
        let origin = self
            .module_name
            .clone()
            .or_else(|| self.module_id.as_ref().map(RawId::to_string))
            .unwrap_or_else(|| "(entry)".to_string());
        match self.kind.as_deref() {
            Some(kind) => format!("{origin} [{kind}]"),
            None => origin,
        }
    }
}

pub fn parse_stats(contents: &str, path: &Path) -> Result<Stats> {
    serde_json::from_str(contents).map_err(|source| StatsError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_stats(path: &Path) -> Result<Stats> {
    if !path.is_file() {
        return Err(StatsError::NotFound(path.to_path_buf()));
    }

    let contents = std::fs::read_to_string(path)?;
    let stats = parse_stats(&contents, path)?;
    info!(
        path = %path.display(),
        modules = stats.modules.len(),
        chunks = stats.chunks.len(),
        groups = stats.named_chunk_groups.len(),
        "loaded stats"
    );
    Ok(stats)
}
