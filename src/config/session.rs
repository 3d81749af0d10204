use std::path::PathBuf;

use serde::Deserialize;

/// Contents of a `.bobble.toml` session file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub stats: Option<PathBuf>,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub cuts: CutsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub group_pattern: Option<String>,
}

/// Cut markers applied on every run, before any `--cut` flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CutsConfig {
    #[serde(default)]
    pub nodes: Vec<String>,
    /// `"parent => child"` pairs.
    #[serde(default)]
    pub edges: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub show_unreachable: bool,
}
