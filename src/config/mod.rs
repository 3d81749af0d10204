pub mod resolve;
pub mod session;

pub use resolve::{
    load_session_config, resolve_session, resolve_session_with_overrides, ResolvedSession,
    CONFIG_FILE_NAME,
};
pub use session::{CutsConfig, OutputConfig, SelectionConfig, SessionConfig};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config at {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
