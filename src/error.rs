use thiserror::Error;

use crate::config::ConfigError;
use crate::stats::StatsError;

#[derive(Debug, Error)]
pub enum BobbleError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("stats error: {0}")]
    Stats(#[from] StatsError),
    #[error("invalid cut: {0}")]
    InvalidCut(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BobbleError>;
