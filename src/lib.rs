#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod reach;
pub mod reactive;
pub mod stats;
pub mod util;
