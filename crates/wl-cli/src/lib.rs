//! Watch tracker CLI library.
//!
//! This crate provides the CLI interface for the watch tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{AdminAction, Cli, Commands, StatsScope};
pub use config::Config;
