//! CLI subcommand implementations.

pub mod admin;
pub mod import;
pub mod init;
pub mod mark;
pub mod refresh;
pub mod stats;
pub mod status;
