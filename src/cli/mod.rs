//! CLI module
//!
//! Command-line interface for running ingestions.
//!
//! # Commands
//!
//! - `run` - Ingest channels and their videos into the output root
//! - `validate` - Check a configuration file

mod commands;
mod runner;

pub use commands::{parse_id_list, Cli, Commands, OutputFormat};
pub use runner::Runner;
