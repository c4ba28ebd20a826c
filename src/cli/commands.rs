//! CLI commands and argument parsing

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Channel/video ingestion CLI
#[derive(Parser, Debug)]
#[command(name = "yt-ingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest channels and their recent videos
    Run {
        /// Channel IDs (repeatable; comma- or whitespace-separated lists accepted)
        #[arg(long = "channel-id", num_args = 1..)]
        channel_ids: Vec<String>,

        /// API key
        #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Root directory of the partitioned output
        #[arg(long)]
        output_root: Option<PathBuf>,

        /// Partition date (YYYY-MM-DD, default: today UTC)
        #[arg(long)]
        ingestion_date: Option<NaiveDate>,

        /// Request ceiling per rolling second
        #[arg(long)]
        rps: Option<u32>,

        /// Rotation threshold in MiB (uncompressed)
        #[arg(long)]
        part_size_mb: Option<usize>,

        /// Videos per channel (0 = no cap)
        #[arg(long)]
        max_videos: Option<usize>,
    },

    /// Validate a configuration file
    Validate,
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Single-line JSON
    Json,
    /// Indented JSON
    Pretty,
}

/// Split repeated list arguments on commas and whitespace
pub fn parse_id_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
