//! yt-ingest CLI
//!
//! Command-line interface for running ingestions

use clap::Parser;
use yt_ingest::cli::{Cli, Runner};

#[tokio::main]
async fn main() {
    // Initialize logging; stdout carries the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let runner = Runner::new(cli);

    if let Err(e) = runner.run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
