//! CLI runner - executes commands

use crate::cli::commands::{parse_id_list, Cli, Commands, OutputFormat};
use crate::config::IngestConfig;
use crate::engine::{IngestionOrchestrator, RunReport};
use crate::error::{Error, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run { .. } => self.ingest().await,
            Commands::Validate => self.validate(),
        }
    }

    /// Load the config file, if any, and apply command-line overrides
    pub fn build_config(&self) -> Result<IngestConfig> {
        let mut config = match &self.cli.config {
            Some(path) => IngestConfig::from_yaml_file(path)?,
            None => IngestConfig::default(),
        };

        if let Commands::Run {
            channel_ids,
            api_key,
            output_root,
            ingestion_date,
            rps,
            part_size_mb,
            max_videos,
        } = &self.cli.command
        {
            let ids = parse_id_list(channel_ids);
            if !ids.is_empty() {
                config = config.with_channel_ids(ids);
            }
            if let Some(key) = api_key {
                config = config.with_api_key(key);
            }
            if let Some(root) = output_root {
                config = config.with_output_root(root);
            }
            if let Some(date) = ingestion_date {
                config = config.with_ingestion_date(*date);
            }
            if let Some(rps) = rps {
                config = config.with_requests_per_second(*rps);
            }
            if let Some(mb) = part_size_mb {
                config = config.with_part_size_bytes(mb.saturating_mul(1024 * 1024));
            }
            if let Some(max) = max_videos {
                config = config.with_max_children(*max);
            }
        }
        Ok(config)
    }

    async fn ingest(&self) -> Result<()> {
        let config = self.build_config()?;
        if config.channel_ids.is_empty() {
            return Err(Error::missing_field("channel_ids"));
        }

        let cancel = CancellationToken::new();
        let orchestrator = IngestionOrchestrator::from_config(&config, cancel.clone())?;

        let signal_token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing in-flight work and flushing output");
                signal_token.cancel();
            }
        });

        let report = orchestrator.run(&config.channel_ids).await?;
        self.print(&report)?;
        check_report(&report)
    }

    fn validate(&self) -> Result<()> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Config file not specified (use --config)"))?;
        let config = IngestConfig::from_yaml_file(path)?;
        config.validate()?;
        info!(path = %path.display(), "Config is valid");
        self.print(&serde_json::json!({
            "valid": true,
            "channels": config.channel_ids.len(),
        }))
    }

    fn print<T: Serialize>(&self, value: &T) -> Result<()> {
        let out = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(value)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        };
        println!("{out}");
        Ok(())
    }
}

/// Fail when any parent failed, after the report has been printed
fn check_report(report: &RunReport) -> Result<()> {
    let failed: Vec<&str> = report
        .parents
        .iter()
        .filter(|p| p.is_failed())
        .map(|p| p.parent_id.as_str())
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::Other(format!(
            "{} of {} channel(s) failed: {}",
            failed.len(),
            report.parents.len(),
            failed.join(", ")
        )))
    }
}
