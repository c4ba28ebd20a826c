// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

//! # yt-ingest
//!
//! Rate-limited, resilient ingestion of YouTube channels and their videos
//! into partitioned, gzip-compressed NDJSON batch files.
//!
//! ## Features
//!
//! - **Global Rate Limit**: One shared permit budget per rolling second, retries included
//! - **Bounded Retries**: Exponential backoff with jitter, `Retry-After` honored
//! - **Three-Stage Walk**: Parent lookup, capped paginated listing, batched details
//! - **Explicit Gaps**: Listed children without details become `not_found` records
//! - **Atomic Output**: Temp file, fsync, rename; readers never see partial batches
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use yt_ingest::{IngestConfig, IngestionOrchestrator, Result};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = IngestConfig::default()
//!         .with_api_key("AIza...")
//!         .with_output_root("./raw");
//!
//!     let orchestrator = IngestionOrchestrator::from_config(&config, CancellationToken::new())?;
//!     let report = orchestrator.run(&["UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string()]).await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    IngestionOrchestrator                        │
//! │        parents ──▶ buffer_unordered(parent_concurrency)         │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │                                  │
//! ┌───────────────┴──────────────┐   ┌───────────────┴─────────────┐
//! │         EntityWalker         │   │   PartitionedRecordWriter   │
//! │ parent → listing → details   │   │ <stream>/ingestion_date=D/  │
//! │        → reconcile()         │   │   part-NNNNN.ndjson.gz      │
//! └──────────────────────────────┘   └─────────────────────────────┘
//!                 │
//! ┌───────────────┴──────────────┐
//! │ EntityApi (YouTubeApi)       │
//! │   ResilientClient            │
//! │     RateLimiter (shared)     │
//! └──────────────────────────────┘
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Records, streams and partition keys
pub mod types;

/// HTTP client with retry and rate limiting
pub mod http;

/// Page-token pagination with a hard item cap
pub mod pagination;

/// Remote API seam and the YouTube implementation
pub mod api;

/// Three-stage parent walk and reconciliation
pub mod walker;

/// Partitioned gzip NDJSON output
pub mod output;

/// Run orchestration
pub mod engine;

/// Run configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use api::{EntityApi, YouTubeApi};
pub use config::IngestConfig;
pub use engine::{IngestionOrchestrator, ParentReport, ParentStatus, RunReport};
pub use http::{RateLimiter, ResilientClient};
pub use output::PartitionedRecordWriter;
pub use walker::EntityWalker;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
