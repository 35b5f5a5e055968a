//! Command-line interface for tap-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Sync all configured streams, carrying forward persisted state
//! tap-sync sync \
//!   --config config.json \
//!   --catalog catalog.json \
//!   --state state.json
//!
//! # Bounded sample run (aborts with a distinct exit code when hit)
//! tap-sync sync --config config.json --max-records 100
//!
//! # Emit a fully-selected catalog for the configured streams
//! tap-sync discover --config config.json
//! ```
//!
//! Messages go to stdout, one JSON object per line; logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tap_catalog::{Catalog, CatalogEntry};
use tap_state::TapState;
use tap_sync::config::TapConfig;
use tap_sync::jsonl::JsonlSource;
use tap_sync::source::RecordSource;
use tap_sync::sync::{SyncError, Syncer};
use tap_protocol::JsonLinesSink;

#[derive(Parser)]
#[command(name = "tap-sync")]
#[command(about = "Run data-extraction taps with incremental checkpointing")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract records and emit schema/record/state messages to stdout
    Sync {
        /// Path to the tap configuration file
        #[arg(long, env = "TAP_CONFIG")]
        config: PathBuf,

        /// Path to a catalog file with stream selection and overrides
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Path to the persisted state from a previous run
        #[arg(long)]
        state: Option<PathBuf>,

        /// Abort each stream after this many records
        #[arg(long)]
        max_records: Option<u64>,

        /// Records between intermediate state messages
        #[arg(long)]
        state_message_frequency: Option<u64>,
    },

    /// Print a catalog with every configured stream fully selected
    Discover {
        /// Path to the tap configuration file
        #[arg(long, env = "TAP_CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // A hit record limit is an intentional short-circuit, not a
        // failure; give it a distinct exit code so wrappers can tell.
        if let Some(SyncError::LimitReached { limit }) = e.downcast_ref::<SyncError>() {
            eprintln!("Record limit ({limit}) reached, stopping.");
            std::process::exit(2);
        }
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing; logs must stay off stdout, which carries the
    // message stream.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            config,
            catalog,
            state,
            max_records,
            state_message_frequency,
        } => {
            let config = TapConfig::from_file(&config)?;

            let catalog = match catalog {
                Some(path) => Some(
                    Catalog::from_file(&path)
                        .with_context(|| format!("Failed to load catalog from {path:?}"))?,
                ),
                None => None,
            };

            let mut state = match state {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read state file {path:?}"))?;
                    let value: serde_json::Value = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse state file {path:?}"))?;
                    TapState::from_value(value)?
                }
                None => TapState::new(),
            };

            let mut options = config.sync_options();
            if let Some(limit) = max_records {
                options.max_records = Some(limit);
            }
            if let Some(frequency) = state_message_frequency {
                options.state_message_frequency = frequency;
            }

            let mut sources: Vec<Box<dyn RecordSource>> = Vec::new();
            for stream in &config.streams {
                sources.push(Box::new(JsonlSource::from_config(stream)?));
            }

            let mut sink = JsonLinesSink::new(std::io::stdout());
            let mut syncer = Syncer::new(catalog.as_ref(), options);
            syncer.sync_all(&mut sources, &mut state, &mut sink).await?;
        }

        Commands::Discover { config } => {
            let config = TapConfig::from_file(&config)?;
            let mut catalog = Catalog::new();
            for stream in &config.streams {
                let definition = stream.resolve_definition()?;
                catalog.streams.insert(
                    definition.name.clone(),
                    CatalogEntry {
                        selected: Some(true),
                        selected_fields: None,
                        key_properties: Some(definition.primary_keys.clone()),
                        replication_key: definition.replication_key.clone(),
                        forced_replication_method: definition.forced_replication_method,
                    },
                );
            }
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
    }

    Ok(())
}
