//! CLI interface for seo-sync: command parsing and the async `run` entrypoint.
//!
//! All business logic lives in `seo-sync-core`; this module loads the config,
//! builds a [`seo_sync_core::scheduler::Registry`] and drives it.
//!
//! ## Commands
//! - `sync`: one immediate sync of every source (or one, with `--source`)
//! - `fetch`: one manual fetch of a single variant for one source, then write
//! - `watch`: arm every source's schedule and keep running until Ctrl-C
use crate::load_config::load_config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use seo_sync_core::contract::{FetchMode, SyncOutcome};
use std::path::PathBuf;

/// CLI for seo-sync: publish generated SEO content to disk.
#[derive(Parser)]
#[clap(
    name = "seo-sync",
    version,
    about = "Pull generated sitemap, robots.txt and pages from the content API into a static-asset directory"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronise sources once, right now
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Only synchronise this source id
        #[clap(long)]
        source: Option<String>,
    },
    /// Fetch one content variant for a source and write it
    Fetch {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Source id to fetch for
        #[clap(long)]
        source: String,
        /// new, previous or all
        #[clap(long, default_value = "new")]
        mode: FetchMode,
    },
    /// Run every source on its schedule until interrupted
    Watch {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

fn print_outcome(id: &str, outcome: &SyncOutcome) {
    let status = if outcome.success { "ok" } else { "FAILED" };
    println!("[{status}] {id}: {}", outcome.message);
    for file in &outcome.files_created {
        println!("    + {file}");
    }
    for err in outcome.errors.iter().flatten() {
        println!("    ! {err}");
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sync { config, source } => {
            let config = load_config(config)?;
            let registry = config.build_registry();
            println!("Synchronise starting...");

            let all_succeeded = match source {
                Some(id) => {
                    tracing::info!(command = "sync", source_id = %id, "Synchronising single source");
                    let outcome = registry.sync_one(&id).await?;
                    print_outcome(&id, &outcome);
                    outcome.success
                }
                None => {
                    tracing::info!(command = "sync", "Synchronising all sources");
                    let report = registry.sync_all().await;
                    for entry in &report.sources {
                        print_outcome(&entry.id, &entry.outcome);
                    }
                    report.all_succeeded()
                }
            };

            if all_succeeded {
                println!("Synchronise complete.");
                Ok(())
            } else {
                tracing::error!(command = "sync", "Synchronisation finished with errors");
                Err(anyhow::anyhow!("Synchronisation finished with errors"))
            }
        }
        Commands::Fetch {
            config,
            source,
            mode,
        } => {
            let config = load_config(config)?;
            let registry = config.build_registry();
            tracing::info!(command = "fetch", source_id = %source, ?mode, "Manual fetch");

            let outcome = registry.fetch_and_write(&source, mode).await?;
            print_outcome(&source, &outcome);
            if outcome.success {
                Ok(())
            } else {
                Err(anyhow::anyhow!("Fetch for '{source}' finished with errors"))
            }
        }
        Commands::Watch { config } => {
            let config = load_config(config)?;
            let mut registry = config.build_registry();

            registry.start_all();
            println!(
                "Watching {} source(s) every {}h. Press Ctrl-C to stop.",
                registry.active_ids().len(),
                registry.interval().as_secs() / 3600
            );

            tokio::signal::ctrl_c().await?;
            tracing::info!(command = "watch", "Interrupt received, stopping schedules");
            registry.stop_all();
            println!("Stopped.");
            Ok(())
        }
    }
}
