//! Replikk CLI entry point.

use anyhow::Result;
use clap::Parser;
use replikk::cli::{commands, Cli, Commands};
use replikk::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("replikk={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure the data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Ingest {
            path,
            corpus,
            version,
            force,
        } => {
            commands::run_ingest(path, corpus.clone(), version.clone(), *force, settings).await?;
        }

        Commands::Ask { question, steps } => {
            commands::run_ask(question, *steps, settings).await?;
        }

        Commands::Search {
            query,
            limit,
            speaker,
            scene,
        } => {
            commands::run_search(query, *limit, speaker.clone(), scene.clone(), settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
