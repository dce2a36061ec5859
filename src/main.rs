//! ctxtrim - token estimation, cost accounting and history compression for chats
//!
#![doc = "Main entry point for the ctxtrim command-line tool."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ctxtrim::cli::{Cli, Commands};
use ctxtrim::commands;
use ctxtrim::config::Config;
use ctxtrim::metrics;
use ctxtrim::storage::{SqliteStorage, HISTORY_DB_ENV};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);
    metrics::init_metrics_exporter();

    // Mirror a CLI storage override into the environment so
    // `SqliteStorage::new()` picks it up.
    if let Some(db_path) = &cli.storage_path {
        std::env::set_var(HISTORY_DB_ENV, db_path);
        tracing::info!("Using storage DB override: {}", db_path);
    }

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    match cli.command {
        Commands::Import { file } => {
            let storage = SqliteStorage::new()?;
            commands::import::run_import(&storage, &file)?;
        }
        Commands::Chats { json } => {
            let storage = SqliteStorage::new()?;
            commands::inspect::list_chats(&storage, json)?;
        }
        Commands::Tokens { chat_id, json } => {
            let storage = SqliteStorage::new()?;
            commands::inspect::show_tokens(&config, &storage, chat_id, json)?;
        }
        Commands::Cost { chat_id, json } => {
            let storage = SqliteStorage::new()?;
            commands::inspect::show_cost(&config, &storage, chat_id, json)?;
        }
        Commands::Preview {
            chat_id,
            strategy,
            window,
            threshold,
            json,
        } => {
            let storage = SqliteStorage::new()?;
            commands::optimize::run_preview(
                &config,
                &storage,
                chat_id,
                strategy.as_deref(),
                window,
                threshold,
                json,
            )?;
        }
        Commands::Compress {
            chat_id,
            threshold,
            json,
        } => {
            let storage = SqliteStorage::new()?;
            commands::optimize::run_compress(&config, &storage, chat_id, threshold, json).await?;
        }
        Commands::Pricing {
            provider,
            model,
            json,
        } => {
            commands::pricing::show_pricing(&config, provider.as_deref(), model.as_deref(), json)?;
        }
    }

    Ok(())
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "ctxtrim=debug" } else { "ctxtrim=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
