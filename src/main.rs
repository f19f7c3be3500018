use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spec_orchestrator::{
    config::{Config, LogFormat},
    generator::HttpGenerator,
    orchestrator::{EngineServer, EngineState},
    storage::SqliteStorage,
};

/// Specification orchestration engine over stdio.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Override the database path from the environment.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Override the log level from the environment.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(database) = cli.database {
        config.database.path = database;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Specification orchestration engine starting..."
    );

    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    let generator = match HttpGenerator::new(&config.generator, config.request.clone()) {
        Ok(g) => {
            info!(base_url = %config.generator.base_url, "Generator client initialized");
            g
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize generator client");
            return Err(e.into());
        }
    };

    let state = Arc::new(EngineState::new(config, storage, Arc::new(generator)));
    let server = EngineServer::new(state);

    info!("Engine ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Engine shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
