use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cp7_recon::{
    AppConfig, BatchPersister, HttpLookupClient, PersistStatus, Reconciler, TableStore,
    import::import_table,
    web::{AppState, StoreRepository, build_router},
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cp7-recon", version, about = "Postal code reconciliation and lookup service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up every code in the source file and replace the result tables
    Sync {
        /// Directory searched for the source file
        #[arg(long)]
        source_dir: Option<PathBuf>,
        /// Glob pattern of the source file inside the directory
        #[arg(long)]
        pattern: Option<String>,
    },
    /// Serve the reconciled codes over HTTP
    Serve,
    /// Load a CSV file into a table, replacing its content
    Import {
        /// Destination table
        #[arg(long)]
        table: String,
        /// CSV file to load
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load application configuration")?;

    let store = Arc::new(
        TableStore::open(&config.store_path)
            .with_context(|| format!("failed to open store {}", config.store_path.display()))?,
    );

    match cli.command {
        Command::Sync {
            source_dir,
            pattern,
        } => {
            if let Some(dir) = source_dir {
                config.source.dir = dir;
            }
            if let Some(pattern) = pattern {
                config.source.pattern = pattern;
            }

            let lookup = Arc::new(
                HttpLookupClient::new(config.base_url()?).context("failed to build lookup client")?,
            );
            let reconciler = Reconciler::new(&config, lookup, store);
            let summary = reconciler.run().await.context("reconciliation failed")?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Serve => {
            let repo = Arc::new(StoreRepository::new(store, config.serve_table.clone()));
            let app = build_router(AppState::new(repo));

            let addr = config.address();
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind to {addr}"))?;

            info!(address = %addr, table = %config.serve_table, "postal code service started");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")?;
        }
        Command::Import { table, file } => {
            let persister = BatchPersister::new(store);
            let report = import_table(&file, config.source.delimiter, &table, &persister)
                .await
                .with_context(|| format!("failed to import {}", file.display()))?;

            if let PersistStatus::Failed { reason } = &report.status {
                anyhow::bail!("failed to write table {table}: {reason}");
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cp7_recon=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
