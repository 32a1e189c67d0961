//! Incident responder CLI.
//!
//! Runs the webhook server, prepares the incident database, or sends sample
//! alerts to a running server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use responder::server::{run_server, ServerState};
use responder::store::schema::TEXT_SEARCH_TABLE;
use responder::store::sqlite::expected_indexes;
use responder::store::SqliteIncidentStore;
use responder::ResponderConfig;

/// Incident responder - AI-assisted first-pass triage for monitoring alerts
#[derive(Parser)]
#[command(name = "incident-responder")]
#[command(about = "AI-assisted first-pass triage for monitoring alerts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum LogFormat {
    Json,
    #[default]
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        #[command(flatten)]
        config: ResponderConfig,
    },
    /// Create the incident database with its indexes
    SetupStore {
        /// SQLite database file
        #[arg(long, env = "DATABASE_PATH")]
        database_path: PathBuf,
    },
    /// Send sample alerts to a running server and print the analyses
    SendTestAlert {
        /// Base URL of the responder
        #[arg(long, env = "RESPONDER_URL", default_value = "http://localhost:8000")]
        url: String,

        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

fn init_tracing(format: LogFormat, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("responder=debug,notify=debug,tower_http=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    match cli.command {
        Commands::Serve { config } => {
            let orchestrator = config.build_orchestrator()?;
            let state = Arc::new(ServerState::new(orchestrator));
            run_server(state, &config.bind_addr).await
        }
        Commands::SetupStore { database_path } => {
            let store = SqliteIncidentStore::open(&database_path)?;
            let indexes = store.index_names().await?;
            info!(path = %database_path.display(), "Incident database ready");

            for expected in expected_indexes() {
                let mark = if indexes.iter().any(|name| name == expected) {
                    "✓".green()
                } else {
                    "✗".red()
                };
                println!("{mark} {expected}");
            }
            println!("{} {TEXT_SEARCH_TABLE} (full text)", "✓".green());
            Ok(())
        }
        Commands::SendTestAlert { url, timeout } => {
            responder::smoke::send_test_alerts(&url, Duration::from_secs(timeout)).await
        }
    }
}
