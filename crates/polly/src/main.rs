mod commands;

use std::net::IpAddr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use polly::config::DEFAULT_CONFIG_FILE;

use commands::Overrides;

// ============================================================================
// CLI Types
// ============================================================================

/// Polly - catalog backend with generic storage and leader-gated jobs
#[derive(Parser, Debug)]
#[command(version = polly::build_info::version_string(), about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server and the scheduled jobs
    Serve {
        #[command(subcommand)]
        action: Option<ServeAction>,

        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
        config: String,

        /// Host to bind to (overrides config file)
        #[arg(long, global = true)]
        host: Option<IpAddr>,

        /// Port to listen on (overrides config file)
        #[arg(short, long, global = true)]
        port: Option<u16>,

        /// Database URL (overrides config file)
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },

    /// Clear an application state lock left behind by a crashed job
    UnlockAppState {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Database URL (overrides config file)
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,

        /// User ident recorded in the audit columns
        #[arg(long)]
        actor: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ServeAction {
    /// Stop a running server
    Stop,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            action,
            config,
            host,
            port,
            database_url,
        } => match action {
            Some(ServeAction::Stop) => commands::serve::stop(&config, port).await,
            None => {
                let overrides = Overrides {
                    host,
                    port,
                    database_url,
                };
                commands::serve::run(&config, overrides).await
            }
        },
        Commands::UnlockAppState {
            config,
            database_url,
            actor,
        } => commands::unlock::run(&config, database_url, actor).await,
    }
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
