//! Send Token - ERC-20 transfer workflow from the terminal
//!
//! # WARNING
//! - Transfers are real on-chain transactions. Use `--dry-run` to try the flow.
//! - The signing key is read from the environment; keep it out of config files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use send_token::cli::commands;
use send_token::config::Config;

/// Send Token - transfer ERC-20 tokens through a guided workflow
#[derive(Parser)]
#[command(name = "send-token")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "send-token.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive send form
    Send {
        /// Use a simulated wallet (no real transactions)
        #[arg(long)]
        dry_run: bool,
    },

    /// Send one transfer without prompting
    Transfer {
        /// Recipient 0x address
        #[arg(long)]
        to: String,

        /// Amount in token units, e.g. 12.5
        #[arg(long)]
        amount: f64,

        /// Use a simulated wallet (no real transactions)
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect the wallet and show the token balance
    Balance {
        /// Use a simulated wallet
        #[arg(long)]
        dry_run: bool,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Logs go to stderr so they do not interleave with the form
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("send_token=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Send { dry_run } => commands::send(&config, dry_run).await,
        Commands::Transfer {
            to,
            amount,
            dry_run,
            json,
        } => commands::transfer(&config, &to, amount, dry_run, json).await,
        Commands::Balance { dry_run } => commands::balance(&config, dry_run).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
