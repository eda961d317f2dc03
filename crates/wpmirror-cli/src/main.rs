//! wpmirror CLI
//!
//! Command-line interface for wpmirror - mirrors a WordPress site's posts
//! and serves them to WebSocket clients.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wpmirror_core::Config;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "wpmirror")]
#[command(about = "wpmirror - Incremental WordPress post mirror with WebSocket fan-out")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (defaults to ~/.config/wpmirror/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror the remote and serve WebSocket clients (default)
    Serve,
    /// Fetch one page from the remote and print it
    Probe {
        /// Page number (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config display reports its own load errors
    if let Some(Commands::Config { command }) = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => {
                commands::config::show(cli.config.as_ref(), &output)
            }
        };
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve::run(&config, &output).await,
        Commands::Probe { page } => commands::probe::run(&config, page, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Initialize stderr logging
///
/// `RUST_LOG` wins over `--verbose`, which wins over `log_level` from config.
fn init_logging(config: &Config, verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { config.log_level.as_str() };
        EnvFilter::new(format!("wpmirror_core={},wpmirror_cli={}", level, level))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
