//! timegap CLI: the main entry point.
//!
//! Commands:
//! - `run`      Find untracked gaps and consolidate them interactively
//! - `gaps`     List untracked gaps without consolidating
//! - `doctor`   Diagnose configuration and service reachability
//! - `onboard`  Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod export;
mod pipeline;
mod render;
mod snapshot;

use commands::WindowArgs;

#[derive(Parser)]
#[command(
    name = "timegap",
    about = "timegap: find untracked time and turn it into time entries",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect gaps in the window and consolidate each one interactively
    Run {
        #[command(flatten)]
        window: WindowArgs,

        /// Write validated blocks to this file as a JSON array
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after listing gaps; never contact the consolidation service
        #[arg(long)]
        skip_llm: bool,

        /// Override the consolidation model
        #[arg(short, long)]
        model: Option<String>,

        /// Override the minimum activity duration (minutes)
        #[arg(long)]
        min_duration: Option<u32>,
    },

    /// List untracked gaps in the window
    Gaps {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Diagnose configuration and service reachability
    Doctor,

    /// Initialize configuration
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they stay out of the interactive prompt
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            window,
            output,
            skip_llm,
            model,
            min_duration,
        } => {
            let options = commands::run::RunOptions {
                window,
                output,
                skip_llm,
                model,
                min_duration,
            };
            commands::run::run(options).await?
        }
        Commands::Gaps { window } => commands::gaps::run(window).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Onboard => commands::onboard::run().await?,
    }

    Ok(())
}
