//! Prefill CLI - Headless driver for the buffer-forcing controller
//!
//! Features:
//! - Run the controller against a simulated player cache
//! - Inspect the seek step the planner would choose
//! - Print the default controller configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// Prefill CLI - Buffer-forcing toolkit
#[derive(Parser)]
#[command(name = "prefill")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Drive and inspect the Prefill buffer-forcing controller", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Buffer a simulated asset and print controller events
    Simulate {
        /// Asset duration in seconds
        #[arg(short, long, default_value = "600")]
        duration: f64,

        /// Cache fill rate in media-seconds per second
        #[arg(short, long, default_value = "20")]
        rate: f64,

        /// How far past the cursor the cache will fetch, in seconds
        #[arg(short, long, default_value = "10")]
        lookahead: f64,

        /// Initial quality label
        #[arg(short, long)]
        quality: Option<String>,

        /// Switch quality after this many seconds
        #[arg(long)]
        quality_switch_at: Option<f64>,

        /// Quality label to switch to
        #[arg(long, default_value = "1080p")]
        switch_to: String,

        /// Controller configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Give up after this many seconds
        #[arg(short, long, default_value = "300")]
        timeout: u64,
    },

    /// Show the seek step for an asset
    Plan {
        /// Asset duration in seconds
        #[arg(short, long)]
        duration: f64,

        /// Measured throughput in media-seconds per second
        #[arg(short, long, default_value = "0")]
        throughput: f64,

        /// Strategy step multiplier
        #[arg(short, long, default_value = "1.0")]
        multiplier: f64,

        /// Treat the asset as short-form
        #[arg(long)]
        short: bool,
    },

    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(level).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(level).init();
    }
    prefill_core::init();

    match cli.command {
        Commands::Simulate {
            duration,
            rate,
            lookahead,
            quality,
            quality_switch_at,
            switch_to,
            config,
            timeout,
        } => {
            let args = commands::SimulateArgs {
                duration,
                rate,
                lookahead,
                quality,
                quality_switch_at,
                switch_to,
                config,
                timeout,
            };
            commands::simulate(args, &cli.format).await?;
        }
        Commands::Plan { duration, throughput, multiplier, short } => {
            commands::plan(duration, throughput, multiplier, short, &cli.format).await?;
        }
        Commands::Config => {
            commands::show_config(&cli.format)?;
        }
    }

    Ok(())
}
