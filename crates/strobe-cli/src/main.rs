//! Strobe host harness
//!
//! Runs the timer scheduler on the host with a handful of counting callbacks and
//! reports what happened, or prints the effective configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use strobe_cli::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strobe")]
#[command(about = "Periodic timer scheduler harness", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler for a while and print statistics
    Run {
        /// Configuration file (strobe.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// How long to run, in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        duration_ms: u16,
        /// Number of counting timer callbacks to register
        #[arg(short, long, default_value_t = 4)]
        timers: usize,
        /// Suspend timers every N milliseconds of running time (0 disables)
        #[arg(long, default_value_t = 0)]
        suspend_every_ms: u16,
        /// How long each suspension lasts, in milliseconds
        #[arg(long, default_value_t = 2)]
        suspend_for_ms: u16,
        /// Shortest delay that services the delay callback
        #[arg(long, default_value_t = 5)]
        delay_callback_min_ms: u16,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file (strobe.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            duration_ms,
            timers,
            suspend_every_ms,
            suspend_for_ms,
            delay_callback_min_ms,
        } => commands::run::execute(commands::run::RunOptions {
            config,
            duration_ms,
            timers,
            suspend_every_ms,
            suspend_for_ms,
            delay_callback_min_ms,
        }),

        Commands::Config { config } => commands::config::execute(config.as_deref()),
    }
}
