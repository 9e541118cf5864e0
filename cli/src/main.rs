//! CLI for Serialguard
//!
//! Operator tool for deserialization filter policies:
//! - validate: Compile a pattern string and show its rules and limits
//! - check: Evaluate classes against a pattern
//! - replay: Drive a stream filter with a recorded event script

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "serialguard")]
#[command(about = "Serialguard - deserialization filter policies", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a pattern string and print its rules and limits
    Validate(commands::validate::ValidateArgs),

    /// Evaluate classes against a pattern
    Check(commands::check::CheckArgs),

    /// Replay a JSON event script through a stream filter
    Replay(commands::replay::ReplayArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Replay(args) => commands::replay::run(args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
