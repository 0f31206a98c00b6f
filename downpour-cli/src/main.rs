//! Downpour CLI - command-line interface to the download engine.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "downpour", version, about = "Resumable background file downloads")]
struct Cli {
    /// Write logs to this directory instead of stderr.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a file, resuming any partial download at the destination.
    Fetch(commands::fetch::FetchArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = downpour::log::init(cli.log_dir.as_deref());

    match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args),
    }
}
