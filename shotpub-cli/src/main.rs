//! Shotpub CLI - batch publish runner.
//!
//! Drives the shotpub library from the command line: collects files into
//! a publish tree, runs the validate/publish/finalize passes and reports
//! the outcome. Ctrl-C requests cooperative cancellation; the run stops
//! at the next task boundary.

mod commands;
mod error;

use std::process;

use clap::{Parser, Subcommand};
use shotpub::engine::CancelFlag;
use tracing::warn;

use commands::{collect, run, tree};
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "shotpub", version, about = "Batch publish runner")]
struct Cli {
    /// Also write logs to <DIR>/shotpub.log
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect items and run validate, publish and finalize
    Run(run::RunArgs),
    /// Collect items and print the resulting tree without executing
    Collect(collect::CollectArgs),
    /// Show a saved publish tree file
    Tree(tree::TreeArgs),
}

fn main() {
    let cli = Cli::parse();

    let _guard = match &cli.log_dir {
        Some(dir) => match shotpub::logging::init_logging(dir, "shotpub.log") {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Failed to initialize file logging: {}", e);
                process::exit(1);
            }
        },
        None => shotpub::logging::init_console_logging(),
    };

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            warn!("cancellation requested, stopping at the next task");
            cancel.cancel();
        }) {
            warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    let result = match cli.command {
        Commands::Run(args) => run::run(args, cancel),
        Commands::Collect(args) => collect::run(args, cancel),
        Commands::Tree(args) => tree::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = match e {
            CliError::PublishFailed { .. } => 2,
            _ => 1,
        };
        process::exit(code);
    }
}
