//! seapp: prepare a program module for verification.
//!
//! ```bash
//! # Normalize only
//! seapp input.json -o prepared.bc
//!
//! # Inline everything, add bounds and overflow checks, print the listing
//! seapp input.json --horn-inline-all --boc --ioc -S -o prepared.ll
//! ```

use std::path::PathBuf;

use clap::Parser;
use sea_cli::{
    commands::{preprocess::PreprocessArgs, preprocess_command},
    config::SeappConfigFile,
    diagnostics::{report, setup_error_reporting},
    logging::{setup_logging, LogFormat},
    Result,
};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "seapp",
    version = env!("CARGO_PKG_VERSION"),
    about = "Normalize and instrument a program module for verification"
)]
struct Cli {
    #[command(flatten)]
    args: PreprocessArgs,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    quiet: bool,

    /// Set log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Configuration file with a [pipeline] table
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn run(cli: &Cli) -> Result<()> {
    setup_error_reporting()?;
    setup_logging(cli.verbose, cli.quiet, cli.log_format)?;
    let file = SeappConfigFile::load(cli.config.as_deref())?;
    preprocess_command(&cli.args, &file)
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => {
            if cli.verbose > 0 {
                info!("Command completed successfully");
            }
        }
        Err(e) => std::process::exit(report(e, cli.verbose)),
    }
}
