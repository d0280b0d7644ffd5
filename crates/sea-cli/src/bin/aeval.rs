//! aeval: existential elimination for `forall x. S(x) => exists y. T(x, y)`.
//!
//! ```bash
//! AEVAL_SOLVER=z3-aeval aeval s.smt2 t.smt2 --skol
//! aeval s.smt2 t.smt2 --print-partition
//! ```

use clap::Parser;
use sea_cli::{
    commands::{aeval::AevalArgs, aeval_command},
    diagnostics::{report, setup_error_reporting},
    logging::{setup_logging, LogFormat},
    Result,
};

#[derive(Parser)]
#[command(
    name = "aeval",
    version = env!("CARGO_PKG_VERSION"),
    about = "Partition two SMT-LIB2 formulas and hand them to a skolemizing solver"
)]
struct Cli {
    #[command(flatten)]
    args: AevalArgs,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(cli: &Cli) -> Result<i32> {
    setup_error_reporting()?;
    setup_logging(cli.verbose, false, LogFormat::Pretty)?;
    aeval_command(&cli.args)
}

fn main() {
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(status) => status,
        Err(e) => report(e, cli.verbose),
    };
    std::process::exit(code);
}
