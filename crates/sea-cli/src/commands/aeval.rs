use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use sea_aeval::{load_formulas, solve, AevalError, CommandSolver, SolverMode};
use tracing::info;

use crate::{CliError, Result};

#[derive(Debug, Clone, Args)]
pub struct AevalArgs {
    /// Formula files: the first `.smt2` is the S-part, the second the T-part
    #[arg(required = true, value_name = "FILE")]
    pub formulas: Vec<PathBuf>,

    /// Extract a skolem witness
    #[arg(long)]
    pub skol: bool,

    /// All-inclusive skolemization (ignores --skol and --split)
    #[arg(long = "all-inclusive")]
    pub all_inclusive: bool,

    /// Compact output
    #[arg(long)]
    pub compact: bool,

    /// Verbose solving with internal self-checks
    #[arg(long)]
    pub debug: bool,

    /// Split the skolem into per-variable functions
    #[arg(long)]
    pub split: bool,

    /// Solver command line
    #[arg(long, env = "AEVAL_SOLVER", value_name = "CMD")]
    pub solver: Option<String>,

    /// Print the discovered variable partition and exit
    #[arg(long = "print-partition")]
    pub print_partition: bool,
}

impl AevalArgs {
    fn mode(&self) -> SolverMode {
        SolverMode {
            skolem: self.skol,
            all_inclusive: self.all_inclusive,
            compact: self.compact,
            debug: self.debug,
            split: self.split,
        }
    }
}

/// Returns the exit status to finish with: the solver's own when it ran.
pub fn aeval_command(args: &AevalArgs) -> Result<i32> {
    let formulas = load_formulas(&args.formulas)?;
    if args.print_partition {
        println!("{}", formulas.partition);
        return Ok(0);
    }
    let solver = args
        .solver
        .as_deref()
        .and_then(CommandSolver::from_command_line)
        .ok_or(AevalError::NoSolver)?;
    let outcome = solve(&formulas, args.mode(), &solver)?;

    relay(&mut std::io::stdout().lock(), &outcome.stdout)?;
    relay(&mut std::io::stderr().lock(), &outcome.stderr)?;
    info!(status = outcome.status, "solver exited");
    Ok(outcome.status)
}

fn relay(stream: &mut impl Write, bytes: &[u8]) -> Result<()> {
    stream
        .write_all(bytes)
        .and_then(|()| stream.flush())
        .map_err(CliError::Relay)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn closed_stream_is_an_error() {
        let err = relay(&mut Closed, b"valid\n").unwrap_err();
        assert!(matches!(err, CliError::Relay(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn bytes_are_copied_unchanged() {
        let mut sink = Vec::new();
        relay(&mut sink, b"sat\n\xff(model)").unwrap();
        assert_eq!(sink, b"sat\n\xff(model)");
    }
}
