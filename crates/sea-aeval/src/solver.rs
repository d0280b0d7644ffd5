use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use itertools::Itertools;
use tracing::{debug, info};

use crate::error::{AevalError, Result};
use crate::partition::VariablePartition;

/// Flags forwarded to the solving back end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverMode {
    /// Emit a skolem witness.
    pub skolem: bool,
    pub all_inclusive: bool,
    pub compact: bool,
    pub debug: bool,
    pub split: bool,
}

impl SolverMode {
    /// All-inclusive skolemization has no separate skolem or split variants.
    pub fn normalized(self) -> Self {
        if !self.all_inclusive || !(self.skolem || self.split) {
            return self;
        }
        debug!("--skol and --split have no effect with --all-inclusive");
        Self {
            skolem: false,
            split: false,
            ..self
        }
    }

    pub fn flags(&self) -> Vec<&'static str> {
        [
            (self.skolem, "--skol"),
            (self.all_inclusive, "--all-inclusive"),
            (self.compact, "--compact"),
            (self.debug, "--debug"),
            (self.split, "--split"),
        ]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect()
    }
}

pub struct SolveRequest<'a> {
    pub s: &'a Path,
    pub t: &'a Path,
    pub partition: &'a VariablePartition,
    pub mode: SolverMode,
}

/// What the back end produced, relayed to the caller unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverOutcome {
    pub status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

pub trait SkolemSolver {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<SolverOutcome>;
}

/// Runs an external program as
/// `<program> [args] [mode flags] --x-vars a,b --y-vars c <S> <T>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSolver {
    program: String,
    args: Vec<String>,
}

impl CommandSolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Splits a command line such as `"z3-aeval --timeout 10"` on whitespace.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self, request: &SolveRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.extend(request.mode.flags().into_iter().map(OsString::from));
        args.push("--x-vars".into());
        args.push(request.partition.x_vars.iter().join(",").into());
        args.push("--y-vars".into());
        args.push(request.partition.y_vars.iter().join(",").into());
        args.push(request.s.into());
        args.push(request.t.into());
        args
    }
}

impl SkolemSolver for CommandSolver {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<SolverOutcome> {
        let args = self.arguments(request);
        info!(program = %self.program, args = ?args, "running solver");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| AevalError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        // killed by a signal
        let status = output.status.code().unwrap_or(1);
        debug!(status, "solver finished");
        Ok(SolverOutcome {
            status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn all_inclusive_drops_skolem_and_split() {
        let mode = SolverMode {
            skolem: true,
            all_inclusive: true,
            split: true,
            ..SolverMode::default()
        };
        assert_eq!(mode.normalized().flags(), vec!["--all-inclusive"]);
        let plain = SolverMode {
            skolem: true,
            split: true,
            ..SolverMode::default()
        };
        assert_eq!(plain.normalized(), plain);
    }

    #[test]
    fn arguments_carry_partition_and_files() {
        let partition = VariablePartition {
            x_vars: vec!["x1".to_string(), "x2".to_string()],
            y_vars: vec!["y1".to_string()],
        };
        let request = SolveRequest {
            s: Path::new("s.smt2"),
            t: Path::new("t.smt2"),
            partition: &partition,
            mode: SolverMode {
                compact: true,
                ..SolverMode::default()
            },
        };
        let solver = CommandSolver::from_command_line("solve --fast").unwrap();
        assert_eq!(solver.program(), "solve");
        let args: Vec<String> = solver
            .arguments(&request)
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--fast", "--compact", "--x-vars", "x1,x2", "--y-vars", "y1", "s.smt2", "t.smt2"
            ]
        );
        assert!(CommandSolver::from_command_line("   ").is_none());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let partition = VariablePartition::default();
        let request = SolveRequest {
            s: Path::new("s.smt2"),
            t: Path::new("t.smt2"),
            partition: &partition,
            mode: SolverMode::default(),
        };
        let err = CommandSolver::new("/nonexistent/aeval-backend")
            .solve(&request)
            .unwrap_err();
        assert!(matches!(err, AevalError::Spawn { .. }));
    }
}
