use std::path::PathBuf;

use thiserror::Error;

use crate::smtlib::SmtParseError;

#[derive(Debug, Error)]
pub enum AevalError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: SmtParseError,
    },
    #[error("expected two `.smt2` formula files (S-part, then T-part), found {found}")]
    MissingFormula { found: usize },
    #[error("no solver configured; pass --solver or set AEVAL_SOLVER")]
    NoSolver,
    #[error("failed to run solver `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("partition self-check failed: {0}")]
    SelfCheck(String),
}

pub type Result<T> = std::result::Result<T, AevalError>;
