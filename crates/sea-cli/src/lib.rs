//! Command-line front ends: `seapp` prepares a module for verification,
//! `aeval` drives existential elimination over two SMT-LIB2 formulas.

pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod logging;
pub mod output;

pub mod error {
    use std::path::PathBuf;

    use miette::Diagnostic;
    use sea_aeval::AevalError;
    use sea_core::ir::io::ModuleIoError;
    use sea_core::ir::layout::LayoutError;
    use sea_pipeline::PipelineError;
    use thiserror::Error;

    #[derive(Error, Debug, Diagnostic)]
    pub enum CliError {
        #[error("cannot read input module {}", path.display())]
        #[diagnostic(
            code(seapp::input_parse),
            help("inputs are JSON modules or binary modules written by seapp")
        )]
        InputParse {
            path: PathBuf,
            #[source]
            source: ModuleIoError,
        },

        #[error("cannot open output {}", path.display())]
        #[diagnostic(code(seapp::output_open))]
        OutputOpen {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },

        #[error("cannot write output {}", path.display())]
        #[diagnostic(code(seapp::output_write))]
        OutputWrite {
            path: PathBuf,
            #[source]
            source: ModuleIoError,
        },

        #[error("{0}")]
        #[diagnostic(code(seapp::stage_failure))]
        StageFailure(PipelineError),

        #[error("{0}")]
        #[diagnostic(
            code(seapp::verification_failure),
            help("a stage left the module ill-formed")
        )]
        VerificationFailure(PipelineError),

        #[error("module declares an unusable data layout")]
        #[diagnostic(code(seapp::module_layout))]
        ModuleLayout(#[source] LayoutError),

        #[error("invalid --default-data-layout")]
        #[diagnostic(code(seapp::default_layout))]
        DefaultLayout(#[source] LayoutError),

        #[error("Configuration error: {0}")]
        #[diagnostic(code(seapp::config))]
        Config(String),

        #[error("{0}")]
        #[diagnostic(code(aeval::formula_input))]
        FormulaInput(AevalError),

        #[error("{0}")]
        #[diagnostic(code(aeval::no_solver), help("pass --solver <cmd> or set AEVAL_SOLVER"))]
        NoSolver(AevalError),

        #[error("{0}")]
        #[diagnostic(code(aeval::solver))]
        Solver(AevalError),

        #[error("cannot relay solver output")]
        #[diagnostic(code(aeval::relay))]
        Relay(#[source] std::io::Error),
    }

    impl CliError {
        /// Process exit status for this failure.
        pub fn exit_code(&self) -> i32 {
            match self {
                CliError::InputParse { .. }
                | CliError::OutputOpen { .. }
                | CliError::ModuleLayout(_)
                | CliError::FormulaInput(_) => 3,
                CliError::DefaultLayout(_) | CliError::Config(_) | CliError::NoSolver(_) => 2,
                CliError::OutputWrite { .. }
                | CliError::StageFailure(_)
                | CliError::VerificationFailure(_)
                | CliError::Solver(_)
                | CliError::Relay(_) => 1,
            }
        }
    }

    impl From<PipelineError> for CliError {
        fn from(err: PipelineError) -> Self {
            match err {
                PipelineError::Layout(layout) => CliError::ModuleLayout(layout),
                err @ PipelineError::Verification(_) => CliError::VerificationFailure(err),
                err @ PipelineError::Stage { .. } => CliError::StageFailure(err),
            }
        }
    }

    impl From<AevalError> for CliError {
        fn from(err: AevalError) -> Self {
            match err {
                AevalError::Read { .. }
                | AevalError::Parse { .. }
                | AevalError::MissingFormula { .. } => CliError::FormulaInput(err),
                AevalError::NoSolver => CliError::NoSolver(err),
                AevalError::Spawn { .. } | AevalError::SelfCheck(_) => CliError::Solver(err),
            }
        }
    }

    pub type Result<T> = std::result::Result<T, CliError>;

}

pub use error::{CliError, Result};
