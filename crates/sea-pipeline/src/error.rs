use sea_core::ir::layout::LayoutError;
use sea_transforms::{TransformError, VerificationError};
use thiserror::Error;

use crate::catalog::Property;

/// Why a single stage did not produce a module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[{stage}] {source}")]
    Stage {
        stage: &'static str,
        index: usize,
        #[source]
        source: TransformError,
    },
    #[error("[verify] {0}")]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl PipelineError {
    pub fn from_stage(stage: &'static str, index: usize, failure: StageFailure) -> Self {
        match failure {
            StageFailure::Transform(source) => PipelineError::Stage {
                stage,
                index,
                source,
            },
            StageFailure::Verification(err) => PipelineError::Verification(err),
        }
    }

    /// Name of the stage that failed, if a stage failed.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            PipelineError::Stage { stage, .. } => Some(stage),
            PipelineError::Verification(_) => Some("verify"),
            PipelineError::Layout(_) => None,
        }
    }
}

/// A stage order that breaks a catalog contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("stage {index} `{stage}` requires `{property}`, which does not hold")]
    Unsatisfied {
        index: usize,
        stage: &'static str,
        property: Property,
    },
    #[error("stage {index} `{stage}` is not repeatable but already ran")]
    Repeated { index: usize, stage: &'static str },
    #[error("stage {index} `{stage}` runs before `nondet-init` resolves the undef left by `{introduced_by}`")]
    UndefNotResolved {
        index: usize,
        stage: &'static str,
        introduced_by: &'static str,
    },
    #[error("the pipeline must end with exactly one `verify`")]
    VerifyNotLast,
}
