//! Stage catalog, pipeline construction and execution.
//!
//! A [`Configuration`] is turned into a [`PipelineInstance`] by
//! [`PipelineBuilder::for_configuration`]; an [`Executor`] then threads one
//! module through the instance.

pub mod builder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod instance;

pub use builder::PipelineBuilder;
pub use catalog::{Property, Stage, StageContract};
pub use config::Configuration;
pub use error::{ContractViolation, PipelineError, StageFailure};
pub use executor::{run_pipeline, Execution, Executor, StageReport};
pub use instance::PipelineInstance;
pub use sea_transforms::SroaThresholds;
