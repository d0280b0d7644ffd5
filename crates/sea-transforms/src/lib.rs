//! Implementations of the preprocessing stages over `sea_core::ir`.
//!
//! Every stage is a [`ModulePass`]; the pipeline crate decides the order.

pub mod analysis;
pub mod context;
pub mod error;
pub mod passes;
pub mod util;

pub use context::{ModulePass, PassContext};
pub use error::{Result, TransformError};
pub use passes::*;
