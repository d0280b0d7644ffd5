//! Command implementations behind the `seapp` and `aeval` binaries.

pub mod aeval;
pub mod preprocess;

pub use aeval::aeval_command;
pub use preprocess::preprocess_command;
