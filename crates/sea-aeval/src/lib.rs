//! Existential-elimination driver.
//!
//! Reads the S-part and T-part of `forall x. S(x) => exists y. T(x, y)` from
//! two SMT-LIB2 scripts, discovers the `x`/`y` partition from the symbols
//! each script mentions and hands everything to a [`SkolemSolver`].

pub mod driver;
pub mod error;
pub mod partition;
pub mod smtlib;
pub mod solver;

pub use driver::{load_formulas, solve, Formulas};
pub use error::{AevalError, Result};
pub use partition::{assign_roles, FormulaRoles, VariablePartition};
pub use smtlib::{parse_script, SExpr, Script, SmtParseError};
pub use solver::{CommandSolver, SkolemSolver, SolveRequest, SolverMode, SolverOutcome};
