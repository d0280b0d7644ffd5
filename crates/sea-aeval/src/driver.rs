use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{AevalError, Result};
use crate::partition::{assign_roles, FormulaRoles, VariablePartition};
use crate::smtlib::{parse_script, Script};
use crate::solver::{SkolemSolver, SolveRequest, SolverMode, SolverOutcome};

/// Both parts of the formula, parsed, with the partition derived from them.
#[derive(Debug, Clone)]
pub struct Formulas {
    pub roles: FormulaRoles,
    pub s: Script,
    pub t: Script,
    pub partition: VariablePartition,
}

fn read_script(path: &Path) -> Result<Script> {
    let text = fs::read_to_string(path).map_err(|source| AevalError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&text).map_err(|source| AevalError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_formulas<I, P>(args: I) -> Result<Formulas>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let roles = assign_roles(args)?;
    info!(s = %roles.s.display(), t = %roles.t.display(), "loading formulas");
    let s = read_script(&roles.s)?;
    let t = read_script(&roles.t)?;
    let partition = VariablePartition::discover(&s, &t);
    Ok(Formulas {
        roles,
        s,
        t,
        partition,
    })
}

pub fn solve(
    formulas: &Formulas,
    mode: SolverMode,
    solver: &dyn SkolemSolver,
) -> Result<SolverOutcome> {
    let mode = mode.normalized();
    if mode.debug {
        formulas.partition.self_check(&formulas.s, &formulas.t)?;
        debug!("partition self-check passed");
    }
    let request = SolveRequest {
        s: &formulas.roles.s,
        t: &formulas.roles.t,
        partition: &formulas.partition,
        mode,
    };
    solver.solve(&request)
}

impl Formulas {
    pub fn paths(&self) -> [&PathBuf; 2] {
        [&self.roles.s, &self.roles.t]
    }
}
