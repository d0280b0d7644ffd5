use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::{debug, warn};

use crate::error::{AevalError, Result};
use crate::smtlib::Script;

const FORMULA_EXTENSION: &str = ".smt2";

/// Which file holds which part of the formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaRoles {
    pub s: PathBuf,
    pub t: PathBuf,
}

/// Among all arguments ending in `.smt2`, the first is the S-part and the
/// second the T-part, wherever they appear on the command line. Further
/// formula arguments are ignored.
pub fn assign_roles<I, P>(args: I) -> Result<FormulaRoles>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let formulas: Vec<PathBuf> = args
        .into_iter()
        .map(|arg| arg.as_ref().to_path_buf())
        .filter(|path| path.to_string_lossy().ends_with(FORMULA_EXTENSION))
        .collect();
    match formulas.as_slice() {
        [s, t, rest @ ..] => {
            if !rest.is_empty() {
                warn!(
                    ignored = %rest.iter().map(|path| path.display()).join(", "),
                    "more than two formula files given"
                );
            }
            Ok(FormulaRoles {
                s: s.clone(),
                t: t.clone(),
            })
        }
        _ => Err(AevalError::MissingFormula {
            found: formulas.len(),
        }),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariablePartition {
    /// Free symbols of S.
    pub x_vars: Vec<String>,
    /// Free symbols of T that S does not mention.
    pub y_vars: Vec<String>,
}

impl VariablePartition {
    pub fn discover(s: &Script, t: &Script) -> Self {
        let x_vars = s.free_symbols();
        let universal: HashSet<&str> = x_vars.iter().map(String::as_str).collect();
        let y_vars = t
            .free_symbols()
            .into_iter()
            .filter(|name| !universal.contains(name.as_str()))
            .collect();
        let partition = Self { x_vars, y_vars };
        debug!(x = ?partition.x_vars, y = ?partition.y_vars, "discovered partition");
        partition
    }

    /// Sanity checks run in debug mode: the two sets are disjoint, together
    /// they cover every free symbol of T, and a symbol shared by S and T has
    /// the same sort in both.
    pub fn self_check(&self, s: &Script, t: &Script) -> Result<()> {
        let x: HashSet<&str> = self.x_vars.iter().map(String::as_str).collect();
        let y: HashSet<&str> = self.y_vars.iter().map(String::as_str).collect();
        if let Some(shared) = x.intersection(&y).sorted().next() {
            return Err(AevalError::SelfCheck(format!(
                "`{}` is both universal and existential",
                shared
            )));
        }
        for name in t.free_symbols() {
            if !x.contains(name.as_str()) && !y.contains(name.as_str()) {
                return Err(AevalError::SelfCheck(format!(
                    "`{}` occurs in T but is not partitioned",
                    name
                )));
            }
            if let (Some(in_s), Some(in_t)) = (s.constant_sort(&name), t.constant_sort(&name)) {
                if in_s != in_t {
                    return Err(AevalError::SelfCheck(format!(
                        "`{}` is declared with different sorts in S and T",
                        name
                    )));
                }
            }
        }
        if self.y_vars.is_empty() {
            warn!("T introduces no existential variables");
        }
        Ok(())
    }
}

impl fmt::Display for VariablePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "x: {}", self.x_vars.join(", "))?;
        write!(f, "y: {}", self.y_vars.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtlib::parse_script;
    use pretty_assertions::assert_eq;

    #[test]
    fn roles_follow_formula_order_not_flag_order() {
        let roles = assign_roles(["--skol", "b.smt2", "--debug", "a.smt2"]).unwrap();
        assert_eq!(roles.s, PathBuf::from("b.smt2"));
        assert_eq!(roles.t, PathBuf::from("a.smt2"));
    }

    #[test]
    fn one_formula_is_not_enough() {
        let err = assign_roles(["a.smt2", "notes.txt"]).unwrap_err();
        assert!(matches!(err, AevalError::MissingFormula { found: 1 }));
    }

    #[test]
    fn self_check_catches_sort_mismatch() {
        let s = parse_script("(declare-const x Int)(assert (> x 0))").unwrap();
        let t = parse_script("(declare-const x Real)(declare-const y Int)(assert (> x y))")
            .unwrap();
        let partition = VariablePartition::discover(&s, &t);
        assert_eq!(partition.x_vars, vec!["x"]);
        assert_eq!(partition.y_vars, vec!["y"]);
        let err = partition.self_check(&s, &t).unwrap_err();
        assert!(err.to_string().contains("different sorts"));
    }

    #[test]
    fn display_lists_both_sets() {
        let partition = VariablePartition {
            x_vars: vec!["x1".to_string(), "x2".to_string()],
            y_vars: vec!["y1".to_string()],
        };
        assert_eq!(partition.to_string(), "x: x1, x2\ny: y1");
    }
}
