//! Verifier intrinsics: the calls through which a program talks to the
//! verification back end.
//!
//! Harnesses spell these in several historical ways. Stage one of the pipeline
//! rewrites every known spelling to the canonical `verifier.*` names below, so
//! later stages only ever match on [`VerifierIntrinsic::canonical_name`].

use crate::ir::Ty;

pub const ASSUME: &str = "verifier.assume";
pub const ASSERT: &str = "verifier.assert";
pub const ERROR: &str = "verifier.error";

/// Prefix of nondeterministic value generators, followed by `.` and the
/// mangled result type.
pub const NONDET_PREFIX: &str = "verifier.nondet";
pub const LEGACY_NONDET_PREFIX: &str = "__VERIFIER_nondet_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifierIntrinsic {
    Assume,
    Assert,
    Error,
}

struct Spelling {
    name: &'static str,
    intrinsic: VerifierIntrinsic,
}

const LEGACY_SPELLINGS: &[Spelling] = &[
    Spelling {
        name: "__VERIFIER_assume",
        intrinsic: VerifierIntrinsic::Assume,
    },
    Spelling {
        name: "__VERIFIER_assert",
        intrinsic: VerifierIntrinsic::Assert,
    },
    Spelling {
        name: "__VERIFIER_error",
        intrinsic: VerifierIntrinsic::Error,
    },
    Spelling {
        name: "__SEAHORN_fail",
        intrinsic: VerifierIntrinsic::Error,
    },
];

impl VerifierIntrinsic {
    pub fn canonical_name(self) -> &'static str {
        match self {
            VerifierIntrinsic::Assume => ASSUME,
            VerifierIntrinsic::Assert => ASSERT,
            VerifierIntrinsic::Error => ERROR,
        }
    }

    /// Parameter types of the canonical declaration.
    pub fn params(self) -> Vec<Ty> {
        match self {
            VerifierIntrinsic::Assume | VerifierIntrinsic::Assert => vec![Ty::I1],
            VerifierIntrinsic::Error => Vec::new(),
        }
    }

    /// Resolves canonical and legacy spellings.
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            ASSUME => Some(VerifierIntrinsic::Assume),
            ASSERT => Some(VerifierIntrinsic::Assert),
            ERROR => Some(VerifierIntrinsic::Error),
            _ => Self::lookup_legacy(name),
        }
    }

    pub fn lookup_legacy(name: &str) -> Option<Self> {
        LEGACY_SPELLINGS
            .iter()
            .find(|spelling| spelling.name == name)
            .map(|spelling| spelling.intrinsic)
    }
}

/// Name of the nondeterministic generator returning `ty`.
pub fn nondet_name(ty: &Ty) -> String {
    format!("{}.{}", NONDET_PREFIX, ty.mangle())
}

pub fn is_nondet(name: &str) -> bool {
    name.starts_with(NONDET_PREFIX) || name.starts_with(LEGACY_NONDET_PREFIX)
}

/// Any call into the verifier: assumptions, assertions, errors and
/// nondeterministic generators.
pub fn is_verifier_call(name: &str) -> bool {
    VerifierIntrinsic::lookup(name).is_some() || is_nondet(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_spellings_resolve_to_canonical_names() {
        assert_eq!(
            VerifierIntrinsic::lookup("__SEAHORN_fail").map(VerifierIntrinsic::canonical_name),
            Some(ERROR)
        );
        assert_eq!(
            VerifierIntrinsic::lookup(ASSUME),
            Some(VerifierIntrinsic::Assume)
        );
        assert_eq!(VerifierIntrinsic::lookup_legacy(ASSUME), None);
        assert_eq!(VerifierIntrinsic::lookup("abort"), None);
    }

    #[test]
    fn nondet_names_follow_the_type() {
        assert_eq!(nondet_name(&Ty::I32), "verifier.nondet.i32");
        assert!(is_nondet("__VERIFIER_nondet_int"));
        assert!(is_verifier_call("verifier.nondet.ptr"));
        assert!(!is_nondet("nondet"));
    }
}
