//! One module per catalog stage.

mod bounds_check;
mod cleanup;
mod dead_code;
mod dead_nondet;
mod global_dce;
mod inline;
mod internalize;
mod lower_cstexpr;
mod lower_gv;
mod lower_switch;
mod mem2reg;
mod memory_access;
mod mixed_semantics;
mod nondet_init;
mod overflow_check;
mod promote_verifier_calls;
mod shadow_bounds;
mod sroa;
mod unify_exits;
mod verify;

pub use bounds_check::BufferBoundsCheck;
pub use cleanup::{cleanup_function, fold_binary, fold_cmp, Cleanup};
pub use dead_code::{DeadInstElim, RemoveUnreachableBlocks};
pub use dead_nondet::DeadNondetElim;
pub use global_dce::{eliminate_dead_globals, GlobalDce};
pub use inline::{recursive_functions, AlwaysInline, MarkInternalInline};
pub use internalize::Internalize;
pub use lower_cstexpr::LowerCstExpr;
pub use lower_gv::LowerGvInitializers;
pub use lower_switch::LowerSwitch;
pub use mem2reg::{promote_allocas, Mem2Reg};
pub use memory_access::CanAccessMemory;
pub use mixed_semantics::{fail_name, failing_functions, MixedSemantics};
pub use nondet_init::NondetInit;
pub use overflow_check::IntegerOverflowCheck;
pub use promote_verifier_calls::PromoteVerifierCalls;
pub use shadow_bounds::ShadowBoundsCheckFuncPars;
pub use sroa::{split_aggregates, Sroa, SroaThresholds};
pub use unify_exits::{UnifyFunctionExitNodes, UNIFIED_RETURN, UNIFIED_UNREACHABLE};
pub use verify::{verify_module, VerificationError, Violation};

pub mod labels {
    pub use super::bounds_check::ERROR_LABEL as BOUNDS_ERROR;
    pub use super::overflow_check::ERROR_LABEL as OVERFLOW_ERROR;
}
