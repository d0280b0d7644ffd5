//! The fixed set of stages a pipeline can be built from, and the contract
//! each one declares over [`Property`] tags.

use sea_core::ir::Module;
use sea_transforms::{
    verify_module, AlwaysInline, BufferBoundsCheck, CanAccessMemory, Cleanup, DeadInstElim,
    DeadNondetElim, GlobalDce, IntegerOverflowCheck, Internalize, LowerCstExpr,
    LowerGvInitializers, LowerSwitch, MarkInternalInline, Mem2Reg, MixedSemantics, ModulePass,
    NondetInit, PassContext, PromoteVerifierCalls, RemoveUnreachableBlocks,
    ShadowBoundsCheckFuncPars, Sroa, SroaThresholds, UnifyFunctionExitNodes,
};
use strum::{Display, EnumIter, IntoStaticStr};

use crate::error::StageFailure;

/// Facts about a module that stages establish and rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum Property {
    VerifierCallsCanonical,
    Internalized,
    SsaForm,
    UndefFree,
    AggregatesDecomposed,
    SwitchFree,
    InlineMarked,
    Inlined,
    GlobalsLowered,
    /// One return block per function.
    SingleExit,
    ConstExprFree,
    MemoryAccessAnalyzed,
    ParamsShadowed,
    BoundsChecked,
    OverflowChecked,
    MixedSemantics,
    WellFormed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageContract {
    pub requires: &'static [Property],
    pub establishes: &'static [Property],
    pub invalidates: &'static [Property],
    /// The stage may leave `undef` operands behind; `UndefFree` no longer
    /// holds afterwards.
    pub introduces_undef: bool,
    pub repeatable: bool,
}

impl StageContract {
    const fn new(requires: &'static [Property], establishes: &'static [Property]) -> Self {
        Self {
            requires,
            establishes,
            invalidates: &[],
            introduces_undef: false,
            repeatable: true,
        }
    }

    const fn once(mut self) -> Self {
        self.repeatable = false;
        self
    }

    const fn undef(mut self) -> Self {
        self.introduces_undef = true;
        self
    }

    const fn invalidating(mut self, invalidates: &'static [Property]) -> Self {
        self.invalidates = invalidates;
        self
    }
}

/// One entry of the catalog. Parameterized stages carry their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Stage {
    PromoteVerifierCalls,
    Internalize,
    #[strum(serialize = "mem2reg")]
    Mem2Reg,
    NondetInit,
    Cleanup,
    Sroa(SroaThresholds),
    DeadNondetElim,
    LowerSwitch,
    DeadInstElim,
    RemoveUnreachableBlocks,
    MarkInternalInline,
    AlwaysInline,
    GlobalDce,
    #[strum(serialize = "lower-gv-initializers")]
    LowerGvInitializers,
    UnifyFunctionExitNodes,
    LowerCstexpr,
    CanAccessMemory,
    ShadowBoundsCheckFuncPars,
    BufferBoundsCheck { inline_all: bool },
    IntegerOverflowCheck { inline_all: bool },
    MixedSemantics,
    Verify,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn contract(&self) -> StageContract {
        use Property::*;
        match self {
            Stage::PromoteVerifierCalls => StageContract::new(&[], &[VerifierCallsCanonical]).once(),
            Stage::Internalize => {
                StageContract::new(&[VerifierCallsCanonical], &[Internalized]).once()
            }
            Stage::Mem2Reg => StageContract::new(&[], &[SsaForm]).undef().once(),
            Stage::NondetInit => StageContract::new(&[], &[UndefFree]),
            Stage::Cleanup => StageContract::new(&[SsaForm, UndefFree], &[]),
            Stage::Sroa(_) => StageContract::new(&[SsaForm, UndefFree], &[AggregatesDecomposed])
                .undef()
                .once(),
            Stage::DeadNondetElim => StageContract::new(&[UndefFree], &[]),
            Stage::LowerSwitch => StageContract::new(&[], &[SwitchFree]),
            Stage::DeadInstElim | Stage::RemoveUnreachableBlocks | Stage::GlobalDce => {
                StageContract::new(&[], &[])
            }
            Stage::MarkInternalInline => {
                StageContract::new(&[Internalized], &[InlineMarked]).once()
            }
            Stage::AlwaysInline => StageContract::new(&[InlineMarked], &[Inlined])
                .invalidating(&[MemoryAccessAnalyzed])
                .once(),
            Stage::LowerGvInitializers => StageContract::new(&[], &[GlobalsLowered]).once(),
            Stage::UnifyFunctionExitNodes => StageContract::new(&[], &[SingleExit]),
            Stage::LowerCstexpr => StageContract::new(&[], &[ConstExprFree]),
            Stage::CanAccessMemory => StageContract::new(&[], &[MemoryAccessAnalyzed]),
            Stage::ShadowBoundsCheckFuncPars => {
                StageContract::new(&[Internalized, MemoryAccessAnalyzed], &[ParamsShadowed])
                    .undef()
                    .once()
            }
            Stage::BufferBoundsCheck { .. } => StageContract::new(
                &[ConstExprFree, MemoryAccessAnalyzed, GlobalsLowered, SingleExit],
                &[BoundsChecked],
            )
            .once(),
            Stage::IntegerOverflowCheck { .. } => {
                StageContract::new(&[ConstExprFree, UndefFree], &[OverflowChecked]).once()
            }
            Stage::MixedSemantics => StageContract::new(
                &[SingleExit, UndefFree, Internalized],
                &[Property::MixedSemantics],
            )
            .once(),
            Stage::Verify => StageContract::new(&[], &[WellFormed]).once(),
        }
    }

    /// Runs the stage on `module`. Returns the number of changes made.
    pub fn apply(
        &self,
        module: &mut Module,
        cx: &mut PassContext<'_>,
    ) -> Result<usize, StageFailure> {
        let changes = match *self {
            Stage::PromoteVerifierCalls => PromoteVerifierCalls.run(module, cx)?,
            Stage::Internalize => Internalize.run(module, cx)?,
            Stage::Mem2Reg => Mem2Reg.run(module, cx)?,
            Stage::NondetInit => NondetInit.run(module, cx)?,
            Stage::Cleanup => Cleanup.run(module, cx)?,
            Stage::Sroa(thresholds) => Sroa { thresholds }.run(module, cx)?,
            Stage::DeadNondetElim => DeadNondetElim.run(module, cx)?,
            Stage::LowerSwitch => LowerSwitch.run(module, cx)?,
            Stage::DeadInstElim => DeadInstElim.run(module, cx)?,
            Stage::RemoveUnreachableBlocks => RemoveUnreachableBlocks.run(module, cx)?,
            Stage::MarkInternalInline => MarkInternalInline.run(module, cx)?,
            Stage::AlwaysInline => AlwaysInline.run(module, cx)?,
            Stage::GlobalDce => GlobalDce.run(module, cx)?,
            Stage::LowerGvInitializers => LowerGvInitializers.run(module, cx)?,
            Stage::UnifyFunctionExitNodes => UnifyFunctionExitNodes.run(module, cx)?,
            Stage::LowerCstexpr => LowerCstExpr.run(module, cx)?,
            Stage::CanAccessMemory => CanAccessMemory.run(module, cx)?,
            Stage::ShadowBoundsCheckFuncPars => ShadowBoundsCheckFuncPars.run(module, cx)?,
            Stage::BufferBoundsCheck { inline_all } => {
                BufferBoundsCheck { inline_all }.run(module, cx)?
            }
            Stage::IntegerOverflowCheck { inline_all } => {
                IntegerOverflowCheck { inline_all }.run(module, cx)?
            }
            Stage::MixedSemantics => MixedSemantics.run(module, cx)?,
            Stage::Verify => {
                verify_module(module)?;
                0
            }
        };
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn stage_names_are_unique_and_kebab_case() {
        let names: Vec<&str> = Stage::iter().map(|stage| stage.name()).collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());
        assert!(names.contains(&"mem2reg"));
        assert!(names.contains(&"lower-gv-initializers"));
        assert!(names.contains(&"lower-cstexpr"));
        assert!(names.contains(&"shadow-bounds-check-func-pars"));
        assert!(names
            .iter()
            .all(|name| name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')));
    }

    #[test]
    fn parameters_do_not_change_the_name() {
        let unlimited = Stage::Sroa(SroaThresholds::unlimited());
        assert_eq!(unlimited.name(), "sroa");
        assert_eq!(
            Stage::BufferBoundsCheck { inline_all: true }.name(),
            Stage::BufferBoundsCheck { inline_all: false }.name()
        );
    }

    #[test]
    fn undef_introducing_stages_are_not_repeatable() {
        for stage in Stage::iter() {
            let contract = stage.contract();
            if contract.introduces_undef {
                assert!(!contract.repeatable, "{}", stage.name());
                assert!(!contract.establishes.contains(&Property::UndefFree));
            }
        }
    }
}
