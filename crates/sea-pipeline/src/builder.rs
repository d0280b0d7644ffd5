use tracing::debug;

use crate::catalog::Stage;
use crate::config::Configuration;
use crate::instance::PipelineInstance;

#[derive(Debug, Default)]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn add_stages(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.stages.extend(stages);
        self
    }

    pub fn build(self) -> PipelineInstance {
        PipelineInstance::new(self.stages)
    }

    /// The stage order for `config`: the fixed backbone with every enabled
    /// group spliced in at its place, closed by `verify`.
    pub fn for_configuration(config: &Configuration) -> PipelineInstance {
        let mut builder = Self::new().add_stages(normalization(config));
        if config.inline_all {
            builder = builder.add_stages(inline_group());
        }
        builder = builder.add_stages([Stage::LowerGvInitializers, Stage::UnifyFunctionExitNodes]);
        if config.insert_bounds_checks {
            builder = builder.add_stages(bounds_check_group(config.inline_all));
        }
        if config.insert_overflow_checks {
            builder = builder.add_stages(overflow_check_group(config.inline_all));
        }
        if config.mixed_semantics {
            builder = builder.add_stages([Stage::MixedSemantics, Stage::RemoveUnreachableBlocks]);
        }
        let instance = builder.add_stage(Stage::Verify).build();
        debug!(stages = instance.len(), pipeline = %instance, "built pipeline");
        debug_assert!(
            instance.check_contracts().is_ok(),
            "pipeline breaks a stage contract: {:?}",
            instance.check_contracts()
        );
        instance
    }
}

fn normalization(config: &Configuration) -> [Stage; 12] {
    [
        Stage::PromoteVerifierCalls,
        Stage::Internalize,
        Stage::Mem2Reg,
        Stage::NondetInit,
        Stage::Cleanup,
        Stage::Sroa(config.sroa_thresholds),
        // decomposition re-promotes and can leave undef behind
        Stage::NondetInit,
        Stage::Cleanup,
        Stage::DeadNondetElim,
        Stage::LowerSwitch,
        Stage::DeadInstElim,
        Stage::RemoveUnreachableBlocks,
    ]
}

fn inline_group() -> [Stage; 4] {
    [
        Stage::MarkInternalInline,
        Stage::AlwaysInline,
        Stage::GlobalDce,
        Stage::RemoveUnreachableBlocks,
    ]
}

fn bounds_check_group(inline_all: bool) -> Vec<Stage> {
    let mut stages = vec![Stage::LowerCstexpr, Stage::CanAccessMemory];
    if !inline_all {
        stages.push(Stage::ShadowBoundsCheckFuncPars);
    }
    stages.extend([
        Stage::BufferBoundsCheck { inline_all },
        Stage::NondetInit,
        Stage::RemoveUnreachableBlocks,
    ]);
    stages
}

fn overflow_check_group(inline_all: bool) -> [Stage; 3] {
    [
        Stage::LowerCstexpr,
        Stage::IntegerOverflowCheck { inline_all },
        Stage::RemoveUnreachableBlocks,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_configuration_is_the_backbone() {
        let instance = PipelineBuilder::for_configuration(&Configuration::default());
        assert_eq!(
            instance.names(),
            vec![
                "promote-verifier-calls",
                "internalize",
                "mem2reg",
                "nondet-init",
                "cleanup",
                "sroa",
                "nondet-init",
                "cleanup",
                "dead-nondet-elim",
                "lower-switch",
                "dead-inst-elim",
                "remove-unreachable-blocks",
                "lower-gv-initializers",
                "unify-function-exit-nodes",
                "verify",
            ]
        );
    }

    #[test]
    fn thresholds_reach_the_decomposition_stage() {
        let config = Configuration {
            sroa_thresholds: sea_transforms::SroaThresholds::unlimited(),
            ..Configuration::default()
        };
        let instance = PipelineBuilder::for_configuration(&config);
        assert_eq!(
            instance.stages()[5],
            Stage::Sroa(sea_transforms::SroaThresholds::unlimited())
        );
    }
}
