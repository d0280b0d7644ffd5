use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;

use crate::catalog::{Property, Stage};
use crate::error::ContractViolation;

/// An ordered, immutable sequence of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineInstance {
    stages: Vec<Stage>,
}

impl PipelineInstance {
    pub(crate) fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Replays the stage contracts in order and reports every stage whose
    /// requirements do not hold when it runs, every non-repeatable stage that
    /// runs twice, and a missing or misplaced `verify`. A stage that leaves
    /// undef behind must be followed by `nondet-init`, with only bounds or
    /// overflow instrumentation in between.
    pub fn check_contracts(&self) -> Result<(), Vec<ContractViolation>> {
        let mut violations = Vec::new();
        let mut holds: BTreeSet<Property> = BTreeSet::new();
        let mut ran: Vec<&'static str> = Vec::new();
        let mut pending_undef: Option<&'static str> = None;

        for (index, stage) in self.stages.iter().enumerate() {
            let contract = stage.contract();
            let name = stage.name();
            for property in contract.requires {
                if !holds.contains(property) {
                    violations.push(ContractViolation::Unsatisfied {
                        index,
                        stage: name,
                        property: *property,
                    });
                }
            }
            if !contract.repeatable && ran.contains(&name) {
                violations.push(ContractViolation::Repeated { index, stage: name });
            }
            match stage {
                Stage::NondetInit => pending_undef = None,
                Stage::BufferBoundsCheck { .. } | Stage::IntegerOverflowCheck { .. } => {}
                _ => {
                    if let Some(introduced_by) = pending_undef.take() {
                        violations.push(ContractViolation::UndefNotResolved {
                            index,
                            stage: name,
                            introduced_by,
                        });
                    }
                }
            }
            for property in contract.invalidates {
                holds.remove(property);
            }
            if contract.introduces_undef {
                holds.remove(&Property::UndefFree);
                pending_undef = Some(name);
            }
            holds.extend(contract.establishes.iter().copied());
            ran.push(name);
        }

        let verifies = self
            .stages
            .iter()
            .positions(|stage| *stage == Stage::Verify)
            .collect_vec();
        if verifies != [self.stages.len().wrapping_sub(1)] {
            violations.push(ContractViolation::VerifyNotLast);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl fmt::Display for PipelineInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stages.iter().map(Stage::name).join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PipelineBuilder;
    use pretty_assertions::assert_eq;
    use sea_transforms::SroaThresholds;

    #[test]
    fn decomposition_before_promotion_is_rejected() {
        let instance = PipelineBuilder::new()
            .add_stages([
                Stage::PromoteVerifierCalls,
                Stage::Sroa(SroaThresholds::default()),
                Stage::Mem2Reg,
                Stage::Verify,
            ])
            .build();
        let violations = instance.check_contracts().unwrap_err();
        assert_eq!(
            violations,
            vec![
                ContractViolation::Unsatisfied {
                    index: 1,
                    stage: "sroa",
                    property: Property::SsaForm,
                },
                ContractViolation::Unsatisfied {
                    index: 1,
                    stage: "sroa",
                    property: Property::UndefFree,
                },
                ContractViolation::UndefNotResolved {
                    index: 2,
                    stage: "mem2reg",
                    introduced_by: "sroa",
                },
                ContractViolation::UndefNotResolved {
                    index: 3,
                    stage: "verify",
                    introduced_by: "mem2reg",
                },
            ]
        );
    }

    #[test]
    fn cleanup_needs_nondet_after_promotion() {
        let instance = PipelineBuilder::new()
            .add_stages([Stage::Mem2Reg, Stage::Cleanup, Stage::Verify])
            .build();
        assert_eq!(
            instance.check_contracts(),
            Err(vec![
                ContractViolation::Unsatisfied {
                    index: 1,
                    stage: "cleanup",
                    property: Property::UndefFree,
                },
                ContractViolation::UndefNotResolved {
                    index: 1,
                    stage: "cleanup",
                    introduced_by: "mem2reg",
                },
            ])
        );
    }

    #[test]
    fn undef_must_be_resolved_before_the_next_transformation() {
        let instance = PipelineBuilder::new()
            .add_stages([
                Stage::PromoteVerifierCalls,
                Stage::Mem2Reg,
                Stage::LowerSwitch,
                Stage::NondetInit,
                Stage::Cleanup,
                Stage::Verify,
            ])
            .build();
        assert_eq!(
            instance.check_contracts(),
            Err(vec![ContractViolation::UndefNotResolved {
                index: 2,
                stage: "lower-switch",
                introduced_by: "mem2reg",
            }])
        );
    }

    #[test]
    fn instrumentation_may_precede_nondet_init() {
        let instance = PipelineBuilder::new()
            .add_stages([
                Stage::PromoteVerifierCalls,
                Stage::Internalize,
                Stage::Mem2Reg,
                Stage::NondetInit,
                Stage::LowerCstexpr,
                Stage::CanAccessMemory,
                Stage::ShadowBoundsCheckFuncPars,
                Stage::BufferBoundsCheck { inline_all: false },
                Stage::NondetInit,
                Stage::Verify,
            ])
            .build();
        let violations = instance.check_contracts().err().unwrap_or_default();
        assert!(
            !violations
                .iter()
                .any(|v| matches!(v, ContractViolation::UndefNotResolved { .. })),
            "{:?}",
            violations
        );
    }

    #[test]
    fn verify_must_close_the_pipeline_once() {
        let twice = PipelineBuilder::new()
            .add_stages([Stage::Verify, Stage::LowerSwitch, Stage::Verify])
            .build();
        let violations = twice.check_contracts().unwrap_err();
        assert!(violations.contains(&ContractViolation::Repeated {
            index: 2,
            stage: "verify",
        }));
        assert!(violations.contains(&ContractViolation::VerifyNotLast));

        let missing = PipelineBuilder::new().add_stage(Stage::LowerSwitch).build();
        assert_eq!(
            missing.check_contracts(),
            Err(vec![ContractViolation::VerifyNotLast])
        );
    }

    #[test]
    fn display_joins_stage_names() {
        let instance = PipelineBuilder::new()
            .add_stages([Stage::LowerSwitch, Stage::Verify])
            .build();
        assert_eq!(instance.to_string(), "lower-switch -> verify");
    }
}
