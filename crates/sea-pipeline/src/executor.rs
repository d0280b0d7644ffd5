use std::time::{Duration, Instant};

use sea_core::diagnostics::emit;
use sea_core::ir::{DataLayout, Module};
use sea_transforms::PassContext;
use tracing::{debug, error, info, info_span};

use crate::builder::PipelineBuilder;
use crate::config::Configuration;
use crate::error::PipelineError;
use crate::instance::PipelineInstance;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub changes: usize,
    pub elapsed: Duration,
}

/// A completed run: the verified module and what each stage did.
#[derive(Debug, Clone)]
pub struct Execution {
    pub module: Module,
    pub reports: Vec<StageReport>,
}

impl Execution {
    pub fn total_changes(&self) -> usize {
        self.reports.iter().map(|report| report.changes).sum()
    }
}

pub struct Executor<'a> {
    instance: &'a PipelineInstance,
    layout: DataLayout,
}

impl<'a> Executor<'a> {
    pub fn new(instance: &'a PipelineInstance, layout: DataLayout) -> Self {
        Self { instance, layout }
    }

    /// Runs every stage in order. The first failure ends the run and the
    /// module is dropped.
    pub fn run(&self, mut module: Module) -> Result<Execution, PipelineError> {
        let total = self.instance.len();
        let mut reports = Vec::with_capacity(total);
        for (index, stage) in self.instance.stages().iter().enumerate() {
            let name = stage.name();
            let _span = info_span!("stage", stage = name, index).entered();
            let mut cx = PassContext::new(&self.layout);
            let started = Instant::now();
            let outcome = stage.apply(&mut module, &mut cx);
            let elapsed = started.elapsed();
            emit(&cx.take_diagnostics(), name);
            let changes = match outcome {
                Ok(changes) => changes,
                Err(failure) => {
                    error!(stage = name, index, "stage failed: {}", failure);
                    return Err(PipelineError::from_stage(name, index, failure));
                }
            };
            debug!(
                stage = name,
                index,
                changes,
                elapsed_us = elapsed.as_micros() as u64,
                "stage {}/{} done",
                index + 1,
                total
            );
            reports.push(StageReport {
                stage: name,
                changes,
                elapsed,
            });
        }
        info!(stages = total, module = %module.name, "pipeline finished");
        Ok(Execution { module, reports })
    }
}

/// Builds the pipeline for `config`, resolves the data layout for `module`
/// and runs it.
pub fn run_pipeline(config: &Configuration, module: Module) -> Result<Execution, PipelineError> {
    let instance = PipelineBuilder::for_configuration(config);
    let layout = config.resolve_data_layout(&module)?;
    Executor::new(&instance, layout).run(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Stage;
    use sea_core::ir::builder::FunctionBuilder;
    use sea_core::ir::{Terminator, Ty, Value};

    fn trivial() -> Module {
        let mut module = Module::new("trivial");
        let mut main = FunctionBuilder::new("main", Vec::new(), Ty::I32);
        main.ret(Some(Value::int(0, Ty::I32)));
        module.functions.push(main.finish());
        module
    }

    #[test]
    fn reports_one_entry_per_stage() {
        let config = Configuration::default();
        let execution = run_pipeline(&config, trivial()).unwrap();
        assert_eq!(execution.reports.len(), 15);
        assert_eq!(execution.reports.last().map(|r| r.stage), Some("verify"));
        assert_eq!(execution.module.name, "trivial");
    }

    #[test]
    fn verification_failure_names_verify() {
        let mut module = trivial();
        module.functions[0].blocks[0].terminator = Terminator::Br(7);
        let instance = PipelineBuilder::new().add_stage(Stage::Verify).build();
        let err = Executor::new(&instance, DataLayout::default())
            .run(module)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Verification(_)));
        assert_eq!(err.stage(), Some("verify"));
    }

    #[test]
    fn malformed_module_layout_is_rejected() {
        let mut module = trivial();
        module.data_layout = Some("q-nonsense".to_string());
        let err = run_pipeline(&Configuration::default(), module).unwrap_err();
        assert!(matches!(err, PipelineError::Layout(_)));
    }
}
