use itertools::iproduct;
use pretty_assertions::assert_eq;
use sea_core::ir::builder::{declaration, FunctionBuilder};
use sea_core::ir::{BinaryOp, Global, Linkage, Module, Ty, Value};
use sea_pipeline::{
    run_pipeline, Configuration, PipelineBuilder, PipelineError, PipelineInstance, Stage,
};

fn every_configuration() -> Vec<Configuration> {
    iproduct!([false, true], [false, true], [false, true], [false, true])
        .map(|(inline_all, boc, ioc, mixed)| Configuration {
            inline_all,
            insert_bounds_checks: boc,
            insert_overflow_checks: ioc,
            mixed_semantics: mixed,
            ..Configuration::default()
        })
        .collect()
}

fn positions(instance: &PipelineInstance, name: &str) -> Vec<usize> {
    instance
        .names()
        .iter()
        .enumerate()
        .filter(|(_, stage)| **stage == name)
        .map(|(index, _)| index)
        .collect()
}

#[test]
fn every_configuration_satisfies_the_contracts() {
    let configs = every_configuration();
    assert_eq!(configs.len(), 16);
    for config in &configs {
        let instance = PipelineBuilder::for_configuration(config);
        assert_eq!(instance.check_contracts(), Ok(()), "{:?}", config);
    }
}

#[test]
fn building_is_deterministic() {
    for config in every_configuration() {
        assert_eq!(
            PipelineBuilder::for_configuration(&config),
            PipelineBuilder::for_configuration(&config)
        );
    }
}

#[test]
fn verify_runs_once_and_last() {
    for config in every_configuration() {
        let instance = PipelineBuilder::for_configuration(&config);
        assert_eq!(positions(&instance, "verify"), vec![instance.len() - 1]);
    }
}

#[test]
fn nondet_follows_promotion_and_decomposition() {
    for config in every_configuration() {
        let names = PipelineBuilder::for_configuration(&config).names();
        let mem2reg = names.iter().position(|name| *name == "mem2reg").unwrap();
        let sroa = names.iter().position(|name| *name == "sroa").unwrap();
        assert!(mem2reg < sroa);
        assert_eq!(names[mem2reg + 1], "nondet-init");
        assert_eq!(names[sroa + 1], "nondet-init");
    }
}

#[test]
fn shadowing_depends_on_inlining() {
    for config in every_configuration() {
        let instance = PipelineBuilder::for_configuration(&config);
        let shadowed = !positions(&instance, "shadow-bounds-check-func-pars").is_empty();
        assert_eq!(
            shadowed,
            config.insert_bounds_checks && !config.inline_all,
            "{:?}",
            config
        );
    }
}

#[test]
fn bounds_group_with_inlining() {
    let config = Configuration {
        inline_all: true,
        insert_bounds_checks: true,
        ..Configuration::default()
    };
    let instance = PipelineBuilder::for_configuration(&config);
    let names = instance.names();
    for stage in ["lower-cstexpr", "can-access-memory", "buffer-bounds-check"] {
        assert!(names.contains(&stage), "{}", stage);
    }
    assert!(!names.contains(&"shadow-bounds-check-func-pars"));
    assert!(instance
        .stages()
        .contains(&Stage::BufferBoundsCheck { inline_all: true }));
}

#[test]
fn instrumentation_groups_are_ordered_and_closed() {
    for config in every_configuration() {
        let instance = PipelineBuilder::for_configuration(&config);
        let names = instance.names();
        let bounds = positions(&instance, "buffer-bounds-check");
        let overflow = positions(&instance, "integer-overflow-check");
        assert_eq!(bounds.len(), usize::from(config.insert_bounds_checks));
        assert_eq!(overflow.len(), usize::from(config.insert_overflow_checks));
        if let Some(&at) = bounds.first() {
            assert_eq!(names[at + 1], "nondet-init");
            assert_eq!(names[at + 2], "remove-unreachable-blocks");
        }
        if let Some(&at) = overflow.first() {
            assert_eq!(names[at + 1], "remove-unreachable-blocks");
        }
        if let (Some(b), Some(o)) = (bounds.first(), overflow.first()) {
            assert!(b < o);
        }
        if let Some(&mixed) = positions(&instance, "mixed-semantics").first() {
            assert!(bounds.iter().chain(&overflow).all(|at| *at < mixed));
            assert_eq!(names[mixed + 1], "remove-unreachable-blocks");
        }
    }
}

#[test]
fn inlining_group_follows_the_first_reachability_cleanup() {
    let config = Configuration {
        inline_all: true,
        ..Configuration::default()
    };
    let names = PipelineBuilder::for_configuration(&config).names();
    assert_eq!(
        &names[11..17],
        &[
            "remove-unreachable-blocks",
            "mark-internal-inline",
            "always-inline",
            "global-dce",
            "remove-unreachable-blocks",
            "lower-gv-initializers",
        ]
    );
}

/// `main` indexes a global array with a nondet value and passes a sum to an
/// internal function that asserts on it.
fn harness() -> Module {
    let array = Ty::array(Ty::I32, 8);
    let mut module = Module::new("harness");
    module.globals.push(Global {
        name: "table".to_string(),
        ty: array.clone(),
        initializer: Some(sea_core::ir::Constant::Zero(array.clone())),
        linkage: Linkage::External,
        is_constant: false,
    });

    let mut main = FunctionBuilder::new("main", Vec::new(), Ty::I32);
    let index = main
        .call("__VERIFIER_nondet_int", Ty::I32, Vec::new())
        .unwrap_or(Value::int(0, Ty::I32));
    let slot = main.gep(
        array,
        Value::global("table"),
        vec![Value::i64(0), index.clone()],
    );
    let loaded = main.load(Ty::I32, slot);
    let sum = main.binary_nsw(BinaryOp::Add, Ty::I32, loaded, index);
    main.call("check", Ty::Void, vec![sum]);
    main.ret(Some(Value::int(0, Ty::I32)));
    module.functions.push(main.finish());

    let mut check = FunctionBuilder::new("check", vec![Ty::I32], Ty::Void);
    let x = check.param(0);
    let ok = check.cmp(
        sea_core::ir::CmpPredicate::Sge,
        x,
        Value::int(0, Ty::I32),
    );
    check.call("__VERIFIER_assert", Ty::Void, vec![ok]);
    check.ret(None);
    module.functions.push(check.finish());

    module
        .functions
        .push(declaration("__VERIFIER_nondet_int", Vec::new(), Ty::I32));
    module
        .functions
        .push(declaration("__VERIFIER_assert", vec![Ty::I1], Ty::Void));
    module
}

#[test]
fn every_configuration_runs_to_a_verified_module() {
    for config in every_configuration() {
        let execution = run_pipeline(&config, harness())
            .unwrap_or_else(|err| panic!("{:?} failed: {}", config, err));
        let expected = PipelineBuilder::for_configuration(&config).len();
        assert_eq!(execution.reports.len(), expected);
    }
}

#[test]
fn stage_failure_aborts_the_run() {
    let mut module = harness();
    module.globals[0].initializer = Some(sea_core::ir::Constant::Aggregate {
        ty: Ty::array(Ty::I32, 8),
        elements: vec![sea_core::ir::Constant::int(1, Ty::I32)],
    });
    let err = run_pipeline(&Configuration::default(), module).unwrap_err();
    match err {
        PipelineError::Stage { stage, index, .. } => {
            assert_eq!(stage, "lower-gv-initializers");
            assert_eq!(index, 12);
        }
        other => panic!("unexpected error: {}", other),
    }
}
