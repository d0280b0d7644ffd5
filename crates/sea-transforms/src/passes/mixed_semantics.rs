//! Mixed-semantics transformation.
//!
//! Every function that can fail gets a failure-only twin `<f>.fail` in which
//! returning is impossible, while the original keeps running only along
//! non-failing paths (its failures become assumptions). The entry function and
//! the twins choose nondeterministically, at each call to a failing function,
//! between descending into the twin and continuing normally. A property
//! violation is thus reachable exactly along a single failing call chain.

use std::collections::HashSet;

use sea_core::intrinsics::{self, nondet_name};
use sea_core::ir::{
    BasicBlock, Function, IdGen, Instruction, InstructionKind, Linkage, Module, Terminator, Ty,
    Value, ENTRY_FUNCTION,
};
use tracing::debug;

use crate::context::{ModulePass, PassContext};
use crate::error::Result;
use crate::util::split_block;

pub struct MixedSemantics;

pub fn fail_name(function: &str) -> String {
    format!("{}.fail", function)
}

impl ModulePass for MixedSemantics {
    fn name(&self) -> &'static str {
        "mixed-semantics"
    }

    fn run(&self, module: &mut Module, cx: &mut PassContext<'_>) -> Result<usize> {
        if module
            .function(ENTRY_FUNCTION)
            .map_or(true, Function::is_declaration)
        {
            cx.warn(format!(
                "no `{}` definition; mixed semantics not applied",
                ENTRY_FUNCTION
            ));
            return Ok(0);
        }
        let failing = failing_functions(module);
        if failing.is_empty() {
            return Ok(0);
        }

        let mut twins: Vec<Function> = module
            .functions
            .iter()
            .filter(|func| failing.contains(&func.name))
            .map(failure_twin)
            .collect();

        let mut changes = twins.len();
        for func in module.functions.iter_mut() {
            if func.is_entry() {
                changes += route_failures(func, &failing);
            } else if failing.contains(&func.name) {
                changes += assume_success(func);
            }
        }
        for twin in twins.iter_mut() {
            changes += route_failures(twin, &failing);
        }
        debug!(failing = failing.len(), "created failure twins");
        module.functions.extend(twins);
        module.declare_function(intrinsics::ASSUME, vec![Ty::I1], Ty::Void);
        module.declare_function(&nondet_name(&Ty::I1), Vec::new(), Ty::I1);
        Ok(changes)
    }
}

/// Defined functions other than `main` that can reach `verifier.error` or
/// `verifier.assert`.
pub fn failing_functions(module: &Module) -> HashSet<String> {
    let mut failing: HashSet<String> = HashSet::new();
    loop {
        let mut grew = false;
        for func in module.defined_functions() {
            if func.is_entry() || failing.contains(&func.name) {
                continue;
            }
            let fails = func.callees().into_iter().any(|callee| {
                callee == intrinsics::ERROR || callee == intrinsics::ASSERT || failing.contains(callee)
            });
            if fails {
                failing.insert(func.name.clone());
                grew = true;
            }
        }
        if !grew {
            return failing;
        }
    }
}

fn assume_false() -> Instruction {
    Instruction::effect(InstructionKind::Call {
        callee: intrinsics::ASSUME.to_string(),
        args: vec![Value::bool(false)],
    })
}

fn failure_twin(func: &Function) -> Function {
    let mut twin = func.clone();
    twin.name = fail_name(&func.name);
    twin.linkage = Linkage::Internal;
    for block in twin.blocks.iter_mut() {
        if matches!(block.terminator, Terminator::Ret(_)) {
            block.instructions.push(assume_false());
            block.terminator = Terminator::Unreachable;
        }
    }
    twin
}

/// Turns failures into assumptions. Returns the number of rewritten calls.
fn assume_success(func: &mut Function) -> usize {
    let mut rewritten = 0;
    for inst in func.blocks.iter_mut().flat_map(|block| block.instructions.iter_mut()) {
        let InstructionKind::Call { callee, args } = &mut inst.kind else {
            continue;
        };
        if callee.as_str() == intrinsics::ERROR {
            *args = vec![Value::bool(false)];
        } else if callee.as_str() != intrinsics::ASSERT {
            continue;
        }
        *callee = intrinsics::ASSUME.to_string();
        rewritten += 1;
    }
    rewritten
}

/// Precedes every call to a failing function with a nondeterministic branch
/// into its failure twin. Returns the number of routed calls.
fn route_failures(func: &mut Function, failing: &HashSet<String>) -> usize {
    let mut ids = IdGen::new(func);
    let mut routed = 0;
    let mut cursor = 0;
    let mut start = 0;
    while cursor < func.blocks.len() {
        let block = &func.blocks[cursor];
        let block_id = block.id;
        let found = block
            .instructions
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(at, inst)| match &inst.kind {
                InstructionKind::Call { callee, args } if failing.contains(callee) => {
                    Some((at, callee.clone(), args.clone(), inst.ty.clone()))
                }
                _ => None,
            });
        let Some((at, callee, args, ty)) = found else {
            cursor += 1;
            start = 0;
            continue;
        };

        let choice = ids.value();
        func.blocks[cursor].instructions.insert(
            at,
            Instruction::new(
                choice,
                Ty::I1,
                InstructionKind::Call {
                    callee: nondet_name(&Ty::I1),
                    args: Vec::new(),
                },
            ),
        );
        let rest = split_block(func, block_id, at + 1, &mut ids);
        let descend = ids.block();
        let mut failure = BasicBlock::new(descend, None, Terminator::Unreachable);
        let call = InstructionKind::Call {
            callee: fail_name(&callee),
            args,
        };
        failure.instructions.push(if ty.is_void() {
            Instruction::effect(call)
        } else {
            Instruction::new(ids.value(), ty, call)
        });
        func.blocks.push(failure);
        func.blocks[cursor].terminator = Terminator::CondBr {
            cond: Value::Reg(choice),
            if_true: descend,
            if_false: rest,
        };
        routed += 1;
        cursor += 1;
        start = 1;
    }
    routed
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_core::ir::builder::FunctionBuilder;
    use sea_core::ir::{CmpPredicate, DataLayout};

    fn module() -> Module {
        let mut module = Module::new("m");
        let mut main = FunctionBuilder::new("main", Vec::new(), Ty::I32);
        let x = main
            .call("verifier.nondet.i32", Ty::I32, Vec::new())
            .unwrap_or(Value::int(0, Ty::I32));
        main.call("outer", Ty::Void, vec![x]);
        main.ret(Some(Value::int(0, Ty::I32)));
        module.functions.push(main.finish());

        let mut outer = FunctionBuilder::new("outer", vec![Ty::I32], Ty::Void)
            .linkage(Linkage::Internal);
        let x = outer.param(0);
        outer.call("check", Ty::Void, vec![x]);
        outer.ret(None);
        module.functions.push(outer.finish());

        let mut check = FunctionBuilder::new("check", vec![Ty::I32], Ty::Void)
            .linkage(Linkage::Internal);
        let x = check.param(0);
        let positive = check.cmp(CmpPredicate::Sgt, x, Value::int(0, Ty::I32));
        check.call(intrinsics::ASSERT, Ty::Void, vec![positive]);
        check.ret(None);
        module.functions.push(check.finish());

        let mut quiet = FunctionBuilder::new("quiet", Vec::new(), Ty::Void)
            .linkage(Linkage::Internal);
        quiet.ret(None);
        module.functions.push(quiet.finish());
        module
    }

    #[test]
    fn failing_set_is_transitive() {
        let failing = failing_functions(&module());
        let mut names: Vec<&str> = failing.iter().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["check", "outer"]);
    }

    #[test]
    fn twins_carry_the_failures() {
        let mut module = module();
        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        // two twins, one rewritten assert, main->outer, outer.fail->check
        assert_eq!(MixedSemantics.run(&mut module, &mut cx).unwrap(), 5);

        let check = module.function("check").unwrap();
        assert_eq!(check.callees(), vec![intrinsics::ASSUME]);
        let twin = module.function("check.fail").unwrap();
        assert_eq!(twin.linkage, Linkage::Internal);
        assert_eq!(twin.callees(), vec![intrinsics::ASSERT, intrinsics::ASSUME]);
        assert_eq!(twin.blocks[0].terminator, Terminator::Unreachable);

        let main = module.function("main").unwrap();
        assert_eq!(
            main.callees(),
            vec!["verifier.nondet.i32", "verifier.nondet.i1", "outer", "outer.fail"]
        );
        assert!(matches!(
            main.blocks[0].terminator,
            Terminator::CondBr { .. }
        ));
        let outer = module.function("outer").unwrap();
        assert_eq!(outer.callees(), vec!["check"]);
        assert!(module.function("verifier.assume").is_some());
        assert!(module.function("verifier.nondet.i1").is_some());
        assert!(module.function("quiet.fail").is_none());
    }
}
