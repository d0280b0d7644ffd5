use std::collections::HashSet;

use sea_core::intrinsics::VerifierIntrinsic;
use sea_core::ir::{CmpPredicate, IdGen, Instruction, InstructionKind, Module, Ty, Value};
use tracing::debug;

use crate::context::{ModulePass, PassContext};
use crate::error::Result;
use crate::util::{referenced_symbols, value_type};

/// Rewrites calls to every known spelling of the verifier intrinsics to the
/// canonical `verifier.*` names. Integer conditions passed to assume/assert
/// are narrowed to `i1` with a `!= 0` test. Legacy declarations left without
/// users are removed.
pub struct PromoteVerifierCalls;

impl ModulePass for PromoteVerifierCalls {
    fn name(&self) -> &'static str {
        "promote-verifier-calls"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        let mut promoted = 0;
        let mut used = HashSet::new();
        let mut legacy = HashSet::new();
        // harnesses sometimes define their own `__VERIFIER_assert`; those stay calls
        let defined: HashSet<String> = module
            .defined_functions()
            .map(|func| func.name.clone())
            .collect();

        for func in &mut module.functions {
            if func.is_declaration() {
                continue;
            }
            let types = func.value_types();
            let mut ids = IdGen::new(func);
            for block in &mut func.blocks {
                let mut idx = 0;
                while idx < block.instructions.len() {
                    let InstructionKind::Call { callee, args } = &mut block.instructions[idx].kind
                    else {
                        idx += 1;
                        continue;
                    };
                    let Some(intrinsic) = VerifierIntrinsic::lookup(callee)
                        .filter(|_| !defined.contains(callee.as_str()))
                    else {
                        idx += 1;
                        continue;
                    };
                    used.insert(intrinsic);
                    if callee.as_str() != intrinsic.canonical_name() {
                        legacy.insert(std::mem::replace(
                            callee,
                            intrinsic.canonical_name().to_string(),
                        ));
                        promoted += 1;
                    }

                    let mut narrowing = None;
                    if let Some(cond) = args.first_mut() {
                        if let Some(ty) = value_type(cond, &types)
                            .filter(|ty| ty.is_integer() && *ty != Ty::I1)
                        {
                            let id = ids.value();
                            let original = std::mem::replace(cond, Value::Reg(id));
                            narrowing = Some(Instruction::new(
                                id,
                                Ty::I1,
                                InstructionKind::Cmp {
                                    pred: CmpPredicate::Ne,
                                    lhs: original,
                                    rhs: Value::int(0, ty),
                                },
                            ));
                        }
                    }
                    if let Some(cmp) = narrowing {
                        block.instructions.insert(idx, cmp);
                        idx += 1;
                    }
                    idx += 1;
                }
            }
        }

        for intrinsic in used {
            module.declare_function(intrinsic.canonical_name(), intrinsic.params(), Ty::Void);
        }

        let referenced = referenced_symbols(module);
        let before = module.functions.len();
        module.functions.retain(|func| {
            !(func.is_declaration() && legacy.contains(&func.name) && !referenced.contains(&func.name))
        });
        debug!(
            promoted,
            removed_declarations = before - module.functions.len(),
            "promoted verifier calls"
        );
        Ok(promoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_core::intrinsics;
    use sea_core::ir::builder::{declaration, FunctionBuilder};
    use sea_core::ir::DataLayout;

    #[test]
    fn legacy_calls_become_canonical() {
        let mut module = Module::new("m");
        let mut main = FunctionBuilder::new("main", vec![Ty::I32], Ty::I32);
        let x = main.param(0);
        main.call("__VERIFIER_assume", Ty::Void, vec![x]);
        main.call("__SEAHORN_fail", Ty::Void, Vec::new());
        main.ret(Some(Value::int(0, Ty::I32)));
        module.functions.push(main.finish());
        module
            .functions
            .push(declaration("__VERIFIER_assume", vec![Ty::I32], Ty::Void));
        module
            .functions
            .push(declaration("__SEAHORN_fail", Vec::new(), Ty::Void));

        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        assert_eq!(PromoteVerifierCalls.run(&mut module, &mut cx).unwrap(), 2);

        let main = module.function("main").unwrap();
        let insts = &main.blocks[0].instructions;
        assert_eq!(insts.len(), 3);
        assert!(matches!(
            &insts[0].kind,
            InstructionKind::Cmp { pred: CmpPredicate::Ne, lhs: Value::Reg(0), .. }
        ));
        assert!(matches!(
            &insts[1].kind,
            InstructionKind::Call { callee, args } if callee == intrinsics::ASSUME && args == &vec![Value::Reg(1)]
        ));
        assert!(matches!(
            &insts[2].kind,
            InstructionKind::Call { callee, .. } if callee == intrinsics::ERROR
        ));
        assert!(module.function("__VERIFIER_assume").is_none());
        assert!(module.function("__SEAHORN_fail").is_none());
        assert!(module.function(intrinsics::ASSUME).is_some());
        assert!(module.function(intrinsics::ERROR).is_some());

        // a second run finds nothing left to promote
        assert_eq!(PromoteVerifierCalls.run(&mut module, &mut cx).unwrap(), 0);
    }
}
