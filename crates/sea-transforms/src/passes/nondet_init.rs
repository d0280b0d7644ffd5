use std::collections::BTreeMap;

use sea_core::intrinsics::nondet_name;
use sea_core::ir::{IdGen, Instruction, InstructionKind, Module, Ty, Value};

use crate::context::{ModulePass, PassContext};
use crate::error::Result;

/// Replaces every `undef` operand with the result of a fresh call to the
/// nondeterministic generator of its type. Calls are placed at the top of the
/// entry block so they dominate every use.
pub struct NondetInit;

impl ModulePass for NondetInit {
    fn name(&self) -> &'static str {
        "nondet-init"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        let mut generators: BTreeMap<String, Ty> = BTreeMap::new();
        let mut replaced = 0;

        for func in module.functions.iter_mut() {
            if func.is_declaration() {
                continue;
            }
            let mut ids = IdGen::new(func);
            let mut calls = Vec::new();
            func.for_each_operand_mut(|operand| {
                let Value::Undef(ty) = operand else {
                    return;
                };
                let ty = ty.clone();
                let name = nondet_name(&ty);
                let id = ids.value();
                calls.push(Instruction::new(
                    id,
                    ty.clone(),
                    InstructionKind::Call {
                        callee: name.clone(),
                        args: Vec::new(),
                    },
                ));
                generators.insert(name, ty);
                *operand = Value::Reg(id);
            });
            if calls.is_empty() {
                continue;
            }
            replaced += calls.len();
            let entry = &mut func.blocks[0];
            let at = entry.first_non_phi();
            entry.instructions.splice(at..at, calls);
        }

        for (name, ty) in generators {
            module.declare_function(&name, Vec::new(), ty);
        }
        Ok(replaced)
    }
}
