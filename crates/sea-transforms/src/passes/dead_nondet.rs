use sea_core::intrinsics::is_nondet;
use sea_core::ir::{InstructionKind, Module};

use crate::context::{ModulePass, PassContext};
use crate::error::Result;
use crate::util::referenced_symbols;

/// Drops calls to nondeterministic generators whose result is never used,
/// then generator declarations nothing calls any more.
pub struct DeadNondetElim;

impl ModulePass for DeadNondetElim {
    fn name(&self) -> &'static str {
        "dead-nondet-elim"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        let mut removed = 0;
        for func in module.functions.iter_mut() {
            let uses = func.use_counts();
            for block in &mut func.blocks {
                block.instructions.retain(|inst| {
                    let InstructionKind::Call { callee, .. } = &inst.kind else {
                        return true;
                    };
                    let unused = inst.result.map_or(true, |id| !uses.contains_key(&id));
                    let dead = unused && is_nondet(callee);
                    if dead {
                        removed += 1;
                    }
                    !dead
                });
            }
        }

        let referenced = referenced_symbols(module);
        let before = module.functions.len();
        module.functions.retain(|func| {
            !(func.is_declaration() && is_nondet(&func.name) && !referenced.contains(&func.name))
        });
        Ok(removed + before - module.functions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_core::ir::builder::{declaration, FunctionBuilder};
    use sea_core::ir::{DataLayout, Ty};

    #[test]
    fn unused_generators_disappear() {
        let mut b = FunctionBuilder::new("main", Vec::new(), Ty::I32);
        b.call("verifier.nondet.i8", Ty::I8, Vec::new());
        let kept = b.call("verifier.nondet.i32", Ty::I32, Vec::new());
        b.call("external_effect", Ty::I32, Vec::new());
        b.ret(kept);
        let mut module = Module::new("m");
        module.functions.push(b.finish());
        module
            .functions
            .push(declaration("verifier.nondet.i8", Vec::new(), Ty::I8));
        module
            .functions
            .push(declaration("verifier.nondet.i32", Vec::new(), Ty::I32));
        module
            .functions
            .push(declaration("external_effect", Vec::new(), Ty::I32));

        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        assert_eq!(DeadNondetElim.run(&mut module, &mut cx).unwrap(), 2);

        let main = module.function("main").unwrap();
        assert_eq!(
            main.callees(),
            vec!["verifier.nondet.i32", "external_effect"]
        );
        assert!(module.function("verifier.nondet.i8").is_none());
        assert!(module.function("external_effect").is_some());
    }
}
