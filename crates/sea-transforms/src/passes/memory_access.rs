use std::collections::HashMap;

use sea_core::intrinsics::is_verifier_call;
use sea_core::ir::{InstructionKind, Module};

use crate::context::{ModulePass, PassContext};
use crate::error::Result;

/// Records on every function whether it may read or write memory, directly
/// or through its callees. Unknown external functions are assumed to.
pub struct CanAccessMemory;

impl ModulePass for CanAccessMemory {
    fn name(&self) -> &'static str {
        "can-access-memory"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        let mut access: HashMap<String, bool> = module
            .functions
            .iter()
            .map(|func| {
                let direct = if func.is_declaration() {
                    !is_verifier_call(&func.name)
                } else {
                    func.blocks
                        .iter()
                        .flat_map(|block| block.instructions.iter())
                        .any(|inst| {
                            matches!(
                                inst.kind,
                                InstructionKind::Load { .. } | InstructionKind::Store { .. }
                            )
                        })
                };
                (func.name.clone(), direct)
            })
            .collect();

        loop {
            let mut changed = false;
            for func in module.defined_functions() {
                if access.get(&func.name).copied().unwrap_or(false) {
                    continue;
                }
                let through_calls = func
                    .callees()
                    .into_iter()
                    .any(|callee| access.get(callee).copied().unwrap_or(!is_verifier_call(callee)));
                if through_calls {
                    access.insert(func.name.clone(), true);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut updated = 0;
        for func in module.functions.iter_mut() {
            let value = access.get(&func.name).copied();
            if func.attrs.accesses_memory != value {
                func.attrs.accesses_memory = value;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_core::ir::builder::{declaration, FunctionBuilder};
    use sea_core::ir::{BinaryOp, DataLayout, Ty, Value};

    #[test]
    fn memory_access_propagates_to_callers() {
        let mut module = Module::new("m");
        let mut main = FunctionBuilder::new("main", Vec::new(), Ty::I32);
        let value = main
            .call("wrapper", Ty::I32, Vec::new())
            .unwrap_or(Value::int(0, Ty::I32));
        main.call("pure", Ty::I32, Vec::new());
        main.ret(Some(value));
        module.functions.push(main.finish());

        let mut wrapper = FunctionBuilder::new("wrapper", Vec::new(), Ty::I32);
        let read = wrapper.call("reader", Ty::I32, Vec::new());
        wrapper.ret(read);
        module.functions.push(wrapper.finish());

        let mut reader = FunctionBuilder::new("reader", Vec::new(), Ty::I32);
        let loaded = reader.load(Ty::I32, Value::global("g"));
        reader.ret(Some(loaded));
        module.functions.push(reader.finish());

        let mut pure = FunctionBuilder::new("pure", Vec::new(), Ty::I32);
        let choice = pure
            .call("verifier.nondet.i32", Ty::I32, Vec::new())
            .unwrap_or(Value::int(0, Ty::I32));
        let doubled = pure.binary(BinaryOp::Add, Ty::I32, choice.clone(), choice);
        pure.ret(Some(doubled));
        module.functions.push(pure.finish());
        module
            .functions
            .push(declaration("verifier.nondet.i32", Vec::new(), Ty::I32));

        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        assert_eq!(CanAccessMemory.run(&mut module, &mut cx).unwrap(), 5);

        let flag = |name: &str| module.function(name).unwrap().attrs.accesses_memory;
        assert_eq!(flag("reader"), Some(true));
        assert_eq!(flag("wrapper"), Some(true));
        assert_eq!(flag("main"), Some(true));
        assert_eq!(flag("pure"), Some(false));
        assert_eq!(flag("verifier.nondet.i32"), Some(false));
        assert_eq!(CanAccessMemory.run(&mut module, &mut cx).unwrap(), 0);
    }
}
