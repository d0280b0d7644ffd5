//! Shadowing of buffer sizes across calls.
//!
//! Every pointer parameter of an internal function gets a companion `i64`
//! parameter carrying the size in bytes of the object it points into. Call
//! sites pass the size when it is known locally, forward their own shadow
//! parameter when passing one of their pointer parameters on, and pass
//! `undef` otherwise.

use std::collections::HashMap;

use sea_core::ir::{
    DataLayout, Function, IdGen, InstructionKind, Linkage, Module, Param, Ty, Value, ValueId,
};
use tracing::debug;

use crate::context::{ModulePass, PassContext};
use crate::error::Result;

pub struct ShadowBoundsCheckFuncPars;

impl ModulePass for ShadowBoundsCheckFuncPars {
    fn name(&self) -> &'static str {
        "shadow-bounds-check-func-pars"
    }

    fn run(&self, module: &mut Module, cx: &mut PassContext<'_>) -> Result<usize> {
        // pointer parameter positions of every rewritten function
        let mut shadowed: HashMap<String, Vec<usize>> = HashMap::new();
        for func in module.functions.iter_mut() {
            if func.is_declaration()
                || func.is_entry()
                || func.linkage != Linkage::Internal
                || func.params.iter().any(|param| param.shadow_of.is_some())
            {
                continue;
            }
            let pointers: Vec<usize> = func
                .params
                .iter()
                .enumerate()
                .filter(|(_, param)| param.ty.is_pointer())
                .map(|(idx, _)| idx)
                .collect();
            if pointers.is_empty() {
                continue;
            }
            let mut ids = IdGen::new(func);
            for idx in &pointers {
                let target = func.params[*idx].id;
                let name = func.params[*idx]
                    .name
                    .as_ref()
                    .map(|name| format!("{}.size", name));
                func.params.push(Param {
                    id: ids.value(),
                    name,
                    ty: Ty::I64,
                    shadow_of: Some(target),
                });
            }
            shadowed.insert(func.name.clone(), pointers);
        }
        if shadowed.is_empty() {
            return Ok(0);
        }

        let globals: HashMap<String, u64> = module
            .globals
            .iter()
            .map(|global| (global.name.clone(), cx.layout.alloc_size_of(&global.ty)))
            .collect();
        let mut call_sites = 0;
        for func in module.functions.iter_mut() {
            call_sites += extend_call_sites(func, &shadowed, &globals, cx.layout);
        }
        debug!(
            functions = shadowed.len(),
            call_sites, "shadowed pointer parameters"
        );
        Ok(shadowed.len() + call_sites)
    }
}

fn extend_call_sites(
    func: &mut Function,
    shadowed: &HashMap<String, Vec<usize>>,
    globals: &HashMap<String, u64>,
    layout: &DataLayout,
) -> usize {
    let mut known: HashMap<ValueId, Value> = HashMap::new();
    for param in &func.params {
        if let Some(target) = param.shadow_of {
            known.insert(target, Value::Reg(param.id));
        }
    }
    for inst in func.blocks.iter().flat_map(|block| block.instructions.iter()) {
        if let (Some(id), InstructionKind::Alloca { allocated }) = (inst.result, &inst.kind) {
            known.insert(id, Value::i64(layout.alloc_size_of(allocated) as i64));
        }
    }
    let size_of = |arg: &Value| -> Value {
        match arg {
            Value::Reg(id) => known.get(id).cloned(),
            Value::Global(name) => globals.get(name).map(|size| Value::i64(*size as i64)),
            _ => None,
        }
        .unwrap_or(Value::Undef(Ty::I64))
    };

    let mut rewritten = 0;
    for block in func.blocks.iter_mut() {
        for inst in block.instructions.iter_mut() {
            let InstructionKind::Call { callee, args } = &mut inst.kind else {
                continue;
            };
            let Some(pointers) = shadowed.get(callee.as_str()) else {
                continue;
            };
            let sizes: Vec<Value> = pointers
                .iter()
                .map(|idx| args.get(*idx).map_or(Value::Undef(Ty::I64), &size_of))
                .collect();
            args.extend(sizes);
            rewritten += 1;
        }
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sea_core::ir::builder::FunctionBuilder;
    use sea_core::ir::{Global, Terminator};

    fn module() -> Module {
        let mut module = Module::new("m");
        module.globals.push(Global {
            name: "buf".to_string(),
            ty: Ty::array(Ty::I32, 8),
            initializer: None,
            linkage: Linkage::Internal,
            is_constant: false,
        });
        let mut main = FunctionBuilder::new("main", Vec::new(), Ty::I32);
        let local = main.alloca(Ty::array(Ty::I8, 5));
        main.call("fill", Ty::Void, vec![local, Value::int(1, Ty::I32)]);
        main.call("fill", Ty::Void, vec![Value::global("buf"), Value::int(2, Ty::I32)]);
        main.ret(Some(Value::int(0, Ty::I32)));
        module.functions.push(main.finish());

        let mut fill = FunctionBuilder::new("fill", vec![Ty::Ptr, Ty::I32], Ty::Void)
            .linkage(Linkage::Internal);
        let (dst, value) = (fill.param(0), fill.param(1));
        fill.call("fill", Ty::Void, vec![dst.clone(), value.clone()]);
        fill.store(value, dst);
        fill.terminate(Terminator::Ret(None));
        module.functions.push(fill.finish());
        module
    }

    #[test]
    fn pointer_parameters_get_size_companions() {
        let mut module = module();
        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        assert_eq!(
            ShadowBoundsCheckFuncPars.run(&mut module, &mut cx).unwrap(),
            4
        );

        let fill = module.function("fill").unwrap();
        assert_eq!(fill.params.len(), 3);
        assert_eq!(fill.params[2].ty, Ty::I64);
        assert_eq!(fill.params[2].shadow_of, Some(0));
        let shadow = fill.params[2].id;

        let args: Vec<Vec<Value>> = module
            .functions
            .iter()
            .flat_map(|func| func.blocks.iter())
            .flat_map(|block| block.instructions.iter())
            .filter_map(|inst| match &inst.kind {
                InstructionKind::Call { args, .. } => Some(args.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(args[0][2], Value::i64(5));
        assert_eq!(args[1][2], Value::i64(32));
        assert_eq!(args[2][2], Value::Reg(shadow));
        // a second run leaves shadowed functions alone
        assert_eq!(
            ShadowBoundsCheckFuncPars.run(&mut module, &mut cx).unwrap(),
            0
        );
    }
}
