//! Marking and inlining of internal functions.

use std::collections::{HashMap, HashSet};

use sea_core::diagnostics::Diagnostic;
use sea_core::ir::{
    BasicBlock, BlockId, Function, IdGen, Instruction, InstructionKind, Linkage, Module,
    Terminator, Value, ValueId,
};
use tracing::{debug, trace};

use crate::context::{ModulePass, PassContext};
use crate::error::Result;

/// Requests inlining of every internal definition other than `main`, unless
/// the function opted out with `no_inline`.
pub struct MarkInternalInline;

impl ModulePass for MarkInternalInline {
    fn name(&self) -> &'static str {
        "mark-internal-inline"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        let mut marked = 0;
        for func in module.functions.iter_mut() {
            if func.is_declaration()
                || func.is_entry()
                || func.linkage != Linkage::Internal
                || func.attrs.no_inline
                || func.attrs.always_inline
            {
                continue;
            }
            func.attrs.always_inline = true;
            marked += 1;
        }
        Ok(marked)
    }
}

/// Inlines every call to a defined `always_inline` function that cannot reach
/// itself through the call graph.
pub struct AlwaysInline;

impl ModulePass for AlwaysInline {
    fn name(&self) -> &'static str {
        "always-inline"
    }

    fn run(&self, module: &mut Module, cx: &mut PassContext<'_>) -> Result<usize> {
        let recursive = recursive_functions(module);
        let mut inlinable: HashMap<String, Function> = HashMap::new();
        for func in module.defined_functions() {
            if !func.attrs.always_inline {
                continue;
            }
            if recursive.contains(&func.name) {
                cx.push(
                    Diagnostic::info("recursive function stays out of line")
                        .with_source_context(func.name.clone()),
                );
                continue;
            }
            inlinable.insert(func.name.clone(), func.clone());
        }
        if inlinable.is_empty() {
            return Ok(0);
        }

        let mut inlined = 0;
        for caller in module.functions.iter_mut() {
            while let Some((block_idx, inst_idx, callee)) = next_call_site(caller, &inlinable) {
                inline_call(caller, block_idx, inst_idx, callee);
                inlined += 1;
            }
        }
        debug!(inlined, "inlined call sites");
        Ok(inlined)
    }
}

fn call_graph(module: &Module) -> HashMap<&str, HashSet<&str>> {
    module
        .defined_functions()
        .map(|func| {
            let callees = func
                .callees()
                .into_iter()
                .filter(|callee| module.function(callee).is_some_and(|f| !f.is_declaration()))
                .collect();
            (func.name.as_str(), callees)
        })
        .collect()
}

/// Functions that can reach themselves through calls.
pub fn recursive_functions(module: &Module) -> HashSet<String> {
    let graph = call_graph(module);
    let mut recursive = HashSet::new();
    for (&start, callees) in &graph {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = callees.iter().copied().collect();
        while let Some(name) = stack.pop() {
            if name == start {
                recursive.insert(start.to_string());
                break;
            }
            if seen.insert(name) {
                if let Some(next) = graph.get(name) {
                    stack.extend(next.iter().copied());
                }
            }
        }
    }
    recursive
}

fn next_call_site<'m>(
    caller: &Function,
    inlinable: &'m HashMap<String, Function>,
) -> Option<(usize, usize, &'m Function)> {
    for (block_idx, block) in caller.blocks.iter().enumerate() {
        for (inst_idx, inst) in block.instructions.iter().enumerate() {
            let InstructionKind::Call { callee, args } = &inst.kind else {
                continue;
            };
            if *callee == caller.name {
                continue;
            }
            if let Some(target) = inlinable.get(callee) {
                if target.params.len() == args.len() {
                    return Some((block_idx, inst_idx, target));
                }
            }
        }
    }
    None
}

fn remap_value(value: &mut Value, values: &HashMap<ValueId, Value>) {
    value.visit_mut(&mut |value| {
        if let Value::Reg(id) = value {
            if let Some(mapped) = values.get(id) {
                *value = mapped.clone();
            }
        }
    });
}

fn remap_targets(terminator: &mut Terminator, blocks: &HashMap<BlockId, BlockId>) {
    let map = |target: &mut BlockId| {
        if let Some(mapped) = blocks.get(target) {
            *target = *mapped;
        }
    };
    match terminator {
        Terminator::Br(target) => map(target),
        Terminator::CondBr {
            if_true, if_false, ..
        } => {
            map(if_true);
            map(if_false);
        }
        Terminator::Switch { default, cases, .. } => {
            map(default);
            for (_, target) in cases.iter_mut() {
                map(target);
            }
        }
        Terminator::Ret(_) | Terminator::Unreachable => {}
    }
}

fn inline_call(caller: &mut Function, block_idx: usize, inst_idx: usize, callee: &Function) {
    let mut ids = IdGen::new(caller);
    let call_block = caller.blocks[block_idx].id;
    let mut tail = caller.blocks[block_idx].instructions.split_off(inst_idx);
    let call = tail.remove(0);
    let InstructionKind::Call { args, .. } = call.kind else {
        return;
    };

    let continuation = ids.block();
    let terminator = std::mem::replace(
        &mut caller.blocks[block_idx].terminator,
        Terminator::Unreachable,
    );
    for succ in terminator.successors() {
        if let Some(block) = caller.block_mut(succ) {
            block.retarget_phis(call_block, continuation);
        }
    }
    let mut after = BasicBlock::new(continuation, None, terminator);
    after.instructions = tail;

    let mut values: HashMap<ValueId, Value> = callee
        .params
        .iter()
        .zip(args)
        .map(|(param, arg)| (param.id, arg))
        .collect();
    let mut blocks: HashMap<BlockId, BlockId> = HashMap::new();
    for block in &callee.blocks {
        blocks.insert(block.id, ids.block());
        for inst in &block.instructions {
            if let Some(id) = inst.result {
                values.insert(id, Value::Reg(ids.value()));
            }
        }
    }

    let mut body: Vec<BasicBlock> = Vec::with_capacity(callee.blocks.len());
    let mut allocas: Vec<Instruction> = Vec::new();
    let mut returns: Vec<(Value, BlockId)> = Vec::new();
    for block in &callee.blocks {
        let id = blocks[&block.id];
        let mut clone = BasicBlock::new(id, block.label.clone(), block.terminator.clone());
        for inst in &block.instructions {
            let mut inst = inst.clone();
            inst.result = inst
                .result
                .and_then(|old| values.get(&old).and_then(Value::as_reg));
            for operand in inst.operands_mut() {
                remap_value(operand, &values);
            }
            if let InstructionKind::Phi { incoming } = &mut inst.kind {
                for (_, pred) in incoming.iter_mut() {
                    *pred = blocks.get(pred).copied().unwrap_or(*pred);
                }
            }
            if matches!(inst.kind, InstructionKind::Alloca { .. }) {
                allocas.push(inst);
            } else {
                clone.instructions.push(inst);
            }
        }
        for operand in clone.terminator.operands_mut() {
            remap_value(operand, &values);
        }
        remap_targets(&mut clone.terminator, &blocks);
        if let Terminator::Ret(value) = &clone.terminator {
            if let Some(value) = value {
                returns.push((value.clone(), id));
            }
            clone.terminator = Terminator::Br(continuation);
        }
        body.push(clone);
    }

    let mut replacements: HashMap<ValueId, Value> = HashMap::new();
    if let Some(result) = call.result {
        match returns.len() {
            0 => {
                replacements.insert(result, Value::Undef(call.ty.clone()));
            }
            1 => {
                replacements.insert(result, returns[0].0.clone());
            }
            _ => after.instructions.insert(
                0,
                Instruction::new(result, call.ty.clone(), InstructionKind::Phi { incoming: returns }),
            ),
        }
    }

    if let Some(entry) = callee.entry_id().and_then(|entry| blocks.get(&entry)) {
        caller.blocks[block_idx].terminator = Terminator::Br(*entry);
    }
    let at = block_idx + 1;
    caller.blocks.splice(at..at, body.into_iter().chain(std::iter::once(after)));
    let entry = &mut caller.blocks[0];
    let first = entry.first_non_phi();
    entry.instructions.splice(first..first, allocas);
    caller.replace_uses(&replacements);
    trace!(caller = %caller.name, callee = %callee.name, "inlined call");
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_core::ir::builder::FunctionBuilder;
    use sea_core::ir::{BinaryOp, CmpPredicate, DataLayout, Ty};

    fn module() -> Module {
        let mut module = Module::new("m");
        let mut main = FunctionBuilder::new("main", Vec::new(), Ty::I32);
        let clamped = main
            .call("clamp", Ty::I32, vec![Value::int(5, Ty::I32)])
            .unwrap_or(Value::int(0, Ty::I32));
        let plus = main.binary(BinaryOp::Add, Ty::I32, clamped, Value::int(1, Ty::I32));
        main.call("spin", Ty::Void, Vec::new());
        main.ret(Some(plus));
        module.functions.push(main.finish());

        let mut clamp = FunctionBuilder::new("clamp", vec![Ty::I32], Ty::I32)
            .linkage(Linkage::Internal);
        let x = clamp.param(0);
        let slot = clamp.alloca(Ty::I32);
        clamp.store(x.clone(), slot);
        let positive = clamp.cmp(CmpPredicate::Sgt, x.clone(), Value::int(0, Ty::I32));
        let keep = clamp.block();
        let zero = clamp.block();
        clamp.cond_br(positive, keep, zero);
        clamp.switch_to(keep);
        clamp.ret(Some(x));
        clamp.switch_to(zero);
        clamp.ret(Some(Value::int(0, Ty::I32)));
        module.functions.push(clamp.finish());

        let mut spin = FunctionBuilder::new("spin", Vec::new(), Ty::Void).linkage(Linkage::Internal);
        spin.call("spin", Ty::Void, Vec::new());
        spin.ret(None);
        module.functions.push(spin.finish());
        module
    }

    #[test]
    fn marks_internal_definitions() {
        let mut module = module();
        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        assert_eq!(MarkInternalInline.run(&mut module, &mut cx).unwrap(), 2);
        assert!(!module.function("main").unwrap().attrs.always_inline);
        assert!(module.function("clamp").unwrap().attrs.always_inline);
        assert_eq!(MarkInternalInline.run(&mut module, &mut cx).unwrap(), 0);
    }

    #[test]
    fn inlines_non_recursive_callees() {
        let mut module = module();
        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        MarkInternalInline.run(&mut module, &mut cx).unwrap();
        assert_eq!(AlwaysInline.run(&mut module, &mut cx).unwrap(), 1);

        let main = module.function("main").unwrap();
        assert_eq!(main.callees(), vec!["spin"]);
        assert!(matches!(
            main.blocks[0].instructions[0].kind,
            InstructionKind::Alloca { .. }
        ));
        // the call's register now names the merged return value
        let continuation = main.blocks.last().unwrap();
        let phi = &continuation.instructions[0];
        assert_eq!(phi.result, Some(0));
        let InstructionKind::Phi { incoming } = &phi.kind else {
            panic!("expected phi");
        };
        assert_eq!(incoming.len(), 2);
        assert_eq!(incoming[0].0, Value::int(5, Ty::I32));
        assert_eq!(incoming[1].0, Value::int(0, Ty::I32));
        assert!(recursive_functions(&module).contains("spin"));
        assert_eq!(main.predecessors()[&continuation.id].len(), 2);
    }
}
