use sea_core::ir::{
    BasicBlock, BlockId, Function, IdGen, Instruction, InstructionKind, Module, Terminator, Value,
};

use crate::context::{ModulePass, PassContext};
use crate::error::Result;

pub const UNIFIED_RETURN: &str = "UnifiedReturnBlock";
pub const UNIFIED_UNREACHABLE: &str = "UnifiedUnreachableBlock";

/// Leaves each function with at most one `ret` block and at most one
/// `unreachable` block.
pub struct UnifyFunctionExitNodes;

impl ModulePass for UnifyFunctionExitNodes {
    fn name(&self) -> &'static str {
        "unify-function-exit-nodes"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        let mut redirected = 0;
        for func in module.functions.iter_mut() {
            if func.is_declaration() {
                continue;
            }
            redirected += unify_unreachable(func) + unify_returns(func);
        }
        Ok(redirected)
    }
}

fn unify_unreachable(func: &mut Function) -> usize {
    let exits: Vec<BlockId> = func
        .blocks
        .iter()
        .filter(|block| matches!(block.terminator, Terminator::Unreachable))
        .map(|block| block.id)
        .collect();
    if exits.len() < 2 {
        return 0;
    }
    let unified = IdGen::new(func).block();
    for block in func.blocks.iter_mut().filter(|b| exits.contains(&b.id)) {
        block.terminator = Terminator::Br(unified);
    }
    func.blocks.push(BasicBlock::new(
        unified,
        Some(UNIFIED_UNREACHABLE.to_string()),
        Terminator::Unreachable,
    ));
    exits.len()
}

fn unify_returns(func: &mut Function) -> usize {
    let exits: Vec<(BlockId, Option<Value>)> = func
        .blocks
        .iter()
        .filter_map(|block| match &block.terminator {
            Terminator::Ret(value) => Some((block.id, value.clone())),
            _ => None,
        })
        .collect();
    if exits.len() < 2 {
        return 0;
    }
    let mut ids = IdGen::new(func);
    let unified = ids.block();
    for block in func.blocks.iter_mut() {
        if exits.iter().any(|(id, _)| *id == block.id) {
            block.terminator = Terminator::Br(unified);
        }
    }

    let mut block = BasicBlock::new(unified, Some(UNIFIED_RETURN.to_string()), Terminator::Ret(None));
    if !func.return_type.is_void() {
        let merged = ids.value();
        let incoming = exits
            .iter()
            .map(|(id, value)| {
                let value = value
                    .clone()
                    .unwrap_or_else(|| Value::Undef(func.return_type.clone()));
                (value, *id)
            })
            .collect();
        block.instructions.push(Instruction::new(
            merged,
            func.return_type.clone(),
            InstructionKind::Phi { incoming },
        ));
        block.terminator = Terminator::Ret(Some(Value::Reg(merged)));
    }
    func.blocks.push(block);
    exits.len()
}
