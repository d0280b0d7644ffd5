//! Helpers shared by several passes.

use std::collections::{HashMap, HashSet};

use sea_core::intrinsics;
use sea_core::ir::{
    BasicBlock, BlockId, Function, IdGen, Instruction, InstructionKind, Module, Terminator, Ty,
    Value, ValueId,
};

use crate::analysis::Cfg;

/// Deletes blocks not reachable from the entry and drops phi entries that
/// referred to them. Returns the number of deleted blocks.
pub fn remove_unreachable_blocks(func: &mut Function) -> usize {
    let Some(cfg) = Cfg::new(func) else {
        return 0;
    };
    let reachable = cfg.reachable();
    let dead: Vec<BlockId> = func
        .blocks
        .iter()
        .map(|block| block.id)
        .filter(|id| !reachable.contains(id))
        .collect();
    if dead.is_empty() {
        return 0;
    }
    func.blocks.retain(|block| reachable.contains(&block.id));
    for block in &mut func.blocks {
        for id in &dead {
            block.remove_phi_incoming(*id);
        }
    }
    dead.len()
}

/// Moves `instructions[at..]` and the terminator of `block` into a fresh block
/// placed right after it. The original block is left ending in `br` to the
/// new block; successors' phis are retargeted.
pub fn split_block(func: &mut Function, block: BlockId, at: usize, ids: &mut IdGen) -> BlockId {
    let new_id = ids.block();
    let Some(idx) = func.block_index(block) else {
        return new_id;
    };
    let tail = func.blocks[idx].instructions.split_off(at);
    let terminator = std::mem::replace(&mut func.blocks[idx].terminator, Terminator::Br(new_id));
    let successors = terminator.successors();
    let mut new_block = BasicBlock::new(new_id, None, terminator);
    new_block.instructions = tail;
    func.blocks.insert(idx + 1, new_block);
    for succ in successors {
        if let Some(succ_block) = func.block_mut(succ) {
            succ_block.retarget_phis(block, new_id);
        }
    }
    new_id
}

/// Returns the function's error block with the given label, creating one that
/// calls `verifier.error` and ends in `unreachable`.
pub fn error_block(func: &mut Function, ids: &mut IdGen, label: &str) -> BlockId {
    if let Some(block) = func
        .blocks
        .iter()
        .find(|block| block.label.as_deref() == Some(label))
    {
        return block.id;
    }
    let id = ids.block();
    let mut block = BasicBlock::new(id, Some(label.to_string()), Terminator::Unreachable);
    block.instructions.push(Instruction::effect(InstructionKind::Call {
        callee: intrinsics::ERROR.to_string(),
        args: Vec::new(),
    }));
    func.blocks.push(block);
    id
}

/// Walks every instruction of `func` and, where `plan` returns guard code and
/// a failure condition for it, inserts the code right before the instruction
/// and branches to the `label` error block when the condition holds. The
/// guarded instruction starts a fresh block. Returns the number of guards.
pub fn insert_guards(
    func: &mut Function,
    ids: &mut IdGen,
    label: &str,
    mut plan: impl FnMut(&Instruction, &mut IdGen) -> Option<(Vec<Instruction>, Value)>,
) -> usize {
    let mut guards = 0;
    let mut cursor = 0;
    let mut start = 0;
    while cursor < func.blocks.len() {
        let block = &func.blocks[cursor];
        let block_id = block.id;
        let found = block.instructions[start.min(block.instructions.len())..]
            .iter()
            .enumerate()
            .find_map(|(offset, inst)| plan(inst, ids).map(|guard| (start + offset, guard)));
        let Some((at, (checks, failed))) = found else {
            cursor += 1;
            start = 0;
            continue;
        };
        let len = checks.len();
        func.blocks[cursor].instructions.splice(at..at, checks);
        let rest = split_block(func, block_id, at + len, ids);
        let error = error_block(func, ids, label);
        func.blocks[cursor].terminator = Terminator::CondBr {
            cond: failed,
            if_true: error,
            if_false: rest,
        };
        guards += 1;
        // the split-off block follows; skip its first instruction
        cursor += 1;
        start = 1;
    }
    guards
}

/// Every symbol named by a call or an operand anywhere in the module.
pub fn referenced_symbols(module: &Module) -> HashSet<String> {
    let mut symbols = HashSet::new();
    for func in &module.functions {
        symbols.extend(function_references(func));
    }
    symbols
}

pub fn function_references(func: &Function) -> HashSet<String> {
    let mut symbols = HashSet::new();
    for block in &func.blocks {
        for inst in &block.instructions {
            if let InstructionKind::Call { callee, .. } = &inst.kind {
                symbols.insert(callee.clone());
            }
            for operand in inst.operands() {
                symbols.extend(operand.referenced_globals().into_iter().map(str::to_string));
            }
        }
        for operand in block.terminator.operands() {
            symbols.extend(operand.referenced_globals().into_iter().map(str::to_string));
        }
    }
    symbols
}

pub fn value_type(value: &Value, types: &HashMap<ValueId, Ty>) -> Option<Ty> {
    match value {
        Value::Reg(id) => types.get(id).cloned(),
        Value::Const(constant) => Some(constant.ty()),
        Value::Global(_) => Some(Ty::Ptr),
        Value::Undef(ty) => Some(ty.clone()),
        Value::Expr(expr) => Some(expr.ty()),
    }
}

/// Deletes instructions whose results are unused and that have no side
/// effects, until nothing changes. Returns the number removed.
pub fn remove_dead_instructions(func: &mut Function) -> usize {
    let mut removed = 0;
    loop {
        let uses = func.use_counts();
        let mut round = 0;
        for block in &mut func.blocks {
            block.instructions.retain(|inst| {
                let dead = match inst.result {
                    Some(id) => !uses.contains_key(&id) && !inst.has_side_effects(),
                    None => false,
                };
                if dead {
                    round += 1;
                }
                !dead
            });
        }
        if round == 0 {
            return removed;
        }
        removed += round;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_core::ir::builder::FunctionBuilder;
    use sea_core::ir::{BinaryOp, CmpPredicate};

    #[test]
    fn split_block_moves_tail_and_retargets_phis() {
        let mut b = FunctionBuilder::new("f", vec![Ty::I32], Ty::I32);
        let x = b.param(0);
        let one = b.binary(BinaryOp::Add, Ty::I32, x.clone(), Value::int(1, Ty::I32));
        let two = b.binary(BinaryOp::Add, Ty::I32, one.clone(), Value::int(1, Ty::I32));
        let exit = b.block();
        b.br(exit);
        b.switch_to(exit);
        let phi = b.phi(Ty::I32, vec![(two, 0)]);
        b.ret(Some(phi));
        let mut func = b.finish();

        let mut ids = IdGen::new(&func);
        let tail = split_block(&mut func, 0, 1, &mut ids);
        assert_eq!(func.blocks[0].instructions.len(), 1);
        assert_eq!(func.blocks[0].terminator, Terminator::Br(tail));
        assert_eq!(func.blocks[1].id, tail);
        assert_eq!(func.blocks[1].terminator, Terminator::Br(exit));
        assert_eq!(func.predecessors()[&exit], vec![tail]);
        let InstructionKind::Phi { incoming } = &func.block(exit).unwrap().instructions[0].kind
        else {
            panic!("expected phi");
        };
        assert_eq!(incoming[0].1, tail);
    }

    #[test]
    fn unreachable_blocks_leave_no_phi_entries() {
        let mut b = FunctionBuilder::new("f", vec![Ty::I32], Ty::I32);
        let exit = b.block();
        let dead = b.block();
        b.br(exit);
        b.switch_to(dead);
        b.br(exit);
        b.switch_to(exit);
        let x = b.param(0);
        let phi = b.phi(Ty::I32, vec![(x, 0), (Value::int(3, Ty::I32), dead)]);
        b.cmp(CmpPredicate::Eq, phi.clone(), Value::int(0, Ty::I32));
        b.ret(Some(phi));
        let mut func = b.finish();

        assert_eq!(remove_unreachable_blocks(&mut func), 1);
        assert!(func.block(dead).is_none());
        let InstructionKind::Phi { incoming } = &func.block(exit).unwrap().instructions[0].kind
        else {
            panic!("expected phi");
        };
        assert_eq!(incoming.len(), 1);
        assert_eq!(remove_dead_instructions(&mut func), 1);
    }
}
