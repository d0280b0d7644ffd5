use std::collections::HashMap;

use sea_core::ir::{
    BasicBlock, BlockId, CmpPredicate, Function, IdGen, Instruction, InstructionKind, Module,
    Terminator, Ty, Value, ValueId,
};

use crate::context::{ModulePass, PassContext};
use crate::error::Result;
use crate::util::value_type;

/// Rewrites every `switch` as a chain of equality tests, one block per case.
pub struct LowerSwitch;

impl ModulePass for LowerSwitch {
    fn name(&self) -> &'static str {
        "lower-switch"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        Ok(module
            .functions
            .iter_mut()
            .map(lower_switches)
            .sum())
    }
}

fn lower_switches(func: &mut Function) -> usize {
    let switches: Vec<BlockId> = func
        .blocks
        .iter()
        .filter(|block| matches!(block.terminator, Terminator::Switch { .. }))
        .map(|block| block.id)
        .collect();
    if switches.is_empty() {
        return 0;
    }
    let types = func.value_types();
    let mut ids = IdGen::new(func);
    for block_id in &switches {
        lower_one(func, *block_id, &types, &mut ids);
    }
    switches.len()
}

fn lower_one(
    func: &mut Function,
    block_id: BlockId,
    types: &HashMap<ValueId, Ty>,
    ids: &mut IdGen,
) {
    let Some(idx) = func.block_index(block_id) else {
        return;
    };
    if !matches!(func.blocks[idx].terminator, Terminator::Switch { .. }) {
        return;
    }
    let terminator = std::mem::replace(&mut func.blocks[idx].terminator, Terminator::Unreachable);
    let successors = terminator.successors();
    let Terminator::Switch {
        value,
        default,
        cases,
    } = terminator
    else {
        return;
    };
    let ty = value_type(&value, types).unwrap_or(Ty::I64);

    // (from, to) edges of the lowered chain
    let mut edges: Vec<(BlockId, BlockId)> = Vec::new();
    let mut chain: Vec<BasicBlock> = Vec::new();
    if cases.is_empty() {
        func.blocks[idx].terminator = Terminator::Br(default);
        edges.push((block_id, default));
    } else {
        let mut current = block_id;
        for (pos, (case, target)) in cases.iter().enumerate() {
            let next = if pos + 1 == cases.len() {
                default
            } else {
                ids.block()
            };
            let cond = ids.value();
            let test = Instruction::new(
                cond,
                Ty::I1,
                InstructionKind::Cmp {
                    pred: CmpPredicate::Eq,
                    lhs: value.clone(),
                    rhs: Value::int(*case, ty.clone()),
                },
            );
            let branch = Terminator::CondBr {
                cond: Value::Reg(cond),
                if_true: *target,
                if_false: next,
            };
            edges.push((current, *target));
            edges.push((current, next));
            if current == block_id {
                func.blocks[idx].instructions.push(test);
                func.blocks[idx].terminator = branch;
            } else {
                let mut block = BasicBlock::new(current, None, branch);
                block.instructions.push(test);
                chain.push(block);
            }
            current = next;
        }
    }
    func.blocks.splice(idx + 1..idx + 1, chain);

    for succ in successors {
        let mut preds: Vec<BlockId> = Vec::new();
        for (from, to) in &edges {
            if *to == succ && !preds.contains(from) {
                preds.push(*from);
            }
        }
        let Some(succ_block) = func.block_mut(succ) else {
            continue;
        };
        for inst in &mut succ_block.instructions {
            let InstructionKind::Phi { incoming } = &mut inst.kind else {
                continue;
            };
            let mut rewritten = Vec::with_capacity(incoming.len() + preds.len());
            for (value, pred) in incoming.drain(..) {
                if pred == block_id {
                    rewritten.extend(preds.iter().map(|p| (value.clone(), *p)));
                } else {
                    rewritten.push((value, pred));
                }
            }
            *incoming = rewritten;
        }
    }
}
