//! Promotion of stack slots to SSA registers.
//!
//! A scalar `alloca` whose address is only ever used directly by loads and
//! stores of its own type is replaced by registers: phis are placed on the
//! iterated dominance frontier of its stores and uses are renamed by a walk
//! over the dominator tree. Reads that no store reaches become `undef`.

use std::collections::{HashMap, HashSet};

use sea_core::ir::{
    BlockId, Function, IdGen, Instruction, InstructionKind, Module, Ty, Value, ValueId,
};
use tracing::trace;

use crate::analysis::{Cfg, DomTree};
use crate::context::{ModulePass, PassContext};
use crate::error::Result;
use crate::util::value_type;

pub struct Mem2Reg;

impl ModulePass for Mem2Reg {
    fn name(&self) -> &'static str {
        "mem2reg"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        let mut promoted = 0;
        for func in module.functions.iter_mut() {
            if func.is_declaration() {
                continue;
            }
            let count = promote_allocas(func);
            if count > 0 {
                trace!(function = %func.name, count, "promoted allocas");
            }
            promoted += count;
        }
        Ok(promoted)
    }
}

fn promotable_allocas(func: &Function) -> Vec<(ValueId, Ty)> {
    let uses = func.use_counts();
    let mut candidates: Vec<(ValueId, Ty)> = Vec::new();
    let mut direct: HashMap<ValueId, usize> = HashMap::new();
    for inst in func.blocks.iter().flat_map(|block| block.instructions.iter()) {
        match &inst.kind {
            InstructionKind::Alloca { allocated } if allocated.is_scalar() => {
                if let Some(id) = inst.result {
                    candidates.push((id, allocated.clone()));
                }
            }
            InstructionKind::Load {
                ptr: Value::Reg(ptr),
            } => {
                *direct.entry(*ptr).or_insert(0) += 1;
            }
            InstructionKind::Store {
                value,
                ptr: Value::Reg(ptr),
            } if value.as_reg() != Some(*ptr) => {
                *direct.entry(*ptr).or_insert(0) += 1;
            }
            _ => {}
        }
    }
    // loads must read the slot at its own type
    let types = func.value_types();
    candidates.retain(|(id, allocated)| {
        let typed_loads = func
            .blocks
            .iter()
            .flat_map(|block| block.instructions.iter())
            .all(|inst| match &inst.kind {
                InstructionKind::Load {
                    ptr: Value::Reg(ptr),
                } if ptr == id => inst.ty == *allocated,
                InstructionKind::Store {
                    value,
                    ptr: Value::Reg(ptr),
                } if ptr == id => value_type(value, &types)
                    .map_or(true, |ty| ty == *allocated),
                _ => true,
            });
        typed_loads && uses.get(id).copied().unwrap_or(0) == direct.get(id).copied().unwrap_or(0)
    });
    candidates
}

/// Promotes every promotable alloca of `func`. Returns how many were promoted.
pub fn promote_allocas(func: &mut Function) -> usize {
    let Some(cfg) = Cfg::new(func) else {
        return 0;
    };
    let allocas = promotable_allocas(func);
    if allocas.is_empty() {
        return 0;
    }
    let slot_types: HashMap<ValueId, Ty> = allocas.iter().cloned().collect();
    let reachable = cfg.reachable();
    let dom = DomTree::new(&cfg);
    let frontiers = dom.frontiers(&cfg);
    let mut ids = IdGen::new(func);

    // phi placement on the iterated dominance frontier
    let mut phi_slot: HashMap<ValueId, ValueId> = HashMap::new();
    let mut block_phis: HashMap<BlockId, Vec<ValueId>> = HashMap::new();
    for (slot, _) in &allocas {
        let def_blocks: HashSet<BlockId> = func
            .blocks
            .iter()
            .filter(|block| reachable.contains(&block.id))
            .filter(|block| {
                block.instructions.iter().any(|inst| {
                    matches!(&inst.kind, InstructionKind::Store { ptr: Value::Reg(ptr), .. } if ptr == slot)
                })
            })
            .map(|block| block.id)
            .collect();
        let mut placed: HashSet<BlockId> = HashSet::new();
        let mut work: Vec<BlockId> = def_blocks.iter().copied().collect();
        work.sort_unstable();
        while let Some(block) = work.pop() {
            let Some(frontier) = frontiers.get(&block) else {
                continue;
            };
            let mut frontier: Vec<BlockId> = frontier.iter().copied().collect();
            frontier.sort_unstable();
            for target in frontier {
                if placed.insert(target) {
                    let phi = ids.value();
                    phi_slot.insert(phi, *slot);
                    block_phis.entry(target).or_default().push(phi);
                    if !def_blocks.contains(&target) {
                        work.push(target);
                    }
                }
            }
        }
    }
    for (block_id, phis) in &block_phis {
        if let Some(block) = func.block_mut(*block_id) {
            for phi in phis.iter().rev() {
                let ty = slot_types[&phi_slot[phi]].clone();
                block.instructions.insert(
                    0,
                    Instruction::new(*phi, ty, InstructionKind::Phi { incoming: Vec::new() }),
                );
            }
        }
    }

    // renaming over the dominator tree
    let mut replacements: HashMap<ValueId, Value> = HashMap::new();
    let initial: HashMap<ValueId, Value> = allocas
        .iter()
        .map(|(slot, ty)| (*slot, Value::Undef(ty.clone())))
        .collect();
    let mut stack = vec![(cfg.entry, initial)];
    while let Some((block_id, mut current)) = stack.pop() {
        let Some(block) = func.block_mut(block_id) else {
            continue;
        };
        block.instructions.retain(|inst| {
            if let Some(result) = inst.result {
                if let Some(slot) = phi_slot.get(&result) {
                    current.insert(*slot, Value::Reg(result));
                    return true;
                }
            }
            match &inst.kind {
                InstructionKind::Alloca { .. } => {
                    !inst.result.is_some_and(|id| slot_types.contains_key(&id))
                }
                InstructionKind::Load {
                    ptr: Value::Reg(ptr),
                } if slot_types.contains_key(ptr) => {
                    if let (Some(result), Some(value)) = (inst.result, current.get(ptr)) {
                        replacements.insert(result, value.clone());
                    }
                    false
                }
                InstructionKind::Store {
                    value,
                    ptr: Value::Reg(ptr),
                } if slot_types.contains_key(ptr) => {
                    current.insert(*ptr, value.clone());
                    false
                }
                _ => true,
            }
        });
        let successors = block.successors();
        for succ in successors {
            let Some(phis) = block_phis.get(&succ) else {
                continue;
            };
            let Some(succ_block) = func.block_mut(succ) else {
                continue;
            };
            for inst in &mut succ_block.instructions {
                let Some(result) = inst.result else {
                    continue;
                };
                if !phis.contains(&result) {
                    continue;
                }
                let slot = phi_slot[&result];
                if let InstructionKind::Phi { incoming } = &mut inst.kind {
                    incoming.push((current[&slot].clone(), block_id));
                }
            }
        }
        for child in dom.children(block_id) {
            stack.push((*child, current.clone()));
        }
    }

    // blocks the walk never reached
    for block in func.blocks.iter_mut().filter(|block| !reachable.contains(&block.id)) {
        block.instructions.retain(|inst| match &inst.kind {
            InstructionKind::Alloca { .. } => {
                !inst.result.is_some_and(|id| slot_types.contains_key(&id))
            }
            InstructionKind::Load {
                ptr: Value::Reg(ptr),
            } if slot_types.contains_key(ptr) => {
                if let Some(result) = inst.result {
                    replacements.insert(result, Value::Undef(slot_types[ptr].clone()));
                }
                false
            }
            InstructionKind::Store {
                ptr: Value::Reg(ptr),
                ..
            } if slot_types.contains_key(ptr) => false,
            _ => true,
        });
    }
    let preds = func.predecessors();
    for (block_id, phis) in &block_phis {
        let dead_preds: Vec<BlockId> = preds
            .get(block_id)
            .map(|preds| {
                preds
                    .iter()
                    .copied()
                    .filter(|pred| !reachable.contains(pred))
                    .collect()
            })
            .unwrap_or_default();
        if dead_preds.is_empty() {
            continue;
        }
        if let Some(block) = func.block_mut(*block_id) {
            for inst in &mut block.instructions {
                let Some(result) = inst.result.filter(|id| phis.contains(id)) else {
                    continue;
                };
                let ty = slot_types[&phi_slot[&result]].clone();
                if let InstructionKind::Phi { incoming } = &mut inst.kind {
                    for pred in &dead_preds {
                        incoming.push((Value::Undef(ty.clone()), *pred));
                    }
                }
            }
        }
    }

    func.replace_uses(&replacements);
    allocas.len()
}
