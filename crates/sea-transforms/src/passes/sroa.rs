//! Scalar replacement of aggregates.
//!
//! An aggregate stack slot that is only accessed member-wise through
//! constant-index address computations is split into one slot per member.
//! Splitting repeats for nested aggregates; the resulting scalar slots are
//! then promoted to registers, which can leave `undef` behind.

use std::collections::HashMap;

use sea_core::ir::{
    DataLayout, Function, IdGen, Instruction, InstructionKind, Module, Ty, Value, ValueId,
};
use tracing::trace;

use super::mem2reg::promote_allocas;
use crate::context::{ModulePass, PassContext};
use crate::error::Result;

/// Limits on what is split. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SroaThresholds {
    /// Largest aggregate, in bytes.
    pub size: Option<u64>,
    pub struct_members: Option<u64>,
    pub array_elements: Option<u64>,
    /// Most member loads an aggregate may see.
    pub scalar_loads: Option<u64>,
}

impl SroaThresholds {
    /// Builds thresholds from command-line style values where a negative
    /// number means unlimited.
    pub fn from_raw(size: i64, struct_members: i64, array_elements: i64, scalar_loads: i64) -> Self {
        let limit = |value: i64| u64::try_from(value).ok();
        Self {
            size: limit(size),
            struct_members: limit(struct_members),
            array_elements: limit(array_elements),
            scalar_loads: limit(scalar_loads),
        }
    }

    pub fn unlimited() -> Self {
        Self::from_raw(-1, -1, -1, -1)
    }

    fn allows(&self, layout: &DataLayout, ty: &Ty, loads: u64) -> bool {
        let within = |limit: Option<u64>, value: u64| limit.map_or(true, |limit| value <= limit);
        let members = ty.element_count().unwrap_or(0);
        let shape = match ty {
            Ty::Struct(_) => within(self.struct_members, members),
            Ty::Array(..) => within(self.array_elements, members),
            _ => false,
        };
        shape && within(self.size, layout.size_of(ty)) && within(self.scalar_loads, loads)
    }
}

impl Default for SroaThresholds {
    fn default() -> Self {
        let max = i64::from(i32::MAX);
        Self::from_raw(max, max, max, -1)
    }
}

pub struct Sroa {
    pub thresholds: SroaThresholds,
}

impl ModulePass for Sroa {
    fn name(&self) -> &'static str {
        "sroa"
    }

    fn run(&self, module: &mut Module, cx: &mut PassContext<'_>) -> Result<usize> {
        let mut changes = 0;
        for func in module.functions.iter_mut() {
            if func.is_declaration() {
                continue;
            }
            let split = split_aggregates(func, cx.layout, &self.thresholds);
            let promoted = promote_allocas(func);
            if split + promoted > 0 {
                trace!(function = %func.name, split, promoted, "scalarized");
            }
            changes += split + promoted;
        }
        Ok(changes)
    }
}

/// Member index addressed by a splittable access, or `None` when the access
/// does not have the `[0, const k, ...]` shape.
fn member_index(indices: &[Value], ty: &Ty) -> Option<u64> {
    if indices.len() < 2 || indices[0].as_int() != Some(0) {
        return None;
    }
    let index = u64::try_from(indices[1].as_int()?).ok()?;
    (index < ty.element_count()?).then_some(index)
}

fn splittable(
    func: &Function,
    layout: &DataLayout,
    thresholds: &SroaThresholds,
) -> Vec<(ValueId, Ty)> {
    let uses = func.use_counts();
    let insts: Vec<&Instruction> = func
        .blocks
        .iter()
        .flat_map(|block| block.instructions.iter())
        .collect();

    // direct load/store address uses per register
    let mut access_uses: HashMap<ValueId, usize> = HashMap::new();
    let mut loads_through: HashMap<ValueId, u64> = HashMap::new();
    for inst in &insts {
        match &inst.kind {
            InstructionKind::Load {
                ptr: Value::Reg(ptr),
            } => {
                *access_uses.entry(*ptr).or_insert(0) += 1;
                *loads_through.entry(*ptr).or_insert(0) += 1;
            }
            InstructionKind::Store {
                value,
                ptr: Value::Reg(ptr),
            } if value.as_reg() != Some(*ptr) => {
                *access_uses.entry(*ptr).or_insert(0) += 1;
            }
            _ => {}
        }
    }

    let mut candidates = Vec::new();
    for inst in &insts {
        let (Some(slot), InstructionKind::Alloca { allocated }) = (inst.result, &inst.kind) else {
            continue;
        };
        if !allocated.is_aggregate() {
            continue;
        }
        let mut gep_uses = 0;
        let mut loads = 0;
        let mut valid = true;
        for user in &insts {
            let InstructionKind::Gep {
                base,
                element,
                indices,
            } = &user.kind
            else {
                continue;
            };
            if base.as_reg() != Some(slot) {
                continue;
            }
            gep_uses += 1;
            let Some(gep) = user.result else {
                valid = false;
                break;
            };
            let member_only = element == allocated && member_index(indices, allocated).is_some();
            let accessed_only = uses.get(&gep).copied().unwrap_or(0)
                == access_uses.get(&gep).copied().unwrap_or(0);
            if !member_only || !accessed_only {
                valid = false;
                break;
            }
            loads += loads_through.get(&gep).copied().unwrap_or(0);
        }
        let only_geps = uses.get(&slot).copied().unwrap_or(0) == gep_uses;
        if valid && only_geps && gep_uses > 0 && thresholds.allows(layout, allocated, loads) {
            candidates.push((slot, allocated.clone()));
        }
    }
    candidates
}

fn split_one(func: &mut Function, slot: ValueId, ty: &Ty, ids: &mut IdGen) {
    let mut members: HashMap<u64, ValueId> = HashMap::new();
    let mut replacements: HashMap<ValueId, Value> = HashMap::new();

    for block in func.blocks.iter_mut() {
        for inst in block.instructions.iter_mut() {
            let Some(result) = inst.result else {
                continue;
            };
            let InstructionKind::Gep {
                base,
                element,
                indices,
            } = &mut inst.kind
            else {
                continue;
            };
            if base.as_reg() != Some(slot) {
                continue;
            }
            let Some(index) = member_index(indices, ty) else {
                continue;
            };
            let member_slot = *members.entry(index).or_insert_with(|| ids.value());
            if indices.len() == 2 {
                replacements.insert(result, Value::Reg(member_slot));
            } else {
                let member_ty = ty.element_type(index).cloned().unwrap_or(Ty::I8);
                let mut rest = vec![Value::i64(0)];
                rest.extend(indices.drain(2..));
                *base = Value::Reg(member_slot);
                *element = member_ty;
                *indices = rest;
            }
        }
    }

    for block in func.blocks.iter_mut() {
        let Some(pos) = block
            .instructions
            .iter()
            .position(|inst| inst.result == Some(slot))
        else {
            continue;
        };
        let mut ordered: Vec<(u64, ValueId)> = members.iter().map(|(k, v)| (*k, *v)).collect();
        ordered.sort_unstable();
        let allocas = ordered.into_iter().map(|(index, id)| {
            let member_ty = ty.element_type(index).cloned().unwrap_or(Ty::I8);
            Instruction::new(
                id,
                Ty::Ptr,
                InstructionKind::Alloca {
                    allocated: member_ty,
                },
            )
        });
        block.instructions.splice(pos..=pos, allocas);
        break;
    }

    for block in func.blocks.iter_mut() {
        block
            .instructions
            .retain(|inst| !inst.result.is_some_and(|id| replacements.contains_key(&id)));
    }
    func.replace_uses(&replacements);
}

/// Splits aggregates until none qualifies. Returns the number of splits.
pub fn split_aggregates(
    func: &mut Function,
    layout: &DataLayout,
    thresholds: &SroaThresholds,
) -> usize {
    let mut split = 0;
    loop {
        let candidates = splittable(func, layout, thresholds);
        if candidates.is_empty() {
            return split;
        }
        let mut ids = IdGen::new(func);
        for (slot, ty) in candidates {
            split_one(func, slot, &ty, &mut ids);
            split += 1;
        }
    }
}
