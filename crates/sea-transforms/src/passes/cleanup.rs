//! Local instruction simplification followed by control-flow simplification,
//! iterated until neither finds anything to do. Running the stage on its own
//! output therefore changes nothing.

use std::collections::HashMap;

use sea_core::ir::{
    BinaryOp, BlockId, CastOp, CmpPredicate, Function, Instruction, InstructionKind, Module,
    Terminator, Ty, Value, ValueId,
};
use tracing::trace;

use crate::context::{ModulePass, PassContext};
use crate::error::Result;
use crate::util::{remove_dead_instructions, remove_unreachable_blocks};

const MAX_ROUNDS: usize = 1000;

pub struct Cleanup;

impl ModulePass for Cleanup {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        let mut changes = 0;
        for func in module.functions.iter_mut() {
            if func.is_declaration() {
                continue;
            }
            let count = cleanup_function(func);
            if count > 0 {
                trace!(function = %func.name, count, "cleaned up");
            }
            changes += count;
        }
        Ok(changes)
    }
}

pub fn cleanup_function(func: &mut Function) -> usize {
    let mut total = 0;
    for _ in 0..MAX_ROUNDS {
        let round = fold_instructions(func)
            + remove_dead_instructions(func)
            + fold_terminators(func)
            + remove_unreachable_blocks(func)
            + merge_blocks(func)
            + forward_empty_blocks(func);
        if round == 0 {
            break;
        }
        total += round;
    }
    total
}

fn fold_instructions(func: &mut Function) -> usize {
    let mut replacements: HashMap<ValueId, Value> = HashMap::new();
    for inst in func.blocks.iter().flat_map(|block| block.instructions.iter()) {
        let Some(id) = inst.result else {
            continue;
        };
        let Some(value) = simplify(inst, id) else {
            continue;
        };
        let value = resolve(&replacements, value);
        if value == Value::Reg(id) || value.is_undef() {
            continue;
        }
        replacements.insert(id, value);
    }
    if replacements.is_empty() {
        return 0;
    }
    func.replace_uses(&replacements);
    for block in &mut func.blocks {
        block
            .instructions
            .retain(|inst| !inst.result.is_some_and(|id| replacements.contains_key(&id)));
    }
    replacements.len()
}

fn resolve(replacements: &HashMap<ValueId, Value>, mut value: Value) -> Value {
    for _ in 0..=replacements.len() {
        match &value {
            Value::Reg(id) => match replacements.get(id) {
                Some(next) => value = next.clone(),
                None => break,
            },
            _ => break,
        }
    }
    value
}

fn simplify(inst: &Instruction, id: ValueId) -> Option<Value> {
    match &inst.kind {
        InstructionKind::Binary { op, lhs, rhs, nsw } => {
            simplify_binary(*op, lhs, rhs, *nsw, &inst.ty)
        }
        InstructionKind::Cmp { pred, lhs, rhs } => {
            if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
                let ty = operand_int_type(lhs, rhs)?;
                return Some(Value::bool(fold_cmp(*pred, a, b, &ty)));
            }
            if lhs == rhs && lhs.as_reg().is_some() {
                let reflexive = matches!(
                    pred,
                    CmpPredicate::Eq
                        | CmpPredicate::Sle
                        | CmpPredicate::Sge
                        | CmpPredicate::Ule
                        | CmpPredicate::Uge
                );
                return Some(Value::bool(reflexive));
            }
            None
        }
        InstructionKind::Select {
            cond,
            if_true,
            if_false,
        } => match cond.as_int() {
            Some(0) => Some(if_false.clone()),
            Some(_) => Some(if_true.clone()),
            None if if_true == if_false => Some(if_true.clone()),
            None => None,
        },
        InstructionKind::Cast { op, value } => fold_cast(*op, value, &inst.ty),
        InstructionKind::Phi { incoming } => {
            let mut unique: Option<&Value> = None;
            for (value, _) in incoming {
                if *value == Value::Reg(id) {
                    continue;
                }
                match unique {
                    None => unique = Some(value),
                    Some(seen) if seen == value => {}
                    Some(_) => return None,
                }
            }
            unique.cloned()
        }
        _ => None,
    }
}

fn operand_int_type(lhs: &Value, rhs: &Value) -> Option<Ty> {
    [lhs, rhs].into_iter().find_map(|value| match value {
        Value::Const(constant) if constant.ty().is_integer() => Some(constant.ty()),
        _ => None,
    })
}

fn simplify_binary(op: BinaryOp, lhs: &Value, rhs: &Value, nsw: bool, ty: &Ty) -> Option<Value> {
    if !ty.is_integer() {
        return None;
    }
    if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
        return fold_binary(op, a, b, ty, nsw).map(|value| Value::int(value, ty.clone()));
    }
    let zero = Value::int(0, ty.clone());
    let all_ones = ty.normalize(-1);
    let commutative = matches!(
        op,
        BinaryOp::Add | BinaryOp::Mul | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor
    );
    let (value, constant) = match (lhs.as_int(), rhs.as_int()) {
        (None, Some(c)) => (lhs, c),
        (Some(c), None) if commutative => (rhs, c),
        _ => {
            if lhs == rhs && lhs.as_reg().is_some() {
                return match op {
                    BinaryOp::Sub | BinaryOp::Xor => Some(zero),
                    BinaryOp::And | BinaryOp::Or => Some(lhs.clone()),
                    _ => None,
                };
            }
            return None;
        }
    };
    // a constant on the left only gets here for commutative operators
    match (op, constant) {
        (
            BinaryOp::Add
            | BinaryOp::Or
            | BinaryOp::Xor
            | BinaryOp::Sub
            | BinaryOp::Shl
            | BinaryOp::LShr
            | BinaryOp::AShr,
            0,
        ) => Some(value.clone()),
        (BinaryOp::Mul | BinaryOp::SDiv | BinaryOp::UDiv, 1) => Some(value.clone()),
        (BinaryOp::Mul | BinaryOp::And, 0) => Some(zero),
        (BinaryOp::And, c) if c == all_ones => Some(value.clone()),
        _ => None,
    }
}

fn unsigned(value: i64, ty: &Ty) -> u64 {
    match ty.int_bits() {
        Some(bits) if bits < 64 => (value as u64) & ((1u64 << bits) - 1),
        _ => value as u64,
    }
}

/// Evaluates `a op b` at the width of `ty`. `None` when the operation would
/// trap, shift out of range, or overflow an `nsw` operation.
pub fn fold_binary(op: BinaryOp, a: i64, b: i64, ty: &Ty, nsw: bool) -> Option<i64> {
    let bits = ty.int_bits()?;
    let (min, max) = ty.signed_range()?;
    let wide = |value: i128| -> Option<i64> {
        if nsw && (value < min || value > max) {
            return None;
        }
        Some(ty.normalize(value as i64))
    };
    let (ua, ub) = (unsigned(a, ty), unsigned(b, ty));
    match op {
        BinaryOp::Add => wide(a as i128 + b as i128),
        BinaryOp::Sub => wide(a as i128 - b as i128),
        BinaryOp::Mul => wide(a as i128 * b as i128),
        BinaryOp::SDiv | BinaryOp::SRem if a as i128 == min && b == -1 => None,
        BinaryOp::SDiv => a.checked_div(b).map(|q| ty.normalize(q)),
        BinaryOp::SRem => a.checked_rem(b).map(|r| ty.normalize(r)),
        BinaryOp::UDiv => (ub != 0).then(|| ty.normalize((ua / ub) as i64)),
        BinaryOp::URem => (ub != 0).then(|| ty.normalize((ua % ub) as i64)),
        BinaryOp::And => Some(ty.normalize(a & b)),
        BinaryOp::Or => Some(ty.normalize(a | b)),
        BinaryOp::Xor => Some(ty.normalize(a ^ b)),
        BinaryOp::Shl => (ub < u64::from(bits)).then(|| ty.normalize((ua << ub) as i64)),
        BinaryOp::LShr => (ub < u64::from(bits)).then(|| ty.normalize((ua >> ub) as i64)),
        BinaryOp::AShr => (ub < u64::from(bits)).then(|| ty.normalize(a >> ub)),
    }
}

pub fn fold_cmp(pred: CmpPredicate, a: i64, b: i64, ty: &Ty) -> bool {
    let (ua, ub) = (unsigned(a, ty), unsigned(b, ty));
    match pred {
        CmpPredicate::Eq => a == b,
        CmpPredicate::Ne => a != b,
        CmpPredicate::Slt => a < b,
        CmpPredicate::Sle => a <= b,
        CmpPredicate::Sgt => a > b,
        CmpPredicate::Sge => a >= b,
        CmpPredicate::Ult => ua < ub,
        CmpPredicate::Ule => ua <= ub,
        CmpPredicate::Ugt => ua > ub,
        CmpPredicate::Uge => ua >= ub,
    }
}

fn fold_cast(op: CastOp, value: &Value, ty: &Ty) -> Option<Value> {
    let Value::Const(constant) = value else {
        return None;
    };
    let source = constant.ty();
    if op == CastOp::Bitcast && source == *ty {
        return Some(value.clone());
    }
    let raw = constant.as_int()?;
    if !source.is_integer() || !ty.is_integer() {
        return None;
    }
    let folded = match op {
        CastOp::Trunc | CastOp::SExt => raw,
        CastOp::ZExt => unsigned(raw, &source) as i64,
        _ => return None,
    };
    Some(Value::int(folded, ty.clone()))
}

fn fold_terminators(func: &mut Function) -> usize {
    let mut dropped_edges: Vec<(BlockId, BlockId)> = Vec::new();
    let mut changed = 0;
    for block in &mut func.blocks {
        let folded = match &block.terminator {
            Terminator::CondBr {
                cond,
                if_true,
                if_false,
            } => match cond.as_int() {
                _ if if_true == if_false => Some((*if_true, Vec::new())),
                Some(0) => Some((*if_false, vec![*if_true])),
                Some(_) => Some((*if_true, vec![*if_false])),
                None => None,
            },
            Terminator::Switch {
                value,
                default,
                cases,
            } => {
                let target = match value.as_int() {
                    Some(constant) => Some(
                        cases
                            .iter()
                            .find(|(case, _)| *case == constant)
                            .map(|(_, target)| *target)
                            .unwrap_or(*default),
                    ),
                    None if cases.is_empty() => Some(*default),
                    None => None,
                };
                target.map(|target| {
                    let others = block
                        .terminator
                        .successors()
                        .into_iter()
                        .filter(|succ| *succ != target)
                        .collect();
                    (target, others)
                })
            }
            _ => None,
        };
        if let Some((target, dropped)) = folded {
            dropped_edges.extend(dropped.into_iter().map(|succ| (block.id, succ)));
            block.terminator = Terminator::Br(target);
            changed += 1;
        }
    }
    for (pred, succ) in dropped_edges {
        if let Some(block) = func.block_mut(succ) {
            block.remove_phi_incoming(pred);
        }
    }
    changed
}

/// Folds a block into its sole predecessor when that predecessor has no
/// other successor.
fn merge_blocks(func: &mut Function) -> usize {
    let mut merged = 0;
    loop {
        let preds = func.predecessors();
        let entry = func.entry_id();
        let candidate = func.blocks.iter().find_map(|block| {
            if Some(block.id) == entry || block.instructions.iter().any(Instruction::is_phi) {
                return None;
            }
            let [pred] = preds.get(&block.id)?.as_slice() else {
                return None;
            };
            if *pred == block.id {
                return None;
            }
            let pred_block = func.block(*pred)?;
            (pred_block.successors() == vec![block.id]).then_some((*pred, block.id))
        });
        let Some((pred, block)) = candidate else {
            return merged;
        };
        let Some(idx) = func.block_index(block) else {
            return merged;
        };
        let removed = func.blocks.remove(idx);
        let successors = removed.terminator.successors();
        if let Some(pred_block) = func.block_mut(pred) {
            pred_block.instructions.extend(removed.instructions);
            pred_block.terminator = removed.terminator;
        }
        for succ in successors {
            if let Some(succ_block) = func.block_mut(succ) {
                succ_block.retarget_phis(block, pred);
            }
        }
        merged += 1;
    }
}

/// Redirects branches that target an empty block which only jumps on to a
/// phi-free block.
fn forward_empty_blocks(func: &mut Function) -> usize {
    let entry = func.entry_id();
    let forwards: Vec<(BlockId, BlockId)> = func
        .blocks
        .iter()
        .filter(|block| Some(block.id) != entry && block.instructions.is_empty())
        .filter_map(|block| match block.terminator {
            Terminator::Br(target) if target != block.id => Some((block.id, target)),
            _ => None,
        })
        .filter(|(_, target)| {
            func.block(*target)
                .is_some_and(|target| !target.instructions.iter().any(Instruction::is_phi))
        })
        .collect();
    let preds = func.predecessors();
    let mut changed = 0;
    for (empty, target) in forwards {
        for pred in preds.get(&empty).cloned().unwrap_or_default() {
            if let Some(block) = func.block_mut(pred) {
                if block.terminator.successors().contains(&empty) {
                    block.terminator.replace_successor(empty, target);
                    changed += 1;
                }
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sea_core::ir::builder::FunctionBuilder;
    use sea_core::ir::DataLayout;

    fn branchy_module() -> Module {
        let mut b = FunctionBuilder::new("main", vec![Ty::I32], Ty::I32);
        let x = b.param(0);
        let two = b.binary(
            BinaryOp::Add,
            Ty::I32,
            Value::int(1, Ty::I32),
            Value::int(1, Ty::I32),
        );
        let always = b.cmp(CmpPredicate::Eq, two.clone(), Value::int(2, Ty::I32));
        let then = b.block();
        let other = b.block();
        let join = b.block();
        b.cond_br(always, then, other);
        b.switch_to(then);
        let doubled = b.binary(BinaryOp::Mul, Ty::I32, x.clone(), two);
        b.br(join);
        b.switch_to(other);
        b.br(join);
        b.switch_to(join);
        let result = b.phi(Ty::I32, vec![(doubled, then), (x, other)]);
        let same = b.binary(BinaryOp::Add, Ty::I32, result, Value::int(0, Ty::I32));
        b.ret(Some(same));
        let mut module = Module::new("m");
        module.functions.push(b.finish());
        module
    }

    #[test]
    fn folds_constant_branch_into_one_block() {
        let mut module = branchy_module();
        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        assert!(Cleanup.run(&mut module, &mut cx).unwrap() > 0);

        let main = &module.functions[0];
        assert_eq!(main.blocks.len(), 1);
        let insts = &main.blocks[0].instructions;
        assert_eq!(insts.len(), 1);
        assert!(matches!(
            &insts[0].kind,
            InstructionKind::Binary { op: BinaryOp::Mul, rhs, .. } if *rhs == Value::int(2, Ty::I32)
        ));
        assert_eq!(
            main.blocks[0].terminator,
            Terminator::Ret(Some(Value::Reg(insts[0].result.unwrap())))
        );
    }

    #[test]
    fn cleanup_is_idempotent() {
        let mut module = branchy_module();
        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        Cleanup.run(&mut module, &mut cx).unwrap();
        let once = module.clone();
        assert_eq!(Cleanup.run(&mut module, &mut cx).unwrap(), 0);
        assert_eq!(module, once);
    }

    #[test]
    fn nsw_overflow_is_not_folded() {
        assert_eq!(fold_binary(BinaryOp::Add, i32::MAX as i64, 1, &Ty::I32, true), None);
        assert_eq!(
            fold_binary(BinaryOp::Add, i32::MAX as i64, 1, &Ty::I32, false),
            Some(i32::MIN as i64)
        );
        assert_eq!(fold_binary(BinaryOp::SDiv, 7, 0, &Ty::I32, false), None);
        assert_eq!(fold_binary(BinaryOp::SRem, -7, 2, &Ty::I32, false), Some(-1));
        assert_eq!(fold_binary(BinaryOp::LShr, -1, 28, &Ty::I32, false), Some(15));
        assert!(fold_cmp(CmpPredicate::Ult, 1, -1, &Ty::I8));
    }

    #[test]
    fn division_of_unnormalized_operands_does_not_trap() {
        assert_eq!(fold_binary(BinaryOp::SDiv, i64::MIN, -1, &Ty::I32, false), None);
        assert_eq!(fold_binary(BinaryOp::SRem, i64::MIN, -1, &Ty::I32, false), None);
        assert_eq!(fold_binary(BinaryOp::SDiv, i64::MIN, -1, &Ty::I64, false), None);
        assert_eq!(
            fold_binary(BinaryOp::SDiv, i32::MIN as i64, -1, &Ty::I32, false),
            None
        );
    }
}
