use sea_core::ir::{
    BlockId, ConstExpr, Function, IdGen, Instruction, InstructionKind, Module, Ty, Value,
};

use crate::context::{ModulePass, PassContext};
use crate::error::Result;

/// Turns constant expressions in operand position into ordinary instructions,
/// so instrumentation sees every address computation as a `gep`.
pub struct LowerCstExpr;

impl ModulePass for LowerCstExpr {
    fn name(&self) -> &'static str {
        "lower-cstexpr"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        Ok(module.functions.iter_mut().map(lower_function).sum())
    }
}

fn lower_function(func: &mut Function) -> usize {
    let mut ids = IdGen::new(func);
    let mut lowered = 0;
    for idx in 0..func.blocks.len() {
        let insts = std::mem::take(&mut func.blocks[idx].instructions);
        let mut out = Vec::with_capacity(insts.len());
        // phi operands are computed at the end of the incoming edge's block
        let mut on_edges: Vec<(BlockId, Vec<Instruction>)> = Vec::new();
        for mut inst in insts {
            if let InstructionKind::Phi { incoming } = &mut inst.kind {
                for (value, pred) in incoming.iter_mut() {
                    let mut emitted = Vec::new();
                    materialize(value, &mut ids, &mut emitted);
                    if !emitted.is_empty() {
                        lowered += emitted.len();
                        on_edges.push((*pred, emitted));
                    }
                }
            } else {
                let before = out.len();
                for operand in inst.operands_mut() {
                    materialize(operand, &mut ids, &mut out);
                }
                lowered += out.len() - before;
            }
            out.push(inst);
        }
        let before = out.len();
        for operand in func.blocks[idx].terminator.operands_mut() {
            materialize(operand, &mut ids, &mut out);
        }
        lowered += out.len() - before;
        func.blocks[idx].instructions = out;
        for (pred, emitted) in on_edges {
            if let Some(block) = func.block_mut(pred) {
                block.instructions.extend(emitted);
            }
        }
    }
    lowered
}

fn materialize(value: &mut Value, ids: &mut IdGen, out: &mut Vec<Instruction>) {
    if !matches!(value, Value::Expr(_)) {
        return;
    }
    let Value::Expr(expr) = std::mem::replace(value, Value::Undef(Ty::Void)) else {
        return;
    };
    let (ty, kind) = match *expr {
        ConstExpr::Gep {
            global,
            element,
            indices,
        } => (
            Ty::Ptr,
            InstructionKind::Gep {
                base: Value::Global(global),
                element,
                indices: indices.into_iter().map(Value::i64).collect(),
            },
        ),
        ConstExpr::Cast {
            op,
            value: mut inner,
            ty,
        } => {
            materialize(&mut inner, ids, out);
            (ty, InstructionKind::Cast { op, value: inner })
        }
        ConstExpr::Binary {
            op,
            mut lhs,
            mut rhs,
            ty,
        } => {
            materialize(&mut lhs, ids, out);
            materialize(&mut rhs, ids, out);
            (
                ty,
                InstructionKind::Binary {
                    op,
                    lhs,
                    rhs,
                    nsw: false,
                },
            )
        }
    };
    let id = ids.value();
    out.push(Instruction::new(id, ty, kind));
    *value = Value::Reg(id);
}
