use sea_core::intrinsics;
use sea_core::ir::{
    BinaryOp, IdGen, Instruction, InstructionKind, Module, Ty, Value, ENTRY_FUNCTION,
};
use tracing::debug;

use crate::context::{ModulePass, PassContext};
use crate::error::Result;
use crate::util::insert_guards;

pub const ERROR_LABEL: &str = "ioc.error";

/// Guards signed arithmetic that must not wrap: `nsw` `add`/`sub`/`mul` and
/// every `sdiv`.
pub struct IntegerOverflowCheck {
    pub inline_all: bool,
}

impl ModulePass for IntegerOverflowCheck {
    fn name(&self) -> &'static str {
        "integer-overflow-check"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        let mut checks = 0;
        for func in module.functions.iter_mut() {
            if func.is_declaration() || (self.inline_all && func.name != ENTRY_FUNCTION) {
                continue;
            }
            let mut ids = IdGen::new(func);
            let count = insert_guards(func, &mut ids, ERROR_LABEL, |inst, ids| {
                let InstructionKind::Binary { op, lhs, rhs, nsw } = &inst.kind else {
                    return None;
                };
                let guarded = match op {
                    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => *nsw,
                    BinaryOp::SDiv => true,
                    _ => false,
                };
                if !guarded || statically_safe(*op, lhs, rhs, &inst.ty) {
                    return None;
                }
                let id = ids.value();
                let test = Instruction::new(
                    id,
                    Ty::I1,
                    InstructionKind::SignedOverflow {
                        op: *op,
                        lhs: lhs.clone(),
                        rhs: rhs.clone(),
                        operand_ty: inst.ty.clone(),
                    },
                );
                Some((vec![test], Value::Reg(id)))
            });
            if count > 0 {
                debug!(function = %func.name, checks = count, "inserted overflow checks");
            }
            checks += count;
        }
        if checks > 0 {
            module.declare_function(intrinsics::ERROR, Vec::new(), Ty::Void);
        }
        Ok(checks)
    }
}

fn statically_safe(op: BinaryOp, lhs: &Value, rhs: &Value, ty: &Ty) -> bool {
    if op == BinaryOp::SDiv {
        return rhs.as_int().is_some_and(|divisor| divisor != -1);
    }
    let (Some(a), Some(b), Some((min, max))) = (lhs.as_int(), rhs.as_int(), ty.signed_range())
    else {
        return false;
    };
    let (a, b) = (i128::from(a), i128::from(b));
    let exact = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        _ => return false,
    };
    (min..=max).contains(&exact)
}
