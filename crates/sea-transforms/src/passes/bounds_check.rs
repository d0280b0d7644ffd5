//! Buffer bounds instrumentation.
//!
//! Every load and store through an address computed from an object of known
//! size is preceded by a test of the accessed byte range against that size;
//! a violation branches to a block calling `verifier.error`.

use std::collections::HashMap;

use sea_core::intrinsics;
use sea_core::ir::{
    BinaryOp, CastOp, CmpPredicate, DataLayout, Function, IdGen, Instruction, InstructionKind,
    Module, Ty, Value, ValueId, ENTRY_FUNCTION,
};
use tracing::debug;

use crate::context::{ModulePass, PassContext};
use crate::error::Result;
use crate::util::{insert_guards, value_type};

pub const ERROR_LABEL: &str = "boc.error";

pub struct BufferBoundsCheck {
    /// Everything has been inlined into `main`; only `main` is instrumented
    /// and shadow parameters are not consulted.
    pub inline_all: bool,
}

impl ModulePass for BufferBoundsCheck {
    fn name(&self) -> &'static str {
        "buffer-bounds-check"
    }

    fn run(&self, module: &mut Module, cx: &mut PassContext<'_>) -> Result<usize> {
        let globals: HashMap<String, u64> = module
            .globals
            .iter()
            .map(|global| (global.name.clone(), cx.layout.alloc_size_of(&global.ty)))
            .collect();
        let mut checks = 0;
        for func in module.functions.iter_mut() {
            let selected = if self.inline_all {
                func.name == ENTRY_FUNCTION
            } else {
                func.attrs.accesses_memory != Some(false)
            };
            if func.is_declaration() || !selected {
                continue;
            }
            let count = instrument(func, &globals, cx.layout, self.inline_all);
            if count > 0 {
                debug!(function = %func.name, checks = count, "inserted bounds checks");
            }
            checks += count;
        }
        if checks > 0 {
            module.declare_function(intrinsics::ERROR, Vec::new(), Ty::Void);
        }
        Ok(checks)
    }
}

#[derive(Debug, Clone)]
enum ObjectSize {
    Static(u64),
    Dynamic(Value),
}

impl ObjectSize {
    fn as_value(&self) -> Value {
        match self {
            ObjectSize::Static(size) => Value::i64(*size as i64),
            ObjectSize::Dynamic(value) => value.clone(),
        }
    }
}

/// Byte offset as a constant plus scaled runtime indices.
#[derive(Debug, Default)]
struct Offset {
    constant: i64,
    terms: Vec<(Value, i64)>,
}

impl Offset {
    fn add(&mut self, index: &Value, scale: u64) {
        let scale = scale as i64;
        match index.as_int() {
            Some(value) => self.constant = self.constant.wrapping_add(value.wrapping_mul(scale)),
            None => self.terms.push((index.clone(), scale)),
        }
    }
}

fn byte_offset(layout: &DataLayout, element: &Ty, indices: &[Value]) -> Option<Offset> {
    let mut offset = Offset::default();
    let (first, rest) = indices.split_first()?;
    offset.add(first, layout.alloc_size_of(element));
    let mut current = element.clone();
    for index in rest {
        match &current {
            Ty::Struct(_) => {
                let member = u64::try_from(index.as_int()?).ok()?;
                offset.constant += layout.member_offset(&current, member)? as i64;
                current = current.element_type(member)?.clone();
            }
            Ty::Array(inner, _) => {
                let inner = inner.as_ref().clone();
                offset.add(index, layout.alloc_size_of(&inner));
                current = inner;
            }
            _ => return None,
        }
    }
    Some(offset)
}

struct Addressing {
    base: Value,
    element: Ty,
    indices: Vec<Value>,
}

fn instrument(
    func: &mut Function,
    globals: &HashMap<String, u64>,
    layout: &DataLayout,
    inline_all: bool,
) -> usize {
    let types = func.value_types();
    let mut objects: HashMap<ValueId, ObjectSize> = HashMap::new();
    let mut geps: HashMap<ValueId, Addressing> = HashMap::new();
    if !inline_all {
        for param in &func.params {
            if let Some(target) = param.shadow_of {
                objects.insert(target, ObjectSize::Dynamic(Value::Reg(param.id)));
            }
        }
    }
    for inst in func.blocks.iter().flat_map(|block| block.instructions.iter()) {
        let Some(id) = inst.result else {
            continue;
        };
        match &inst.kind {
            InstructionKind::Alloca { allocated } => {
                objects.insert(id, ObjectSize::Static(layout.alloc_size_of(allocated)));
            }
            InstructionKind::Gep {
                base,
                element,
                indices,
            } => {
                geps.insert(
                    id,
                    Addressing {
                        base: base.clone(),
                        element: element.clone(),
                        indices: indices.clone(),
                    },
                );
            }
            _ => {}
        }
    }

    let object_size = |base: &Value| match base {
        Value::Reg(id) => objects.get(id).cloned(),
        Value::Global(name) => globals.get(name).map(|size| ObjectSize::Static(*size)),
        _ => None,
    };

    let mut ids = IdGen::new(func);
    insert_guards(func, &mut ids, ERROR_LABEL, |inst, ids| {
        let (ptr, accessed) = match &inst.kind {
            InstructionKind::Load { ptr } => (ptr, inst.ty.clone()),
            InstructionKind::Store { value, ptr } => (ptr, value_type(value, &types)?),
            _ => return None,
        };
        let addressing = geps.get(&ptr.as_reg()?)?;
        let size = object_size(&addressing.base)?;
        let offset = byte_offset(layout, &addressing.element, &addressing.indices)?;
        let access = layout.size_of(&accessed) as i64;
        if let (ObjectSize::Static(size), true) = (&size, offset.terms.is_empty()) {
            let end = offset.constant.saturating_add(access);
            if offset.constant >= 0 && end <= *size as i64 {
                return None;
            }
        }
        Some(emit_guard(offset, access, &size, &types, ids))
    })
}

fn emit_guard(
    offset: Offset,
    access: i64,
    size: &ObjectSize,
    types: &HashMap<ValueId, Ty>,
    ids: &mut IdGen,
) -> (Vec<Instruction>, Value) {
    let mut code = Vec::new();
    let mut push = |code: &mut Vec<Instruction>, ty: Ty, kind: InstructionKind| {
        let id = ids.value();
        code.push(Instruction::new(id, ty, kind));
        Value::Reg(id)
    };
    let add = |lhs: Value, rhs: Value| InstructionKind::Binary {
        op: BinaryOp::Add,
        lhs,
        rhs,
        nsw: false,
    };

    let mut total = (offset.constant != 0 || offset.terms.is_empty())
        .then(|| Value::i64(offset.constant));
    for (index, scale) in offset.terms {
        let mut index = index;
        if value_type(&index, types).is_some_and(|ty| ty != Ty::I64) {
            index = push(
                &mut code,
                Ty::I64,
                InstructionKind::Cast {
                    op: CastOp::SExt,
                    value: index,
                },
            );
        }
        let scaled = if scale == 1 {
            index
        } else {
            push(
                &mut code,
                Ty::I64,
                InstructionKind::Binary {
                    op: BinaryOp::Mul,
                    lhs: index,
                    rhs: Value::i64(scale),
                    nsw: false,
                },
            )
        };
        total = Some(match total {
            Some(sum) => push(&mut code, Ty::I64, add(sum, scaled)),
            None => scaled,
        });
    }
    let start = total.unwrap_or(Value::i64(0));
    let end = push(&mut code, Ty::I64, add(start.clone(), Value::i64(access)));
    let below = push(
        &mut code,
        Ty::I1,
        InstructionKind::Cmp {
            pred: CmpPredicate::Slt,
            lhs: start,
            rhs: Value::i64(0),
        },
    );
    let above = push(
        &mut code,
        Ty::I1,
        InstructionKind::Cmp {
            pred: CmpPredicate::Sgt,
            lhs: end,
            rhs: size.as_value(),
        },
    );
    let failed = push(
        &mut code,
        Ty::I1,
        InstructionKind::Binary {
            op: BinaryOp::Or,
            lhs: below,
            rhs: above,
            nsw: false,
        },
    );
    (code, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_core::ir::builder::FunctionBuilder;
    use sea_core::ir::{Linkage, Param, Terminator};

    fn guarded_branches(func: &Function) -> usize {
        let error = func
            .blocks
            .iter()
            .find(|block| block.label.as_deref() == Some(ERROR_LABEL))
            .map(|block| block.id);
        func.blocks
            .iter()
            .filter(|block| {
                matches!(block.terminator, Terminator::CondBr { if_true, .. } if Some(if_true) == error)
            })
            .count()
    }

    fn main_with_local_array() -> Function {
        let array = Ty::array(Ty::I32, 4);
        let mut b = FunctionBuilder::new("main", Vec::new(), Ty::I32);
        let slot = b.alloca(array.clone());
        let index = b
            .call("verifier.nondet.i32", Ty::I32, Vec::new())
            .unwrap_or(Value::int(0, Ty::I32));
        let fixed = b.gep(array.clone(), slot.clone(), vec![Value::i64(0), Value::i64(2)]);
        b.store(Value::int(1, Ty::I32), fixed);
        let dynamic = b.gep(array, slot, vec![Value::i64(0), index]);
        let loaded = b.load(Ty::I32, dynamic);
        b.ret(Some(loaded));
        b.finish()
    }

    #[test]
    fn dynamic_index_is_guarded_static_one_is_not() {
        let mut module = Module::new("m");
        module.functions.push(main_with_local_array());
        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        let pass = BufferBoundsCheck { inline_all: true };
        assert_eq!(pass.run(&mut module, &mut cx).unwrap(), 1);

        let main = module.function("main").unwrap();
        assert_eq!(guarded_branches(main), 1);
        let error = main
            .blocks
            .iter()
            .find(|block| block.label.as_deref() == Some(ERROR_LABEL))
            .unwrap();
        assert_eq!(error.terminator, Terminator::Unreachable);
        assert!(module.function(intrinsics::ERROR).is_some());

        // the guarded load starts the block after the check
        let InstructionKind::Load { .. } = main.blocks[1].instructions[0].kind else {
            panic!("expected the load first");
        };
        let InstructionKind::Cmp { rhs, .. } = &main.blocks[0]
            .instructions
            .iter()
            .rev()
            .nth(1)
            .unwrap()
            .kind
        else {
            panic!("expected the upper bound compare");
        };
        assert_eq!(rhs, &Value::i64(16));
    }

    #[test]
    fn shadow_parameters_bound_pointer_arguments() {
        let mut b = FunctionBuilder::new("get", vec![Ty::Ptr, Ty::I64], Ty::I8)
            .linkage(Linkage::Internal);
        let ptr = b.param(0);
        let index = b.param(1);
        let at = b.gep(Ty::I8, ptr, vec![index]);
        let loaded = b.load(Ty::I8, at);
        b.ret(Some(loaded));
        let mut get = b.finish();
        get.params.push(Param {
            id: 4,
            name: None,
            ty: Ty::I64,
            shadow_of: Some(0),
        });
        let mut module = Module::new("m");
        module.functions.push(get);

        let layout = DataLayout::default();
        let mut cx = PassContext::new(&layout);
        let inlined = BufferBoundsCheck { inline_all: true };
        assert_eq!(inlined.run(&mut module, &mut cx).unwrap(), 0);

        let modular = BufferBoundsCheck { inline_all: false };
        assert_eq!(modular.run(&mut module, &mut cx).unwrap(), 1);
        let get = module.function("get").unwrap();
        let compares_shadow = get.blocks[0].instructions.iter().any(|inst| {
            matches!(&inst.kind, InstructionKind::Cmp { rhs: Value::Reg(4), .. })
        });
        assert!(compares_shadow);
    }
}
