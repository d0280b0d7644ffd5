//! Incremental construction of functions, used by harness generators and
//! throughout the tests.

use super::{
    BasicBlock, BinaryOp, BlockId, CmpPredicate, Function, FunctionAttrs, IdGen, Instruction,
    InstructionKind, Linkage, Param, Terminator, Ty, Value,
};

pub struct FunctionBuilder {
    func: Function,
    ids: IdGen,
    /// Index into `func.blocks`.
    current: usize,
}

impl FunctionBuilder {
    /// Starts a defined function whose parameters get registers `0..n` and
    /// whose entry block is `bb0`.
    pub fn new(name: impl Into<String>, params: Vec<Ty>, return_type: Ty) -> Self {
        let params = params
            .into_iter()
            .enumerate()
            .map(|(idx, ty)| Param {
                id: idx as u32,
                name: None,
                ty,
                shadow_of: None,
            })
            .collect();
        let mut func = Function {
            name: name.into(),
            params,
            return_type,
            linkage: Linkage::External,
            attrs: FunctionAttrs::default(),
            blocks: Vec::new(),
        };
        let mut ids = IdGen::new(&func);
        let entry = ids.block();
        func.blocks
            .push(BasicBlock::new(entry, None, Terminator::Unreachable));
        Self {
            func,
            ids,
            current: 0,
        }
    }

    pub fn linkage(mut self, linkage: Linkage) -> Self {
        self.func.linkage = linkage;
        self
    }

    pub fn attrs(mut self, attrs: FunctionAttrs) -> Self {
        self.func.attrs = attrs;
        self
    }

    pub fn param(&self, idx: usize) -> Value {
        Value::Reg(self.func.params[idx].id)
    }

    pub fn current(&self) -> BlockId {
        self.func.blocks[self.current].id
    }

    /// Appends an empty block ending in `unreachable` until terminated.
    pub fn block(&mut self) -> BlockId {
        let id = self.ids.block();
        self.func
            .blocks
            .push(BasicBlock::new(id, None, Terminator::Unreachable));
        id
    }

    /// Moves the insertion point to the end of `block`. Unknown ids are
    /// ignored.
    pub fn switch_to(&mut self, block: BlockId) {
        if let Some(idx) = self.func.block_index(block) {
            self.current = idx;
        }
    }

    fn current_block(&mut self) -> &mut BasicBlock {
        &mut self.func.blocks[self.current]
    }

    pub fn push(&mut self, ty: Ty, kind: InstructionKind) -> Value {
        let id = self.ids.value();
        self.current_block()
            .instructions
            .push(Instruction::new(id, ty, kind));
        Value::Reg(id)
    }

    pub fn effect(&mut self, kind: InstructionKind) {
        self.current_block()
            .instructions
            .push(Instruction::effect(kind));
    }

    pub fn alloca(&mut self, allocated: Ty) -> Value {
        self.push(Ty::Ptr, InstructionKind::Alloca { allocated })
    }

    pub fn load(&mut self, ty: Ty, ptr: Value) -> Value {
        self.push(ty, InstructionKind::Load { ptr })
    }

    pub fn store(&mut self, value: Value, ptr: Value) {
        self.effect(InstructionKind::Store { value, ptr });
    }

    pub fn binary(&mut self, op: BinaryOp, ty: Ty, lhs: Value, rhs: Value) -> Value {
        self.push(
            ty,
            InstructionKind::Binary {
                op,
                lhs,
                rhs,
                nsw: false,
            },
        )
    }

    pub fn binary_nsw(&mut self, op: BinaryOp, ty: Ty, lhs: Value, rhs: Value) -> Value {
        self.push(
            ty,
            InstructionKind::Binary {
                op,
                lhs,
                rhs,
                nsw: true,
            },
        )
    }

    pub fn cmp(&mut self, pred: CmpPredicate, lhs: Value, rhs: Value) -> Value {
        self.push(Ty::I1, InstructionKind::Cmp { pred, lhs, rhs })
    }

    pub fn gep(&mut self, element: Ty, base: Value, indices: Vec<Value>) -> Value {
        self.push(
            Ty::Ptr,
            InstructionKind::Gep {
                base,
                element,
                indices,
            },
        )
    }

    pub fn phi(&mut self, ty: Ty, incoming: Vec<(Value, BlockId)>) -> Value {
        self.push(ty, InstructionKind::Phi { incoming })
    }

    /// Emits a call; returns the result register unless `return_type` is void.
    pub fn call(&mut self, callee: &str, return_type: Ty, args: Vec<Value>) -> Option<Value> {
        let kind = InstructionKind::Call {
            callee: callee.to_string(),
            args,
        };
        if return_type.is_void() {
            self.effect(kind);
            None
        } else {
            Some(self.push(return_type, kind))
        }
    }

    pub fn terminate(&mut self, terminator: Terminator) {
        self.current_block().terminator = terminator;
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.terminate(Terminator::Ret(value));
    }

    pub fn br(&mut self, target: BlockId) {
        self.terminate(Terminator::Br(target));
    }

    pub fn cond_br(&mut self, cond: Value, if_true: BlockId, if_false: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            if_true,
            if_false,
        });
    }

    pub fn finish(self) -> Function {
        self.func
    }
}

/// A bodiless external function.
pub fn declaration(name: impl Into<String>, params: Vec<Ty>, return_type: Ty) -> Function {
    let mut func = FunctionBuilder::new(name, params, return_type).finish();
    func.blocks.clear();
    func
}
