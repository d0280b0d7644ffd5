//! Program module model: functions made of basic blocks of SSA instructions,
//! plus global variables.
//!
//! The model is deliberately close to a low-level compiler IR. Registers are
//! numbered per function (`ValueId`), blocks are numbered per function
//! (`BlockId`), and the first block of a defined function is its entry. A
//! function without blocks is a declaration.

pub mod builder;
pub mod io;
pub mod layout;
pub mod pretty;
pub mod ty;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use layout::DataLayout;
pub use ty::Ty;

pub type ValueId = u32;
pub type BlockId = u32;

/// Name of the function every verification harness starts from.
pub const ENTRY_FUNCTION: &str = "main";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub data_layout: Option<String>,
    #[serde(default)]
    pub globals: Vec<Global>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    pub ty: Ty,
    #[serde(default)]
    pub initializer: Option<Constant>,
    #[serde(default)]
    pub linkage: Linkage,
    #[serde(default)]
    pub is_constant: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
pub enum Linkage {
    #[default]
    #[display("external")]
    External,
    #[display("internal")]
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    pub return_type: Ty,
    #[serde(default)]
    pub linkage: Linkage,
    #[serde(default)]
    pub attrs: FunctionAttrs,
    #[serde(default)]
    pub blocks: Vec<BasicBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub id: ValueId,
    #[serde(default)]
    pub name: Option<String>,
    pub ty: Ty,
    /// Set on size parameters added by bounds shadowing; points at the
    /// pointer parameter whose object size this parameter carries.
    #[serde(default)]
    pub shadow_of: Option<ValueId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionAttrs {
    #[serde(default)]
    pub always_inline: bool,
    #[serde(default)]
    pub no_inline: bool,
    /// Result of the memory-access analysis; `None` until it has run.
    #[serde(default)]
    pub accesses_memory: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default)]
    pub result: Option<ValueId>,
    /// Type of the produced value, `Void` for instructions without a result.
    pub ty: Ty,
    pub kind: InstructionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        #[serde(default)]
        nsw: bool,
    },
    Cmp {
        pred: CmpPredicate,
        lhs: Value,
        rhs: Value,
    },
    Select {
        cond: Value,
        if_true: Value,
        if_false: Value,
    },
    Cast {
        op: CastOp,
        value: Value,
    },
    Alloca {
        allocated: Ty,
    },
    Load {
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    /// Address arithmetic: the first index steps over whole `element`s, the
    /// remaining ones select members of nested aggregates.
    Gep {
        base: Value,
        element: Ty,
        indices: Vec<Value>,
    },
    Call {
        callee: String,
        args: Vec<Value>,
    },
    Phi {
        incoming: Vec<(Value, BlockId)>,
    },
    /// `true` when `lhs op rhs` overflows the signed range of `operand_ty`.
    SignedOverflow {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        operand_ty: Ty,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum BinaryOp {
    #[display("add")]
    Add,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
    #[display("sdiv")]
    SDiv,
    #[display("udiv")]
    UDiv,
    #[display("srem")]
    SRem,
    #[display("urem")]
    URem,
    #[display("and")]
    And,
    #[display("or")]
    Or,
    #[display("xor")]
    Xor,
    #[display("shl")]
    Shl,
    #[display("lshr")]
    LShr,
    #[display("ashr")]
    AShr,
}

impl BinaryOp {
    pub fn may_trap(self) -> bool {
        matches!(
            self,
            BinaryOp::SDiv | BinaryOp::UDiv | BinaryOp::SRem | BinaryOp::URem
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum CmpPredicate {
    #[display("eq")]
    Eq,
    #[display("ne")]
    Ne,
    #[display("slt")]
    Slt,
    #[display("sle")]
    Sle,
    #[display("sgt")]
    Sgt,
    #[display("sge")]
    Sge,
    #[display("ult")]
    Ult,
    #[display("ule")]
    Ule,
    #[display("ugt")]
    Ugt,
    #[display("uge")]
    Uge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum CastOp {
    #[display("trunc")]
    Trunc,
    #[display("zext")]
    ZExt,
    #[display("sext")]
    SExt,
    #[display("bitcast")]
    Bitcast,
    #[display("ptrtoint")]
    PtrToInt,
    #[display("inttoptr")]
    IntToPtr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Ret(Option<Value>),
    Br(BlockId),
    CondBr {
        cond: Value,
        if_true: BlockId,
        if_false: BlockId,
    },
    Switch {
        value: Value,
        default: BlockId,
        cases: Vec<(i64, BlockId)>,
    },
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Reg(ValueId),
    Const(Constant),
    /// Address of a global variable or function.
    Global(String),
    Undef(Ty),
    Expr(Box<ConstExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Int { value: i64, ty: Ty },
    Null,
    Zero(Ty),
    Aggregate { ty: Ty, elements: Vec<Constant> },
}

/// Constant expressions over globals, folded into operand position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstExpr {
    Gep {
        global: String,
        element: Ty,
        indices: Vec<i64>,
    },
    Cast {
        op: CastOp,
        value: Value,
        ty: Ty,
    },
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        ty: Ty,
    },
}

impl ConstExpr {
    pub fn ty(&self) -> Ty {
        match self {
            ConstExpr::Gep { .. } => Ty::Ptr,
            ConstExpr::Cast { ty, .. } | ConstExpr::Binary { ty, .. } => ty.clone(),
        }
    }
}

impl Constant {
    pub fn int(value: i64, ty: Ty) -> Self {
        let value = ty.normalize(value);
        Constant::Int { value, ty }
    }

    pub fn ty(&self) -> Ty {
        match self {
            Constant::Int { ty, .. } => ty.clone(),
            Constant::Null => Ty::Ptr,
            Constant::Zero(ty) | Constant::Aggregate { ty, .. } => ty.clone(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int { value, .. } => Some(*value),
            Constant::Zero(ty) if ty.is_integer() => Some(0),
            _ => None,
        }
    }
}

impl Value {
    pub fn int(value: i64, ty: Ty) -> Self {
        Value::Const(Constant::int(value, ty))
    }

    pub fn i64(value: i64) -> Self {
        Value::int(value, Ty::I64)
    }

    pub fn bool(value: bool) -> Self {
        Value::int(i64::from(value), Ty::I1)
    }

    pub fn global(name: impl Into<String>) -> Self {
        Value::Global(name.into())
    }

    pub fn as_reg(&self) -> Option<ValueId> {
        match self {
            Value::Reg(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Const(constant) => constant.as_int(),
            _ => None,
        }
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Value::Undef(_))
    }

    /// Visits every nested value, outermost first.
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Value)) {
        f(self);
        if let Value::Expr(expr) = self {
            match expr.as_mut() {
                ConstExpr::Gep { .. } => {}
                ConstExpr::Cast { value, .. } => value.visit_mut(f),
                ConstExpr::Binary { lhs, rhs, .. } => {
                    lhs.visit_mut(f);
                    rhs.visit_mut(f);
                }
            }
        }
    }

    pub fn visit(&self, f: &mut dyn FnMut(&Value)) {
        f(self);
        if let Value::Expr(expr) = self {
            match expr.as_ref() {
                ConstExpr::Gep { .. } => {}
                ConstExpr::Cast { value, .. } => value.visit(f),
                ConstExpr::Binary { lhs, rhs, .. } => {
                    lhs.visit(f);
                    rhs.visit(f);
                }
            }
        }
    }

    /// Names of globals referenced by this value, including through constant
    /// expressions.
    pub fn referenced_globals(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_globals(self, &mut names);
        names
    }
}

fn collect_globals<'a>(value: &'a Value, names: &mut Vec<&'a str>) {
    match value {
        Value::Global(name) => names.push(name),
        Value::Expr(expr) => match expr.as_ref() {
            ConstExpr::Gep { global, .. } => names.push(global),
            ConstExpr::Cast { value, .. } => collect_globals(value, names),
            ConstExpr::Binary { lhs, rhs, .. } => {
                collect_globals(lhs, names);
                collect_globals(rhs, names);
            }
        },
        _ => {}
    }
}

impl Instruction {
    pub fn new(result: ValueId, ty: Ty, kind: InstructionKind) -> Self {
        Self {
            result: Some(result),
            ty,
            kind,
        }
    }

    /// An instruction executed only for its effect.
    pub fn effect(kind: InstructionKind) -> Self {
        Self {
            result: None,
            ty: Ty::Void,
            kind,
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self.kind, InstructionKind::Phi { .. })
    }

    pub fn operands(&self) -> Vec<&Value> {
        match &self.kind {
            InstructionKind::Binary { lhs, rhs, .. }
            | InstructionKind::Cmp { lhs, rhs, .. }
            | InstructionKind::SignedOverflow { lhs, rhs, .. } => vec![lhs, rhs],
            InstructionKind::Select {
                cond,
                if_true,
                if_false,
            } => vec![cond, if_true, if_false],
            InstructionKind::Cast { value, .. } => vec![value],
            InstructionKind::Alloca { .. } => Vec::new(),
            InstructionKind::Load { ptr } => vec![ptr],
            InstructionKind::Store { value, ptr } => vec![value, ptr],
            InstructionKind::Gep { base, indices, .. } => {
                let mut operands = vec![base];
                operands.extend(indices.iter());
                operands
            }
            InstructionKind::Call { args, .. } => args.iter().collect(),
            InstructionKind::Phi { incoming } => incoming.iter().map(|(value, _)| value).collect(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match &mut self.kind {
            InstructionKind::Binary { lhs, rhs, .. }
            | InstructionKind::Cmp { lhs, rhs, .. }
            | InstructionKind::SignedOverflow { lhs, rhs, .. } => vec![lhs, rhs],
            InstructionKind::Select {
                cond,
                if_true,
                if_false,
            } => vec![cond, if_true, if_false],
            InstructionKind::Cast { value, .. } => vec![value],
            InstructionKind::Alloca { .. } => Vec::new(),
            InstructionKind::Load { ptr } => vec![ptr],
            InstructionKind::Store { value, ptr } => vec![value, ptr],
            InstructionKind::Gep { base, indices, .. } => {
                let mut operands = vec![base];
                operands.extend(indices.iter_mut());
                operands
            }
            InstructionKind::Call { args, .. } => args.iter_mut().collect(),
            InstructionKind::Phi { incoming } => {
                incoming.iter_mut().map(|(value, _)| value).collect()
            }
        }
    }

    /// Whether removing the instruction could change observable behavior,
    /// ignoring its result.
    pub fn has_side_effects(&self) -> bool {
        match &self.kind {
            InstructionKind::Store { .. } | InstructionKind::Call { .. } => true,
            InstructionKind::Binary { op, rhs, .. } if op.may_trap() => {
                !matches!(rhs.as_int(), Some(value) if value != 0 && value != -1)
            }
            _ => false,
        }
    }
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        let mut succs = match self {
            Terminator::Ret(_) | Terminator::Unreachable => Vec::new(),
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr {
                if_true, if_false, ..
            } => vec![*if_true, *if_false],
            Terminator::Switch { default, cases, .. } => {
                let mut targets = vec![*default];
                targets.extend(cases.iter().map(|(_, target)| *target));
                targets
            }
        };
        let mut seen = Vec::with_capacity(succs.len());
        succs.retain(|succ| {
            if seen.contains(succ) {
                false
            } else {
                seen.push(*succ);
                true
            }
        });
        succs
    }

    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Terminator::Ret(Some(value)) => vec![value],
            Terminator::CondBr { cond, .. } => vec![cond],
            Terminator::Switch { value, .. } => vec![value],
            _ => Vec::new(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Terminator::Ret(Some(value)) => vec![value],
            Terminator::CondBr { cond, .. } => vec![cond],
            Terminator::Switch { value, .. } => vec![value],
            _ => Vec::new(),
        }
    }

    pub fn replace_successor(&mut self, old: BlockId, new: BlockId) {
        let swap = |target: &mut BlockId| {
            if *target == old {
                *target = new;
            }
        };
        match self {
            Terminator::Br(target) => swap(target),
            Terminator::CondBr {
                if_true, if_false, ..
            } => {
                swap(if_true);
                swap(if_false);
            }
            Terminator::Switch { default, cases, .. } => {
                swap(default);
                for (_, target) in cases.iter_mut() {
                    swap(target);
                }
            }
            Terminator::Ret(_) | Terminator::Unreachable => {}
        }
    }
}

impl BasicBlock {
    pub fn new(id: BlockId, label: Option<String>, terminator: Terminator) -> Self {
        Self {
            id,
            label,
            instructions: Vec::new(),
            terminator,
        }
    }

    /// Index of the first non-phi instruction.
    pub fn first_non_phi(&self) -> usize {
        self.instructions
            .iter()
            .position(|inst| !inst.is_phi())
            .unwrap_or(self.instructions.len())
    }

    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator.successors()
    }

    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("bb{}", self.id),
        }
    }

    /// Rewrites phi entries coming from `old_pred` to come from `new_pred`.
    pub fn retarget_phis(&mut self, old_pred: BlockId, new_pred: BlockId) {
        for inst in &mut self.instructions {
            if let InstructionKind::Phi { incoming } = &mut inst.kind {
                for (_, pred) in incoming.iter_mut() {
                    if *pred == old_pred {
                        *pred = new_pred;
                    }
                }
            }
        }
    }

    /// Drops phi entries coming from `pred`.
    pub fn remove_phi_incoming(&mut self, pred: BlockId) {
        for inst in &mut self.instructions {
            if let InstructionKind::Phi { incoming } = &mut inst.kind {
                incoming.retain(|(_, from)| *from != pred);
            }
        }
    }
}

impl Function {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_entry(&self) -> bool {
        self.name == ENTRY_FUNCTION
    }

    pub fn entry_id(&self) -> Option<BlockId> {
        self.blocks.first().map(|block| block.id)
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|block| block.id == id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.iter_mut().find(|block| block.id == id)
    }

    pub fn block_index(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| block.id == id)
    }

    pub fn param_types(&self) -> Vec<Ty> {
        self.params.iter().map(|param| param.ty.clone()).collect()
    }

    /// Types of every register defined by a parameter or an instruction.
    pub fn value_types(&self) -> HashMap<ValueId, Ty> {
        let mut types = HashMap::new();
        for param in &self.params {
            types.insert(param.id, param.ty.clone());
        }
        for block in &self.blocks {
            for inst in &block.instructions {
                if let Some(id) = inst.result {
                    types.insert(id, inst.ty.clone());
                }
            }
        }
        types
    }

    /// Block and position of every instruction-defined register.
    pub fn definitions(&self) -> HashMap<ValueId, (BlockId, usize)> {
        let mut defs = HashMap::new();
        for block in &self.blocks {
            for (idx, inst) in block.instructions.iter().enumerate() {
                if let Some(id) = inst.result {
                    defs.insert(id, (block.id, idx));
                }
            }
        }
        defs
    }

    pub fn use_counts(&self) -> HashMap<ValueId, usize> {
        let mut counts = HashMap::new();
        let mut count = |value: &Value| {
            value.visit(&mut |value| {
                if let Value::Reg(id) = value {
                    *counts.entry(*id).or_insert(0) += 1;
                }
            })
        };
        for block in &self.blocks {
            for inst in &block.instructions {
                for operand in inst.operands() {
                    count(operand);
                }
            }
            for operand in block.terminator.operands() {
                count(operand);
            }
        }
        counts
    }

    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        for block in &mut self.blocks {
            for inst in &mut block.instructions {
                for operand in inst.operands_mut() {
                    operand.visit_mut(&mut f);
                }
            }
            for operand in block.terminator.operands_mut() {
                operand.visit_mut(&mut f);
            }
        }
    }

    /// Replaces uses of registers according to `replacements`, following
    /// chains (`a -> b`, `b -> c` rewrites `a` to `c`).
    pub fn replace_uses(&mut self, replacements: &HashMap<ValueId, Value>) {
        if replacements.is_empty() {
            return;
        }
        self.for_each_operand_mut(|operand| {
            let mut steps = 0;
            while let Value::Reg(id) = operand {
                match replacements.get(id) {
                    Some(next) if steps <= replacements.len() => {
                        *operand = next.clone();
                        steps += 1;
                    }
                    _ => break,
                }
            }
        });
    }

    /// Predecessor lists keyed by block id, without duplicates.
    pub fn predecessors(&self) -> HashMap<BlockId, Vec<BlockId>> {
        let mut preds: HashMap<BlockId, Vec<BlockId>> =
            self.blocks.iter().map(|block| (block.id, Vec::new())).collect();
        for block in &self.blocks {
            for succ in block.successors() {
                let entry = preds.entry(succ).or_default();
                if !entry.contains(&block.id) {
                    entry.push(block.id);
                }
            }
        }
        preds
    }

    /// Calls made by this function, in program order.
    pub fn callees(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .flat_map(|block| block.instructions.iter())
            .filter_map(|inst| match &inst.kind {
                InstructionKind::Call { callee, .. } => Some(callee.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Hands out fresh register and block ids for one function.
#[derive(Debug, Clone)]
pub struct IdGen {
    next_value: ValueId,
    next_block: BlockId,
}

impl IdGen {
    pub fn new(function: &Function) -> Self {
        let mut next_value = 0;
        for param in &function.params {
            next_value = next_value.max(param.id + 1);
        }
        let mut next_block = 0;
        for block in &function.blocks {
            next_block = next_block.max(block.id + 1);
            for inst in &block.instructions {
                if let Some(id) = inst.result {
                    next_value = next_value.max(id + 1);
                }
            }
        }
        Self {
            next_value,
            next_block,
        }
    }

    pub fn value(&mut self) -> ValueId {
        let id = self.next_value;
        self.next_value += 1;
        id
    }

    pub fn block(&mut self) -> BlockId {
        let id = self.next_block;
        self.next_block += 1;
        id
    }
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_layout: None,
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|func| func.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|func| func.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|global| global.name == name)
    }

    pub fn defined_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|func| !func.is_declaration())
    }

    /// Adds an external declaration unless a function of that name exists.
    /// Returns whether a declaration was added.
    pub fn declare_function(&mut self, name: &str, params: Vec<Ty>, return_type: Ty) -> bool {
        if self.function(name).is_some() {
            return false;
        }
        let params = params
            .into_iter()
            .enumerate()
            .map(|(idx, ty)| Param {
                id: idx as ValueId,
                name: None,
                ty,
                shadow_of: None,
            })
            .collect();
        self.functions.push(Function {
            name: name.to_string(),
            params,
            return_type,
            linkage: Linkage::External,
            attrs: FunctionAttrs::default(),
            blocks: Vec::new(),
        });
        true
    }

    /// Return types of every function, for call result typing.
    pub fn signatures(&self) -> HashMap<String, (Vec<Ty>, Ty)> {
        self.functions
            .iter()
            .map(|func| {
                (
                    func.name.clone(),
                    (func.param_types(), func.return_type.clone()),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Function {
        Function {
            name: "f".to_string(),
            params: vec![Param {
                id: 0,
                name: Some("x".to_string()),
                ty: Ty::I32,
                shadow_of: None,
            }],
            return_type: Ty::I32,
            linkage: Linkage::Internal,
            attrs: FunctionAttrs::default(),
            blocks: vec![BasicBlock {
                id: 0,
                label: None,
                instructions: vec![
                    Instruction::new(
                        1,
                        Ty::I32,
                        InstructionKind::Binary {
                            op: BinaryOp::Add,
                            lhs: Value::Reg(0),
                            rhs: Value::int(1, Ty::I32),
                            nsw: true,
                        },
                    ),
                    Instruction::new(
                        2,
                        Ty::I32,
                        InstructionKind::Binary {
                            op: BinaryOp::Mul,
                            lhs: Value::Reg(1),
                            rhs: Value::Reg(1),
                            nsw: false,
                        },
                    ),
                ],
                terminator: Terminator::Ret(Some(Value::Reg(2))),
            }],
        }
    }

    #[test]
    fn replace_uses_follows_chains() {
        let mut func = sample();
        let mut replacements = HashMap::new();
        replacements.insert(2, Value::Reg(1));
        replacements.insert(1, Value::Reg(0));
        func.replace_uses(&replacements);
        assert_eq!(
            func.blocks[0].terminator,
            Terminator::Ret(Some(Value::Reg(0)))
        );
    }

    #[test]
    fn id_gen_starts_after_existing_ids() {
        let func = sample();
        let mut ids = IdGen::new(&func);
        assert_eq!(ids.value(), 3);
        assert_eq!(ids.block(), 1);
    }

    #[test]
    fn use_counts_see_every_operand() {
        let func = sample();
        let counts = func.use_counts();
        assert_eq!(counts.get(&1), Some(&2));
        assert_eq!(counts.get(&2), Some(&1));
    }

    #[test]
    fn switch_successors_are_deduplicated() {
        let term = Terminator::Switch {
            value: Value::Reg(0),
            default: 1,
            cases: vec![(0, 2), (1, 1), (2, 2)],
        };
        assert_eq!(term.successors(), vec![1, 2]);
    }
}
