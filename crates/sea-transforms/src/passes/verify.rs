//! Structural well-formedness checks run on the final module.

use std::collections::{HashMap, HashSet};

use sea_core::ir::{
    BlockId, Function, InstructionKind, Module, Terminator, Ty, Value, ValueId,
};
use thiserror::Error;

use crate::analysis::{Cfg, DomTree};
use crate::util::value_type;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{message}", function_prefix(.function))]
pub struct Violation {
    pub function: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "module is not well formed ({}){}",
    violation_count(.violations),
    violation_list(.violations)
)]
pub struct VerificationError {
    pub violations: Vec<Violation>,
}

fn function_prefix(function: &Option<String>) -> String {
    function
        .as_deref()
        .map_or_else(String::new, |name| format!("@{name}: "))
}

fn violation_count(violations: &[Violation]) -> String {
    match violations.len() {
        1 => "1 violation".to_string(),
        n => format!("{n} violations"),
    }
}

fn violation_list(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| format!("\n  {violation}"))
        .collect()
}

/// Checks every structural invariant later consumers rely on and reports all
/// violations found.
pub fn verify_module(module: &Module) -> Result<(), VerificationError> {
    let mut violations = Vec::new();
    let mut report = |function: Option<&str>, message: String| {
        violations.push(Violation {
            function: function.map(str::to_string),
            message,
        });
    };

    let mut symbols: HashSet<&str> = HashSet::new();
    for name in module
        .globals
        .iter()
        .map(|global| global.name.as_str())
        .chain(module.functions.iter().map(|func| func.name.as_str()))
    {
        if !symbols.insert(name) {
            report(None, format!("symbol `@{}` is defined more than once", name));
        }
    }

    let signatures = module.signatures();
    for func in module.defined_functions() {
        FunctionVerifier {
            func,
            symbols: &symbols,
            signatures: &signatures,
        }
        .check(&mut |message| report(Some(&func.name), message));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(VerificationError { violations })
    }
}

struct FunctionVerifier<'a> {
    func: &'a Function,
    symbols: &'a HashSet<&'a str>,
    signatures: &'a HashMap<String, (Vec<Ty>, Ty)>,
}

impl FunctionVerifier<'_> {
    fn check(&self, report: &mut dyn FnMut(String)) {
        let func = self.func;

        let mut blocks: HashSet<BlockId> = HashSet::new();
        for block in &func.blocks {
            if !blocks.insert(block.id) {
                report(format!("block {} is defined more than once", block.display_name()));
            }
        }
        let mut defined: HashSet<ValueId> = HashSet::new();
        for id in func
            .params
            .iter()
            .map(|param| param.id)
            .chain(func.definitions().into_keys())
        {
            defined.insert(id);
        }
        let result_count = func.params.len()
            + func
                .blocks
                .iter()
                .flat_map(|block| block.instructions.iter())
                .filter(|inst| inst.result.is_some())
                .count();
        if defined.len() != result_count {
            report("a register is defined more than once".to_string());
        }
        if blocks.len() != func.blocks.len() {
            return;
        }

        let preds = func.predecessors();
        if let Some(entry) = func.entry_id() {
            if preds.get(&entry).is_some_and(|preds| !preds.is_empty()) {
                report("the entry block has predecessors".to_string());
            }
        }
        for block in &func.blocks {
            for succ in block.successors() {
                if !blocks.contains(&succ) {
                    report(format!(
                        "{} branches to missing block bb{}",
                        block.display_name(),
                        succ
                    ));
                }
            }
        }

        let types = func.value_types();
        for block in &func.blocks {
            let name = block.display_name();
            if block.instructions[block.first_non_phi()..]
                .iter()
                .any(|inst| inst.is_phi())
            {
                report(format!("{}: phi after a non-phi instruction", name));
            }
            let block_preds: HashSet<BlockId> = preds
                .get(&block.id)
                .map(|preds| preds.iter().copied().collect())
                .unwrap_or_default();
            for inst in &block.instructions {
                if inst.result.is_some() == inst.ty.is_void() {
                    report(format!(
                        "{}: result presence does not match type {}",
                        name, inst.ty
                    ));
                }
                match &inst.kind {
                    InstructionKind::Phi { incoming } => {
                        let from: Vec<BlockId> = incoming.iter().map(|(_, pred)| *pred).collect();
                        let unique: HashSet<BlockId> = from.iter().copied().collect();
                        if unique.len() != from.len() || unique != block_preds {
                            report(format!(
                                "{}: phi incoming blocks do not match the predecessors",
                                name
                            ));
                        }
                    }
                    InstructionKind::Call { callee, args } => match self.signatures.get(callee) {
                        None => report(format!("{}: call to unknown `@{}`", name, callee)),
                        Some((params, ret)) => {
                            if params.len() != args.len() {
                                report(format!(
                                    "{}: `@{}` takes {} arguments, got {}",
                                    name,
                                    callee,
                                    params.len(),
                                    args.len()
                                ));
                            }
                            if *ret != inst.ty {
                                report(format!(
                                    "{}: `@{}` returns {}, call produces {}",
                                    name, callee, ret, inst.ty
                                ));
                            }
                        }
                    },
                    _ => {}
                }
                for operand in inst.operands() {
                    self.check_operand(operand, &defined, &name, report);
                }
            }
            for operand in block.terminator.operands() {
                self.check_operand(operand, &defined, &name, report);
            }
            match &block.terminator {
                Terminator::Ret(value) => {
                    let returned = value.as_ref().and_then(|value| value_type(value, &types));
                    let matches = match (value, &func.return_type) {
                        (None, Ty::Void) => true,
                        (None, _) | (Some(_), Ty::Void) => false,
                        (Some(_), expected) => returned.map_or(true, |ty| ty == *expected),
                    };
                    if !matches {
                        report(format!(
                            "{}: return does not match return type {}",
                            name, func.return_type
                        ));
                    }
                }
                Terminator::CondBr { cond, .. } => {
                    if value_type(cond, &types).is_some_and(|ty| ty != Ty::I1) {
                        report(format!("{}: branch condition is not i1", name));
                    }
                }
                _ => {}
            }
        }

        self.check_dominance(&defined, report);
    }

    fn check_operand(
        &self,
        operand: &Value,
        defined: &HashSet<ValueId>,
        block: &str,
        report: &mut dyn FnMut(String),
    ) {
        operand.visit(&mut |value| {
            if let Value::Reg(id) = value {
                if !defined.contains(id) {
                    report(format!("{}: use of undefined register %{}", block, id));
                }
            }
        });
        for name in operand.referenced_globals() {
            if !self.symbols.contains(name) {
                report(format!("{}: reference to unknown `@{}`", block, name));
            }
        }
    }

    /// Every use in a reachable block must be dominated by its definition;
    /// phi uses count at the end of the incoming block.
    fn check_dominance(&self, defined: &HashSet<ValueId>, report: &mut dyn FnMut(String)) {
        let func = self.func;
        let Some(cfg) = Cfg::new(func) else {
            return;
        };
        let dom = DomTree::new(&cfg);
        let defs = func.definitions();
        let dominated = |id: ValueId, block: BlockId, position: Option<usize>| -> bool {
            let Some((def_block, def_pos)) = defs.get(&id) else {
                // parameters, or undefined registers reported elsewhere
                return true;
            };
            if *def_block == block {
                return position.map_or(true, |pos| *def_pos < pos);
            }
            dom.dominates(*def_block, block)
        };
        let regs = |value: &Value| {
            let mut ids = Vec::new();
            value.visit(&mut |value| {
                if let Value::Reg(id) = value {
                    ids.push(*id);
                }
            });
            ids
        };

        for block in func.blocks.iter().filter(|block| dom.is_reachable(block.id)) {
            for (pos, inst) in block.instructions.iter().enumerate() {
                if let InstructionKind::Phi { incoming } = &inst.kind {
                    for (value, pred) in incoming {
                        if !dom.is_reachable(*pred) {
                            continue;
                        }
                        for id in regs(value) {
                            if defined.contains(&id) && !dominated(id, *pred, None) {
                                report(format!(
                                    "{}: %{} does not dominate its phi use from bb{}",
                                    block.display_name(),
                                    id,
                                    pred
                                ));
                            }
                        }
                    }
                    continue;
                }
                for id in inst.operands().into_iter().flat_map(|value| regs(value)) {
                    if defined.contains(&id) && !dominated(id, block.id, Some(pos)) {
                        report(format!(
                            "{}: %{} does not dominate its use",
                            block.display_name(),
                            id
                        ));
                    }
                }
            }
            let end = block.instructions.len();
            for id in block.terminator.operands().into_iter().flat_map(|value| regs(value)) {
                if defined.contains(&id) && !dominated(id, block.id, Some(end)) {
                    report(format!(
                        "{}: %{} does not dominate the terminator",
                        block.display_name(),
                        id
                    ));
                }
            }
        }
    }
}
