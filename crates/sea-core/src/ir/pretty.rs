use std::fmt::{self, Formatter};

use itertools::Itertools;

use crate::pretty::{listing, quote, Listing, ListingOptions, WriteListing};

use super::{
    BasicBlock, ConstExpr, Constant, Function, Global, Instruction, InstructionKind, Linkage,
    Module, Terminator, Value,
};

impl WriteListing for Module {
    fn write_listing(&self, f: &mut Formatter<'_>, ctx: &mut Listing) -> fmt::Result {
        ctx.line(f, format!("; module {}", self.name))?;
        if let Some(layout) = &self.data_layout {
            ctx.line(
                f,
                format!("target datalayout = {}", quote(layout)),
            )?;
        }
        if !self.globals.is_empty() {
            writeln!(f)?;
            for global in &self.globals {
                write_global(global, f, ctx)?;
            }
        }
        for func in &self.functions {
            writeln!(f)?;
            write_function(func, f, ctx)?;
        }
        Ok(())
    }
}

impl Module {
    /// Textual listing of the module, as written by `-S`.
    pub fn to_text(&self) -> String {
        listing(self, ListingOptions::default()).to_string()
    }
}

fn linkage_prefix(linkage: Linkage) -> &'static str {
    match linkage {
        Linkage::External => "",
        Linkage::Internal => "internal ",
    }
}

fn write_global(global: &Global, f: &mut Formatter<'_>, ctx: &mut Listing) -> fmt::Result {
    let kind = if global.is_constant { "constant" } else { "global" };
    let mut line = format!(
        "@{} = {}{} {}",
        global.name,
        linkage_prefix(global.linkage),
        kind,
        global.ty
    );
    if let Some(init) = &global.initializer {
        line.push(' ');
        line.push_str(&format_constant(init));
    }
    ctx.line(f, line)
}

fn write_function(func: &Function, f: &mut Formatter<'_>, ctx: &mut Listing) -> fmt::Result {
    let params = func
        .params
        .iter()
        .map(|param| {
            let mut text = format!("{} %{}", param.ty, param.id);
            if let Some(name) = &param.name {
                text.push_str(&format!(" /* {} */", name));
            }
            text
        })
        .join(", ");
    let mut attrs = Vec::new();
    if func.attrs.always_inline {
        attrs.push("alwaysinline".to_string());
    }
    if func.attrs.no_inline {
        attrs.push("noinline".to_string());
    }
    match func.attrs.accesses_memory {
        Some(true) => attrs.push("memory(readwrite)".to_string()),
        Some(false) => attrs.push("memory(none)".to_string()),
        None => {}
    }
    let attrs = if attrs.is_empty() {
        String::new()
    } else {
        format!(" {}", attrs.join(" "))
    };

    if func.is_declaration() {
        return ctx.line(
            f,
            format!(
                "declare {} @{}({}){}",
                func.return_type, func.name, params, attrs
            ),
        );
    }

    ctx.line(
        f,
        format!(
            "define {}{} @{}({}){} {{",
            linkage_prefix(func.linkage),
            func.return_type,
            func.name,
            params,
            attrs
        ),
    )?;
    for block in &func.blocks {
        write_block(block, f, ctx)?;
    }
    ctx.line(f, "}")
}

fn write_block(block: &BasicBlock, f: &mut Formatter<'_>, ctx: &mut Listing) -> fmt::Result {
    let mut header = format!("bb{}:", block.id);
    if let Some(label) = &block.label {
        header.push_str(&format!(" ; {}", label));
    }
    ctx.line(f, header)?;
    ctx.nested(|ctx| {
        for inst in &block.instructions {
            let mut line = format_instruction(inst);
            if ctx.options.annotate_types && inst.result.is_some() {
                line.push_str(&format!(" ; {}", inst.ty));
            }
            ctx.line(f, line)?;
        }
        ctx.line(f, format_terminator(&block.terminator))
    })
}

pub fn format_instruction(inst: &Instruction) -> String {
    let body = match &inst.kind {
        InstructionKind::Binary { op, lhs, rhs, nsw } => format!(
            "{}{} {}, {}",
            op,
            if *nsw { " nsw" } else { "" },
            format_value(lhs),
            format_value(rhs)
        ),
        InstructionKind::Cmp { pred, lhs, rhs } => {
            format!("icmp {} {}, {}", pred, format_value(lhs), format_value(rhs))
        }
        InstructionKind::Select {
            cond,
            if_true,
            if_false,
        } => format!(
            "select {}, {}, {}",
            format_value(cond),
            format_value(if_true),
            format_value(if_false)
        ),
        InstructionKind::Cast { op, value } => {
            format!("{} {} to {}", op, format_value(value), inst.ty)
        }
        InstructionKind::Alloca { allocated } => format!("alloca {}", allocated),
        InstructionKind::Load { ptr } => format!("load {}, {}", inst.ty, format_value(ptr)),
        InstructionKind::Store { value, ptr } => {
            format!("store {}, {}", format_value(value), format_value(ptr))
        }
        InstructionKind::Gep {
            base,
            element,
            indices,
        } => format!(
            "getelementptr {}, {}, {}",
            element,
            format_value(base),
            indices.iter().map(format_value).join(", ")
        ),
        InstructionKind::Call { callee, args } => format!(
            "call {} @{}({})",
            inst.ty,
            callee,
            args.iter().map(format_value).join(", ")
        ),
        InstructionKind::Phi { incoming } => format!(
            "phi {} {}",
            inst.ty,
            incoming
                .iter()
                .map(|(value, pred)| format!("[ {}, bb{} ]", format_value(value), pred))
                .join(", ")
        ),
        InstructionKind::SignedOverflow {
            op,
            lhs,
            rhs,
            operand_ty,
        } => format!(
            "soverflow {} {} {}, {}",
            op,
            operand_ty,
            format_value(lhs),
            format_value(rhs)
        ),
    };
    match inst.result {
        Some(id) => format!("%{} = {}", id, body),
        None => body,
    }
}

pub fn format_terminator(term: &Terminator) -> String {
    match term {
        Terminator::Ret(None) => "ret void".to_string(),
        Terminator::Ret(Some(value)) => format!("ret {}", format_value(value)),
        Terminator::Br(target) => format!("br bb{}", target),
        Terminator::CondBr {
            cond,
            if_true,
            if_false,
        } => format!(
            "br {}, bb{}, bb{}",
            format_value(cond),
            if_true,
            if_false
        ),
        Terminator::Switch {
            value,
            default,
            cases,
        } => format!(
            "switch {}, bb{} [{}]",
            format_value(value),
            default,
            cases
                .iter()
                .map(|(case, target)| format!("{}: bb{}", case, target))
                .join(", ")
        ),
        Terminator::Unreachable => "unreachable".to_string(),
    }
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::Reg(id) => format!("%{}", id),
        Value::Const(constant) => format_constant(constant),
        Value::Global(name) => format!("@{}", name),
        Value::Undef(ty) => format!("{} undef", ty),
        Value::Expr(expr) => match expr.as_ref() {
            ConstExpr::Gep {
                global,
                element,
                indices,
            } => format!(
                "getelementptr ({}, @{}, {})",
                element,
                global,
                indices.iter().join(", ")
            ),
            ConstExpr::Cast { op, value, ty } => {
                format!("{} ({} to {})", op, format_value(value), ty)
            }
            ConstExpr::Binary { op, lhs, rhs, ty } => format!(
                "{} {} ({}, {})",
                op,
                ty,
                format_value(lhs),
                format_value(rhs)
            ),
        },
    }
}

pub fn format_constant(constant: &Constant) -> String {
    match constant {
        Constant::Int { value, ty } => format!("{} {}", ty, value),
        Constant::Null => "ptr null".to_string(),
        Constant::Zero(ty) => format!("{} zeroinitializer", ty),
        Constant::Aggregate { ty, elements } => format!(
            "{} [{}]",
            ty,
            elements.iter().map(format_constant).join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Ty};

    #[test]
    fn instructions_render_like_assembly() {
        let inst = Instruction::new(
            4,
            Ty::I32,
            InstructionKind::Binary {
                op: BinaryOp::Add,
                lhs: Value::Reg(1),
                rhs: Value::int(7, Ty::I32),
                nsw: true,
            },
        );
        assert_eq!(format_instruction(&inst), "%4 = add nsw %1, i32 7");
        assert_eq!(
            format_terminator(&Terminator::CondBr {
                cond: Value::Reg(4),
                if_true: 1,
                if_false: 2
            }),
            "br %4, bb1, bb2"
        );
    }
}
