use sea_core::diagnostics::Diagnostic;
use sea_core::ir::{
    ConstExpr, Constant, Instruction, InstructionKind, Module, Ty, Value, ENTRY_FUNCTION,
};
use tracing::debug;

use crate::context::{ModulePass, PassContext};
use crate::error::{Result, TransformError};
use crate::transform_ensure;

/// Upper bound on stores emitted for one global.
const MAX_STORES_PER_GLOBAL: usize = 1 << 16;

/// Makes the initial value of every mutable global explicit: `main` starts by
/// storing each scalar member of each initializer. Initializers are kept.
pub struct LowerGvInitializers;

impl ModulePass for LowerGvInitializers {
    fn name(&self) -> &'static str {
        "lower-gv-initializers"
    }

    fn run(&self, module: &mut Module, cx: &mut PassContext<'_>) -> Result<usize> {
        if module
            .function(ENTRY_FUNCTION)
            .map_or(true, |main| main.is_declaration())
        {
            cx.push(
                Diagnostic::warning("global initializers are left implicit")
                    .with_code("lower-gv::no-main")
                    .with_suggestion(format!("define `{}`", ENTRY_FUNCTION)),
            );
            return Ok(0);
        }

        let mut stores = Vec::new();
        for global in &module.globals {
            if global.is_constant {
                continue;
            }
            let Some(init) = &global.initializer else {
                continue;
            };
            let mut scalars = Vec::new();
            flatten(init, &global.ty, &mut Vec::new(), &mut scalars).map_err(|err| {
                TransformError {
                    message: format!("initializer of `@{}`: {}", global.name, err.message),
                    ..err
                }
            })?;
            if scalars.len() > MAX_STORES_PER_GLOBAL {
                cx.warn(format!(
                    "initializer of `@{}` has {} scalars; left implicit",
                    global.name,
                    scalars.len()
                ));
                continue;
            }
            for (path, value) in scalars {
                let ptr = if path.is_empty() {
                    Value::global(global.name.clone())
                } else {
                    let mut indices = vec![0];
                    indices.extend(path);
                    Value::Expr(Box::new(ConstExpr::Gep {
                        global: global.name.clone(),
                        element: global.ty.clone(),
                        indices,
                    }))
                };
                stores.push(Instruction::effect(InstructionKind::Store { value, ptr }));
            }
        }

        let count = stores.len();
        if let Some(entry) = module
            .function_mut(ENTRY_FUNCTION)
            .and_then(|main| main.blocks.first_mut())
        {
            let at = entry.first_non_phi();
            entry.instructions.splice(at..at, stores);
        }
        debug!(stores = count, "lowered global initializers");
        Ok(count)
    }
}

/// Collects `(member path, scalar value)` pairs of an initializer.
fn flatten(
    init: &Constant,
    ty: &Ty,
    path: &mut Vec<i64>,
    out: &mut Vec<(Vec<i64>, Value)>,
) -> Result<()> {
    if out.len() > MAX_STORES_PER_GLOBAL {
        return Ok(());
    }
    match init {
        Constant::Aggregate { elements, .. } => {
            transform_ensure!(
                ty.element_count() == Some(elements.len() as u64),
                format!("{} elements do not initialize {}", elements.len(), ty),
                "lower-gv::initializer-mismatch"
            );
            for (index, element) in elements.iter().enumerate() {
                let member_ty = ty.element_type(index as u64).cloned().unwrap_or_else(|| element.ty());
                path.push(index as i64);
                flatten(element, &member_ty, path, out)?;
                path.pop();
            }
        }
        Constant::Zero(_) if ty.is_aggregate() => {
            for index in 0..ty.element_count().unwrap_or(0) {
                let Some(member_ty) = ty.element_type(index) else {
                    break;
                };
                path.push(index as i64);
                flatten(&Constant::Zero(member_ty.clone()), member_ty, path, out)?;
                path.pop();
                if out.len() > MAX_STORES_PER_GLOBAL {
                    return Ok(());
                }
            }
        }
        Constant::Zero(_) if ty.is_pointer() => out.push((path.clone(), Value::Const(Constant::Null))),
        Constant::Zero(_) => out.push((path.clone(), Value::int(0, ty.clone()))),
        scalar => out.push((path.clone(), Value::Const(scalar.clone()))),
    }
    Ok(())
}
