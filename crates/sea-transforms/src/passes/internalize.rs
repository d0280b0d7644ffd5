use sea_core::ir::{Linkage, Module, ENTRY_FUNCTION};
use tracing::debug;

use super::global_dce::eliminate_dead_globals;
use crate::context::{ModulePass, PassContext};
use crate::error::Result;

/// Gives every definition except `main` internal linkage, then drops what is
/// no longer reachable. Declarations stay external.
pub struct Internalize;

impl ModulePass for Internalize {
    fn name(&self) -> &'static str {
        "internalize"
    }

    fn run(&self, module: &mut Module, cx: &mut PassContext<'_>) -> Result<usize> {
        if module.function(ENTRY_FUNCTION).is_none() {
            cx.warn(format!(
                "module has no `{}`; every definition becomes internal",
                ENTRY_FUNCTION
            ));
        }

        let mut changed = 0;
        for func in &mut module.functions {
            if func.is_declaration() || func.is_entry() || func.linkage == Linkage::Internal {
                continue;
            }
            func.linkage = Linkage::Internal;
            changed += 1;
        }
        for global in &mut module.globals {
            if global.initializer.is_some() && global.linkage == Linkage::External {
                global.linkage = Linkage::Internal;
                changed += 1;
            }
        }
        debug!(internalized = changed, "internalized definitions");

        Ok(changed + eliminate_dead_globals(module))
    }
}
