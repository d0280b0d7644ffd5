use sea_core::ir::Module;

use crate::context::{ModulePass, PassContext};
use crate::error::Result;
use crate::util::{remove_dead_instructions, remove_unreachable_blocks};

/// Deletes side-effect-free instructions whose results are never used.
pub struct DeadInstElim;

impl ModulePass for DeadInstElim {
    fn name(&self) -> &'static str {
        "dead-inst-elim"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        Ok(module
            .functions
            .iter_mut()
            .map(remove_dead_instructions)
            .sum())
    }
}

/// Deletes blocks the entry cannot reach.
pub struct RemoveUnreachableBlocks;

impl ModulePass for RemoveUnreachableBlocks {
    fn name(&self) -> &'static str {
        "remove-unreachable-blocks"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        Ok(module
            .functions
            .iter_mut()
            .map(remove_unreachable_blocks)
            .sum())
    }
}
