use std::collections::HashSet;

use sea_core::ir::{Linkage, Module};
use tracing::debug;

use crate::context::{ModulePass, PassContext};
use crate::error::Result;
use crate::util::function_references;

/// Removes functions and globals that cannot be reached from any external
/// definition.
pub struct GlobalDce;

impl ModulePass for GlobalDce {
    fn name(&self) -> &'static str {
        "global-dce"
    }

    fn run(&self, module: &mut Module, _cx: &mut PassContext<'_>) -> Result<usize> {
        Ok(eliminate_dead_globals(module))
    }
}

pub fn eliminate_dead_globals(module: &mut Module) -> usize {
    let mut live: HashSet<String> = HashSet::new();
    let mut worklist: Vec<String> = module
        .defined_functions()
        .filter(|func| func.linkage == Linkage::External)
        .map(|func| func.name.clone())
        .chain(
            module
                .globals
                .iter()
                .filter(|global| global.linkage == Linkage::External)
                .map(|global| global.name.clone()),
        )
        .collect();

    while let Some(name) = worklist.pop() {
        if !live.insert(name.clone()) {
            continue;
        }
        if let Some(func) = module.function(&name) {
            worklist.extend(
                function_references(func)
                    .into_iter()
                    .filter(|symbol| !live.contains(symbol)),
            );
        }
    }

    let before = module.functions.len() + module.globals.len();
    module.functions.retain(|func| live.contains(&func.name));
    module.globals.retain(|global| live.contains(&global.name));
    let removed = before - module.functions.len() - module.globals.len();
    if removed > 0 {
        debug!(removed, "eliminated dead globals");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_core::ir::builder::{declaration, FunctionBuilder};
    use sea_core::ir::{Global, Ty, Value};

    #[test]
    fn keeps_only_what_main_reaches() {
        let mut module = Module::new("m");
        let mut main = FunctionBuilder::new("main", Vec::new(), Ty::I32);
        main.call("used", Ty::Void, Vec::new());
        let value = main.load(Ty::I32, Value::global("g"));
        main.ret(Some(value));
        module.functions.push(main.finish());

        let mut used = FunctionBuilder::new("used", Vec::new(), Ty::Void).linkage(Linkage::Internal);
        used.call("ext", Ty::Void, Vec::new());
        used.ret(None);
        module.functions.push(used.finish());

        let mut unused = FunctionBuilder::new("unused", Vec::new(), Ty::Void).linkage(Linkage::Internal);
        unused.ret(None);
        module.functions.push(unused.finish());
        module.functions.push(declaration("ext", Vec::new(), Ty::Void));
        module.functions.push(declaration("never", Vec::new(), Ty::Void));

        for name in ["g", "dead"] {
            module.globals.push(Global {
                name: name.to_string(),
                ty: Ty::I32,
                initializer: None,
                linkage: Linkage::Internal,
                is_constant: false,
            });
        }

        assert_eq!(eliminate_dead_globals(&mut module), 3);
        let names: Vec<&str> = module.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["main", "used", "ext"]);
        assert_eq!(module.globals.len(), 1);
        assert_eq!(module.globals[0].name, "g");
    }
}
