use sea_core::diagnostics::Diagnostic;
use sea_core::ir::{DataLayout, Module};

use crate::error::Result;

/// State shared by one stage invocation: the resolved target layout and the
/// diagnostics the stage reports.
pub struct PassContext<'a> {
    pub layout: &'a DataLayout,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> PassContext<'a> {
    pub fn new(layout: &'a DataLayout) -> Self {
        Self {
            layout,
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::warning(message));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::info(message));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// A transformation over a whole module. Returns the number of changes made.
pub trait ModulePass {
    fn name(&self) -> &'static str;
    fn run(&self, module: &mut Module, cx: &mut PassContext<'_>) -> Result<usize>;
}
