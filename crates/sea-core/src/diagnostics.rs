use std::fmt::{Display, Formatter};

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// A message collected while transforming a module, attributed to the stage
/// (or function) that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub suggestions: Vec<String>,
    pub source_context: Option<String>,
    pub code: Option<String>,
}

impl Diagnostic {
    fn with_level(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            suggestions: Vec::new(),
            source_context: None,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Info, message)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_source_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }

        if !self.suggestions.is_empty() {
            write!(f, " (hints: {})", self.suggestions.join("; "))?;
        }

        Ok(())
    }
}

/// Routes diagnostics to the log. `fallback_context` names the emitter when a
/// diagnostic does not carry its own context.
pub fn emit(diagnostics: &[Diagnostic], fallback_context: &str) {
    for diagnostic in diagnostics {
        let context = diagnostic
            .source_context
            .as_deref()
            .unwrap_or(fallback_context);
        match diagnostic.level {
            DiagnosticLevel::Error => error!(context, "{}", diagnostic),
            DiagnosticLevel::Warning => warn!(context, "{}", diagnostic),
            DiagnosticLevel::Info => info!(context, "{}", diagnostic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_hints() {
        let diagnostic = Diagnostic::warning("no entry function")
            .with_code("lower-gv::no-main")
            .with_suggestion("define `main`");
        assert_eq!(
            diagnostic.to_string(),
            "no entry function [lower-gv::no-main] (hints: define `main`)"
        );
        assert_eq!(diagnostic.level, DiagnosticLevel::Warning);
    }
}
