//! Diagnostic messages emitted during compilation.

use crate::Span;

/// An error or warning with its source location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[salsa::accumulator]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub severity: DiagnosticSeverity,
    pub phase: CompilationPhase,
}

/// Severity level of a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// Compilation phase where a diagnostic was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompilationPhase {
    Parsing,
    TypeChecking,
    Desugaring,
    IrBuilding,
    VariantGeneration,
    Evaluation,
}

impl std::fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "ERROR"),
            DiagnosticSeverity::Warning => write!(f, "WARNING"),
        }
    }
}
