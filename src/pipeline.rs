//! Compilation pipeline for Braid.
//!
//! Each stage is a salsa tracked function over a [`SourceProgram`], so a
//! unit's results are computed once and shared by later stages.
//!
//! ```text
//! SourceProgram
//!     │
//!     ▼
//! stage_elaborate ─► Elaboration (every node typed)
//!     │
//!     ▼
//! stage_desugar ─► Ast (cross-stage references made explicit)
//!     │
//!     ├─► stage_interpret ─► value
//!     │
//!     ▼
//! stage_typed ─► Elaboration of the desugared tree
//!     │
//!     ▼
//! stage_build_ir ─► CompilerIr (fragments, procedures, def/use)
//!     │
//!     ▼
//! stage_variants ─► VariantTable (snippet escapes resolved)
//! ```
//!
//! A stage that fails accumulates one [`Diagnostic`] and returns `None`;
//! every later stage then returns `None` without reporting again.

use braid_ast::Ast;
use braid_core::{CompilationPhase, CompileError, Diagnostic, DiagnosticSeverity, NodeId, Span};
use braid_ir::{CompilerIr, VariantTable, build_ir, presplice};
use braid_types::{Builtins, Elaboration, desugar_cross_stage, elaborate};
use salsa::Accumulator;
use tracing::debug;

use crate::SourceProgram;
use crate::eval::interpret;

fn span_of(db: &dyn salsa::Database, source: SourceProgram, node: Option<NodeId>) -> Span {
    // Nodes introduced by desugaring have no source position.
    node.and_then(|node| source.ast(db).root.find(node))
        .map(|expr| expr.span)
        .unwrap_or_default()
}

fn report(db: &dyn salsa::Database, source: SourceProgram, error: &CompileError) {
    Diagnostic {
        message: error.to_string(),
        span: span_of(db, source, error.node()),
        severity: DiagnosticSeverity::Error,
        phase: error.phase(),
    }
    .accumulate(db);
}

/// Type every node of the unit as written.
#[salsa::tracked]
pub fn stage_elaborate(db: &dyn salsa::Database, source: SourceProgram) -> Option<Elaboration> {
    let builtins = Builtins::for_mode(source.mode(db));
    match elaborate(&source.ast(db).root, &builtins) {
        Ok(elaboration) => {
            debug!("{}: {:?}", source.path(db).display(), elaboration.root_type());
            Some(elaboration)
        }
        Err(err) => {
            report(db, source, &err);
            None
        }
    }
}

/// Make implicit cross-stage references explicit.
#[salsa::tracked]
pub fn stage_desugar(db: &dyn salsa::Database, source: SourceProgram) -> Option<Ast> {
    let elaboration = stage_elaborate(db, source)?;
    let mut ids = source.ast(db).ids.clone();
    match desugar_cross_stage(&elaboration.tree, &elaboration.type_table, &mut ids) {
        Ok(root) => Some(Ast { root, ids }),
        Err(err) => {
            report(db, source, &err);
            None
        }
    }
}

/// Type the desugared tree, so persist escapes have entries too.
#[salsa::tracked]
pub fn stage_typed(db: &dyn salsa::Database, source: SourceProgram) -> Option<Elaboration> {
    let desugared = stage_desugar(db, source)?;
    let builtins = Builtins::for_mode(source.mode(db));
    match elaborate(&desugared.root, &builtins) {
        Ok(elaboration) => Some(elaboration),
        Err(err) => {
            report(db, source, &err);
            None
        }
    }
}

#[salsa::tracked]
pub fn stage_build_ir(db: &dyn salsa::Database, source: SourceProgram) -> Option<CompilerIr> {
    let typed = stage_typed(db, source)?;
    match build_ir(&typed.tree, &typed.type_table) {
        Ok(ir) => {
            let unused = ir
                .progs
                .values()
                .filter(|prog| prog.snippet && prog.snippet_escape.is_none());
            for prog in unused {
                Diagnostic {
                    message: format!("snippet quote {} fills no snippet escape", prog.id),
                    span: span_of(db, source, Some(prog.id)),
                    severity: DiagnosticSeverity::Warning,
                    phase: CompilationPhase::IrBuilding,
                }
                .accumulate(db);
            }
            Some(ir)
        }
        Err(err) => {
            report(db, source, &err);
            None
        }
    }
}

#[salsa::tracked]
pub fn stage_variants(db: &dyn salsa::Database, source: SourceProgram) -> Option<VariantTable> {
    let ir = stage_build_ir(db, source)?;
    match presplice(&ir.progs) {
        Ok(variants) => Some(variants),
        Err(err) => {
            report(db, source, &err);
            None
        }
    }
}

/// Evaluate the desugared tree, rendering the resulting value.
#[salsa::tracked]
pub fn stage_interpret(db: &dyn salsa::Database, source: SourceProgram) -> Option<String> {
    let desugared = stage_desugar(db, source)?;
    match interpret(&desugared.root) {
        Ok(value) => Some(value.to_string()),
        Err(err) => {
            Diagnostic {
                message: format!("runtime error: {err}"),
                span: Span::default(),
                severity: DiagnosticSeverity::Error,
                phase: CompilationPhase::Evaluation,
            }
            .accumulate(db);
            None
        }
    }
}

/// Results of checking a unit.
#[derive(Debug)]
pub struct CheckResult {
    pub ty: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn check_with_diagnostics(db: &dyn salsa::Database, source: SourceProgram) -> CheckResult {
    let ty = stage_elaborate(db, source)
        .and_then(|elaboration| elaboration.root_type().map(ToString::to_string));
    let diagnostics = stage_elaborate::accumulated::<Diagnostic>(db, source)
        .into_iter()
        .cloned()
        .collect();
    CheckResult { ty, diagnostics }
}

/// Results of interpreting a unit.
#[derive(Debug)]
pub struct RunResult {
    pub value: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn run_with_diagnostics(db: &dyn salsa::Database, source: SourceProgram) -> RunResult {
    let value = stage_interpret(db, source);
    let diagnostics = stage_interpret::accumulated::<Diagnostic>(db, source)
        .into_iter()
        .cloned()
        .collect();
    RunResult { value, diagnostics }
}

/// Results of compiling a unit down to fragment variants.
#[derive(Debug)]
pub struct CompilationResult {
    pub ir: Option<CompilerIr>,
    pub variants: Option<VariantTable>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn compile_with_diagnostics(
    db: &dyn salsa::Database,
    source: SourceProgram,
) -> CompilationResult {
    let variants = stage_variants(db, source);
    let ir = stage_build_ir(db, source);
    let diagnostics = stage_variants::accumulated::<Diagnostic>(db, source)
        .into_iter()
        .cloned()
        .collect();
    CompilationResult {
        ir,
        variants,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BraidDatabaseImpl;
    use braid_ast::{AstBuilder, BinaryOp};
    use braid_types::Mode;
    use salsa::Setter;

    fn source(db: &BraidDatabaseImpl, ast: Ast) -> SourceProgram {
        SourceProgram::new(db, "test.json".into(), ast, Mode::General)
    }

    fn persist_program() -> Ast {
        // var x = 2; !< 37 + x >
        let mut b = AstBuilder::new();
        let two = b.int(2);
        let let_x = b.let_("x", two);
        let thirty_seven = b.int(37);
        let x = b.lookup("x");
        let sum = b.binary(BinaryOp::Add, thirty_seven, x);
        let quote = b.quote(sum);
        let run = b.run(quote);
        let program = b.seq(let_x, run);
        b.finish(program)
    }

    #[test]
    fn test_check_and_run() {
        let db = BraidDatabaseImpl::default();
        let source = source(&db, persist_program());

        let checked = check_with_diagnostics(&db, source);
        assert_eq!(checked.ty.as_deref(), Some("Int"));
        assert!(checked.diagnostics.is_empty());

        let run = run_with_diagnostics(&db, source);
        assert_eq!(run.value.as_deref(), Some("39"));
        assert!(run.diagnostics.is_empty(), "{:?}", run.diagnostics);
    }

    #[test]
    fn test_type_error_becomes_diagnostic() {
        let db = BraidDatabaseImpl::default();
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let escape = b.splice(one);
        let source = source(&db, b.finish(escape));

        let result = compile_with_diagnostics(&db, source);
        assert!(result.ir.is_none() && result.variants.is_none());
        assert_eq!(result.diagnostics.len(), 1);
        let diagnostic = &result.diagnostics[0];
        assert_eq!(diagnostic.phase, CompilationPhase::TypeChecking);
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Error);
        assert_eq!(diagnostic.message, "type error: top-level escape");
    }

    #[test]
    fn test_compile_after_edit() {
        let mut db = BraidDatabaseImpl::default();
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let escape = b.splice(one);
        let source = source(&db, b.finish(escape));
        assert!(compile_with_diagnostics(&db, source).ir.is_none());

        source.set_ast(&mut db).to(persist_program());
        let result = compile_with_diagnostics(&db, source);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let ir = result.ir.unwrap();
        assert_eq!(ir.progs.len(), 1);
        let prog = ir.progs.values().next().unwrap();
        assert_eq!(prog.owned_persist.len(), 1);
        assert_eq!(result.variants.unwrap()[&prog.id], None);
    }

    #[test]
    fn test_unused_snippet_quote_warns() {
        // var s = $<1>; < 2 >
        let db = BraidDatabaseImpl::default();
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let snippet = b.snippet_quote(one);
        let snippet_id = snippet.id;
        let let_s = b.let_("s", snippet);
        let two = b.int(2);
        let quote = b.quote(two);
        let program = b.seq(let_s, quote);
        let source = source(&db, b.finish(program));

        let result = compile_with_diagnostics(&db, source);
        assert!(result.ir.is_some() && result.variants.is_some());
        assert_eq!(result.diagnostics.len(), 1);
        let diagnostic = &result.diagnostics[0];
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Warning);
        assert_eq!(diagnostic.phase, CompilationPhase::IrBuilding);
        assert_eq!(
            diagnostic.message,
            format!("snippet quote {snippet_id} fills no snippet escape")
        );
    }
}
