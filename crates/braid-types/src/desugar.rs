//! Cross-stage desugaring.
//!
//! A lookup of a name bound at a lower quote level than the one it is used
//! at is an implicit cross-stage reference. The desugarer makes each one
//! explicit by wrapping the lookup in one persist escape per level crossed,
//! so later passes only ever see escapes.

use std::cell::RefCell;

use braid_ast::{
    EscapeExpr, EscapeKind, Expr, ExprKind, Handlers, QuoteExpr, VisitTable, rewrite_table,
};
use braid_core::{CompileError, CompileResult, NodeIdGen};
use tracing::{debug, trace};

use crate::elaborate::TypeTable;

/// Rewrite implicit cross-stage references in an elaborated tree into
/// explicit persist escapes. New nodes get IDs from `ids`.
pub fn desugar_cross_stage(
    tree: &Expr,
    type_table: &TypeTable,
    ids: &mut NodeIdGen,
) -> CompileResult<Expr> {
    debug!("desugaring cross-stage references under {}", tree.id);
    let ids = RefCell::new(ids);

    let base: VisitTable<'_, u32, CompileResult<Expr>> = rewrite_table(|_, _| None);
    let overrides = Handlers::<u32, CompileResult<Expr>>::new()
        .quote(|table, expr, quote, level| {
            let body = table.visit(&quote.body, level + 1)?;
            Ok(rebuild(expr, ExprKind::Quote(QuoteExpr {
                annotation: quote.annotation.clone(),
                snippet: quote.snippet,
                body,
            })))
        })
        .escape(|table, expr, escape, level| {
            let body = table.visit(&escape.body, level.saturating_sub(1))?;
            Ok(rebuild(expr, ExprKind::Escape(EscapeExpr {
                kind: escape.kind,
                body,
            })))
        })
        .lookup(|_, expr, lookup, level| {
            let env = type_table.env_of(expr.id).ok_or_else(|| {
                CompileError::type_mismatch(expr.id, "lookup was not elaborated")
            })?;
            // Intrinsics are visible at every level.
            let Some(binding) = env.lookup(&lookup.name) else {
                return Ok(expr.clone());
            };
            if binding.level > level {
                return Err(CompileError::DownwardCrossStageReference {
                    node: expr.id,
                    name: lookup.name.clone(),
                });
            }
            let crossed = level - binding.level;
            if crossed > 0 {
                trace!("persisting {} across {crossed} level(s)", lookup.name);
            }
            let mut ids = ids.borrow_mut();
            Ok((0..crossed).fold(expr.clone(), |body, _| {
                Expr::new(
                    ids.fresh(),
                    expr.span,
                    ExprKind::Escape(EscapeExpr {
                        kind: EscapeKind::Persist,
                        body,
                    }),
                )
            }))
        });

    VisitTable::compose(&base, &overrides).visit(tree, 0)
}

fn rebuild(original: &Expr, kind: ExprKind) -> Expr {
    Expr::new(original.id, original.span, kind)
}
