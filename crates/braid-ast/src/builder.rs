//! Programmatic tree construction.
//!
//! The concrete grammar lives outside this crate; clients that build trees
//! in code (tests, embedders) use `AstBuilder` so IDs come from one
//! allocator.

use braid_core::{NodeIdGen, Span};

use crate::ast::*;

#[derive(Debug, Default)]
pub struct AstBuilder {
    ids: NodeIdGen,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand the tree and its allocator over as a compilation unit.
    pub fn finish(self, root: Expr) -> Ast {
        Ast {
            root,
            ids: self.ids,
        }
    }

    fn node(&mut self, kind: ExprKind) -> Expr {
        Expr::new(self.ids.fresh(), Span::default(), kind)
    }

    pub fn int(&mut self, value: i64) -> Expr {
        self.node(ExprKind::Literal(Literal::Int(value)))
    }

    pub fn float(&mut self, value: f64) -> Expr {
        self.node(ExprKind::Literal(Literal::Float(value)))
    }

    pub fn string(&mut self, value: &str) -> Expr {
        self.node(ExprKind::Literal(Literal::String(value.to_string())))
    }

    pub fn seq(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.node(ExprKind::Seq(SeqExpr { lhs, rhs }))
    }

    /// `a; b; c` as right-nested sequences.
    pub fn block(&mut self, first: Expr, rest: Vec<Expr>) -> Expr {
        match rest.into_iter().rev().reduce(|rhs, lhs| self.seq(lhs, rhs)) {
            Some(tail) => self.seq(first, tail),
            None => first,
        }
    }

    pub fn let_(&mut self, name: &str, value: Expr) -> Expr {
        self.node(ExprKind::Let(LetExpr {
            name: name.to_string(),
            value,
        }))
    }

    pub fn assign(&mut self, name: &str, value: Expr) -> Expr {
        self.node(ExprKind::Assign(AssignExpr {
            name: name.to_string(),
            value,
        }))
    }

    pub fn lookup(&mut self, name: &str) -> Expr {
        self.node(ExprKind::Lookup(LookupExpr {
            name: name.to_string(),
        }))
    }

    pub fn neg(&mut self, operand: Expr) -> Expr {
        self.node(ExprKind::Unary(UnaryExpr {
            op: UnaryOp::Neg,
            operand,
        }))
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        self.node(ExprKind::Binary(BinaryExpr { op, lhs, rhs }))
    }

    pub fn quote(&mut self, body: Expr) -> Expr {
        self.node(ExprKind::Quote(QuoteExpr {
            annotation: None,
            snippet: false,
            body,
        }))
    }

    /// `a<...>` for an annotated quote, e.g. a shader stage.
    pub fn annotated_quote(&mut self, annotation: &str, body: Expr) -> Expr {
        self.node(ExprKind::Quote(QuoteExpr {
            annotation: Some(annotation.to_string()),
            snippet: false,
            body,
        }))
    }

    pub fn snippet_quote(&mut self, body: Expr) -> Expr {
        self.node(ExprKind::Quote(QuoteExpr {
            annotation: None,
            snippet: true,
            body,
        }))
    }

    pub fn escape(&mut self, kind: EscapeKind, body: Expr) -> Expr {
        self.node(ExprKind::Escape(EscapeExpr { kind, body }))
    }

    pub fn splice(&mut self, body: Expr) -> Expr {
        self.escape(EscapeKind::Splice, body)
    }

    pub fn persist(&mut self, body: Expr) -> Expr {
        self.escape(EscapeKind::Persist, body)
    }

    pub fn snippet(&mut self, body: Expr) -> Expr {
        self.escape(EscapeKind::Snippet, body)
    }

    pub fn run(&mut self, body: Expr) -> Expr {
        self.node(ExprKind::Run(RunExpr { body }))
    }

    pub fn fun(&mut self, params: &[(&str, Option<TypeAnnotation>)], body: Expr) -> Expr {
        let params = params
            .iter()
            .map(|(name, ty)| Param {
                id: self.ids.fresh(),
                name: name.to_string(),
                ty: ty.clone(),
            })
            .collect();
        self.node(ExprKind::Fun(FunExpr { params, body }))
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.node(ExprKind::Call(CallExpr { callee, args }))
    }

    pub fn extern_(&mut self, name: &str, ty: TypeAnnotation) -> Expr {
        self.node(ExprKind::Extern(ExternExpr {
            name: name.to_string(),
            ty,
        }))
    }
}

impl TypeAnnotation {
    pub fn named(name: &str) -> Self {
        TypeAnnotation::Named(name.to_string())
    }
}
