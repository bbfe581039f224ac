//! Dispatch tables over syntax nodes.
//!
//! A [`VisitTable`] holds one handler per node variant plus a fallback for
//! variants without one. Handlers receive the table they were dispatched
//! from, so a pass recurses through whatever table it was composed into.
//! Specialized passes extend a generic one with [`VisitTable::compose`]: a
//! handler in the overrides entirely replaces the base handler for that
//! variant and leaves every other variant alone.

use std::rc::Rc;

use crate::ast::*;

type Handler<'a, T, P, R> = Rc<dyn Fn(&VisitTable<'a, P, R>, &Expr, &T, P) -> R + 'a>;
type Fallback<'a, P, R> = Rc<dyn Fn(&VisitTable<'a, P, R>, &Expr, P) -> R + 'a>;
type Observer<'a, R> = Rc<dyn Fn(&Expr, &R) + 'a>;

macro_rules! handlers {
    ($($field:ident: $variant:ident($payload:ty)),* $(,)?) => {
        /// A partial set of per-variant handlers.
        pub struct Handlers<'a, P, R> {
            $($field: Option<Handler<'a, $payload, P, R>>,)*
        }

        impl<P, R> Default for Handlers<'_, P, R> {
            fn default() -> Self {
                Self { $($field: None,)* }
            }
        }

        impl<P, R> Clone for Handlers<'_, P, R> {
            fn clone(&self) -> Self {
                Self { $($field: self.$field.clone(),)* }
            }
        }

        impl<'a, P, R> Handlers<'a, P, R> {
            $(
                pub fn $field(
                    mut self,
                    handler: impl Fn(&VisitTable<'a, P, R>, &Expr, &$payload, P) -> R + 'a,
                ) -> Self {
                    self.$field = Some(Rc::new(handler));
                    self
                }
            )*

            pub fn handles(&self, tag: NodeTag) -> bool {
                match tag {
                    $(NodeTag::$variant => self.$field.is_some(),)*
                }
            }

            fn over(&self, base: &Self) -> Self {
                Self {
                    $($field: self.$field.clone().or_else(|| base.$field.clone()),)*
                }
            }
        }

        impl<P, R> VisitTable<'_, P, R> {
            /// Invoke the handler for `expr`'s variant.
            pub fn visit(&self, expr: &Expr, param: P) -> R {
                let result = match &*expr.kind {
                    $(ExprKind::$variant(payload) => match &self.handlers.$field {
                        Some(handler) => handler(self, expr, payload, param),
                        None => (self.fallback)(self, expr, param),
                    },)*
                };
                for observer in &self.observers {
                    observer(expr, &result);
                }
                result
            }
        }
    };
}

handlers! {
    literal: Literal(Literal),
    seq: Seq(SeqExpr),
    let_: Let(LetExpr),
    assign: Assign(AssignExpr),
    lookup: Lookup(LookupExpr),
    unary: Unary(UnaryExpr),
    binary: Binary(BinaryExpr),
    quote: Quote(QuoteExpr),
    escape: Escape(EscapeExpr),
    run: Run(RunExpr),
    fun: Fun(FunExpr),
    call: Call(CallExpr),
    extern_: Extern(ExternExpr),
    persist: Persist(PersistExpr),
}

impl<'a, P, R> Handlers<'a, P, R> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A complete dispatch table: explicit handlers plus a fallback.
pub struct VisitTable<'a, P, R> {
    handlers: Handlers<'a, P, R>,
    fallback: Fallback<'a, P, R>,
    observers: Vec<Observer<'a, R>>,
}

impl<'a, P, R> VisitTable<'a, P, R> {
    pub fn new(
        handlers: Handlers<'a, P, R>,
        fallback: impl Fn(&VisitTable<'a, P, R>, &Expr, P) -> R + 'a,
    ) -> Self {
        Self {
            handlers,
            fallback: Rc::new(fallback),
            observers: Vec::new(),
        }
    }

    /// A table using `overrides`' handler for each variant it covers and
    /// `base`'s handler (or fallback) for everything else.
    pub fn compose(base: &Self, overrides: &Handlers<'a, P, R>) -> Self {
        Self {
            handlers: overrides.over(&base.handlers),
            fallback: base.fallback.clone(),
            observers: base.observers.clone(),
        }
    }

    /// Call `observer` with every node this table dispatches and the
    /// handler's result, including nodes reached through recursion.
    pub fn inspect(mut self, observer: impl Fn(&Expr, &R) + 'a) -> Self {
        self.observers.push(Rc::new(observer));
        self
    }

    /// Whether `tag` has an explicit handler (rather than the fallback).
    pub fn handles(&self, tag: NodeTag) -> bool {
        self.handlers.handles(tag)
    }
}

/// The generic rewrite: a table that structurally copies a tree.
///
/// `replace` sees every node before it is rebuilt; returning `Some` swaps
/// the whole subtree, returning `None` rebuilds the node from its children
/// (rewritten through the same table). Compose overrides on top to
/// transform particular variants.
pub fn rewrite_table<'a, P, E>(
    replace: impl Fn(&Expr, &P) -> Option<Expr> + 'a,
) -> VisitTable<'a, P, Result<Expr, E>>
where
    P: Clone + 'a,
    E: 'a,
{
    VisitTable::new(Handlers::new(), move |table, expr, param: P| {
        if let Some(replacement) = replace(expr, &param) {
            return Ok(replacement);
        }
        expr.try_map_children(|child| table.visit(child, param.clone()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AstBuilder;

    fn count_table<'a>() -> VisitTable<'a, (), usize> {
        VisitTable::new(Handlers::new(), |table, expr, ()| {
            1 + expr
                .children()
                .into_iter()
                .map(|child| table.visit(child, ()))
                .sum::<usize>()
        })
    }

    #[test]
    fn test_dispatch_picks_variant_handler() {
        let table: VisitTable<'_, (), &'static str> = VisitTable::new(
            Handlers::new()
                .literal(|_, _, _, ()| "literal")
                .quote(|_, _, _, ()| "quote"),
            |_, _, ()| "other",
        );
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let x = b.lookup("x");
        assert_eq!(table.visit(&one, ()), "literal");
        assert_eq!(table.visit(&x, ()), "other");
        let quote = b.quote(one);
        assert_eq!(table.visit(&quote, ()), "quote");
    }

    #[test]
    fn test_compose_overrides_only_named_variants() {
        let base = count_table();
        // Literals count double; everything else keeps counting once.
        let extended = VisitTable::compose(&base, &Handlers::new().literal(|_, _, _, ()| 2));
        assert!(extended.handles(NodeTag::Literal));
        assert!(!extended.handles(NodeTag::Binary));

        let mut b = AstBuilder::new();
        let one = b.int(1);
        let two = b.int(2);
        let sum = b.binary(BinaryOp::Add, one, two);
        assert_eq!(base.visit(&sum, ()), 3);
        assert_eq!(extended.visit(&sum, ()), 5);
    }

    #[test]
    fn test_override_replaces_rather_than_merges() {
        let base = VisitTable::new(Handlers::new().literal(|_, _, _, ()| 1), |_, _, ()| 0);
        let first = VisitTable::compose(&base, &Handlers::new().literal(|_, _, _, ()| 10));
        let second = VisitTable::compose(&first, &Handlers::new().literal(|_, _, _, ()| 100));
        let mut b = AstBuilder::new();
        let one = b.int(1);
        assert_eq!(first.visit(&one, ()), 10);
        assert_eq!(second.visit(&one, ()), 100);
    }

    #[test]
    fn test_inspect_sees_every_node() {
        use std::cell::RefCell;

        let seen = RefCell::new(Vec::new());
        let table = count_table().inspect(|expr, count| seen.borrow_mut().push((expr.id, *count)));
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let one_id = one.id;
        let quote = b.quote(one);
        let quote_id = quote.id;
        assert_eq!(table.visit(&quote, ()), 2);
        drop(table);
        assert_eq!(seen.into_inner(), vec![(one_id, 1), (quote_id, 2)]);
    }

    #[test]
    fn test_rewrite_table_replaces_marked_subtree() {
        let mut b = AstBuilder::new();
        let x = b.lookup("x");
        let target = x.id;
        let one = b.int(1);
        let sum = b.binary(BinaryOp::Add, x, one);
        let seven = b.int(7);

        let table = rewrite_table::<(), ()>(move |expr, _| {
            (expr.id == target).then(|| seven.clone())
        });
        let rewritten = table.visit(&sum, ()).expect("infallible");
        let ExprKind::Binary(binary) = &*rewritten.kind else {
            panic!("expected binary, got {rewritten:?}");
        };
        assert_eq!(rewritten.id, sum.id);
        assert_eq!(*binary.lhs.kind, ExprKind::Literal(Literal::Int(7)));
    }
}
