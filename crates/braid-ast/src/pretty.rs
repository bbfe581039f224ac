//! Surface-syntax rendering of trees, for diagnostics and the CLI.

use std::fmt::{self, Display, Formatter};

use crate::ast::*;

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            ExprKind::Literal(Literal::Int(value)) => write!(f, "{value}"),
            ExprKind::Literal(Literal::Float(value)) => write!(f, "{value:?}"),
            ExprKind::Literal(Literal::String(value)) => write!(f, "{value:?}"),
            ExprKind::Seq(seq) => write!(f, "{}; {}", seq.lhs, seq.rhs),
            ExprKind::Let(binding) => write!(f, "var {} = {}", binding.name, binding.value),
            ExprKind::Assign(assign) => write!(f, "{} = {}", assign.name, assign.value),
            ExprKind::Lookup(lookup) => f.write_str(&lookup.name),
            ExprKind::Unary(unary) => {
                f.write_str("-")?;
                operand(f, &unary.operand)
            }
            ExprKind::Binary(binary) => {
                operand(f, &binary.lhs)?;
                write!(f, " {} ", binary.op.symbol())?;
                operand(f, &binary.rhs)
            }
            ExprKind::Quote(quote) => {
                if quote.snippet {
                    f.write_str("$")?;
                }
                if let Some(annotation) = &quote.annotation {
                    f.write_str(annotation)?;
                }
                write!(f, "<{}>", quote.body)
            }
            ExprKind::Escape(escape) => {
                let sigil = match escape.kind {
                    EscapeKind::Splice => "",
                    EscapeKind::Persist => "%",
                    EscapeKind::Snippet => "$",
                };
                write!(f, "{sigil}[{}]", escape.body)
            }
            ExprKind::Run(run) => {
                f.write_str("!")?;
                operand(f, &run.body)
            }
            ExprKind::Fun(fun) => {
                f.write_str("fun")?;
                for param in &fun.params {
                    match &param.ty {
                        Some(ty) => write!(f, " {}:{ty}", param.name)?,
                        None => write!(f, " {}", param.name)?,
                    }
                }
                write!(f, " -> {}", fun.body)
            }
            ExprKind::Call(call) => {
                operand(f, &call.callee)?;
                f.write_str("(")?;
                for (index, arg) in call.args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            ExprKind::Extern(decl) => write!(f, "extern {}: {}", decl.name, decl.ty),
            ExprKind::Persist(persist) => write!(f, "%{}", persist.index),
        }
    }
}

/// Parenthesize compound operands.
fn operand(f: &mut Formatter<'_>, expr: &Expr) -> fmt::Result {
    match &*expr.kind {
        ExprKind::Seq(_)
        | ExprKind::Let(_)
        | ExprKind::Assign(_)
        | ExprKind::Binary(_)
        | ExprKind::Fun(_)
        | ExprKind::Extern(_) => write!(f, "({expr})"),
        _ => write!(f, "{expr}"),
    }
}

impl Display for TypeAnnotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeAnnotation::Named(name) => f.write_str(name),
            TypeAnnotation::Code(inner) => write!(f, "<{inner}>"),
            TypeAnnotation::Fun { params, ret } => {
                f.write_str("(")?;
                for param in params {
                    write!(f, "{param} ")?;
                }
                write!(f, "-> {ret})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AstBuilder;

    #[test]
    fn test_render_staged_program() {
        let mut b = AstBuilder::new();
        let five = b.int(5);
        let quoted = b.quote(five);
        let let_x = b.let_("x", quoted);
        let thirty_seven = b.int(37);
        let x = b.lookup("x");
        let splice = b.splice(x);
        let sum = b.binary(BinaryOp::Add, thirty_seven, splice);
        let quote = b.quote(sum);
        let run = b.run(quote);
        let program = b.seq(let_x, run);
        assert_eq!(program.to_string(), "var x = <5>; !<37 + [x]>");
    }

    #[test]
    fn test_render_functions_and_escapes() {
        let mut b = AstBuilder::new();
        let n = b.lookup("n");
        let half = b.float(0.5);
        let product = b.binary(BinaryOp::Mul, n, half);
        let one = b.int(1);
        let sum = b.binary(BinaryOp::Add, product, one);
        let fun = b.fun(&[("n", Some(TypeAnnotation::named("Float")))], sum);
        assert_eq!(fun.to_string(), "fun n:Float -> (n * 0.5) + 1");

        let y = b.lookup("y");
        let persist = b.persist(y);
        let s = b.lookup("s");
        let hole = b.snippet(s);
        let sum = b.binary(BinaryOp::Sub, persist, hole);
        let snippet = b.snippet_quote(sum);
        assert_eq!(snippet.to_string(), "$<%[y] - $[s]>");
    }
}
