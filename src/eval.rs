//! Tree-walking interpreter for desugared Braid programs.
//!
//! A quote evaluates to a code value: its body with every escape at the
//! quote's own level already resolved. Splices inline other code values,
//! persist escapes capture a value into the code value's persist list and
//! leave an index in the tree. `run` evaluates a code value's tree with
//! those captured values.

use std::cell::RefCell;
use std::rc::Rc;

use braid_ast::{
    BinaryOp, Env, EscapeExpr, EscapeKind, Expr, ExprKind, Handlers, Identifier, Literal,
    PersistExpr, QuoteExpr, UnaryOp, VisitTable, rewrite_table,
};
use derive_more::{Display, Error};
use tracing::{debug, trace};

type HostFn = fn(&[Value]) -> Result<Value, EvalError>;

#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum EvalError {
    #[display("unbound variable {name}")]
    Unbound { name: Identifier },
    #[display("unknown extern {name}")]
    UnknownExtern { name: Identifier },
    #[display("expected {expected}, got {found}")]
    Unexpected { expected: &'static str, found: String },
    #[display("expected {expected} arguments, got {found}")]
    Arity { expected: usize, found: usize },
    #[display("division by zero")]
    DivisionByZero,
    #[display("escape outside of a quote")]
    EscapeOutsideQuote,
    #[display("persisted value {index} is missing")]
    MissingPersist { index: usize },
}

#[derive(Clone, Debug)]
pub struct Closure {
    pub params: Vec<Identifier>,
    pub body: Expr,
    env: EvalEnv,
    persist: Rc<Vec<Value>>,
}

/// A program fragment plus the values its persist references index into.
#[derive(Clone, Debug, PartialEq)]
pub struct Code {
    pub expr: Expr,
    pub persist: Vec<Value>,
}

#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
    Void,
    Fun(Rc<Closure>),
    Code(Rc<Code>),
    Host(&'static str, HostFn),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Void, Value::Void) => true,
            (Value::Fun(a), Value::Fun(b)) => Rc::ptr_eq(a, b),
            (Value::Code(a), Value::Code(b)) => a == b,
            (Value::Host(a, _), Value::Host(b, _)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Void => f.write_str("void"),
            Value::Fun(_) => f.write_str("(fun)"),
            Value::Code(code) => write!(f, "<{}>", code.expr),
            Value::Host(name, _) => write!(f, "<extern {name}>"),
        }
    }
}

impl Value {
    fn describe(&self) -> String {
        match self {
            Value::Int(_) => "an integer".to_string(),
            Value::Float(_) => "a float".to_string(),
            Value::String(_) => "a string".to_string(),
            Value::Void => "void".to_string(),
            Value::Fun(_) | Value::Host(..) => "a function".to_string(),
            Value::Code(_) => "code".to_string(),
        }
    }

    fn unexpected(&self, expected: &'static str) -> EvalError {
        EvalError::Unexpected {
            expected,
            found: self.describe(),
        }
    }
}

type Slot = Rc<RefCell<Value>>;
type EvalEnv = Env<Slot>;

/// Externs a program may declare.
const HOST_EXTERNS: &[(&str, HostFn)] = &[("print", host::print), ("pow", host::pow)];

/// Names visible without a declaration.
const INTRINSICS: &[(&str, HostFn)] = &[("float", host::to_float), ("int", host::to_int)];

/// Evaluate a program whose cross-stage references are all explicit.
pub fn interpret(tree: &Expr) -> Result<Value, EvalError> {
    debug!("interpreting tree rooted at {}", tree.id);
    let (value, _) = eval(tree, &EvalEnv::new(), &Rc::new(Vec::new()))?;
    Ok(value)
}

fn eval(expr: &Expr, env: &EvalEnv, persist: &Rc<Vec<Value>>) -> Result<(Value, EvalEnv), EvalError> {
    let value = match &*expr.kind {
        ExprKind::Literal(Literal::Int(n)) => Value::Int(*n),
        ExprKind::Literal(Literal::Float(n)) => Value::Float(*n),
        ExprKind::Literal(Literal::String(s)) => Value::String(s.clone()),
        ExprKind::Seq(seq) => {
            let (_, env) = eval(&seq.lhs, env, persist)?;
            return eval(&seq.rhs, &env, persist);
        }
        ExprKind::Let(binding) => {
            let (value, _) = eval(&binding.value, env, persist)?;
            let slot = Rc::new(RefCell::new(value.clone()));
            return Ok((value, env.extend(binding.name.clone(), slot)));
        }
        ExprKind::Assign(assign) => {
            let (value, _) = eval(&assign.value, env, persist)?;
            let slot = env.lookup(&assign.name).ok_or_else(|| EvalError::Unbound {
                name: assign.name.clone(),
            })?;
            *slot.borrow_mut() = value.clone();
            value
        }
        ExprKind::Lookup(lookup) => lookup_value(env, &lookup.name)?,
        ExprKind::Unary(unary) => {
            let (operand, _) = eval(&unary.operand, env, persist)?;
            match (unary.op, operand) {
                (UnaryOp::Neg, Value::Int(n)) => Value::Int(n.wrapping_neg()),
                (UnaryOp::Neg, Value::Float(n)) => Value::Float(-n),
                (_, other) => return Err(other.unexpected("a number")),
            }
        }
        ExprKind::Binary(binary) => {
            let (lhs, env_after) = eval(&binary.lhs, env, persist)?;
            let (rhs, _) = eval(&binary.rhs, &env_after, persist)?;
            arithmetic(binary.op, lhs, rhs)?
        }
        ExprKind::Quote(quote) => Value::Code(Rc::new(build_code(&quote.body, env, persist)?)),
        ExprKind::Escape(_) => return Err(EvalError::EscapeOutsideQuote),
        ExprKind::Run(run) => {
            let (code, _) = eval(&run.body, env, persist)?;
            let code = match code {
                Value::Code(code) => code,
                other => return Err(other.unexpected("code")),
            };
            trace!("running {}", code.expr);
            let persist = Rc::new(code.persist.clone());
            eval(&code.expr, &EvalEnv::new(), &persist)?.0
        }
        ExprKind::Fun(fun) => Value::Fun(Rc::new(Closure {
            params: fun.params.iter().map(|param| param.name.clone()).collect(),
            body: fun.body.clone(),
            env: env.clone(),
            persist: persist.clone(),
        })),
        ExprKind::Call(call) => {
            let (callee, _) = eval(&call.callee, env, persist)?;
            let args = call
                .args
                .iter()
                .map(|arg| Ok(eval(arg, env, persist)?.0))
                .collect::<Result<Vec<_>, EvalError>>()?;
            apply(callee, args)?
        }
        ExprKind::Extern(decl) => {
            let (name, host) = HOST_EXTERNS
                .iter()
                .find(|(name, _)| *name == decl.name)
                .ok_or_else(|| EvalError::UnknownExtern {
                    name: decl.name.clone(),
                })?;
            let value = Value::Host(*name, *host);
            let slot = Rc::new(RefCell::new(value.clone()));
            return Ok((value, env.extend(decl.name.clone(), slot)));
        }
        ExprKind::Persist(PersistExpr { index }) => persist
            .get(*index)
            .cloned()
            .ok_or(EvalError::MissingPersist { index: *index })?,
    };
    Ok((value, env.clone()))
}

fn lookup_value(env: &EvalEnv, name: &str) -> Result<Value, EvalError> {
    if let Some(slot) = env.lookup(name) {
        return Ok(slot.borrow().clone());
    }
    INTRINSICS
        .iter()
        .find(|(intrinsic, _)| *intrinsic == name)
        .map(|(intrinsic, host)| Value::Host(*intrinsic, *host))
        .ok_or_else(|| EvalError::Unbound {
            name: name.to_string(),
        })
}

fn apply(callee: Value, args: Vec<Value>) -> Result<Value, EvalError> {
    match callee {
        Value::Fun(closure) => {
            if closure.params.len() != args.len() {
                return Err(EvalError::Arity {
                    expected: closure.params.len(),
                    found: args.len(),
                });
            }
            let bindings = closure
                .params
                .iter()
                .cloned()
                .zip(args.into_iter().map(|arg| Rc::new(RefCell::new(arg))));
            let env = closure.env.extend_all(bindings);
            Ok(eval(&closure.body, &env, &closure.persist)?.0)
        }
        Value::Host(_, host) => host(&args),
        other => Err(other.unexpected("a function")),
    }
}

fn arithmetic(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div if b == 0 => return Err(EvalError::DivisionByZero),
            BinaryOp::Div => a.wrapping_div(b),
        })),
        (lhs, rhs) => {
            let a = as_float(&lhs)?;
            let b = as_float(&rhs)?;
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
            }))
        }
    }
}

fn as_float(value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        other => Err(other.unexpected("a number")),
    }
}

/// Resolve the escapes that belong to a quote being evaluated.
///
/// The parameter is the number of quotes between the node and the quote
/// being built; escapes at depth 0 are evaluated now.
fn build_code(body: &Expr, env: &EvalEnv, persist: &Rc<Vec<Value>>) -> Result<Code, EvalError> {
    let captured = RefCell::new(Vec::new());

    let base: VisitTable<'_, u32, Result<Expr, EvalError>> = rewrite_table(|_, _| None);
    let overrides = Handlers::<u32, Result<Expr, EvalError>>::new()
        .quote(|table, expr, quote, depth| {
            let body = table.visit(&quote.body, depth + 1)?;
            Ok(Expr::new(
                expr.id,
                expr.span,
                ExprKind::Quote(QuoteExpr {
                    annotation: quote.annotation.clone(),
                    snippet: quote.snippet,
                    body,
                }),
            ))
        })
        .escape(|table, expr, escape, depth| {
            if depth > 0 {
                let body = table.visit(&escape.body, depth - 1)?;
                return Ok(Expr::new(
                    expr.id,
                    expr.span,
                    ExprKind::Escape(EscapeExpr {
                        kind: escape.kind,
                        body,
                    }),
                ));
            }
            let (value, _) = eval(&escape.body, env, persist)?;
            let mut captured = captured.borrow_mut();
            match escape.kind {
                EscapeKind::Persist => {
                    let index = captured.len();
                    captured.push(value);
                    Ok(Expr::new(
                        expr.id,
                        expr.span,
                        ExprKind::Persist(PersistExpr { index }),
                    ))
                }
                EscapeKind::Splice | EscapeKind::Snippet => {
                    let code = match value {
                        Value::Code(code) => code,
                        other => return Err(other.unexpected("code")),
                    };
                    let offset = captured.len();
                    captured.extend(code.persist.iter().cloned());
                    Ok(shift_persist(&code.expr, offset))
                }
            }
        });

    let expr = VisitTable::compose(&base, &overrides).visit(body, 0);
    // The escape handler borrows `captured`.
    drop(overrides);
    drop(base);
    let expr = expr?;
    Ok(Code {
        expr,
        persist: captured.into_inner(),
    })
}

/// Renumber persist references after their values moved in a persist list.
fn shift_persist(expr: &Expr, offset: usize) -> Expr {
    if offset == 0 {
        return expr.clone();
    }
    let table = rewrite_table::<(), std::convert::Infallible>(|expr, _| match &*expr.kind {
        ExprKind::Persist(PersistExpr { index }) => Some(Expr::new(
            expr.id,
            expr.span,
            ExprKind::Persist(PersistExpr {
                index: index + offset,
            }),
        )),
        _ => None,
    });
    match table.visit(expr, ()) {
        Ok(expr) => expr,
        Err(never) => match never {},
    }
}

mod host {
    use super::{EvalError, Value};

    pub fn print(args: &[Value]) -> Result<Value, EvalError> {
        for arg in args {
            match arg {
                Value::String(s) => println!("{s}"),
                other => println!("{other}"),
            }
        }
        Ok(Value::Void)
    }

    pub fn pow(args: &[Value]) -> Result<Value, EvalError> {
        let [base, exponent] = args else {
            return Err(EvalError::Arity {
                expected: 2,
                found: args.len(),
            });
        };
        Ok(Value::Float(
            super::as_float(base)?.powf(super::as_float(exponent)?),
        ))
    }

    pub fn to_float(args: &[Value]) -> Result<Value, EvalError> {
        match args {
            [Value::Int(n)] => Ok(Value::Float(*n as f64)),
            [other] => Err(other.unexpected("an integer")),
            _ => Err(EvalError::Arity {
                expected: 1,
                found: args.len(),
            }),
        }
    }

    pub fn to_int(args: &[Value]) -> Result<Value, EvalError> {
        match args {
            [Value::Float(n)] => Ok(Value::Int(*n as i64)),
            [other] => Err(other.unexpected("a float")),
            _ => Err(EvalError::Arity {
                expected: 1,
                found: args.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_ast::AstBuilder;

    #[test]
    fn test_splice_builds_code() {
        // var x = <5>; < 37 + [x] >
        let mut b = AstBuilder::new();
        let five = b.int(5);
        let quoted = b.quote(five);
        let let_x = b.let_("x", quoted);
        let thirty_seven = b.int(37);
        let x = b.lookup("x");
        let splice = b.splice(x);
        let sum = b.binary(BinaryOp::Add, thirty_seven, splice);
        let quote = b.quote(sum);
        let program = b.seq(let_x, quote.clone());

        let value = interpret(&program).unwrap();
        assert_eq!(value.to_string(), "<37 + 5>");

        let run = b.run(quote);
        let let_x = {
            let five = b.int(5);
            let quoted = b.quote(five);
            b.let_("x", quoted)
        };
        let program = b.seq(let_x, run);
        assert_eq!(interpret(&program), Ok(Value::Int(42)));
    }

    #[test]
    fn test_persist_captures_value() {
        // var x = 2; < 37 + %[x] >
        let mut b = AstBuilder::new();
        let two = b.int(2);
        let let_x = b.let_("x", two);
        let thirty_seven = b.int(37);
        let x = b.lookup("x");
        let persist = b.persist(x);
        let sum = b.binary(BinaryOp::Add, thirty_seven, persist);
        let quote = b.quote(sum);
        let program = b.seq(let_x, quote);

        let Value::Code(code) = interpret(&program).unwrap() else {
            panic!("expected code");
        };
        assert_eq!(code.expr.to_string(), "37 + %0");
        assert_eq!(code.persist, vec![Value::Int(2)]);
    }

    #[test]
    fn test_spliced_persists_are_renumbered() {
        // var a = 1; var b = 2; var c = <%[b]>; !< %[a] + [c] >
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let let_a = b.let_("a", one);
        let two = b.int(2);
        let let_b = b.let_("b", two);
        let b_ref = b.lookup("b");
        let persist_b = b.persist(b_ref);
        let code_c = b.quote(persist_b);
        let let_c = b.let_("c", code_c);
        let a_ref = b.lookup("a");
        let persist_a = b.persist(a_ref);
        let c_ref = b.lookup("c");
        let splice_c = b.splice(c_ref);
        let sum = b.binary(BinaryOp::Sub, persist_a, splice_c);
        let quote = b.quote(sum);
        let run = b.run(quote);
        let program = b.block(let_a, vec![let_b, let_c, run]);

        assert_eq!(interpret(&program), Ok(Value::Int(-1)));
    }

    #[test]
    fn test_closures_and_assignment() {
        // var n = 1; var bump = fun k -> n = n + k; bump(41); n
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let let_n = b.let_("n", one);
        let n = b.lookup("n");
        let k = b.lookup("k");
        let sum = b.binary(BinaryOp::Add, n, k);
        let assign = b.assign("n", sum);
        let fun = b.fun(&[("k", None)], assign);
        let let_bump = b.let_("bump", fun);
        let bump = b.lookup("bump");
        let forty_one = b.int(41);
        let call = b.call(bump, vec![forty_one]);
        let n = b.lookup("n");
        let program = b.block(let_n, vec![let_bump, call, n]);

        assert_eq!(interpret(&program), Ok(Value::Int(42)));
    }

    #[test]
    fn test_runtime_errors() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let zero = b.int(0);
        let quotient = b.binary(BinaryOp::Div, one, zero);
        assert_eq!(interpret(&quotient), Err(EvalError::DivisionByZero));

        let decl = b.extern_("launch", braid_ast::TypeAnnotation::named("Int"));
        assert_eq!(
            interpret(&decl),
            Err(EvalError::UnknownExtern {
                name: "launch".to_string()
            })
        );

        let callee = b.lookup("float");
        let three = b.int(3);
        let call = b.call(callee, vec![three]);
        assert_eq!(interpret(&call), Ok(Value::Float(3.0)));
    }

    #[test]
    fn test_integer_overflow_wraps() {
        let mut b = AstBuilder::new();
        let min = b.int(i64::MIN);
        let negated = b.neg(min);
        assert_eq!(interpret(&negated), Ok(Value::Int(i64::MIN)));

        let min = b.int(i64::MIN);
        let minus_one = b.int(-1);
        let quotient = b.binary(BinaryOp::Div, min, minus_one);
        assert_eq!(interpret(&quotient), Ok(Value::Int(i64::MIN)));

        let seven = b.int(7);
        let minus_two = b.int(-2);
        let quotient = b.binary(BinaryOp::Div, seven, minus_two);
        assert_eq!(interpret(&quotient), Ok(Value::Int(-3)));
    }
}
