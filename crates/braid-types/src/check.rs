//! The staged type checker.
//!
//! `check(node, env, level) -> (type, env')`, where `level` counts the
//! quotes enclosing the node. Quote and escape shift the environment and
//! the result in opposite directions, so `<[e]>` and `[<e>]` check like `e`.

use braid_ast::{
    BinaryExpr, BinaryOp, EscapeKind, Expr, Handlers, Literal, VisitTable,
};
use braid_core::{CompileError, CompileResult, NodeId};

use crate::builtins::{Builtins, Mode};
use crate::types::{Binding, Type, TypeEnv, TypeKind, shift_env};

/// The environment and quote level a node is checked under.
#[derive(Clone, Debug)]
pub struct Ctx {
    pub env: TypeEnv,
    pub level: u32,
}

impl Ctx {
    pub fn top_level() -> Self {
        Self {
            env: TypeEnv::new(),
            level: 0,
        }
    }

    fn with_env(&self, env: TypeEnv) -> Self {
        Self {
            env,
            level: self.level,
        }
    }
}

pub type Checked = (Type, TypeEnv);
pub type CheckResult = CompileResult<Checked>;
pub type CheckTable<'a> = VisitTable<'a, Ctx, CheckResult>;

/// The checker for `builtins`' mode: the base rules, with the shader
/// arithmetic rules composed on top in shader mode.
pub fn checker(builtins: &Builtins) -> CheckTable<'_> {
    let base = VisitTable::new(base_rules(builtins), |_, expr, _| {
        Err(CompileError::type_mismatch(
            expr.id,
            format!("{:?} node cannot appear in a checked program", expr.tag()),
        ))
    });
    match builtins.mode {
        Mode::General => base,
        Mode::Shader => VisitTable::compose(&base, &shader_rules()),
    }
}

/// Check a whole program from the top level.
pub fn typecheck(tree: &Expr, builtins: &Builtins) -> CompileResult<Type> {
    let (ty, _) = checker(builtins).visit(tree, Ctx::top_level())?;
    Ok(ty)
}

fn base_rules(builtins: &Builtins) -> Handlers<'_, Ctx, CheckResult> {
    Handlers::<Ctx, CheckResult>::new()
        .literal(|_, _, literal, ctx| {
            let ty = match literal {
                Literal::Int(_) => Type::int(),
                Literal::Float(_) => Type::float(),
                Literal::String(_) => Type::string(),
            };
            Ok((ty, ctx.env))
        })
        .seq(|table, _, seq, ctx| {
            let (_, env) = table.visit(&seq.lhs, ctx.clone())?;
            table.visit(&seq.rhs, ctx.with_env(env))
        })
        .let_(|table, _, binding, ctx| {
            let (ty, env) = table.visit(&binding.value, ctx.clone())?;
            let env = env.extend(
                binding.name.clone(),
                Binding {
                    ty: ty.clone(),
                    level: ctx.level,
                },
            );
            Ok((ty, env))
        })
        .assign(move |table, expr, assign, ctx| {
            let (ty, env) = table.visit(&assign.value, ctx.clone())?;
            let target = match ctx.env.lookup(&assign.name) {
                Some(binding) if binding.level != ctx.level => {
                    return Err(CompileError::stage_mismatch(
                        expr.id,
                        format!("cannot assign to {} from another stage", assign.name),
                    ));
                }
                Some(binding) => binding.ty.clone(),
                None => match builtins.intrinsics.get(&assign.name) {
                    Some(ty) => ty.clone(),
                    None => {
                        return Err(CompileError::UndefinedVariable {
                            node: expr.id,
                            name: assign.name.clone(),
                        });
                    }
                },
            };
            if target != ty {
                return Err(CompileError::type_mismatch(
                    expr.id,
                    format!("cannot assign {ty} to {} of type {target}", assign.name),
                ));
            }
            Ok((ty, env))
        })
        .lookup(move |_, expr, lookup, ctx| {
            let ty = resolve_name(builtins, &ctx, &lookup.name, expr.id)?;
            Ok((ty, ctx.env))
        })
        .unary(|table, expr, unary, ctx| {
            let (ty, _) = table.visit(&unary.operand, ctx.clone())?;
            if ty.stage != 0 {
                return Err(CompileError::stage_mismatch(
                    expr.id,
                    "unary operation on wrong stage",
                ));
            }
            if !ty.is_numeric() {
                return Err(CompileError::type_mismatch(
                    expr.id,
                    "unary operation on non-number",
                ));
            }
            Ok((ty, ctx.env))
        })
        .binary(|table, expr, binary, ctx| {
            let (lhs, rhs) = check_operands(table, binary, &ctx)?;
            Ok((numeric_binary(expr.id, &lhs, &rhs)?, ctx.env))
        })
        .quote(|table, _, quote, ctx| {
            // Move the context "up" before checking inside the quote, then
            // move the result back "down".
            let inner = Ctx {
                env: shift_env(&ctx.env, -1),
                level: ctx.level + 1,
            };
            let (ty, _) = table.visit(&quote.body, inner)?;
            Ok((ty.shifted(1), ctx.env))
        })
        .escape(|table, expr, escape, ctx| {
            if ctx.level == 0 {
                return Err(CompileError::TopLevelEscape { node: expr.id });
            }
            let inner = Ctx {
                env: shift_env(&ctx.env, 1),
                level: ctx.level - 1,
            };
            let (ty, _) = table.visit(&escape.body, inner)?;
            match escape.kind {
                // A persisted value keeps its type on the other side.
                EscapeKind::Persist => Ok((ty, ctx.env)),
                EscapeKind::Splice | EscapeKind::Snippet => {
                    if ty.stage < 1 {
                        return Err(CompileError::NonCodeEscape { node: expr.id });
                    }
                    Ok((ty.shifted(-1), ctx.env))
                }
            }
        })
        .run(|table, expr, run, ctx| {
            let (ty, env) = table.visit(&run.body, ctx)?;
            if ty.stage > 0 {
                Ok((ty.shifted(-1), env))
            } else {
                Err(CompileError::NonCodeRun { node: expr.id })
            }
        })
        .fun(move |table, expr, fun, ctx| {
            let mut params = Vec::with_capacity(fun.params.len());
            for param in &fun.params {
                // Unannotated parameters are integers.
                let ty = match &param.ty {
                    Some(annotation) => builtins.resolve(annotation, expr.id)?,
                    None => Type::int(),
                };
                params.push((param.name.clone(), ty));
            }
            let body_env = ctx.env.extend_all(params.iter().map(|(name, ty)| {
                (
                    name.clone(),
                    Binding {
                        ty: ty.clone(),
                        level: ctx.level,
                    },
                )
            }));
            let (ret, _) = table.visit(&fun.body, ctx.with_env(body_env))?;
            let params = params.into_iter().map(|(_, ty)| ty).collect();
            Ok((Type::fun(params, ret), ctx.env))
        })
        .call(|table, expr, call, ctx| {
            let (callee, _) = table.visit(&call.callee, ctx.clone())?;
            let mut args = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                args.push(table.visit(arg, ctx.clone())?.0);
            }
            if callee.stage != 0 {
                return Err(CompileError::stage_mismatch(
                    expr.id,
                    "call to a function on the wrong stage",
                ));
            }
            let TypeKind::Fun { params, ret } = &callee.kind else {
                return Err(CompileError::type_mismatch(
                    expr.id,
                    format!("call to non-function {callee}"),
                ));
            };
            if params.len() != args.len() {
                return Err(CompileError::type_mismatch(
                    expr.id,
                    format!("expected {} arguments, got {}", params.len(), args.len()),
                ));
            }
            for (param, arg) in params.iter().zip(&args) {
                if param != arg {
                    return Err(CompileError::type_mismatch(
                        expr.id,
                        format!("expected argument of type {param}, got {arg}"),
                    ));
                }
            }
            Ok(((**ret).clone(), ctx.env))
        })
        .extern_(move |_, expr, decl, ctx| {
            let ty = builtins.resolve(&decl.ty, expr.id)?;
            let env = ctx.env.extend(
                decl.name.clone(),
                Binding {
                    ty: ty.clone(),
                    level: ctx.level,
                },
            );
            Ok((ty, env))
        })
}

/// Shader arithmetic: vectors and matrices combine component-wise, a
/// matrix transforms a vector of matching width, and a scalar scales
/// either. Everything else falls back to the numeric rule.
fn shader_rules<'a>() -> Handlers<'a, Ctx, CheckResult> {
    Handlers::<Ctx, CheckResult>::new().binary(|table, expr, binary, ctx| {
        let (lhs, rhs) = check_operands(table, binary, &ctx)?;
        if lhs.is_numeric() && rhs.is_numeric() {
            return Ok((numeric_binary(expr.id, &lhs, &rhs)?, ctx.env));
        }
        if lhs.stage != 0 || rhs.stage != 0 {
            return Err(CompileError::stage_mismatch(
                expr.id,
                "binary operation on wrong stage",
            ));
        }
        let ty = match (&lhs.kind, &rhs.kind) {
            (TypeKind::Prim(a), TypeKind::Prim(b)) if a == b => lhs.clone(),
            (TypeKind::Prim(m), TypeKind::Prim(v))
                if binary.op == BinaryOp::Mul
                    && matrix_width(m).is_some()
                    && matrix_width(m) == vector_width(v) =>
            {
                rhs.clone()
            }
            (TypeKind::Float, TypeKind::Prim(_)) if binary.op == BinaryOp::Mul => rhs.clone(),
            (TypeKind::Prim(_), TypeKind::Float)
                if matches!(binary.op, BinaryOp::Mul | BinaryOp::Div) =>
            {
                lhs.clone()
            }
            _ => {
                return Err(CompileError::type_mismatch(
                    expr.id,
                    format!("invalid operands to {}: {lhs} and {rhs}", binary.op.symbol()),
                ));
            }
        };
        Ok((ty, ctx.env))
    })
}

fn matrix_width(name: &str) -> Option<u8> {
    match name {
        "Mat3" => Some(3),
        "Mat4" => Some(4),
        _ => None,
    }
}

fn vector_width(name: &str) -> Option<u8> {
    match name {
        "Float3" => Some(3),
        "Float4" => Some(4),
        _ => None,
    }
}

fn check_operands(
    table: &CheckTable<'_>,
    binary: &BinaryExpr,
    ctx: &Ctx,
) -> CompileResult<(Type, Type)> {
    let (lhs, env) = table.visit(&binary.lhs, ctx.clone())?;
    let (rhs, _) = table.visit(&binary.rhs, ctx.with_env(env))?;
    Ok((lhs, rhs))
}

fn numeric_binary(node: NodeId, lhs: &Type, rhs: &Type) -> CompileResult<Type> {
    if lhs.stage != 0 || rhs.stage != 0 {
        return Err(CompileError::stage_mismatch(
            node,
            "binary operation on wrong stage",
        ));
    }
    match (&lhs.kind, &rhs.kind) {
        (TypeKind::Int, TypeKind::Int) => Ok(Type::int()),
        _ if lhs.is_numeric() && rhs.is_numeric() => Ok(Type::float()),
        _ => Err(CompileError::type_mismatch(
            node,
            "binary operation on non-numbers",
        )),
    }
}

/// Resolve a name at the current level. A name bound at a lower level is an
/// implicit cross-stage reference and has the type it was bound with.
fn resolve_name(builtins: &Builtins, ctx: &Ctx, name: &str, node: NodeId) -> CompileResult<Type> {
    if let Some(binding) = ctx.env.lookup(name) {
        if binding.level < ctx.level {
            return Ok(binding.ty.shifted((ctx.level - binding.level) as i32));
        }
        return Ok(binding.ty.clone());
    }
    builtins
        .intrinsics
        .get(name)
        .cloned()
        .ok_or_else(|| CompileError::UndefinedVariable {
            node,
            name: name.to_string(),
        })
}
