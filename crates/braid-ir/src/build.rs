//! Building the IR from an elaborated tree.
//!
//! One pass over the tree partitions it into fragments (one per quote) and
//! procedures (the main program and every stage-0 function), resolving
//! names to definitions and recording each escape against the fragment it
//! escapes from. A second step links snippet escapes to the snippet quotes
//! that can fill them.

use std::collections::BTreeMap;

use braid_ast::{Env, EscapeKind, Expr, ExprKind, Identifier};
use braid_core::{CompileError, CompileResult, NodeId};
use braid_types::TypeTable;
use tracing::{debug, trace};

use crate::ir::{CompilerIr, DefUse, Proc, ProcTable, Prog, ProgEscape, ProgId, ProgTable};

/// Partition a desugared, elaborated tree into fragments and procedures.
///
/// Implicit cross-stage references must already be explicit persist
/// escapes; `type_table` is carried through for backends.
pub fn build_ir(tree: &Expr, type_table: &TypeTable) -> CompileResult<CompilerIr> {
    debug!("building IR for tree rooted at {}", tree.id);
    let mut builder = IrBuilder::new(tree);
    builder.walk(tree, Env::new())?;
    builder.link_snippets()?;
    builder.collect_escapes();

    let IrBuilder {
        defuse,
        progs,
        mut procs,
        ..
    } = builder;
    let main = procs
        .remove(&tree.id)
        .ok_or_else(|| CompileError::type_mismatch(tree.id, "main procedure went missing"))?;
    debug!("built {} fragments and {} procedures", progs.len(), procs.len());
    Ok(CompilerIr {
        type_table: type_table.clone(),
        defuse,
        progs,
        procs,
        main,
    })
}

/// The innermost unit of code a node belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Unit {
    Proc(NodeId),
    Prog(ProgId),
}

type Scope = Env<NodeId>;

struct IrBuilder {
    defuse: DefUse,
    def_units: BTreeMap<NodeId, Unit>,
    progs: ProgTable,
    /// Fragment IDs in the order their quotes were reached (parents first).
    prog_order: Vec<ProgId>,
    procs: ProcTable,
    frames: Vec<Unit>,
    /// `(definition, snippet quote)` for every snippet quote bound to or
    /// assigned to a variable.
    snippet_bindings: Vec<(NodeId, ProgId)>,
}

impl IrBuilder {
    fn new(tree: &Expr) -> Self {
        let mut procs = ProcTable::new();
        procs.insert(tree.id, Proc::new(tree.id, tree.clone(), Vec::new(), None));
        Self {
            defuse: DefUse::new(),
            def_units: BTreeMap::new(),
            progs: ProgTable::new(),
            prog_order: Vec::new(),
            procs,
            frames: vec![Unit::Proc(tree.id)],
            snippet_bindings: Vec::new(),
        }
    }

    fn current(&self) -> Unit {
        // The main procedure's frame is never popped.
        self.frames.last().copied().unwrap_or(Unit::Proc(NodeId::from_raw(0)))
    }

    fn innermost_prog(&self) -> Option<(usize, ProgId)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, unit)| match unit {
                Unit::Prog(id) => Some((index, *id)),
                Unit::Proc(_) => None,
            })
    }

    fn unit_lists(&mut self, unit: Unit) -> Option<(&mut Vec<NodeId>, &mut Vec<NodeId>)> {
        match unit {
            Unit::Proc(id) => self
                .procs
                .get_mut(&id)
                .map(|proc| (&mut proc.free, &mut proc.bound)),
            Unit::Prog(id) => self
                .progs
                .get_mut(&id)
                .map(|prog| (&mut prog.free, &mut prog.bound)),
        }
    }

    fn define(&mut self, def: NodeId) {
        let unit = self.current();
        self.def_units.insert(def, unit);
        if let Some((_, bound)) = self.unit_lists(unit) {
            bound.push(def);
        }
    }

    fn resolve(&mut self, use_id: NodeId, name: &str, scope: &Scope) -> Option<NodeId> {
        let def = *scope.lookup(name)?;
        self.defuse.insert(use_id, def);
        let unit = self.current();
        if self.def_units.get(&def) != Some(&unit) {
            if let Some((free, _)) = self.unit_lists(unit) {
                if !free.contains(&def) {
                    free.push(def);
                }
            }
        }
        Some(def)
    }

    fn walk(&mut self, expr: &Expr, scope: Scope) -> CompileResult<Scope> {
        match &*expr.kind {
            ExprKind::Literal(_) | ExprKind::Persist(_) => Ok(scope),
            ExprKind::Seq(seq) => {
                let scope = self.walk(&seq.lhs, scope)?;
                self.walk(&seq.rhs, scope)
            }
            ExprKind::Let(binding) => {
                self.walk(&binding.value, scope.clone())?;
                self.define(expr.id);
                if let Some(quote) = snippet_quote(&binding.value) {
                    self.snippet_bindings.push((expr.id, quote));
                }
                Ok(scope.extend(binding.name.clone(), expr.id))
            }
            ExprKind::Assign(assign) => {
                self.walk(&assign.value, scope.clone())?;
                let def = self.resolve(expr.id, &assign.name, &scope);
                if let (Some(def), Some(quote)) = (def, snippet_quote(&assign.value)) {
                    self.snippet_bindings.push((def, quote));
                }
                Ok(scope)
            }
            ExprKind::Lookup(lookup) => {
                self.resolve(expr.id, &lookup.name, &scope);
                Ok(scope)
            }
            ExprKind::Unary(unary) => {
                self.walk(&unary.operand, scope.clone())?;
                Ok(scope)
            }
            ExprKind::Binary(binary) => {
                let inner = self.walk(&binary.lhs, scope.clone())?;
                self.walk(&binary.rhs, inner)?;
                Ok(scope)
            }
            ExprKind::Call(call) => {
                self.walk(&call.callee, scope.clone())?;
                for arg in &call.args {
                    self.walk(arg, scope.clone())?;
                }
                Ok(scope)
            }
            ExprKind::Run(run) => self.walk(&run.body, scope),
            ExprKind::Extern(decl) => {
                self.define(expr.id);
                Ok(scope.extend(decl.name.clone(), expr.id))
            }
            ExprKind::Quote(quote) => {
                let parent = self.innermost_prog().map(|(_, id)| id);
                trace!("fragment {} (parent {parent:?})", expr.id);
                let prog = Prog::new(
                    expr.id,
                    quote.body.clone(),
                    quote.annotation.clone(),
                    quote.snippet,
                    parent,
                );
                self.progs.insert(expr.id, prog);
                self.prog_order.push(expr.id);
                match self.current() {
                    Unit::Proc(id) => {
                        if let Some(proc) = self.procs.get_mut(&id) {
                            proc.quotes.push(expr.id);
                        }
                    }
                    Unit::Prog(id) => {
                        if let Some(parent) = self.progs.get_mut(&id) {
                            parent.subprograms.push(expr.id);
                        }
                    }
                }

                self.frames.push(Unit::Prog(expr.id));
                let result = self.walk(&quote.body, scope.clone());
                self.frames.pop();
                result?;
                Ok(scope)
            }
            ExprKind::Escape(escape) => {
                let Some((index, owner)) = self.innermost_prog() else {
                    return Err(CompileError::TopLevelEscape { node: expr.id });
                };
                let record = ProgEscape {
                    id: expr.id,
                    body: escape.body.clone(),
                    prog: owner,
                };
                if let Some(prog) = self.progs.get_mut(&owner) {
                    match escape.kind {
                        EscapeKind::Persist => prog.owned_persist.push(record),
                        EscapeKind::Splice => prog.owned_splice.push(record),
                        EscapeKind::Snippet => prog.owned_snippet.push(record),
                    }
                }

                // The escaped expression runs one level out, in whatever
                // unit encloses the owning fragment.
                let inner = self.frames.split_off(index);
                let result = self.walk(&escape.body, scope.clone());
                self.frames.extend(inner);
                result?;
                Ok(scope)
            }
            ExprKind::Fun(fun) => {
                let params: Vec<(Identifier, NodeId)> = fun
                    .params
                    .iter()
                    .map(|param| (param.name.clone(), param.id))
                    .collect();
                let pushed = match self.current() {
                    Unit::Proc(parent) => {
                        let ids = params.iter().map(|(_, id)| *id).collect();
                        let proc = Proc::new(expr.id, fun.body.clone(), ids, Some(parent));
                        self.procs.insert(expr.id, proc);
                        if let Some(parent) = self.procs.get_mut(&parent) {
                            parent.children.push(expr.id);
                        }
                        self.frames.push(Unit::Proc(expr.id));
                        true
                    }
                    // Functions inside a quote stay part of the fragment.
                    Unit::Prog(_) => false,
                };
                for (_, id) in &params {
                    self.define(*id);
                }
                let result = self.walk(&fun.body, scope.extend_all(params));
                if pushed {
                    self.frames.pop();
                }
                result?;
                Ok(scope)
            }
        }
    }

    /// Point each snippet quote at the snippet escape it can fill.
    fn link_snippets(&mut self) -> CompileResult<()> {
        let escapes: Vec<ProgEscape> = self
            .progs
            .values()
            .flat_map(|prog| prog.owned_snippet.iter().cloned())
            .collect();
        for escape in escapes {
            let ExprKind::Lookup(lookup) = &*escape.body.kind else {
                return Err(CompileError::invalid_snippet(
                    escape.id,
                    "snippet escape must name a variable",
                ));
            };
            let Some(&def) = self.defuse.get(&escape.body.id) else {
                return Err(CompileError::invalid_snippet(
                    escape.id,
                    format!("{} is not a snippet variable", lookup.name),
                ));
            };
            for &(binding, quote) in &self.snippet_bindings {
                if binding != def {
                    continue;
                }
                let Some(prog) = self.progs.get_mut(&quote) else {
                    continue;
                };
                if let Some(other) = prog.snippet_escape {
                    return Err(CompileError::invalid_snippet(
                        quote,
                        format!("snippet quote already fills escape {other}"),
                    ));
                }
                trace!("fragment {quote} can fill snippet escape {}", escape.id);
                prog.snippet_escape = Some(escape.id);
            }
        }
        Ok(())
    }

    /// Fill `persist` and `splice` with each fragment's own escapes followed
    /// by those of its nested fragments.
    fn collect_escapes(&mut self) {
        for id in self.prog_order.iter().rev() {
            let Some(prog) = self.progs.get(id) else {
                continue;
            };
            let mut persist = prog.owned_persist.clone();
            let mut splice = prog.owned_splice.clone();
            for sub in &prog.subprograms {
                if let Some(sub) = self.progs.get(sub) {
                    persist.extend(sub.persist.iter().cloned());
                    splice.extend(sub.splice.iter().cloned());
                }
            }
            if let Some(prog) = self.progs.get_mut(id) {
                prog.persist = persist;
                prog.splice = splice;
            }
        }
    }
}

fn snippet_quote(expr: &Expr) -> Option<ProgId> {
    match &*expr.kind {
        ExprKind::Quote(quote) if quote.snippet => Some(expr.id),
        _ => None,
    }
}
