//! IR data structures.

use std::collections::BTreeMap;

use braid_ast::Expr;
use braid_core::NodeId;
use braid_types::TypeTable;

/// A fragment is identified by the ID of the quote that introduced it.
pub type ProgId = NodeId;

pub type ProgTable = BTreeMap<ProgId, Prog>;
pub type ProcTable = BTreeMap<NodeId, Proc>;

/// Maps each lookup and assignment to the `let`, parameter or `extern`
/// that defines its name. Intrinsics have no entry.
pub type DefUse = BTreeMap<NodeId, NodeId>;

/// An escape recorded against the fragment that currently owns it.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgEscape {
    pub id: NodeId,
    pub body: Expr,
    pub prog: ProgId,
}

/// One quoted fragment of code.
#[derive(Clone, Debug, PartialEq)]
pub struct Prog {
    pub id: ProgId,
    pub body: Expr,
    pub annotation: Option<String>,
    /// Whether the quote was written as a snippet quote.
    pub snippet: bool,
    /// The innermost quote containing this one.
    pub quote_parent: Option<ProgId>,

    /// Persist escapes in this fragment and every nested fragment.
    pub persist: Vec<ProgEscape>,
    /// Splice escapes in this fragment and every nested fragment.
    pub splice: Vec<ProgEscape>,
    pub owned_persist: Vec<ProgEscape>,
    pub owned_splice: Vec<ProgEscape>,
    pub owned_snippet: Vec<ProgEscape>,

    pub free: Vec<NodeId>,
    pub bound: Vec<NodeId>,

    /// Set when this is a snippet quote that can fill the snippet escape
    /// with this ID.
    pub snippet_escape: Option<NodeId>,
    pub subprograms: Vec<ProgId>,
}

impl Prog {
    pub(crate) fn new(
        id: ProgId,
        body: Expr,
        annotation: Option<String>,
        snippet: bool,
        quote_parent: Option<ProgId>,
    ) -> Self {
        Self {
            id,
            body,
            annotation,
            snippet,
            quote_parent,
            persist: Vec::new(),
            splice: Vec::new(),
            owned_persist: Vec::new(),
            owned_splice: Vec::new(),
            owned_snippet: Vec::new(),
            free: Vec::new(),
            bound: Vec::new(),
            snippet_escape: None,
            subprograms: Vec::new(),
        }
    }
}

/// A stage-0 unit of execution: the main program, or a function defined
/// outside every quote.
#[derive(Clone, Debug, PartialEq)]
pub struct Proc {
    pub id: NodeId,
    pub body: Expr,
    /// Parameter definition IDs; empty for the main program.
    pub params: Vec<NodeId>,
    pub free: Vec<NodeId>,
    pub bound: Vec<NodeId>,
    /// Fragments whose quote appears directly in this procedure.
    pub quotes: Vec<ProgId>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Proc {
    pub(crate) fn new(id: NodeId, body: Expr, params: Vec<NodeId>, parent: Option<NodeId>) -> Self {
        Self {
            id,
            body,
            params,
            free: Vec::new(),
            bound: Vec::new(),
            quotes: Vec::new(),
            parent,
            children: Vec::new(),
        }
    }
}

/// Everything a backend needs: types, fragments, procedures and def/use.
#[derive(Clone, Debug, PartialEq)]
pub struct CompilerIr {
    pub type_table: TypeTable,
    pub defuse: DefUse,
    pub progs: ProgTable,
    pub procs: ProcTable,
    pub main: Proc,
}

impl CompilerIr {
    /// Fragments that can fill some snippet escape.
    pub fn snippet_candidates(&self) -> impl Iterator<Item = &Prog> {
        self.progs.values().filter(|prog| prog.snippet_escape.is_some())
    }
}
