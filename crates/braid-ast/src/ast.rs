//! Syntax tree types.
//!
//! Trees are immutable once built. Passes that transform a tree build new
//! nodes; rebuilt nodes keep their `NodeId` so side tables stay valid, and
//! nodes a pass introduces get fresh IDs from the unit's `NodeIdGen`.

use braid_core::{CompileError, Identifier, NodeId, NodeIdGen, Span};
use serde::{Deserialize, Serialize};

/// A parsed compilation unit: the root expression plus the allocator that
/// owns every ID in it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    pub root: Expr,
    pub ids: NodeIdGen,
}

impl Ast {
    /// Wrap a tree whose IDs were assigned elsewhere (e.g. by the parser).
    ///
    /// Fails if a node uses the largest representable ID, since the unit
    /// could then not allocate fresh ones.
    pub fn new(root: Expr) -> Result<Self, CompileError> {
        let mut ids = NodeIdGen::new();
        let mut full = None;
        root.walk(&mut |expr| {
            let mut reserve = |id: NodeId| {
                if !ids.reserve(id) {
                    full = Some(id);
                }
            };
            reserve(expr.id);
            if let ExprKind::Fun(fun) = &*expr.kind {
                for param in &fun.params {
                    reserve(param.id);
                }
            }
        });
        if let Some(id) = full {
            return Err(CompileError::Parse {
                location: format!("node {id}"),
                message: "node id leaves no room for fresh ids".to_string(),
            });
        }
        Ok(Self { root, ids })
    }

    /// Load a tree from its JSON form.
    pub fn from_json(text: &str) -> Result<Self, CompileError> {
        let root: Expr = serde_json::from_str(text).map_err(|err| CompileError::Parse {
            location: format!("{},{}", err.line(), err.column()),
            message: err.to_string(),
        })?;
        Self::new(root)
    }

    pub fn to_json(&self) -> String {
        // Expr holds nothing serde_json can refuse.
        serde_json::to_string_pretty(&self.root).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub kind: Box<ExprKind>,
}

impl Expr {
    pub fn new(id: NodeId, span: Span, kind: ExprKind) -> Self {
        Self {
            id,
            span,
            kind: Box::new(kind),
        }
    }

    pub fn tag(&self) -> NodeTag {
        self.kind.tag()
    }

    /// Visit every node of the tree in pre-order.
    pub fn walk(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Find the node with the given ID.
    pub fn find(&self, id: NodeId) -> Option<&Expr> {
        if self.id == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|child| child.find(id))
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match &*self.kind {
            ExprKind::Literal(_)
            | ExprKind::Lookup(_)
            | ExprKind::Extern(_)
            | ExprKind::Persist(_) => vec![],
            ExprKind::Seq(seq) => vec![&seq.lhs, &seq.rhs],
            ExprKind::Let(binding) => vec![&binding.value],
            ExprKind::Assign(assign) => vec![&assign.value],
            ExprKind::Unary(unary) => vec![&unary.operand],
            ExprKind::Binary(binary) => vec![&binary.lhs, &binary.rhs],
            ExprKind::Quote(quote) => vec![&quote.body],
            ExprKind::Escape(escape) => vec![&escape.body],
            ExprKind::Run(run) => vec![&run.body],
            ExprKind::Fun(fun) => vec![&fun.body],
            ExprKind::Call(call) => std::iter::once(&call.callee).chain(&call.args).collect(),
        }
    }

    /// Rebuild this node with every direct child replaced by `f(child)`.
    ///
    /// The node keeps its ID and span.
    pub fn map_children(&self, mut f: impl FnMut(&Expr) -> Expr) -> Expr {
        let result: Result<Expr, std::convert::Infallible> = self.try_map_children(|e| Ok(f(e)));
        match result {
            Ok(expr) => expr,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`Expr::map_children`].
    pub fn try_map_children<E>(
        &self,
        mut f: impl FnMut(&Expr) -> Result<Expr, E>,
    ) -> Result<Expr, E> {
        let kind = match &*self.kind {
            ExprKind::Literal(_)
            | ExprKind::Lookup(_)
            | ExprKind::Extern(_)
            | ExprKind::Persist(_) => (*self.kind).clone(),
            ExprKind::Seq(seq) => ExprKind::Seq(SeqExpr {
                lhs: f(&seq.lhs)?,
                rhs: f(&seq.rhs)?,
            }),
            ExprKind::Let(binding) => ExprKind::Let(LetExpr {
                name: binding.name.clone(),
                value: f(&binding.value)?,
            }),
            ExprKind::Assign(assign) => ExprKind::Assign(AssignExpr {
                name: assign.name.clone(),
                value: f(&assign.value)?,
            }),
            ExprKind::Unary(unary) => ExprKind::Unary(UnaryExpr {
                op: unary.op,
                operand: f(&unary.operand)?,
            }),
            ExprKind::Binary(binary) => ExprKind::Binary(BinaryExpr {
                op: binary.op,
                lhs: f(&binary.lhs)?,
                rhs: f(&binary.rhs)?,
            }),
            ExprKind::Quote(quote) => ExprKind::Quote(QuoteExpr {
                annotation: quote.annotation.clone(),
                snippet: quote.snippet,
                body: f(&quote.body)?,
            }),
            ExprKind::Escape(escape) => ExprKind::Escape(EscapeExpr {
                kind: escape.kind,
                body: f(&escape.body)?,
            }),
            ExprKind::Run(run) => ExprKind::Run(RunExpr { body: f(&run.body)? }),
            ExprKind::Fun(fun) => ExprKind::Fun(FunExpr {
                params: fun.params.clone(),
                body: f(&fun.body)?,
            }),
            ExprKind::Call(call) => ExprKind::Call(CallExpr {
                callee: f(&call.callee)?,
                args: call.args.iter().map(&mut f).collect::<Result<_, _>>()?,
            }),
        };
        Ok(Expr::new(self.id, self.span, kind))
    }
}

/// Discriminant of [`ExprKind`], used to key visitor tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeTag {
    Literal,
    Seq,
    Let,
    Assign,
    Lookup,
    Unary,
    Binary,
    Quote,
    Escape,
    Run,
    Fun,
    Call,
    Extern,
    Persist,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum ExprKind {
    Literal(Literal),
    Seq(SeqExpr),
    Let(LetExpr),
    Assign(AssignExpr),
    Lookup(LookupExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Quote(QuoteExpr),
    Escape(EscapeExpr),
    Run(RunExpr),
    Fun(FunExpr),
    Call(CallExpr),
    Extern(ExternExpr),
    /// Reference to a value captured by a persist escape when a code value
    /// was built. Only the evaluator produces these.
    Persist(PersistExpr),
}

impl ExprKind {
    pub fn tag(&self) -> NodeTag {
        match self {
            ExprKind::Literal(_) => NodeTag::Literal,
            ExprKind::Seq(_) => NodeTag::Seq,
            ExprKind::Let(_) => NodeTag::Let,
            ExprKind::Assign(_) => NodeTag::Assign,
            ExprKind::Lookup(_) => NodeTag::Lookup,
            ExprKind::Unary(_) => NodeTag::Unary,
            ExprKind::Binary(_) => NodeTag::Binary,
            ExprKind::Quote(_) => NodeTag::Quote,
            ExprKind::Escape(_) => NodeTag::Escape,
            ExprKind::Run(_) => NodeTag::Run,
            ExprKind::Fun(_) => NodeTag::Fun,
            ExprKind::Call(_) => NodeTag::Call,
            ExprKind::Extern(_) => NodeTag::Extern,
            ExprKind::Persist(_) => NodeTag::Persist,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeqExpr {
    pub lhs: Expr,
    pub rhs: Expr,
}

/// `var name = value`; the binding is visible to the rest of the sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LetExpr {
    pub name: Identifier,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignExpr {
    pub name: Identifier,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LookupExpr {
    pub name: Identifier,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Expr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub lhs: Expr,
    pub rhs: Expr,
}

/// `<body>`, optionally annotated (`s<...>`); snippet quotes are candidates
/// for snippet escapes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteExpr {
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub snippet: bool,
    pub body: Expr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeKind {
    /// `[e]`: splice a code value into the enclosing quote.
    Splice,
    /// `%[e]`: capture a value from the enclosing stage.
    Persist,
    /// `$[x]`: a hole filled by one of the snippet quotes bound to `x`.
    Snippet,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscapeExpr {
    pub kind: EscapeKind,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunExpr {
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub id: NodeId,
    pub name: Identifier,
    #[serde(default)]
    pub ty: Option<TypeAnnotation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunExpr {
    pub params: Vec<Param>,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub callee: Expr,
    pub args: Vec<Expr>,
}

/// `extern name: Type`: a host-provided value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternExpr {
    pub name: Identifier,
    pub ty: TypeAnnotation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistExpr {
    pub index: usize,
}

/// Type syntax as written in annotations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeAnnotation {
    Named(Identifier),
    Code(Box<TypeAnnotation>),
    Fun {
        params: Vec<TypeAnnotation>,
        ret: Box<TypeAnnotation>,
    },
}
