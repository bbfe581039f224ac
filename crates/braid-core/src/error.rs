//! Errors raised by the staged compiler.
//!
//! Every stage is fail-fast: the first error aborts the compilation unit, so
//! each error names the node it was raised at instead of being collected.

use derive_more::{Display, Error};

use crate::{CompilationPhase, NodeId};

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum CompileError {
    /// Reported by the external parser; forwarded as-is.
    #[display("parse error at {location}: {message}")]
    Parse { location: String, message: String },

    #[display("type error: undefined variable {name}")]
    UndefinedVariable { node: NodeId, name: String },

    #[display("type error: {message}")]
    TypeMismatch { node: NodeId, message: String },

    #[display("type error: {message}")]
    StageMismatch { node: NodeId, message: String },

    #[display("type error: top-level escape")]
    TopLevelEscape { node: NodeId },

    #[display("type error: escape produced non-code value")]
    NonCodeEscape { node: NodeId },

    #[display("type error: running a non-code type")]
    NonCodeRun { node: NodeId },

    #[display("type error: unknown type {name}")]
    UnknownType { node: NodeId, name: String },

    #[display("staging error: {name} is referenced at a stage below its binding")]
    DownwardCrossStageReference { node: NodeId, name: String },

    #[display("snippet error: no quote can fill snippet escape {escape}")]
    UnresolvedSnippet { escape: NodeId },

    #[display("snippet error: {message}")]
    InvalidSnippetEscape { node: NodeId, message: String },
}

impl CompileError {
    pub fn type_mismatch(node: NodeId, message: impl std::fmt::Display) -> Self {
        CompileError::TypeMismatch {
            node,
            message: message.to_string(),
        }
    }

    pub fn stage_mismatch(node: NodeId, message: impl std::fmt::Display) -> Self {
        CompileError::StageMismatch {
            node,
            message: message.to_string(),
        }
    }

    pub fn invalid_snippet(node: NodeId, message: impl std::fmt::Display) -> Self {
        CompileError::InvalidSnippetEscape {
            node,
            message: message.to_string(),
        }
    }

    /// The node the error was raised at, if it has one.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            CompileError::Parse { .. } => None,
            CompileError::UndefinedVariable { node, .. }
            | CompileError::TypeMismatch { node, .. }
            | CompileError::StageMismatch { node, .. }
            | CompileError::TopLevelEscape { node }
            | CompileError::NonCodeEscape { node }
            | CompileError::NonCodeRun { node }
            | CompileError::UnknownType { node, .. }
            | CompileError::DownwardCrossStageReference { node, .. }
            | CompileError::InvalidSnippetEscape { node, .. } => Some(*node),
            CompileError::UnresolvedSnippet { escape } => Some(*escape),
        }
    }

    pub fn phase(&self) -> CompilationPhase {
        match self {
            CompileError::Parse { .. } => CompilationPhase::Parsing,
            CompileError::DownwardCrossStageReference { .. } => CompilationPhase::Desugaring,
            CompileError::InvalidSnippetEscape { .. } => CompilationPhase::IrBuilding,
            CompileError::UnresolvedSnippet { .. } => CompilationPhase::VariantGeneration,
            _ => CompilationPhase::TypeChecking,
        }
    }
}
