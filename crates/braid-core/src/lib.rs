//! Braid compiler utilities shared by every stage.
pub mod diagnostic;
pub mod error;
pub mod node_id;

pub use diagnostic::{CompilationPhase, Diagnostic, DiagnosticSeverity};
pub use error::{CompileError, CompileResult};
pub use node_id::{NodeId, NodeIdGen};

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

pub type Identifier = String;
