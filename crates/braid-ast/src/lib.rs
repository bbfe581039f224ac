//! Syntax trees for Braid programs and the passes' shared plumbing.
pub mod ast;
pub mod builder;
pub mod env;
mod pretty;
pub mod visit;

pub use ast::*;
pub use braid_core::{Identifier, NodeId, NodeIdGen, Span};
pub use builder::AstBuilder;
pub use env::Env;
pub use visit::{Handlers, VisitTable, rewrite_table};
