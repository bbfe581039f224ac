//! Braid: a multi-stage language compiler core.
//!
//! The stages live in the workspace crates; this crate ties them together
//! behind a salsa database and provides the interpreter and CLI.
pub mod database;
pub mod eval;
pub mod pipeline;

pub use database::{BraidDatabaseImpl, LoadError, SourceProgram};
pub use eval::{EvalError, Value, interpret};
