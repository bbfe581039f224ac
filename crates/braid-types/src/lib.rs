//! Staged type checking for Braid.
//!
//! The checker enforces the stage discipline for quote, escape and run;
//! the elaborator records a type for every node; the desugarer turns
//! implicit cross-stage references into explicit persist escapes.
pub mod builtins;
pub mod check;
pub mod desugar;
pub mod elaborate;
pub mod types;

pub use builtins::{Builtins, Mode};
pub use check::{CheckResult, CheckTable, Checked, Ctx, checker, typecheck};
pub use desugar::desugar_cross_stage;
pub use elaborate::{Elaboration, TypeTable, elaborate};
pub use types::{Binding, Type, TypeEnv, TypeKind, shift_env};
