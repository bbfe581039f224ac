//! Staged intermediate representation for Braid.
//!
//! [`build_ir`] splits a desugared, elaborated tree into fragments along
//! quote boundaries and procedures for stage-0 code; [`presplice`]
//! resolves snippet escapes into concrete fragment variants.
pub mod build;
pub mod ir;
pub mod variants;

pub use build::build_ir;
pub use ir::{CompilerIr, DefUse, Proc, ProcTable, Prog, ProgEscape, ProgId, ProgTable};
pub use variants::{Variant, VariantTable, cross_product, get_variants, presplice, substitute};
