//! The wake expression tree and its supporting registries.
//!
//! The parser hands the frontend a [`expr::Top`] node: one definition map
//! per source file plus a global-name table. The resolver and type pass
//! rewrite that tree in place until only the evaluator-facing node kinds
//! remain (`VarRef`, `App`, `Lambda`, `Literal`, `Prim`, `Construct`,
//! `Destruct`, `DefBinding`).
//!
//! - [`expr`]: the tagged expression node and tree printing
//! - [`pat`]: surface match patterns
//! - [`sum`]: algebraic sum declarations and the interned registry
//! - [`prim`]: per-primitive flags

pub mod expr;
pub mod pat;
pub mod prim;
pub mod sum;

pub use expr::{
    App, Construct, DefBinding, DefMap, DefValue, Destruct, Expr, ExprFlags, Lambda, LitValue,
    Literal, Match, MatchArm, OrderSlot, Prim, PrimResolved, PubDef, RefKind, Subscribe, Top,
    VarBinding, VarRef,
};
pub use pat::Pattern;
pub use prim::PrimFlags;
pub use sum::{Constructor, Sum, SumId, SumRegistry, TypeSkeleton};
