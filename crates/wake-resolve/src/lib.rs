//! Scope resolution for the wake frontend.
//!
//! This crate turns the parser's [`wake_ast::expr::Top`] tree into a single
//! rooted expression with no surface constructs left:
//!
//! - [`scope`]: the resolve-frame stack, qualified-name lookup, and
//!   publish/subscribe lowering
//! - [`pattern`]: compilation of match expressions into destructor dispatch
//! - [`fracture`]: dependency leveling and SCC clustering of definition
//!   maps into `DefBinding` stacks
//!
//! Variable references that fail to resolve are left untouched; the type
//! pass reports them with better context. Every other problem the resolver
//! can detect is collected into [`ResolveError`]s, and any recorded error
//! makes the result's root `None` -- no partial tree escapes.

mod fracture;
mod pattern;
mod scope;

pub mod error;

pub use error::ResolveError;
pub use scope::{resolve, ResolveResult};
