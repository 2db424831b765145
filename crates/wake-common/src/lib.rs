//! Shared foundation types for the wake compiler frontend.
//!
//! Everything here is consumed by at least two downstream crates:
//!
//! - [`span`]: byte-offset spans and on-demand line/column lookup
//! - [`source`]: interned file identities and source locations
//! - [`hash`]: the keyed 128-bit content hash used for memoization keys

pub mod hash;
pub mod source;
pub mod span;

pub use hash::Hash128;
pub use source::{FileId, Location, SourceMap};
pub use span::{LineIndex, Span};
