//! Per-primitive evaluation flags.

use std::ops::BitOr;

/// Flags describing how a primitive behaves under evaluation.
///
/// `PURE` primitives may be memoized; `SHALLOW` primitives only observe the
/// outermost constructor of their arguments, so the evaluator need not
/// force deeper structure before invoking them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrimFlags(u8);

impl PrimFlags {
    pub const PURE: PrimFlags = PrimFlags(1);
    pub const SHALLOW: PrimFlags = PrimFlags(2);

    pub fn empty() -> PrimFlags {
        PrimFlags(0)
    }

    pub fn contains(self, other: PrimFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PrimFlags {
    type Output = PrimFlags;

    fn bitor(self, rhs: PrimFlags) -> PrimFlags {
        PrimFlags(self.0 | rhs.0)
    }
}
