//! Type variables and bound type terms.
//!
//! Every type is a union-find variable. A variable is either unbound
//! (carrying a generation stamp, its "date of birth") or bound to a
//! [`TyTerm`]: a constructor name applied to child variables. Function
//! types are ordinary two-argument terms named [`FN`], matching how the
//! language names its operators.
//!
//! The `ena` crate supplies the union-find mechanics; [`TyVar`] is its key.

use std::fmt;

/// The type constructor of function types: `argument => result`.
pub const FN: &str = "binary =>";

/// A type variable, identified by an index into the unification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TyVar(pub u32);

/// A bound type: constructor name plus one child variable per argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TyTerm {
    pub con: String,
    pub args: Vec<TyVar>,
}

impl TyTerm {
    pub fn new(con: impl Into<String>, args: Vec<TyVar>) -> Self {
        TyTerm {
            con: con.into(),
            args,
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl fmt::Display for TyTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.con, self.args.len())
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<TyTerm>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for TyTerm {}
