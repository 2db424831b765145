//! Resolution-phase errors.
//!
//! Unbound variable references are deliberately NOT reported here: the
//! resolver leaves them in place and the type pass reports them, where
//! better context is available. Everything the resolver itself can decide
//! -- cycles and pattern problems -- lives in this enum.

use std::fmt;

use wake_common::Location;

/// An error found while resolving scopes, compiling patterns, or
/// fracturing binding groups.
#[derive(Debug, Clone)]
pub enum ResolveError {
    /// A group of value definitions depends on itself without a lambda in
    /// the cycle to break the recursion.
    ValueCycle {
        members: Vec<(String, Location)>,
    },
    /// A match does not cover every constructor; `missing` is the most
    /// general uncovered pattern.
    NonExhaustiveMatch {
        location: Location,
        missing: String,
    },
    /// A pattern names a constructor that is not in scope.
    UnknownConstructor {
        name: String,
        location: Location,
    },
    /// A constructor pattern has the wrong number of sub-patterns.
    /// `name` is `None` for the anonymous multi-scrutinee case row.
    ConstructorArity {
        name: Option<String>,
        location: Location,
        given: usize,
        expected: usize,
    },
    /// A pattern's constructor belongs to a different sum than the one
    /// being dispatched at that position.
    ForeignConstructor {
        name: String,
        sum: String,
        location: Location,
    },
    /// A match arm can never be selected.
    UnreachablePattern {
        location: Location,
    },
}

impl ResolveError {
    /// The primary location of the error, for diagnostic ordering.
    pub fn location(&self) -> Option<Location> {
        match self {
            ResolveError::ValueCycle { members } => members.first().map(|(_, l)| *l),
            ResolveError::NonExhaustiveMatch { location, .. }
            | ResolveError::UnknownConstructor { location, .. }
            | ResolveError::ConstructorArity { location, .. }
            | ResolveError::ForeignConstructor { location, .. }
            | ResolveError::UnreachablePattern { location } => Some(*location),
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::ValueCycle { members } => {
                write!(f, "value definition cycle detected including:")?;
                for (name, _) in members {
                    write!(f, " {name}")?;
                }
                Ok(())
            }
            ResolveError::NonExhaustiveMatch { missing, .. } => {
                write!(f, "non-exhaustive match; missing: {missing}")
            }
            ResolveError::UnknownConstructor { name, .. } => {
                write!(f, "constructor `{name}` in pattern match not found")
            }
            ResolveError::ConstructorArity {
                name,
                given,
                expected,
                ..
            } => {
                match name {
                    Some(name) => write!(f, "constructor `{name}`")?,
                    None => write!(f, "case")?,
                }
                write!(
                    f,
                    " in pattern match has {given} parameters, but must have {expected}"
                )
            }
            ResolveError::ForeignConstructor { name, sum, .. } => {
                write!(f, "constructor `{name}` is not a member of `{sum}`")
            }
            ResolveError::UnreachablePattern { .. } => {
                write!(f, "pattern unreachable in match")
            }
        }
    }
}
