//! Surface match patterns.
//!
//! Patterns arrive from the parser as plain trees; the pattern compiler in
//! the resolver lowers them into destructor dispatch. Variable binders and
//! wildcards both match everything; only constructors refine.

use wake_common::Location;

/// A pattern as written in a match arm.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// `_` -- matches anything, binds nothing.
    Wildcard { location: Location },
    /// A lowercase name -- matches anything and binds it.
    Bind { name: String, location: Location },
    /// A constructor applied to sub-patterns.
    Constructor {
        name: String,
        args: Vec<Pattern>,
        location: Location,
    },
}

impl Pattern {
    pub fn wildcard(location: Location) -> Pattern {
        Pattern::Wildcard { location }
    }

    pub fn bind(name: impl Into<String>, location: Location) -> Pattern {
        Pattern::Bind {
            name: name.into(),
            location,
        }
    }

    pub fn cons(name: impl Into<String>, args: Vec<Pattern>, location: Location) -> Pattern {
        Pattern::Constructor {
            name: name.into(),
            args,
            location,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            Pattern::Wildcard { location }
            | Pattern::Bind { location, .. }
            | Pattern::Constructor { location, .. } => *location,
        }
    }
}
