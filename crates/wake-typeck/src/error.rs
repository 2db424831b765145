//! Type errors with the context that produced each constraint.
//!
//! Mismatches always carry both sides pre-rendered ("has type X but is
//! used as Y"): the union-find evolves after the failure, so the types are
//! formatted at the moment the conflict is found.

use std::fmt;

use wake_common::Location;

/// Where a failed unification came from. Selects the two-sided message
/// template the diagnostics renderer uses.
#[derive(Debug, Clone)]
pub enum ErrorContext {
    /// The function position of an application must have function type.
    Function { location: Location },
    /// An argument's type must match the function's parameter type.
    /// `param` is the parameter name, when one is known, for the message.
    Argument {
        function: Location,
        argument: Location,
        param: Option<String>,
    },
    /// A function body's type must match its declared result slot; the
    /// usual culprit is a recursive call.
    RecursiveReturn { location: Location },
    /// Any other same-expression constraint.
    Expression { location: Location },
}

impl ErrorContext {
    pub fn location(&self) -> Location {
        match self {
            ErrorContext::Function { location }
            | ErrorContext::RecursiveReturn { location }
            | ErrorContext::Expression { location } => *location,
            ErrorContext::Argument { argument, .. } => *argument,
        }
    }
}

/// An error found during type inference.
#[derive(Debug, Clone)]
pub enum TypeError {
    /// A variable reference did not resolve in any enclosing scope.
    Unbound { name: String, location: Location },
    /// A primitive invocation names no registered primitive.
    UnknownPrimitive { name: String, location: Location },
    /// A primitive was used at a type its registration rejects.
    PrimitiveSignature { name: String, location: Location },
    /// Two types that must be equal are not.
    Mismatch {
        context: ErrorContext,
        has_type: String,
        used_as: String,
    },
    /// Unification would build a type containing itself.
    InfiniteType {
        context: ErrorContext,
        has_type: String,
        used_as: String,
    },
}

impl TypeError {
    pub fn location(&self) -> Location {
        match self {
            TypeError::Unbound { location, .. }
            | TypeError::UnknownPrimitive { location, .. }
            | TypeError::PrimitiveSignature { location, .. } => *location,
            TypeError::Mismatch { context, .. } | TypeError::InfiniteType { context, .. } => {
                context.location()
            }
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Unbound { name, .. } => {
                write!(f, "variable reference `{name}` is unbound")
            }
            TypeError::UnknownPrimitive { name, .. } => {
                write!(f, "primitive reference `{name}` is unbound")
            }
            TypeError::PrimitiveSignature { name, .. } => {
                write!(f, "primitive reference `{name}` has wrong type signature")
            }
            TypeError::Mismatch {
                context,
                has_type,
                used_as,
            } => match context {
                ErrorContext::Function { .. } => write!(
                    f,
                    "type error; expression has type `{has_type}` but is used as a function of type `{used_as}`"
                ),
                ErrorContext::Argument { param, .. } => {
                    write!(f, "type error; function expected argument")?;
                    if let Some(param) = param {
                        write!(f, " `{param}`")?;
                    }
                    write!(
                        f,
                        " of type `{has_type}` but was supplied an argument of type `{used_as}`"
                    )
                }
                ErrorContext::RecursiveReturn { .. } => write!(
                    f,
                    "type error; recursive use requires return type `{has_type}` but the function body returns `{used_as}`"
                ),
                ErrorContext::Expression { .. } => write!(
                    f,
                    "type error; expression has type `{has_type}` but is used as `{used_as}`"
                ),
            },
            TypeError::InfiniteType {
                has_type, used_as, ..
            } => write!(
                f,
                "type error; unifying `{has_type}` with `{used_as}` would build an infinite type"
            ),
        }
    }
}
