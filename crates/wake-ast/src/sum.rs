//! Algebraic sum declarations and the interned sum registry.
//!
//! Sums are declared once (by the parser, from `data` syntax) and borrowed
//! everywhere else through dense [`SumId`] handles. Constructor argument
//! types are stored as [`TypeSkeleton`]s: small type-expression trees whose
//! identifiers refer to the sum's type parameters.

use rustc_hash::FxHashMap;
use wake_common::Location;

use crate::expr::{Construct, Destruct, Expr};

/// A unique identifier for a declared sum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SumId(pub u32);

/// A type-expression skeleton for one constructor argument.
///
/// `name` is either one of the owning sum's type parameters or a type
/// constructor name; `args` are its arguments. `tag` optionally names the
/// field for diagnostics.
#[derive(Debug, Clone)]
pub struct TypeSkeleton {
    pub name: String,
    pub args: Vec<TypeSkeleton>,
    pub tag: Option<String>,
}

impl TypeSkeleton {
    pub fn leaf(name: impl Into<String>) -> TypeSkeleton {
        TypeSkeleton {
            name: name.into(),
            args: Vec::new(),
            tag: None,
        }
    }

    pub fn apply(name: impl Into<String>, args: Vec<TypeSkeleton>) -> TypeSkeleton {
        TypeSkeleton {
            name: name.into(),
            args,
            tag: None,
        }
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> TypeSkeleton {
        self.tag = Some(tag.into());
        self
    }
}

/// One constructor of a sum, with positional argument skeletons.
#[derive(Debug, Clone)]
pub struct Constructor {
    pub name: String,
    pub args: Vec<TypeSkeleton>,
}

impl Constructor {
    pub fn new(name: impl Into<String>, args: Vec<TypeSkeleton>) -> Constructor {
        Constructor {
            name: name.into(),
            args,
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// A declared sum type.
#[derive(Debug, Clone)]
pub struct Sum {
    pub name: String,
    pub params: Vec<String>,
    pub members: Vec<Constructor>,
    pub location: Location,
}

/// Registry of all declared sums, interned with dense ids.
#[derive(Default)]
pub struct SumRegistry {
    sums: Vec<Sum>,
    by_name: FxHashMap<String, SumId>,
}

impl SumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the sums the lowering passes rely on:
    /// `Boolean` for guard dispatch and `List` for publish chains, plus
    /// `Option` because nearly every embedder wants it.
    pub fn standard(location: Location) -> Self {
        let mut reg = Self::new();
        reg.define(Sum {
            name: "Boolean".into(),
            params: vec![],
            members: vec![
                Constructor::new("True", vec![]),
                Constructor::new("False", vec![]),
            ],
            location,
        });
        reg.define(Sum {
            name: "Option".into(),
            params: vec!["a".into()],
            members: vec![
                Constructor::new("None", vec![]),
                Constructor::new("Some", vec![TypeSkeleton::leaf("a")]),
            ],
            location,
        });
        reg.define(Sum {
            name: "List".into(),
            params: vec!["a".into()],
            members: vec![
                Constructor::new("Nil", vec![]),
                Constructor::new(
                    "Cons",
                    vec![
                        TypeSkeleton::leaf("a").tagged("head"),
                        TypeSkeleton::apply("List", vec![TypeSkeleton::leaf("a")]).tagged("tail"),
                    ],
                ),
            ],
            location,
        });
        reg
    }

    /// Intern a sum declaration. Redeclaring a name returns the original id.
    pub fn define(&mut self, sum: Sum) -> SumId {
        if let Some(&id) = self.by_name.get(&sum.name) {
            return id;
        }
        let id = SumId(self.sums.len() as u32);
        self.by_name.insert(sum.name.clone(), id);
        self.sums.push(sum);
        id
    }

    pub fn get(&self, id: SumId) -> &Sum {
        &self.sums[id.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<SumId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    // ── Synthesized definitions ─────────────────────────────────────────
    //
    // The parser turns every `data` declaration into ordinary global
    // definitions: one per constructor, plus the sum's destructor. The
    // helpers below produce those definitions for embedders and tests.

    /// `(name, expr)` pairs for each constructor of a sum: a lambda chain
    /// over the constructor's arguments whose innermost body is the
    /// `Construct` node.
    pub fn constructor_defs(&self, id: SumId) -> Vec<(String, Expr)> {
        let sum = self.get(id);
        let loc = sum.location;
        sum.members
            .iter()
            .enumerate()
            .map(|(c, member)| {
                let mut body = Expr::Construct(Construct {
                    location: loc,
                    sum: id,
                    cons: c,
                });
                for i in (0..member.arity()).rev() {
                    body = Expr::lambda(loc, format!("_ a{i}"), body);
                }
                (member.name.clone(), body)
            })
            .collect()
    }

    /// The destructor definition `destruct <Sum>`: one handler lambda per
    /// constructor, then the scrutinee lambda, around the `Destruct` node.
    pub fn destructor_def(&self, id: SumId) -> (String, Expr) {
        let sum = self.get(id);
        let loc = sum.location;
        let mut body = Expr::Destruct(Destruct { location: loc, sum: id });
        body = Expr::lambda(loc, "_ x", body);
        for c in (0..sum.members.len()).rev() {
            body = Expr::lambda(loc, format!("_ c{c}"), body);
        }
        (format!("destruct {}", sum.name), body)
    }
}
