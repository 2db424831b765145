//! The tagged expression node.
//!
//! One enum covers the whole pipeline. `Match`, `Subscribe`, and `DefMap`
//! are surface syntax: the resolver eliminates all three. `DefBinding` only
//! exists after fracturing. The remaining kinds survive to the evaluator.
//!
//! Ownership is strictly tree-shaped: every child slot has exactly one
//! owner, and rewriting passes take nodes by value and hand back the
//! replacement.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;
use wake_common::{Hash128, Location};

use crate::pat::Pattern;
use crate::prim::PrimFlags;
use crate::sum::SumId;

/// Node flags carried through rewriting.
///
/// `SOURCE` marks a synthesized node that stands for syntax the user wrote
/// (a lowered subscribe or match), so downstream tooling can attribute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExprFlags(u8);

impl ExprFlags {
    pub const SOURCE: ExprFlags = ExprFlags(1);

    pub fn contains(self, other: ExprFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ExprFlags) {
        self.0 |= other.0;
    }
}

/// How a resolved reference addresses its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// A lambda parameter or a `val` slot of a `DefBinding`.
    Value,
    /// A `fun` slot of a `DefBinding`; `offset - val_len` indexes the
    /// owning binding's `fun` vector, which is the defining lambda.
    Function,
}

/// Post-resolution binding information on a variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarBinding {
    /// Number of lambda/def-binding frames between the use and its target.
    pub depth: u32,
    /// Slot within the target frame. Values occupy `0..val_len`, functions
    /// `val_len..val_len + fun_len`.
    pub offset: u32,
    /// Where the target definition was written.
    pub target: Location,
    pub kind: RefKind,
}

/// A variable reference. `binding` is populated by the type pass.
#[derive(Debug)]
pub struct VarRef {
    pub location: Location,
    pub name: String,
    pub binding: Option<VarBinding>,
    pub flags: ExprFlags,
}

/// Function application.
#[derive(Debug)]
pub struct App {
    pub location: Location,
    pub func: Box<Expr>,
    pub arg: Box<Expr>,
    pub flags: ExprFlags,
}

/// A single-parameter lambda.
#[derive(Debug)]
pub struct Lambda {
    pub location: Location,
    pub name: String,
    /// Where the parameter name was written, when it came from a pattern
    /// binder; diagnostics point references at this.
    pub token: Option<Location>,
    pub body: Box<Expr>,
}

/// Literal values and their monomorphic types.
#[derive(Debug, Clone, PartialEq)]
pub enum LitValue {
    Str(String),
    Int(i64),
    Double(f64),
}

impl LitValue {
    /// The name of the literal's type constructor.
    pub fn type_name(&self) -> &'static str {
        match self {
            LitValue::Str(_) => "String",
            LitValue::Int(_) => "Integer",
            LitValue::Double(_) => "Double",
        }
    }
}

#[derive(Debug)]
pub struct Literal {
    pub location: Location,
    pub value: LitValue,
}

/// Primitive metadata settled by the type pass.
#[derive(Debug, Clone, Copy)]
pub struct PrimResolved {
    pub flags: PrimFlags,
    /// Number of open enclosing lambdas at the primitive's position; the
    /// evaluator pulls that many arguments from the scope chain.
    pub arity: usize,
}

/// A named primitive invocation.
#[derive(Debug)]
pub struct Prim {
    pub location: Location,
    pub name: String,
    pub resolved: Option<PrimResolved>,
}

/// Constructor node for an algebraic sum. Its arguments are the parameters
/// of the enclosing lambda chain, innermost last.
#[derive(Debug)]
pub struct Construct {
    pub location: Location,
    pub sum: SumId,
    pub cons: usize,
}

/// Destructor dispatch node. The scrutinee is the parameter of the
/// innermost enclosing lambda; one handler lambda per constructor encloses
/// it further out.
#[derive(Debug)]
pub struct Destruct {
    pub location: Location,
    pub sum: SumId,
}

/// One arm of a surface match expression: one pattern per scrutinee.
#[derive(Debug)]
pub struct MatchArm {
    pub patterns: Vec<Pattern>,
    pub guard: Option<Expr>,
    pub body: Expr,
}

/// Surface match over one or more scrutinees. Eliminated by the pattern
/// compiler before type inference runs.
#[derive(Debug)]
pub struct Match {
    pub location: Location,
    pub args: Vec<Expr>,
    pub arms: Vec<MatchArm>,
}

/// Surface subscribe expression; rewritten to a `VarRef` by the resolver.
#[derive(Debug)]
pub struct Subscribe {
    pub location: Location,
    pub name: String,
}

/// A named definition inside a definition map.
#[derive(Debug)]
pub struct DefValue {
    pub location: Location,
    pub body: Expr,
}

/// One published expression for a public name.
#[derive(Debug)]
pub struct PubDef {
    pub location: Location,
    pub body: Expr,
}

/// Surface definition map: unordered name bindings plus per-file publish
/// declarations. Eliminated by the binding fracturer.
///
/// The map is kept name-sorted so definition indices are deterministic
/// across runs.
#[derive(Debug)]
pub struct DefMap {
    pub location: Location,
    pub map: BTreeMap<String, DefValue>,
    pub publishes: BTreeMap<String, Vec<PubDef>>,
    pub body: Box<Expr>,
    pub flags: ExprFlags,
}

/// Name-to-offset entry of a fractured binding.
#[derive(Debug, Clone)]
pub struct OrderSlot {
    pub location: Location,
    pub index: usize,
}

/// One fractured level of recursive bindings.
///
/// Offsets address `val` entries first, then `fun` entries. `scc` runs
/// parallel to `fun`: members of one strongly connected component carry
/// the same dense group id and occupy contiguous slots.
#[derive(Debug)]
pub struct DefBinding {
    pub location: Location,
    pub val: Vec<Expr>,
    pub fun: Vec<Lambda>,
    pub scc: Vec<u32>,
    pub order: FxHashMap<String, OrderSlot>,
    pub body: Box<Expr>,
    pub flags: ExprFlags,
}

impl DefBinding {
    pub fn new(location: Location, body: Expr) -> Self {
        DefBinding {
            location,
            val: Vec::new(),
            fun: Vec::new(),
            scc: Vec::new(),
            order: FxHashMap::default(),
            body: Box::new(body),
            flags: ExprFlags::default(),
        }
    }

    /// Look up a name bound at this level.
    pub fn slot(&self, name: &str) -> Option<&OrderSlot> {
        self.order.get(name)
    }

    /// Structural hash of this binding, used as the definition-site
    /// identity of runtime frames allocated for it.
    pub fn site_hash(&self) -> Hash128 {
        let mut words: Vec<u64> = Vec::new();
        for v in &self.val {
            v.site_hash().push_words(&mut words);
        }
        for f in &self.fun {
            f.body.site_hash().push_words(&mut words);
        }
        for &g in &self.scc {
            words.push(g as u64);
        }
        self.body.site_hash().push_words(&mut words);
        Hash128::keyed(8, &words)
    }
}

/// The root node: one definition map per file plus the global-name table
/// mapping each globally visible name to the file prefix that owns it.
#[derive(Debug)]
pub struct Top {
    pub location: Location,
    pub defmaps: Vec<DefMap>,
    pub globals: FxHashMap<String, u32>,
    pub body: Box<Expr>,
}

/// A wake expression.
#[derive(Debug)]
pub enum Expr {
    VarRef(VarRef),
    App(App),
    Lambda(Lambda),
    Literal(Literal),
    Prim(Prim),
    Construct(Construct),
    Destruct(Destruct),
    Match(Match),
    Subscribe(Subscribe),
    DefMap(DefMap),
    DefBinding(DefBinding),
    Top(Top),
}

impl Expr {
    // ── Builders ────────────────────────────────────────────────────────

    pub fn var(location: Location, name: impl Into<String>) -> Expr {
        Expr::VarRef(VarRef {
            location,
            name: name.into(),
            binding: None,
            flags: ExprFlags::default(),
        })
    }

    pub fn app(location: Location, func: Expr, arg: Expr) -> Expr {
        Expr::App(App {
            location,
            func: Box::new(func),
            arg: Box::new(arg),
            flags: ExprFlags::default(),
        })
    }

    pub fn lambda(location: Location, name: impl Into<String>, body: Expr) -> Expr {
        Expr::Lambda(Lambda {
            location,
            name: name.into(),
            token: None,
            body: Box::new(body),
        })
    }

    pub fn literal(location: Location, value: LitValue) -> Expr {
        Expr::Literal(Literal { location, value })
    }

    pub fn prim(location: Location, name: impl Into<String>) -> Expr {
        Expr::Prim(Prim {
            location,
            name: name.into(),
            resolved: None,
        })
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn location(&self) -> Location {
        match self {
            Expr::VarRef(e) => e.location,
            Expr::App(e) => e.location,
            Expr::Lambda(e) => e.location,
            Expr::Literal(e) => e.location,
            Expr::Prim(e) => e.location,
            Expr::Construct(e) => e.location,
            Expr::Destruct(e) => e.location,
            Expr::Match(e) => e.location,
            Expr::Subscribe(e) => e.location,
            Expr::DefMap(e) => e.location,
            Expr::DefBinding(e) => e.location,
            Expr::Top(e) => e.location,
        }
    }

    pub fn is_lambda(&self) -> bool {
        matches!(self, Expr::Lambda(_))
    }

    /// Mark a synthesized node as standing for user-written syntax, on the
    /// node kinds that track it.
    pub fn mark_source(&mut self) {
        match self {
            Expr::VarRef(e) => e.flags.insert(ExprFlags::SOURCE),
            Expr::App(e) => e.flags.insert(ExprFlags::SOURCE),
            Expr::DefMap(e) => e.flags.insert(ExprFlags::SOURCE),
            Expr::DefBinding(e) => e.flags.insert(ExprFlags::SOURCE),
            _ => {}
        }
    }

    pub fn is_marked_source(&self) -> bool {
        match self {
            Expr::VarRef(e) => e.flags.contains(ExprFlags::SOURCE),
            Expr::App(e) => e.flags.contains(ExprFlags::SOURCE),
            Expr::DefMap(e) => e.flags.contains(ExprFlags::SOURCE),
            Expr::DefBinding(e) => e.flags.contains(ExprFlags::SOURCE),
            _ => false,
        }
    }

    // ── Definition-site identity ────────────────────────────────────────

    /// Structural 128-bit hash of this expression, used as definition-site
    /// identity by the closure hasher. Resolved binding coordinates are
    /// hashed in preference to names so alpha-equivalent trees agree.
    pub fn site_hash(&self) -> Hash128 {
        let mut words: Vec<u64> = Vec::new();
        let tag: u64 = match self {
            Expr::VarRef(e) => {
                match e.binding {
                    Some(b) => {
                        words.push(b.depth as u64);
                        words.push(b.offset as u64);
                    }
                    None => Hash128::of_bytes(e.name.as_bytes()).push_words(&mut words),
                }
                1
            }
            Expr::App(e) => {
                e.func.site_hash().push_words(&mut words);
                e.arg.site_hash().push_words(&mut words);
                2
            }
            Expr::Lambda(e) => {
                e.body.site_hash().push_words(&mut words);
                3
            }
            Expr::Literal(e) => {
                let bytes = match &e.value {
                    LitValue::Str(s) => Hash128::of_bytes(s.as_bytes()),
                    LitValue::Int(i) => Hash128::of_bytes(&i.to_le_bytes()),
                    LitValue::Double(d) => Hash128::of_bytes(&d.to_bits().to_le_bytes()),
                };
                bytes.push_words(&mut words);
                4
            }
            Expr::Prim(e) => {
                Hash128::of_bytes(e.name.as_bytes()).push_words(&mut words);
                5
            }
            Expr::Construct(e) => {
                words.push(e.sum.0 as u64);
                words.push(e.cons as u64);
                6
            }
            Expr::Destruct(e) => {
                words.push(e.sum.0 as u64);
                7
            }
            Expr::DefBinding(e) => return e.site_hash(),
            Expr::Match(e) => {
                for a in &e.args {
                    a.site_hash().push_words(&mut words);
                }
                for arm in &e.arms {
                    arm.body.site_hash().push_words(&mut words);
                }
                9
            }
            Expr::Subscribe(e) => {
                Hash128::of_bytes(e.name.as_bytes()).push_words(&mut words);
                10
            }
            Expr::DefMap(e) => {
                for (name, def) in &e.map {
                    Hash128::of_bytes(name.as_bytes()).push_words(&mut words);
                    def.body.site_hash().push_words(&mut words);
                }
                e.body.site_hash().push_words(&mut words);
                11
            }
            Expr::Top(e) => {
                for map in &e.defmaps {
                    for (name, def) in &map.map {
                        Hash128::of_bytes(name.as_bytes()).push_words(&mut words);
                        def.body.site_hash().push_words(&mut words);
                    }
                }
                e.body.site_hash().push_words(&mut words);
                12
            }
        };
        Hash128::keyed(tag, &words)
    }

    // ── Tree printing ───────────────────────────────────────────────────

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Expr::VarRef(e) => match e.binding {
                Some(b) => writeln!(f, "{pad}VarRef {} [{}:{}]", e.name, b.depth, b.offset),
                None => writeln!(f, "{pad}VarRef {}", e.name),
            },
            Expr::App(e) => {
                writeln!(f, "{pad}App")?;
                e.func.fmt_tree(f, indent + 1)?;
                e.arg.fmt_tree(f, indent + 1)
            }
            Expr::Lambda(e) => {
                writeln!(f, "{pad}Lambda {}", e.name)?;
                e.body.fmt_tree(f, indent + 1)
            }
            Expr::Literal(e) => match &e.value {
                LitValue::Str(s) => writeln!(f, "{pad}Literal {:?}", s),
                LitValue::Int(i) => writeln!(f, "{pad}Literal {}", i),
                LitValue::Double(d) => writeln!(f, "{pad}Literal {}", d),
            },
            Expr::Prim(e) => match e.resolved {
                Some(r) => writeln!(f, "{pad}Prim {} (arity {})", e.name, r.arity),
                None => writeln!(f, "{pad}Prim {}", e.name),
            },
            Expr::Construct(e) => {
                writeln!(f, "{pad}Construct sum#{} cons#{}", e.sum.0, e.cons)
            }
            Expr::Destruct(e) => writeln!(f, "{pad}Destruct sum#{}", e.sum.0),
            Expr::Match(e) => {
                writeln!(f, "{pad}Match ({} args, {} arms)", e.args.len(), e.arms.len())?;
                for a in &e.args {
                    a.fmt_tree(f, indent + 1)?;
                }
                for arm in &e.arms {
                    arm.body.fmt_tree(f, indent + 1)?;
                }
                Ok(())
            }
            Expr::Subscribe(e) => writeln!(f, "{pad}Subscribe {}", e.name),
            Expr::DefMap(e) => {
                writeln!(f, "{pad}DefMap")?;
                for (name, def) in &e.map {
                    writeln!(f, "{pad}  def {name} =")?;
                    def.body.fmt_tree(f, indent + 2)?;
                }
                for (name, pubs) in &e.publishes {
                    for p in pubs {
                        writeln!(f, "{pad}  publish {name} =")?;
                        p.body.fmt_tree(f, indent + 2)?;
                    }
                }
                e.body.fmt_tree(f, indent + 1)
            }
            Expr::DefBinding(e) => {
                writeln!(f, "{pad}DefBinding")?;
                let mut names: Vec<(&String, &OrderSlot)> = e.order.iter().collect();
                names.sort_by_key(|(_, slot)| slot.index);
                for (name, slot) in names {
                    if slot.index < e.val.len() {
                        writeln!(f, "{pad}  val {} =", name)?;
                        e.val[slot.index].fmt_tree(f, indent + 2)?;
                    } else {
                        let fi = slot.index - e.val.len();
                        writeln!(f, "{pad}  fun {} (scc {}) =", name, e.scc[fi])?;
                        writeln!(f, "{pad}    Lambda {}", e.fun[fi].name)?;
                        e.fun[fi].body.fmt_tree(f, indent + 3)?;
                    }
                }
                e.body.fmt_tree(f, indent + 1)
            }
            Expr::Top(e) => {
                writeln!(f, "{pad}Top ({} files)", e.defmaps.len())?;
                for map in &e.defmaps {
                    Expr::fmt_defmap(map, f, indent + 1)?;
                }
                e.body.fmt_tree(f, indent + 1)
            }
        }
    }

    fn fmt_defmap(map: &DefMap, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        writeln!(f, "{pad}DefMap")?;
        for (name, def) in &map.map {
            writeln!(f, "{pad}  def {name} =")?;
            def.body.fmt_tree(f, indent + 2)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wake_common::{FileId, Location};

    fn loc() -> Location {
        Location::synthesized(FileId(0))
    }

    #[test]
    fn site_hash_is_structural() {
        let a = Expr::app(loc(), Expr::var(loc(), "f"), Expr::literal(loc(), LitValue::Int(1)));
        let b = Expr::app(loc(), Expr::var(loc(), "f"), Expr::literal(loc(), LitValue::Int(1)));
        assert_eq!(a.site_hash(), b.site_hash());

        let c = Expr::app(loc(), Expr::var(loc(), "g"), Expr::literal(loc(), LitValue::Int(1)));
        assert_ne!(a.site_hash(), c.site_hash());
    }

    #[test]
    fn site_hash_distinguishes_node_kinds() {
        let v = Expr::var(loc(), "x");
        let p = Expr::prim(loc(), "x");
        assert_ne!(v.site_hash(), p.site_hash());
    }

    #[test]
    fn source_flag_round_trips() {
        let mut e = Expr::var(loc(), "x");
        assert!(!e.is_marked_source());
        e.mark_source();
        assert!(e.is_marked_source());
    }

    #[test]
    fn tree_printing_shows_resolution() {
        let mut e = Expr::var(loc(), "x");
        if let Expr::VarRef(r) = &mut e {
            r.binding = Some(VarBinding {
                depth: 2,
                offset: 1,
                target: loc(),
                kind: RefKind::Value,
            });
        }
        assert_eq!(format!("{e}"), "VarRef x [2:1]\n");
    }
}
