//! The inference context: fresh variables, unification, generation
//! stamps, and generation-bounded cloning.
//!
//! Generalization in wake is not per-let but per function SCC (see the
//! inference walk), so instead of a nesting level each variable carries a
//! generation stamp -- its date of birth. Instantiating a generalized
//! definition clones the parts of its type born at or after the
//! definition's stamp and shares everything older, which is exactly the
//! monomorphic environment.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::FxHashMap;

use crate::error::{ErrorContext, TypeError};
use crate::ty::{TyTerm, TyVar, FN};

/// The inference context. Owns the union-find table, the per-variable
/// generation stamps, diagnostic tags, and the error sink.
pub struct InferCtx {
    table: InPlaceUnificationTable<TyVar>,
    /// Generation stamp per variable, indexed by `TyVar.0`. Merged
    /// variables keep the older stamp.
    dob: Vec<u32>,
    /// Argument-name tags for diagnostics, keyed by variable index.
    tags: FxHashMap<u32, String>,
    epoch: u32,
    /// Errors accumulated during inference.
    pub errors: Vec<TypeError>,
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
            dob: Vec::new(),
            tags: FxHashMap::default(),
            epoch: 0,
            errors: Vec::new(),
        }
    }

    // ── Variable creation ───────────────────────────────────────────────

    /// A fresh unbound variable stamped with the next generation.
    pub fn fresh(&mut self) -> TyVar {
        let var = self.table.new_key(None);
        self.epoch += 1;
        debug_assert_eq!(self.dob.len(), var.0 as usize);
        self.dob.push(self.epoch);
        var
    }

    /// A fresh variable bound to `con` applied to fresh arguments.
    pub fn fresh_term(&mut self, con: &str, arity: usize) -> TyVar {
        let args = (0..arity).map(|_| self.fresh()).collect();
        let var = self.table.new_key(Some(TyTerm::new(con, args)));
        self.epoch += 1;
        self.dob.push(self.epoch);
        var
    }

    /// A fresh function-shaped variable: `argument => result`.
    pub fn fresh_fn(&mut self) -> TyVar {
        self.fresh_term(FN, 2)
    }

    // ── Stamps ──────────────────────────────────────────────────────────

    /// Advance and return the generation counter. Used to stamp a whole
    /// SCC group with one shared generation.
    pub fn next_generation(&mut self) -> u32 {
        self.epoch += 1;
        self.epoch
    }

    /// Restamp a variable's root with `generation`.
    pub fn restamp(&mut self, var: TyVar, generation: u32) {
        let root = self.table.find(var);
        self.dob[root.0 as usize] = generation;
    }

    pub fn generation_of(&mut self, var: TyVar) -> u32 {
        let root = self.table.find(var);
        self.dob[root.0 as usize]
    }

    // ── Tags ────────────────────────────────────────────────────────────

    /// Tag a variable with an argument name for diagnostics.
    pub fn set_tag(&mut self, var: TyVar, tag: &str) {
        let root = self.table.find(var);
        self.tags.entry(root.0).or_insert_with(|| tag.to_string());
    }

    pub fn tag_of(&mut self, var: TyVar) -> Option<String> {
        let root = self.table.find(var);
        self.tags.get(&root.0).cloned()
    }

    // ── Structure queries ───────────────────────────────────────────────

    /// The bound term of a variable, if any.
    pub fn probe(&mut self, var: TyVar) -> Option<TyTerm> {
        self.table.probe_value(var)
    }

    /// Child `i` of a variable known to be bound.
    pub fn child(&mut self, var: TyVar, i: usize) -> Option<TyVar> {
        self.table.probe_value(var).and_then(|t| t.args.get(i).copied())
    }

    // ── Occurs check ────────────────────────────────────────────────────

    fn occurs(&mut self, var: TyVar, inside: TyVar) -> bool {
        let root = self.table.find(var);
        let inside_root = self.table.find(inside);
        if root == inside_root {
            return true;
        }
        if let Some(term) = self.table.probe_value(inside_root) {
            return term.args.iter().any(|&a| self.occurs(var, a));
        }
        false
    }

    // ── Unification ─────────────────────────────────────────────────────

    /// Unify two variables, recording a contextual error on conflict.
    pub fn unify(&mut self, a: TyVar, b: TyVar, context: &ErrorContext) -> bool {
        self.unify_inner(a, b, Some(context))
    }

    /// Unify without recording errors. Primitive type checkers use this;
    /// the caller reports a single signature error on failure.
    pub fn unify_quiet(&mut self, a: TyVar, b: TyVar) -> bool {
        self.unify_inner(a, b, None)
    }

    fn unify_inner(&mut self, a: TyVar, b: TyVar, context: Option<&ErrorContext>) -> bool {
        let ra = self.table.find(a);
        let rb = self.table.find(b);
        if ra == rb {
            return true;
        }
        let ta = self.table.probe_value(ra);
        let tb = self.table.probe_value(rb);
        match (ta, tb) {
            (Some(ta), Some(tb)) => {
                if ta.con != tb.con || ta.arity() != tb.arity() {
                    if let Some(context) = context {
                        let has_type = self.format_var(ra);
                        let used_as = self.format_var(rb);
                        self.errors.push(TypeError::Mismatch {
                            context: context.clone(),
                            has_type,
                            used_as,
                        });
                    }
                    return false;
                }
                let mut ok = true;
                for (ca, cb) in ta.args.iter().zip(tb.args.iter()) {
                    ok = self.unify_inner(*ca, *cb, context) && ok;
                }
                ok
            }
            (bound, unbound_side) => {
                // At least one side is unbound: union them, keeping the
                // older generation so outer-scope variables never get
                // cloned by instantiation.
                let (bound_root, unbound_root) = if bound.is_some() && unbound_side.is_none() {
                    (ra, rb)
                } else {
                    (rb, ra)
                };
                if self.table.probe_value(bound_root).is_some()
                    && self.occurs(unbound_root, bound_root)
                {
                    if let Some(context) = context {
                        let has_type = self.format_var(unbound_root);
                        let used_as = self.format_var(bound_root);
                        self.errors.push(TypeError::InfiniteType {
                            context: context.clone(),
                            has_type,
                            used_as,
                        });
                    }
                    return false;
                }
                let da = self.dob[ra.0 as usize];
                let db = self.dob[rb.0 as usize];
                let tag = self
                    .tags
                    .get(&ra.0)
                    .or_else(|| self.tags.get(&rb.0))
                    .cloned();
                self.table
                    .unify_var_var(ra, rb)
                    .expect("one side is unbound, so the merge cannot conflict");
                let root = self.table.find(ra);
                self.dob[root.0 as usize] = da.min(db);
                if let Some(tag) = tag {
                    self.tags.entry(root.0).or_insert(tag);
                }
                true
            }
        }
    }

    // ── Instantiation ───────────────────────────────────────────────────

    /// Clone the type reachable from `var`, freshening every unbound
    /// variable born at or after `cutoff` and sharing everything older.
    pub fn instantiate(&mut self, var: TyVar, cutoff: u32) -> TyVar {
        let mut memo = FxHashMap::default();
        self.instantiate_rec(var, cutoff, &mut memo)
    }

    fn instantiate_rec(
        &mut self,
        var: TyVar,
        cutoff: u32,
        memo: &mut FxHashMap<TyVar, TyVar>,
    ) -> TyVar {
        let root = self.table.find(var);
        if let Some(&done) = memo.get(&root) {
            return done;
        }
        let out = match self.table.probe_value(root) {
            Some(term) => {
                let args = term
                    .args
                    .iter()
                    .map(|&a| self.instantiate_rec(a, cutoff, memo))
                    .collect();
                let cloned = self.table.new_key(Some(TyTerm::new(term.con, args)));
                self.epoch += 1;
                self.dob.push(self.epoch);
                cloned
            }
            None => {
                if self.dob[root.0 as usize] >= cutoff {
                    self.fresh()
                } else {
                    root
                }
            }
        };
        memo.insert(root, out);
        out
    }

    // ── Formatting ──────────────────────────────────────────────────────

    /// Render a type with unbound variables named `a`, `b`, ... in
    /// traversal order.
    pub fn format_var(&mut self, var: TyVar) -> String {
        let mut names = FxHashMap::default();
        self.format_rec(var, &mut names, false)
    }

    fn format_rec(
        &mut self,
        var: TyVar,
        names: &mut FxHashMap<TyVar, String>,
        nested: bool,
    ) -> String {
        let root = self.table.find(var);
        match self.table.probe_value(root) {
            None => {
                let i = names.len();
                names
                    .entry(root)
                    .or_insert_with(|| {
                        if i < 26 {
                            ((b'a' + i as u8) as char).to_string()
                        } else {
                            format!("t{i}")
                        }
                    })
                    .clone()
            }
            Some(term) if term.con == FN && term.arity() == 2 => {
                let arg = self.format_rec(term.args[0], names, true);
                let result = self.format_rec(term.args[1], names, false);
                if nested {
                    format!("({arg} => {result})")
                } else {
                    format!("{arg} => {result}")
                }
            }
            Some(term) => {
                if term.args.is_empty() {
                    term.con
                } else {
                    let mut out = term.con;
                    for &a in &term.args {
                        let child = self.format_rec(a, names, true);
                        out.push(' ');
                        if child.contains(' ') && !child.starts_with('(') {
                            out.push('(');
                            out.push_str(&child);
                            out.push(')');
                        } else {
                            out.push_str(&child);
                        }
                    }
                    out
                }
            }
        }
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wake_common::{FileId, Location};

    fn here() -> ErrorContext {
        ErrorContext::Expression {
            location: Location::synthesized(FileId(0)),
        }
    }

    #[test]
    fn unify_two_fresh_vars_then_bind() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let b = ctx.fresh();
        assert!(ctx.unify(a, b, &here()));

        let int = ctx.fresh_term("Integer", 0);
        assert!(ctx.unify(a, int, &here()));
        assert_eq!(ctx.format_var(b), "Integer");
    }

    #[test]
    fn constructor_mismatch_is_an_error() {
        let mut ctx = InferCtx::new();
        let int = ctx.fresh_term("Integer", 0);
        let string = ctx.fresh_term("String", 0);
        assert!(!ctx.unify(int, string, &here()));
        assert_eq!(ctx.errors.len(), 1);
        match &ctx.errors[0] {
            TypeError::Mismatch {
                has_type, used_as, ..
            } => {
                assert_eq!(has_type, "Integer");
                assert_eq!(used_as, "String");
            }
            other => panic!("expected a mismatch, got {other:?}"),
        }
    }

    #[test]
    fn function_children_unify_pairwise() {
        let mut ctx = InferCtx::new();
        let f = ctx.fresh_fn();
        let g = ctx.fresh_fn();
        assert!(ctx.unify(f, g, &here()));

        let int = ctx.fresh_term("Integer", 0);
        let f_arg = ctx.child(f, 0).expect("fn has an argument slot");
        assert!(ctx.unify(f_arg, int, &here()));

        let g_arg = ctx.child(g, 0).expect("fn has an argument slot");
        assert_eq!(ctx.format_var(g_arg), "Integer");
    }

    #[test]
    fn occurs_check_rejects_infinite_types() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let f = ctx.fresh_fn();
        let arg = ctx.child(f, 0).unwrap();
        assert!(ctx.unify(a, arg, &here()));
        assert!(!ctx.unify(a, f, &here()));
        assert!(matches!(ctx.errors[0], TypeError::InfiniteType { .. }));
    }

    #[test]
    fn instantiate_freshens_only_young_variables() {
        let mut ctx = InferCtx::new();
        let old = ctx.fresh();
        let cutoff = ctx.next_generation();
        let young = ctx.fresh();
        let f = ctx.fresh_fn();
        let arg = ctx.child(f, 0).unwrap();
        let result = ctx.child(f, 1).unwrap();
        assert!(ctx.unify(arg, old, &here()));
        assert!(ctx.unify(result, young, &here()));

        let inst = ctx.instantiate(f, cutoff);
        let inst_arg = ctx.child(inst, 0).unwrap();
        let inst_result = ctx.child(inst, 1).unwrap();

        // The old variable is shared: binding it shows through the clone.
        let int = ctx.fresh_term("Integer", 0);
        assert!(ctx.unify(old, int, &here()));
        assert_eq!(ctx.format_var(inst_arg), "Integer");

        // The young variable was freshened: binding it does not leak back.
        let string = ctx.fresh_term("String", 0);
        assert!(ctx.unify(inst_result, string, &here()));
        assert_eq!(ctx.format_var(young), "a");
    }

    #[test]
    fn instantiation_preserves_sharing_within_the_clone() {
        // forall a. a => a must clone to b => b, not b => c.
        let mut ctx = InferCtx::new();
        let cutoff = ctx.next_generation();
        let a = ctx.fresh();
        let f = ctx.fresh_fn();
        let arg = ctx.child(f, 0).unwrap();
        let result = ctx.child(f, 1).unwrap();
        assert!(ctx.unify(arg, a, &here()));
        assert!(ctx.unify(result, a, &here()));

        let inst = ctx.instantiate(f, cutoff);
        let inst_arg = ctx.child(inst, 0).unwrap();
        let inst_result = ctx.child(inst, 1).unwrap();
        let int = ctx.fresh_term("Integer", 0);
        assert!(ctx.unify(inst_arg, int, &here()));
        assert_eq!(ctx.format_var(inst_result), "Integer");
    }

    #[test]
    fn merged_variables_keep_the_older_generation() {
        let mut ctx = InferCtx::new();
        let old = ctx.fresh();
        let cutoff = ctx.next_generation();
        let young = ctx.fresh();
        assert!(ctx.unify(young, old, &here()));
        assert!(ctx.generation_of(young) < cutoff);
    }

    #[test]
    fn format_names_variables_in_traversal_order() {
        let mut ctx = InferCtx::new();
        let f = ctx.fresh_fn();
        assert_eq!(ctx.format_var(f), "a => b");

        let list = ctx.fresh_term("List", 1);
        assert_eq!(ctx.format_var(list), "List a");
    }
}
