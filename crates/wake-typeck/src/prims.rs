//! The primitive registry.
//!
//! Primitives are the language's escape hatch into the runtime: a `prim`
//! expression names an entry here, and the registry supplies its
//! type-checking function and evaluation flags. Evaluation functions live
//! with the evaluator, keyed by the same names; this layer only needs to
//! know how a primitive types and whether it is pure.
//!
//! A primitive's argument types are the parameters of the lambdas directly
//! enclosing the `prim` expression (its arity), and the type checker hands
//! those slots plus the result slot to the registered typer, which returns
//! whether the signature fits.

use rustc_hash::FxHashMap;
use wake_ast::prim::PrimFlags;

use crate::ty::TyVar;
use crate::unify::InferCtx;

/// A primitive's type-checking function: given the enclosing lambda
/// parameter slots and the result slot, constrain them and report fit.
/// Unifications should be quiet; the caller reports one signature error.
pub type PrimTyper = Box<dyn Fn(&mut InferCtx, &[TyVar], TyVar) -> bool>;

/// Everything the frontend needs to know about one primitive.
pub struct PrimDesc {
    pub flags: PrimFlags,
    pub typer: PrimTyper,
}

/// Name-keyed registry of all primitives.
#[derive(Default)]
pub struct PrimRegistry {
    map: FxHashMap<String, PrimDesc>,
}

impl PrimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, flags: PrimFlags, typer: PrimTyper) {
        self.map.insert(name.into(), PrimDesc { flags, typer });
    }

    pub fn lookup(&self, name: &str) -> Option<&PrimDesc> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The primitives the standard library's operator definitions expect.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();

        for name in ["iadd", "isub", "imul", "idiv"] {
            reg.insert(
                name,
                PrimFlags::PURE | PrimFlags::SHALLOW,
                binary_op("Integer", "Integer"),
            );
        }
        reg.insert(
            "icmp",
            PrimFlags::PURE | PrimFlags::SHALLOW,
            binary_op("Integer", "Boolean"),
        );
        reg.insert(
            "scat",
            PrimFlags::PURE | PrimFlags::SHALLOW,
            binary_op("String", "String"),
        );

        // List append: (List a, List a) => List a.
        reg.insert(
            "lcat",
            PrimFlags::PURE,
            Box::new(|ctx, args, result| {
                if args.len() != 2 {
                    return false;
                }
                let list = ctx.fresh_term("List", 1);
                ctx.unify_quiet(args[0], list)
                    && ctx.unify_quiet(args[1], list)
                    && ctx.unify_quiet(result, list)
            }),
        );

        reg
    }
}

/// A two-argument primitive over one monomorphic operand type.
fn binary_op(operand: &'static str, result_con: &'static str) -> PrimTyper {
    Box::new(move |ctx, args, result| {
        if args.len() != 2 {
            return false;
        }
        let mut ok = true;
        for &arg in args {
            let shape = ctx.fresh_term(operand, 0);
            ok = ctx.unify_quiet(arg, shape) && ok;
        }
        let shape = ctx.fresh_term(result_con, 0);
        ctx.unify_quiet(result, shape) && ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_integer_op_types_its_slots() {
        let reg = PrimRegistry::with_builtins();
        let desc = reg.lookup("iadd").expect("iadd registered");
        assert!(desc.flags.contains(PrimFlags::PURE));

        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let b = ctx.fresh();
        let r = ctx.fresh();
        assert!((desc.typer)(&mut ctx, &[a, b], r));
        assert_eq!(ctx.format_var(a), "Integer");
        assert_eq!(ctx.format_var(r), "Integer");
    }

    #[test]
    fn builtin_rejects_wrong_arity() {
        let reg = PrimRegistry::with_builtins();
        let desc = reg.lookup("iadd").unwrap();
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let r = ctx.fresh();
        assert!(!(desc.typer)(&mut ctx, &[a], r));
    }

    #[test]
    fn lcat_links_both_operands() {
        let reg = PrimRegistry::with_builtins();
        let desc = reg.lookup("lcat").unwrap();
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let b = ctx.fresh();
        let r = ctx.fresh();
        assert!((desc.typer)(&mut ctx, &[a, b], r));
        let int = ctx.fresh_term("Integer", 0);
        let elem = ctx.child(a, 0).expect("list element slot");
        assert!(ctx.unify_quiet(elem, int));
        assert_eq!(ctx.format_var(r), "List Integer");
    }
}
