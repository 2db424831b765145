//! The inference walk over the resolved tree.
//!
//! This is the second pass: it assigns every variable reference its frame
//! coordinates (depth and offset), settles primitive arity and flags, and
//! infers types by eager unification. Name lookup runs against a stack of
//! name frames -- one per lambda and one per `DefBinding` -- which mirrors
//! exactly the frame layout the evaluator builds at run time, so the
//! coordinates recorded here index correctly at run time.
//!
//! Generalization is per function SCC group: while a group is being
//! inferred, everything below the frame's watermark is polymorphic
//! (references clone via generation-bounded instantiation) and the group
//! itself is monomorphic, which makes mutual recursion sound. After the
//! last group the watermark passes everything, and the binding's body sees
//! all definitions polymorphically.

use rustc_hash::FxHashMap;
use wake_ast::expr::{Expr, Lambda, PrimResolved, RefKind, VarBinding};
use wake_ast::sum::{SumRegistry, TypeSkeleton};
use wake_common::Location;

use crate::error::{ErrorContext, TypeError};
use crate::prims::PrimRegistry;
use crate::ty::TyVar;
use crate::unify::InferCtx;

/// One definition visible in a binding frame.
struct BindingSlot {
    index: usize,
    var: TyVar,
    /// Generation cutoff used when this slot is instantiated.
    stamp: u32,
    target: Location,
    is_fun: bool,
}

enum FrameKind {
    Lambda {
        name: String,
        /// The lambda's function-shaped variable; slot 0 is the parameter.
        var: TyVar,
        target: Location,
    },
    Binding {
        slots: FxHashMap<String, BindingSlot>,
        /// Offsets below this are generalized for the current step.
        generalized: usize,
    },
}

/// A name frame. `open` turns false once an application or binding
/// intervenes; primitives count their arity as the run of open lambda
/// frames directly around them.
struct NameFrame {
    kind: FrameKind,
    open: bool,
}

struct FoundRef {
    depth: u32,
    offset: u32,
    var: Option<TyVar>,
    stamp: u32,
    generalized: bool,
    target: Location,
    kind: RefKind,
}

pub(crate) struct Inference<'a> {
    pub(crate) ctx: InferCtx,
    prims: &'a PrimRegistry,
    sums: &'a SumRegistry,
    frames: Vec<NameFrame>,
    /// Types of definitions on the outermost binding stack, for global
    /// reporting.
    pub(crate) top_types: FxHashMap<String, String>,
}

impl<'a> Inference<'a> {
    pub(crate) fn new(prims: &'a PrimRegistry, sums: &'a SumRegistry) -> Self {
        Inference {
            ctx: InferCtx::new(),
            prims,
            sums,
            frames: Vec::new(),
            top_types: FxHashMap::default(),
        }
    }

    // ── Name lookup ─────────────────────────────────────────────────────

    fn find(&mut self, name: &str) -> Option<FoundRef> {
        let mut depth = 0u32;
        for fi in (0..self.frames.len()).rev() {
            match &self.frames[fi].kind {
                FrameKind::Lambda {
                    name: param,
                    var,
                    target,
                } => {
                    if param == name {
                        let var = *var;
                        let target = *target;
                        let slot = self.ctx.child(var, 0);
                        return Some(FoundRef {
                            depth,
                            offset: 0,
                            var: slot,
                            stamp: 0,
                            generalized: false,
                            target,
                            kind: RefKind::Value,
                        });
                    }
                }
                FrameKind::Binding { slots, generalized } => {
                    if let Some(slot) = slots.get(name) {
                        return Some(FoundRef {
                            depth,
                            offset: slot.index as u32,
                            var: Some(slot.var),
                            stamp: slot.stamp,
                            generalized: slot.index < *generalized,
                            target: slot.target,
                            kind: if slot.is_fun {
                                RefKind::Function
                            } else {
                                RefKind::Value
                            },
                        });
                    }
                }
            }
            depth += 1;
        }
        None
    }

    // ── The walk ────────────────────────────────────────────────────────

    /// Infer one expression. Returns its type variable and whether this
    /// subtree checked cleanly; inference continues past failures to
    /// collect further errors.
    pub(crate) fn explore(&mut self, expr: &mut Expr) -> (TyVar, bool) {
        match expr {
            Expr::VarRef(var_ref) => {
                let var = self.ctx.fresh();
                let Some(found) = self.find(&var_ref.name) else {
                    self.ctx.errors.push(TypeError::Unbound {
                        name: var_ref.name.clone(),
                        location: var_ref.location,
                    });
                    return (var, false);
                };
                var_ref.binding = Some(VarBinding {
                    depth: found.depth,
                    offset: found.offset,
                    target: found.target,
                    kind: found.kind,
                });
                let Some(target_var) = found.var else {
                    return (var, true);
                };
                let context = ErrorContext::Expression {
                    location: var_ref.location,
                };
                let ok = if found.generalized {
                    let instance = self.ctx.instantiate(target_var, found.stamp);
                    self.ctx.unify(var, instance, &context)
                } else {
                    self.ctx.unify(var, target_var, &context)
                };
                (var, ok)
            }

            Expr::App(app) => {
                let var = self.ctx.fresh();
                if let Some(frame) = self.frames.last_mut() {
                    frame.open = false;
                }
                let (func_var, func_ok) = self.explore(&mut app.func);
                let (arg_var, arg_ok) = self.explore(&mut app.arg);

                let shape = self.ctx.fresh_fn();
                let func_context = ErrorContext::Function {
                    location: app.func.location(),
                };
                let shaped = func_ok && self.ctx.unify(func_var, shape, &func_context);
                let mut arg_matches = false;
                let mut result_matches = false;
                if shaped {
                    let arg_slot = self.ctx.child(func_var, 0).expect("function-shaped");
                    let param = self.ctx.tag_of(arg_slot);
                    let arg_context = ErrorContext::Argument {
                        function: app.func.location(),
                        argument: app.arg.location(),
                        param,
                    };
                    arg_matches = arg_ok && self.ctx.unify(arg_slot, arg_var, &arg_context);

                    let result_slot = self.ctx.child(func_var, 1).expect("function-shaped");
                    let result_context = ErrorContext::Expression {
                        location: app.location,
                    };
                    result_matches = self.ctx.unify(result_slot, var, &result_context);
                }
                (var, func_ok && arg_ok && shaped && arg_matches && result_matches)
            }

            Expr::Lambda(lambda) => {
                let var = self.ctx.fresh();
                let ok = self.explore_lambda(lambda, var);
                (var, ok)
            }

            Expr::Literal(lit) => {
                let var = self.ctx.fresh();
                let shape = self.ctx.fresh_term(lit.value.type_name(), 0);
                let context = ErrorContext::Expression {
                    location: lit.location,
                };
                let ok = self.ctx.unify(var, shape, &context);
                (var, ok)
            }

            Expr::Prim(prim) => {
                let var = self.ctx.fresh();
                let mut lambda_vars = Vec::new();
                for fi in (0..self.frames.len()).rev() {
                    let frame = &self.frames[fi];
                    if !frame.open {
                        break;
                    }
                    let FrameKind::Lambda { var: lvar, .. } = &frame.kind else {
                        break;
                    };
                    lambda_vars.push(*lvar);
                }
                lambda_vars.reverse();
                let args: Vec<TyVar> = lambda_vars
                    .into_iter()
                    .map(|v| self.ctx.child(v, 0).expect("lambda frames are function-shaped"))
                    .collect();

                match self.prims.lookup(&prim.name) {
                    None => {
                        self.ctx.errors.push(TypeError::UnknownPrimitive {
                            name: prim.name.clone(),
                            location: prim.location,
                        });
                        (var, false)
                    }
                    Some(desc) => {
                        prim.resolved = Some(PrimResolved {
                            flags: desc.flags,
                            arity: args.len(),
                        });
                        let ok = (desc.typer)(&mut self.ctx, &args, var);
                        if !ok {
                            self.ctx.errors.push(TypeError::PrimitiveSignature {
                                name: prim.name.clone(),
                                location: prim.location,
                            });
                        }
                        (var, ok)
                    }
                }
            }

            Expr::Construct(cons) => {
                let var = self.ctx.fresh();
                let sum = self.sums.get(cons.sum);
                let shape = self.ctx.fresh_term(&sum.name, sum.params.len());
                let context = ErrorContext::Expression {
                    location: cons.location,
                };
                let mut ok = self.ctx.unify(var, shape, &context);

                let mut ids = FxHashMap::default();
                for (i, param) in sum.params.iter().enumerate() {
                    if let Some(child) = self.ctx.child(var, i) {
                        ids.insert(param.clone(), child);
                    }
                }

                // The constructor's arguments are the parameters of the
                // enclosing lambda chain: innermost lambda, last argument.
                let member = &sum.members[cons.cons];
                let mut fi = self.frames.len();
                for i in (0..member.args.len()).rev() {
                    if fi == 0 {
                        ok = false;
                        break;
                    }
                    fi -= 1;
                    let FrameKind::Lambda { var: lvar, .. } = &self.frames[fi].kind else {
                        ok = false;
                        break;
                    };
                    let lvar = *lvar;
                    let Some(arg_slot) = self.ctx.child(lvar, 0) else {
                        ok = false;
                        break;
                    };
                    ok = self.unify_skeleton(&member.args[i], arg_slot, &ids, &context) && ok;
                    if let Some(tag) = &member.args[i].tag {
                        self.ctx.set_tag(arg_slot, tag);
                    }
                }
                (var, ok)
            }

            Expr::Destruct(des) => {
                let var = self.ctx.fresh();
                let sum = self.sums.get(des.sum);
                let context = ErrorContext::Expression {
                    location: des.location,
                };

                // The scrutinee is the innermost enclosing lambda's
                // parameter; each handler lambda encloses it further out.
                let Some(NameFrame {
                    kind: FrameKind::Lambda { var: scrutinee, .. },
                    ..
                }) = self.frames.last()
                else {
                    return (var, false);
                };
                let scrutinee = *scrutinee;
                let Some(typ) = self.ctx.child(scrutinee, 0) else {
                    return (var, false);
                };
                let shape = self.ctx.fresh_term(&sum.name, sum.params.len());
                let mut ok = self.ctx.unify(typ, shape, &context);

                let mut ids = FxHashMap::default();
                for (i, param) in sum.params.iter().enumerate() {
                    if let Some(child) = self.ctx.child(typ, i) {
                        ids.insert(param.clone(), child);
                    }
                }

                let mut fi = self.frames.len() - 1;
                for mi in (0..sum.members.len()).rev() {
                    if fi == 0 {
                        ok = false;
                        break;
                    }
                    fi -= 1;
                    let FrameKind::Lambda { var: hvar, .. } = &self.frames[fi].kind else {
                        ok = false;
                        break;
                    };
                    let hvar = *hvar;
                    // Handler shape: sum => arg0 => ... => result.
                    let Some(mut tail) = self.ctx.child(hvar, 0) else {
                        ok = false;
                        break;
                    };
                    let fn_shape = self.ctx.fresh_fn();
                    if !self.ctx.unify(tail, fn_shape, &context) {
                        ok = false;
                        break;
                    }
                    if let Some(first) = self.ctx.child(tail, 0) {
                        ok = self.ctx.unify(first, typ, &context) && ok;
                    }
                    let Some(mut next) = self.ctx.child(tail, 1) else {
                        ok = false;
                        break;
                    };

                    let member = &sum.members[mi];
                    let mut complete = true;
                    for arg in &member.args {
                        let fn_shape = self.ctx.fresh_fn();
                        if !self.ctx.unify(next, fn_shape, &context) {
                            ok = false;
                            complete = false;
                            break;
                        }
                        if let Some(slot) = self.ctx.child(next, 0) {
                            ok = self.unify_skeleton(arg, slot, &ids, &context) && ok;
                        }
                        match self.ctx.child(next, 1) {
                            Some(n) => next = n,
                            None => {
                                complete = false;
                                break;
                            }
                        }
                    }
                    tail = next;
                    if complete {
                        ok = self.ctx.unify(var, tail, &context) && ok;
                    }
                }
                (var, ok)
            }

            Expr::DefBinding(def) => {
                let var = self.ctx.fresh();
                if let Some(frame) = self.frames.last_mut() {
                    frame.open = false;
                }
                let mut ok = true;

                // Values first, inferred in the enclosing environment. Each
                // value's stamp is taken before its inference starts, so
                // instantiation later freshens exactly the variables its
                // own inference created.
                let mut val_info = Vec::with_capacity(def.val.len());
                for value in def.val.iter_mut() {
                    let stamp = self.ctx.next_generation();
                    let (value_var, value_ok) = self.explore(value);
                    ok = value_ok && ok;
                    val_info.push((value_var, stamp));
                }

                // Pre-create every function's variable so references unify
                // against it during its group's inference.
                let fun_vars: Vec<TyVar> = def.fun.iter().map(|_| self.ctx.fresh()).collect();

                let mut slots = FxHashMap::default();
                for (name, slot) in &def.order {
                    let (slot_var, stamp, is_fun) = if slot.index < def.val.len() {
                        let (v, s) = val_info[slot.index];
                        (v, s, false)
                    } else {
                        (fun_vars[slot.index - def.val.len()], 0, true)
                    };
                    slots.insert(
                        name.clone(),
                        BindingSlot {
                            index: slot.index,
                            var: slot_var,
                            stamp,
                            target: slot.location,
                            is_fun,
                        },
                    );
                }
                self.frames.push(NameFrame {
                    kind: FrameKind::Binding {
                        slots,
                        generalized: 0,
                    },
                    open: true,
                });
                let frame_index = self.frames.len() - 1;

                // Function SCC groups in order: stamp the group with one
                // shared generation, expose earlier groups as generalized,
                // infer the members, then move the watermark past them.
                let mut start = 0;
                while start < def.fun.len() {
                    let group = def.scc[start];
                    let mut end = start;
                    while end < def.fun.len() && def.scc[end] == group {
                        end += 1;
                    }
                    let stamp = self.ctx.next_generation();
                    for j in start..end {
                        self.ctx.restamp(fun_vars[j], stamp);
                    }
                    if let FrameKind::Binding { slots, generalized } =
                        &mut self.frames[frame_index].kind
                    {
                        *generalized = def.val.len() + start;
                        for slot in slots.values_mut() {
                            if slot.is_fun
                                && slot.index >= def.val.len() + start
                                && slot.index < def.val.len() + end
                            {
                                slot.stamp = stamp;
                            }
                        }
                    }
                    for j in start..end {
                        let fun_ok = self.explore_lambda(&mut def.fun[j], fun_vars[j]);
                        ok = fun_ok && ok;
                    }
                    start = end;
                }

                if let FrameKind::Binding { generalized, .. } = &mut self.frames[frame_index].kind {
                    *generalized = def.val.len() + def.fun.len();
                }
                let (body_var, body_ok) = self.explore(&mut def.body);
                ok = body_ok && ok;
                let context = ErrorContext::Expression {
                    location: def.location,
                };
                ok = ok && self.ctx.unify(var, body_var, &context);

                // Record definition types while the outermost binding stack
                // is in scope, for global reporting.
                let is_top_stack = self.frames[..frame_index]
                    .iter()
                    .all(|f| matches!(f.kind, FrameKind::Binding { .. }));
                if is_top_stack {
                    let entries: Vec<(String, TyVar)> =
                        if let FrameKind::Binding { slots, .. } = &self.frames[frame_index].kind {
                            slots.iter().map(|(n, s)| (n.clone(), s.var)).collect()
                        } else {
                            Vec::new()
                        };
                    for (name, slot_var) in entries {
                        let rendered = self.ctx.format_var(slot_var);
                        self.top_types.insert(name, rendered);
                    }
                }

                self.frames.pop();
                (var, ok)
            }

            Expr::Match(_) | Expr::Subscribe(_) | Expr::DefMap(_) | Expr::Top(_) => {
                unreachable!("surface constructs are eliminated before inference")
            }
        }
    }

    /// Infer a lambda against a caller-supplied variable, so pre-created
    /// `fun` slot variables become the lambda's own type.
    fn explore_lambda(&mut self, lambda: &mut Lambda, var: TyVar) -> bool {
        let shape = self.ctx.fresh_fn();
        let context = ErrorContext::Expression {
            location: lambda.location,
        };
        let shaped = self.ctx.unify(var, shape, &context);
        if shaped && lambda.name != "_" && !lambda.name.contains(' ') {
            if let Some(arg_slot) = self.ctx.child(var, 0) {
                self.ctx.set_tag(arg_slot, &lambda.name);
            }
        }
        let target = lambda.token.unwrap_or(lambda.location);
        self.frames.push(NameFrame {
            kind: FrameKind::Lambda {
                name: lambda.name.clone(),
                var,
                target,
            },
            open: true,
        });
        let (body_var, body_ok) = self.explore(&mut lambda.body);
        self.frames.pop();

        let returns = if shaped && body_ok {
            let result_slot = self.ctx.child(var, 1).expect("function-shaped");
            let context = ErrorContext::RecursiveReturn {
                location: lambda.body.location(),
            };
            self.ctx.unify(result_slot, body_var, &context)
        } else {
            false
        };
        body_ok && shaped && returns
    }

    /// Unify a constructor-argument skeleton against a variable. Names
    /// bound in `ids` are the sum's type parameters; anything else is a
    /// type constructor applied to sub-skeletons.
    fn unify_skeleton(
        &mut self,
        skeleton: &TypeSkeleton,
        var: TyVar,
        ids: &FxHashMap<String, TyVar>,
        context: &ErrorContext,
    ) -> bool {
        if let Some(&param) = ids.get(&skeleton.name) {
            return self.ctx.unify(var, param, context);
        }
        let shape = self.ctx.fresh_term(&skeleton.name, skeleton.args.len());
        let mut ok = self.ctx.unify(var, shape, context);
        if ok {
            for (i, arg) in skeleton.args.iter().enumerate() {
                if let Some(child) = self.ctx.child(var, i) {
                    ok = self.unify_skeleton(arg, child, ids, context) && ok;
                }
            }
        }
        ok
    }
}
