//! Pattern-match compilation.
//!
//! A match expression is compiled by incremental refinement of a prototype
//! tree. The prototype starts as the most general pattern (all holes,
//! shaped by the scrutinee arity). Each step finds the first position where
//! the prototype is still a hole but the next arm has a constructor, emits
//! a destructor dispatch on that position's sum, buckets the arms per
//! constructor, and recurses with the prototype's hole expanded. Prototype
//! mutation is reversed on return so sibling constructors see the original
//! shape.
//!
//! Scrutinees are bound to `_ a<i>`, arm bodies to `_ f<j>`, guards to
//! `_ g<j>`; the space in the names keeps them unspellable in source. The
//! finished match is emitted as a lambda/application chain instead of a
//! live definition map so none of these bindings is ever let-generalized
//! (the arm lambdas share type variables with the scrutinees, and cloning
//! them would unlink that).

use wake_ast::expr::{DefMap, DefValue, Expr, Match};
use wake_ast::pat::Pattern;
use wake_ast::sum::SumId;
use wake_common::Location;

use crate::error::ResolveError;
use crate::scope::Resolver;

/// The sum dispatched at a tree position: a declared sum, or the anonymous
/// single-constructor tuple wrapping a multi-scrutinee match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TreeSum {
    Real(SumId),
    Tuple { arity: usize },
}

/// One position of a (prototype or arm) pattern tree.
///
/// `var` is `-1` for an unbound position. On arm trees `0` marks a binder.
/// On the prototype it is the index of the `_ a<var>` value holding this
/// position's sub-value.
#[derive(Debug, Default)]
pub(crate) struct PatternTree {
    sum: Option<TreeSum>,
    cons: usize,
    var: i32,
    children: Vec<PatternTree>,
}

impl PatternTree {
    fn hole(var: i32) -> PatternTree {
        PatternTree {
            sum: None,
            cons: 0,
            var,
            children: Vec::new(),
        }
    }
}

/// One row of the compilation: the prototype (always first) or an arm.
///
/// `index` is the next fresh variable on the prototype and the arm's
/// function number on arms; during bucketing it doubles as a move marker
/// (`MOVED_EXPANDED` / `MOVED_MATCHED`).
pub(crate) struct PatternRef {
    location: Location,
    tree: PatternTree,
    index: i32,
    uses: usize,
    guard: bool,
}

const MOVED_EXPANDED: i32 = -1;
const MOVED_MATCHED: i32 = -2;

impl PatternRef {
    fn placeholder(marker: i32) -> PatternRef {
        PatternRef {
            location: Location::synthesized(wake_common::FileId(0)),
            tree: PatternTree::default(),
            index: marker,
            uses: 0,
            guard: false,
        }
    }
}

fn tree_at<'t>(mut tree: &'t PatternTree, path: &[usize]) -> &'t PatternTree {
    for &i in path {
        tree = &tree.children[i];
    }
    tree
}

fn tree_at_mut<'t>(mut tree: &'t mut PatternTree, path: &[usize]) -> &'t mut PatternTree {
    for &i in path {
        tree = &mut tree.children[i];
    }
    tree
}

/// Find the first position (preorder) where `proto` is a hole but `arm` is
/// expanded, recording the path. Returns the arm's sum there, if any.
fn find_mismatch(path: &mut Vec<usize>, proto: &PatternTree, arm: &PatternTree) -> Option<TreeSum> {
    if proto.sum.is_none() {
        return arm.sum;
    }
    for i in 0..proto.children.len() {
        path.push(i);
        if let Some(sum) = find_mismatch(path, &proto.children[i], &arm.children[i]) {
            return Some(sum);
        }
        path.pop();
    }
    None
}

/// Apply an arm function to the values its pattern binds, in preorder.
fn fill_pattern(expr: Expr, proto: &PatternTree, arm: &PatternTree) -> Expr {
    if arm.var >= 0 {
        let at = expr.location();
        Expr::app(at, expr, Expr::var(at, format!("_ a{}", proto.var)))
    } else {
        let mut out = expr;
        for (p, a) in proto.children.iter().zip(&arm.children) {
            out = fill_pattern(out, p, a);
        }
        out
    }
}

impl<'a> Resolver<'a> {
    // ── Sum queries ─────────────────────────────────────────────────────

    fn member_count(&self, sum: TreeSum) -> usize {
        match sum {
            TreeSum::Real(id) => self.sums.get(id).members.len(),
            TreeSum::Tuple { .. } => 1,
        }
    }

    fn member_arity(&self, sum: TreeSum, cons: usize) -> usize {
        match sum {
            TreeSum::Real(id) => self.sums.get(id).members[cons].arity(),
            TreeSum::Tuple { arity } => arity,
        }
    }

    fn sum_name(&self, sum: TreeSum) -> &str {
        match sum {
            TreeSum::Real(id) => &self.sums.get(id).name,
            TreeSum::Tuple { .. } => "",
        }
    }

    /// Format a prototype tree as source-like syntax for diagnostics.
    fn format_tree(&self, tree: &PatternTree) -> String {
        let Some(sum) = tree.sum else {
            return "_".to_string();
        };
        let children: Vec<String> = tree
            .children
            .iter()
            .map(|c| {
                let s = self.format_tree(c);
                if c.sum.is_some() && !c.children.is_empty() {
                    format!("({s})")
                } else {
                    s
                }
            })
            .collect();
        match sum {
            TreeSum::Tuple { .. } => children.join(" "),
            TreeSum::Real(id) => {
                let name = &self.sums.get(id).members[tree.cons].name;
                if children.is_empty() {
                    name.clone()
                } else {
                    format!("{} {}", name, children.join(" "))
                }
            }
        }
    }

    // ── Constructor lookup ──────────────────────────────────────────────

    /// Resolve a constructor name through the scope stack. The definition
    /// is unwrapped through its lambda chain; a `Construct` at the core
    /// identifies the sum and member, so constructor aliases still work.
    fn find_constructor(&self, name: &str) -> Option<(SumId, usize)> {
        for fi in (0..self.frames.len()).rev() {
            let frame = &self.frames[fi];
            let mut hit = None;
            if let Some(prefix) = frame.prefix {
                hit = frame.index.get(&format!("{prefix} {name}"));
            }
            let hit = hit.or_else(|| frame.index.get(name));
            if let Some(&di) = hit {
                if let Some(expr) = &frame.defs[di].expr {
                    let mut core = expr;
                    while let Expr::Lambda(lambda) = core {
                        core = &lambda.body;
                    }
                    if let Expr::Construct(construct) = core {
                        return Some((construct.sum, construct.cons));
                    }
                }
            }
        }
        None
    }

    // ── Arm lowering ────────────────────────────────────────────────────

    /// Lower one surface pattern to a tree, wrapping `expr` (and the guard,
    /// if present) in a lambda for every binder encountered. Children are
    /// traversed in reverse so the first binder in reading order ends up as
    /// the outermost lambda, matching the order `fill_pattern` applies
    /// arguments.
    fn lower_pattern(
        &mut self,
        pattern: &Pattern,
        expr: &mut Expr,
        guard: &mut Option<Expr>,
    ) -> PatternTree {
        match pattern {
            Pattern::Wildcard { .. } => PatternTree::hole(-1),
            Pattern::Bind { name, location } => {
                let at = expr.location();
                let body = std::mem::replace(expr, Expr::var(at, ""));
                let mut lambda = Expr::lambda(at, name.clone(), body);
                if let Expr::Lambda(l) = &mut lambda {
                    l.token = Some(*location);
                }
                *expr = lambda;
                if let Some(g) = guard.take() {
                    *guard = Some(Expr::lambda(g.location(), name.clone(), g));
                }
                PatternTree::hole(0)
            }
            Pattern::Constructor {
                name,
                args,
                location,
            } => {
                let Some((sum_id, cons)) = self.find_constructor(name) else {
                    self.errors.push(ResolveError::UnknownConstructor {
                        name: name.clone(),
                        location: *location,
                    });
                    return PatternTree::hole(0);
                };
                let expected = self.sums.get(sum_id).members[cons].arity();
                if expected != args.len() {
                    self.errors.push(ResolveError::ConstructorArity {
                        name: Some(name.clone()),
                        location: *location,
                        given: args.len(),
                        expected,
                    });
                    return PatternTree::hole(0);
                }
                let mut children: Vec<PatternTree> = args
                    .iter()
                    .rev()
                    .map(|a| self.lower_pattern(a, expr, guard))
                    .collect();
                children.reverse();
                PatternTree {
                    sum: Some(TreeSum::Real(sum_id)),
                    cons,
                    var: -1,
                    children,
                }
            }
        }
    }

    // ── Match compilation ───────────────────────────────────────────────

    /// Compile a match into destructor dispatch. Returns `None` with errors
    /// recorded when the match is malformed.
    pub(crate) fn rebind_match(&mut self, m: Match) -> Option<Expr> {
        let Match {
            location,
            args,
            arms,
        } = m;
        let nargs = args.len();
        let mut map = DefMap {
            location,
            map: std::collections::BTreeMap::new(),
            publishes: std::collections::BTreeMap::new(),
            body: Box::new(Expr::var(location, "")),
            flags: Default::default(),
        };

        for (i, arg) in args.into_iter().enumerate() {
            map.map.insert(
                format!("_ a{i}"),
                DefValue {
                    location: arg.location(),
                    body: arg,
                },
            );
        }

        let mut patterns: Vec<PatternRef> = Vec::with_capacity(arms.len() + 1);
        let prototype_tree = if nargs == 1 {
            PatternTree::hole(0)
        } else {
            PatternTree {
                sum: Some(TreeSum::Tuple { arity: nargs }),
                cons: 0,
                var: -1,
                children: (0..nargs).map(|i| PatternTree::hole(i as i32)).collect(),
            }
        };
        patterns.push(PatternRef {
            location,
            tree: prototype_tree,
            index: nargs as i32,
            uses: 1,
            guard: false,
        });

        let mut ok = true;
        for (f, arm) in arms.into_iter().enumerate() {
            let arm_location = arm.body.location();
            let mut expr = arm.body;
            let mut guard = arm.guard;
            let tree = if arm.patterns.len() != nargs {
                self.errors.push(ResolveError::ConstructorArity {
                    name: None,
                    location: arm
                        .patterns
                        .first()
                        .map_or(location, |p| p.location()),
                    given: arm.patterns.len(),
                    expected: nargs,
                });
                ok = false;
                PatternTree::hole(0)
            } else if nargs == 1 {
                self.lower_pattern(&arm.patterns[0], &mut expr, &mut guard)
            } else {
                let mut children: Vec<PatternTree> = arm
                    .patterns
                    .iter()
                    .rev()
                    .map(|p| self.lower_pattern(p, &mut expr, &mut guard))
                    .collect();
                children.reverse();
                PatternTree {
                    sum: Some(TreeSum::Tuple { arity: nargs }),
                    cons: 0,
                    var: -1,
                    children,
                }
            };

            let has_guard = guard.is_some();
            let expr = Expr::lambda(arm_location, "_", expr);
            map.map.insert(
                format!("_ f{f}"),
                DefValue {
                    location: arm_location,
                    body: expr,
                },
            );
            if let Some(g) = guard {
                let guard_location = g.location();
                map.map.insert(
                    format!("_ g{f}"),
                    DefValue {
                        location: guard_location,
                        body: Expr::lambda(guard_location, "_", g),
                    },
                );
            }
            patterns.push(PatternRef {
                location: arm_location,
                tree,
                index: f as i32,
                uses: 0,
                guard: has_guard,
            });
        }
        if !ok {
            return None;
        }

        let body = self.expand_patterns(&mut patterns)?;
        map.body = Box::new(body);

        let mut unreachable = false;
        for p in &patterns {
            if p.uses == 0 {
                self.errors.push(ResolveError::UnreachablePattern {
                    location: p.location,
                });
                unreachable = true;
            }
        }
        if unreachable {
            return None;
        }

        Some(without_generalization(map))
    }

    /// One refinement step: either the next arm matches the prototype (emit
    /// its application) or a dispatch position exists (emit a destructor
    /// and recurse per constructor).
    ///
    /// Postcondition: `patterns` is unchanged on success (internal mutation
    /// is reversed before returning).
    fn expand_patterns(&mut self, patterns: &mut Vec<PatternRef>) -> Option<Expr> {
        if patterns.len() == 1 {
            let missing = self.format_tree(&patterns[0].tree);
            self.errors.push(ResolveError::NonExhaustiveMatch {
                location: patterns[0].location,
                missing,
            });
            return None;
        }

        let mut path = Vec::new();
        let mismatch = find_mismatch(&mut path, &patterns[0].tree, &patterns[1].tree);
        match mismatch {
            Some(sum) => self.expand_dispatch(patterns, sum, &path),
            None => self.expand_direct(patterns),
        }
    }

    /// Emit `destruct S c0 … cn-1 scrutinee` at the mismatch position.
    fn expand_dispatch(
        &mut self,
        patterns: &mut Vec<PatternRef>,
        sum: TreeSum,
        path: &[usize],
    ) -> Option<Expr> {
        let at = patterns[0].location;
        let members = self.member_count(sum);
        let mut map = DefMap {
            location: at,
            map: std::collections::BTreeMap::new(),
            publishes: std::collections::BTreeMap::new(),
            body: Box::new(Expr::var(at, format!("destruct {}", self.sum_name(sum)))),
            flags: Default::default(),
        };

        for c in 0..members {
            let cname = format!("_ c{c}");
            let dispatch = std::mem::replace(&mut *map.body, Expr::var(at, ""));
            map.body = Box::new(Expr::app(at, dispatch, Expr::var(at, cname.clone())));

            let arity = self.member_arity(sum, c);
            let var_base = patterns[0].index;
            patterns[0].index += arity as i32;

            let mut bucket: Vec<PatternRef> = Vec::new();
            for (i, p) in patterns.iter_mut().enumerate() {
                let tree = tree_at_mut(&mut p.tree, path);
                if tree.sum.is_none() {
                    tree.sum = Some(sum);
                    tree.cons = c;
                    tree.children = (0..arity).map(|_| PatternTree::hole(-1)).collect();
                    if i == 0 {
                        for (k, child) in tree.children.iter_mut().enumerate() {
                            child.var = var_base + k as i32;
                        }
                    }
                    bucket.push(std::mem::replace(p, PatternRef::placeholder(MOVED_EXPANDED)));
                } else if tree.sum != Some(sum) {
                    self.errors.push(ResolveError::ForeignConstructor {
                        name: match tree.sum {
                            Some(TreeSum::Real(id)) => {
                                self.sums.get(id).members[tree.cons].name.clone()
                            }
                            _ => String::new(),
                        },
                        sum: self.sum_name(sum).to_string(),
                        location: p.location,
                    });
                    return None;
                } else if tree.cons == c {
                    bucket.push(std::mem::replace(p, PatternRef::placeholder(MOVED_MATCHED)));
                }
            }

            let compiled = self.expand_patterns(&mut bucket)?;

            // Handler: one throwaway lambda for the sum value itself, then
            // one per constructor argument, innermost last.
            let mut handler = compiled;
            let mut var = var_base + arity as i32;
            for _ in 0..arity {
                var -= 1;
                handler = Expr::lambda(at, format!("_ a{var}"), handler);
            }
            handler = Expr::lambda(at, "_", handler);
            map.map.insert(
                cname,
                DefValue {
                    location: at,
                    body: handler,
                },
            );

            for p in patterns.iter_mut().rev() {
                match p.index {
                    MOVED_EXPANDED => {
                        *p = bucket.pop().expect("bucket holds every moved row");
                        let tree = tree_at_mut(&mut p.tree, path);
                        tree.sum = None;
                        tree.children.clear();
                    }
                    MOVED_MATCHED => {
                        *p = bucket.pop().expect("bucket holds every moved row");
                    }
                    _ => {}
                }
            }
        }

        let scrutinee_var = tree_at(&patterns[0].tree, path).var;
        let dispatch = std::mem::replace(&mut *map.body, Expr::var(at, ""));
        map.body = Box::new(Expr::app(
            at,
            dispatch,
            Expr::var(at, format!("_ a{scrutinee_var}")),
        ));
        Some(Expr::DefMap(map))
    }

    /// The next arm matches the prototype everywhere: apply its function to
    /// the bound values, honoring its guard if it has one.
    fn expand_direct(&mut self, patterns: &mut Vec<PatternRef>) -> Option<Expr> {
        patterns[1].uses += 1;
        let at = patterns[1].location;
        let f = patterns[1].index;

        let guard_true = fill_pattern(
            Expr::app(at, Expr::var(at, format!("_ f{f}")), Expr::var(at, "_ a0")),
            &patterns[0].tree,
            &patterns[1].tree,
        );
        if !patterns[1].guard {
            return Some(guard_true);
        }

        // Compile the remaining arms with this one removed: that is the
        // guard-false branch.
        let saved = patterns.remove(1);
        let guard_false = self.expand_patterns(patterns);
        let guard_expr = fill_pattern(
            Expr::app(at, Expr::var(at, format!("_ g{f}")), Expr::var(at, "_ a0")),
            &patterns[0].tree,
            &saved.tree,
        );
        patterns.insert(1, saved);
        let guard_false = guard_false?;

        Some(Expr::app(
            at,
            Expr::app(
                at,
                Expr::app(
                    at,
                    Expr::var(at, "destruct Boolean"),
                    Expr::lambda(at, "_", guard_true),
                ),
                Expr::lambda(at, "_", guard_false),
            ),
            guard_expr,
        ))
    }
}

/// Rewrite a definition map into `(\k. body) v` applications so none of
/// its bindings participates in let-generalization. The bindings of a
/// compiled match are independent of each other, so nesting order only has
/// to keep the body innermost.
fn without_generalization(map: DefMap) -> Expr {
    let mut out = *map.body;
    for (name, def) in map.map.into_iter().rev() {
        let at = def.body.location();
        out = Expr::app(at, Expr::lambda(at, name, out), def.body);
    }
    out
}
