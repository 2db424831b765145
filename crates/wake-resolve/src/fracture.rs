//! Binding fracturer: dependency leveling and SCC clustering.
//!
//! A resolved definition map is a flat set of mutually visible definitions
//! plus a body. The fracturer rewrites it into a right-nested stack of
//! `DefBinding` nodes, one per dependency level, so the evaluator can
//! allocate each level's frame before anything that uses it runs.
//!
//! Leveling is longest-path relaxation over the recorded dependency edges.
//! An edge out of a function costs 0 (functions may be mutually recursive),
//! an edge out of a value costs 1 (a value needs its dependencies fully
//! evaluated). A level reaching the definition count proves a value cycle.
//!
//! Within one level, non-functions become `val` slots in insertion order
//! and functions are clustered by Tarjan's algorithm; each strongly
//! connected component gets a dense group id and contiguous `fun` slots in
//! stack-pop order.

use std::collections::VecDeque;

use wake_ast::expr::{DefBinding, Expr, OrderSlot};
use wake_common::Location;

use crate::error::ResolveError;
use crate::scope::{ResolveDef, Resolver};

struct SccState {
    index: Vec<Option<u32>>,
    lowlink: Vec<u32>,
    onstack: Vec<bool>,
    stack: Vec<usize>,
    next_index: u32,
    next_group: u32,
}

impl<'a> Resolver<'a> {
    /// Fracture one frame's definitions around `body`. Returns `None` (with
    /// the error recorded) on a value cycle or when any definition already
    /// failed to lower.
    pub(crate) fn fracture_binding(
        &mut self,
        location: Location,
        mut defs: Vec<ResolveDef>,
        body: Expr,
    ) -> Option<Expr> {
        let count = defs.len();
        if defs.iter().any(|d| d.expr.is_none()) {
            // A lowering step inside some definition already reported.
            return None;
        }

        // Longest-path relaxation over the dependency edges.
        let mut dist = vec![0usize; count];
        let mut pred: Vec<Option<usize>> = vec![None; count];
        let mut queue: VecDeque<(usize, usize)> = (0..count).map(|i| (i, 0)).collect();

        while let Some((v, d)) = queue.pop_front() {
            if d < dist[v] {
                continue; // stale entry
            }
            let d = dist[v];
            if d >= count {
                self.report_cycle(&defs, &pred, v);
                return None;
            }
            let weight = if defs[v].expr.as_ref().is_some_and(Expr::is_lambda) {
                0
            } else {
                1
            };
            let targets: Vec<usize> = defs[v].edges.iter().copied().collect();
            for t in targets {
                if d + weight > dist[t] {
                    dist[t] = d + weight;
                    pred[t] = Some(v);
                    queue.push_back((t, dist[t]));
                }
            }
        }

        // Bucket definitions by level, preserving insertion order.
        let mut levels: Vec<Vec<usize>> = vec![Vec::new(); count];
        for i in 0..count {
            levels[dist[i]].push(i);
        }

        // Wrap levels around the body. Level 0 holds the definitions nothing
        // forces earlier, so it ends up innermost; the most-depended-on
        // level wraps everything and is evaluated first.
        let mut scc = SccState {
            index: vec![None; count],
            lowlink: vec![0; count],
            onstack: vec![false; count],
            stack: Vec::new(),
            next_index: 0,
            next_group: 0,
        };
        let mut out = body;
        for level in 0..count {
            if levels[level].is_empty() {
                continue;
            }
            let mut binding = DefBinding::new(location, out);
            for &j in &levels[level] {
                if !defs[j].expr.as_ref().is_some_and(Expr::is_lambda) {
                    let expr = defs[j].expr.take().expect("checked above");
                    binding.order.insert(
                        defs[j].name.clone(),
                        OrderSlot {
                            location: defs[j].location,
                            index: binding.val.len(),
                        },
                    );
                    binding.val.push(expr);
                }
            }
            scc.next_index = 0;
            scc.next_group = 0;
            for &j in &levels[level] {
                if scc.index[j].is_none() && defs[j].expr.as_ref().is_some_and(Expr::is_lambda) {
                    strongly_connect(&mut scc, &mut defs, &dist, level, j, &mut binding);
                }
            }
            out = Expr::DefBinding(binding);
        }
        Some(out)
    }

    fn report_cycle(&mut self, defs: &[ResolveDef], pred: &[Option<usize>], from: usize) {
        // Walking the predecessor chain one hop per definition is
        // guaranteed to land inside the cycle.
        let mut j = from;
        for _ in 0..defs.len() {
            j = pred[j].expect("an over-relaxed vertex has a predecessor chain");
        }
        let mut members = Vec::new();
        let mut i = j;
        loop {
            members.push((defs[i].name.clone(), defs[i].location));
            i = pred[i].expect("cycle members chain to each other");
            if i == j {
                break;
            }
        }
        self.errors.push(ResolveError::ValueCycle { members });
    }
}

/// Tarjan's strongly-connected-components algorithm, restricted to function
/// definitions whose targets sit at the same level. Each root pop assigns
/// the next dense group id and moves the component's lambdas into
/// contiguous `fun` slots.
fn strongly_connect(
    state: &mut SccState,
    defs: &mut [ResolveDef],
    dist: &[usize],
    level: usize,
    v: usize,
    binding: &mut DefBinding,
) {
    state.index[v] = Some(state.next_index);
    state.lowlink[v] = state.next_index;
    state.next_index += 1;
    state.stack.push(v);
    state.onstack[v] = true;

    let targets: Vec<usize> = defs[v].edges.iter().copied().collect();
    for w in targets {
        if dist[w] != level {
            continue;
        }
        if state.index[w].is_none() && defs[w].expr.as_ref().is_some_and(Expr::is_lambda) {
            strongly_connect(state, defs, dist, level, w, binding);
            state.lowlink[v] = state.lowlink[v].min(state.lowlink[w]);
        } else if state.onstack[w] {
            state.lowlink[v] = state.lowlink[v].min(state.index[w].expect("on-stack implies visited"));
        }
    }

    if state.lowlink[v] == state.index[v].expect("set on entry") {
        let group = state.next_group;
        state.next_group += 1;
        loop {
            let w = state.stack.pop().expect("root is still on the stack");
            state.onstack[w] = false;
            binding.order.insert(
                defs[w].name.clone(),
                OrderSlot {
                    location: defs[w].location,
                    index: binding.val.len() + binding.fun.len(),
                },
            );
            match defs[w].expr.take() {
                Some(Expr::Lambda(lambda)) => binding.fun.push(lambda),
                _ => unreachable!("only lambdas enter the SCC walk"),
            }
            binding.scc.push(group);
            if w == v {
                break;
            }
        }
    }
}
