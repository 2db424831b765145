//! Integration tests for the full frontend: resolution plus inference.
//!
//! Tests build `Top` trees the way the parser would (a prelude file with
//! the standard constructors, destructors, and operators, plus a user
//! file), run `bind`, and assert on inferred types, recorded frame
//! coordinates, and collected errors.

use std::collections::BTreeMap;

use wake_ast::expr::{DefBinding, DefMap, DefValue, Expr, LitValue, Match, MatchArm, PubDef, Top};
use wake_ast::pat::Pattern;
use wake_ast::prim::PrimFlags;
use wake_ast::sum::SumRegistry;
use wake_common::{FileId, Location};
use wake_typeck::error::{ErrorContext, TypeError};
use wake_typeck::prims::PrimRegistry;
use wake_typeck::{bind, BindResult};

// ── Helpers ────────────────────────────────────────────────────────────

fn loc(file: u32) -> Location {
    Location::synthesized(FileId(file))
}

/// The definitions every program in these tests sees: the standard sums'
/// constructors and destructors plus operator wrappers over primitives.
fn prelude(sums: &SumRegistry) -> DefMap {
    let at = loc(0);
    let mut map = BTreeMap::new();
    for sum_name in ["Boolean", "Option", "List"] {
        let id = sums.lookup(sum_name).expect("standard sum");
        for (name, expr) in sums.constructor_defs(id) {
            map.insert(name, DefValue { location: at, body: expr });
        }
        let (name, expr) = sums.destructor_def(id);
        map.insert(name, DefValue { location: at, body: expr });
    }
    for (op, prim) in [("binary ++", "lcat"), ("binary +", "iadd"), ("binary <", "icmp")] {
        map.insert(
            op.to_string(),
            DefValue {
                location: at,
                body: Expr::lambda(at, "l", Expr::lambda(at, "r", Expr::prim(at, prim))),
            },
        );
    }
    DefMap {
        location: at,
        map,
        publishes: BTreeMap::new(),
        body: Box::new(Expr::literal(at, LitValue::Int(0))),
        flags: Default::default(),
    }
}

fn defmap(file: u32, defs: Vec<(&str, Expr)>, pubs: Vec<(&str, Expr)>) -> DefMap {
    let at = loc(file);
    let mut map = BTreeMap::new();
    for (name, body) in defs {
        map.insert(name.to_string(), DefValue { location: at, body });
    }
    let mut publishes: BTreeMap<String, Vec<PubDef>> = BTreeMap::new();
    for (name, body) in pubs {
        publishes
            .entry(name.to_string())
            .or_default()
            .push(PubDef { location: at, body });
    }
    DefMap {
        location: at,
        map,
        publishes,
        body: Box::new(Expr::literal(at, LitValue::Int(0))),
        flags: Default::default(),
    }
}

/// Bind a program of a prelude plus one user file, every name global.
fn bind_program(user: DefMap, body: Expr) -> BindResult {
    let sums = SumRegistry::standard(loc(0));
    let prims = PrimRegistry::with_builtins();
    let files = vec![prelude(&sums), user];
    let mut globals = rustc_hash::FxHashMap::default();
    for (prefix, file) in files.iter().enumerate() {
        for name in file.map.keys() {
            globals.entry(name.clone()).or_insert(prefix as u32);
        }
    }
    let top = Top {
        location: loc(0),
        defmaps: files,
        globals,
        body: Box::new(body),
    };
    bind(top, &prims, &sums)
}

fn assert_ok(result: &BindResult) -> &Expr {
    assert!(
        result.resolve_errors.is_empty(),
        "resolve errors: {:?}",
        result.resolve_errors
    );
    assert!(
        result.type_errors.is_empty(),
        "type errors: {:?}",
        result.type_errors
    );
    result.root.as_ref().expect("expected a bound root")
}

fn app2(at: Location, f: Expr, a: Expr, b: Expr) -> Expr {
    Expr::app(at, Expr::app(at, f, a), b)
}

fn int(at: Location, i: i64) -> Expr {
    Expr::literal(at, LitValue::Int(i))
}

// ── Frame-coordinate invariant ─────────────────────────────────────────

enum Frame<'a> {
    Lambda(&'a str),
    Binding(&'a DefBinding),
}

/// Walk the resolved tree mirroring the evaluator's frame discipline and
/// check every reference: walking `depth` frames up and indexing at
/// `offset` must land on the definition the reference names.
fn check_coordinates<'a>(expr: &'a Expr, stack: &mut Vec<Frame<'a>>, checked: &mut usize) {
    match expr {
        Expr::VarRef(var) => {
            let binding = var
                .binding
                .unwrap_or_else(|| panic!("unresolved reference `{}`", var.name));
            let frame = &stack[stack.len() - 1 - binding.depth as usize];
            match frame {
                Frame::Lambda(name) => {
                    assert_eq!(binding.offset, 0, "lambda frames have one slot");
                    assert_eq!(*name, var.name, "reference must land on its binder");
                }
                Frame::Binding(def) => {
                    let slot = def
                        .order
                        .get(&var.name)
                        .unwrap_or_else(|| panic!("`{}` missing from its frame", var.name));
                    assert_eq!(slot.index as u32, binding.offset);
                    let is_fun = slot.index >= def.val.len();
                    assert_eq!(
                        matches!(binding.kind, wake_ast::expr::RefKind::Function),
                        is_fun,
                        "reference kind must match the slot class for `{}`",
                        var.name
                    );
                }
            }
            *checked += 1;
        }
        Expr::App(app) => {
            check_coordinates(&app.func, stack, checked);
            check_coordinates(&app.arg, stack, checked);
        }
        Expr::Lambda(lambda) => {
            stack.push(Frame::Lambda(&lambda.name));
            check_coordinates(&lambda.body, stack, checked);
            stack.pop();
        }
        Expr::DefBinding(def) => {
            // Values are evaluated in the enclosing environment.
            for value in &def.val {
                check_coordinates(value, stack, checked);
            }
            stack.push(Frame::Binding(def));
            for fun in &def.fun {
                stack.push(Frame::Lambda(&fun.name));
                check_coordinates(&fun.body, stack, checked);
                stack.pop();
            }
            check_coordinates(&def.body, stack, checked);
            stack.pop();
        }
        _ => {}
    }
}

fn assert_coordinates(root: &Expr) {
    let mut stack = Vec::new();
    let mut checked = 0;
    check_coordinates(root, &mut stack, &mut checked);
    assert!(checked > 0, "the tree should contain references");
}

// ── Inference ──────────────────────────────────────────────────────────

#[test]
fn value_chain_types_as_integer() {
    let at = loc(1);
    let result = bind_program(
        defmap(
            1,
            vec![
                ("x", int(at, 1)),
                (
                    "y",
                    app2(at, Expr::var(at, "binary +"), Expr::var(at, "x"), int(at, 1)),
                ),
            ],
            vec![],
        ),
        Expr::var(at, "y"),
    );
    let root = assert_ok(&result);
    assert_eq!(result.root_type.as_deref(), Some("Integer"));
    assert_coordinates(root);

    let globals: rustc_hash::FxHashMap<&str, &str> = result
        .global_types
        .iter()
        .map(|(n, t)| (n.as_str(), t.as_str()))
        .collect();
    assert_eq!(globals.get("x"), Some(&"Integer"));
    assert_eq!(globals.get("y"), Some(&"Integer"));
    assert_eq!(globals.get("binary +"), Some(&"Integer => Integer => Integer"));
}

#[test]
fn mutually_recursive_functions_type_polymorphically() {
    let at = loc(1);
    let result = bind_program(
        defmap(
            1,
            vec![
                (
                    "f",
                    Expr::lambda(
                        at,
                        "x",
                        Expr::app(at, Expr::var(at, "g"), Expr::var(at, "x")),
                    ),
                ),
                (
                    "g",
                    Expr::lambda(
                        at,
                        "y",
                        Expr::app(at, Expr::var(at, "f"), Expr::var(at, "y")),
                    ),
                ),
            ],
            vec![],
        ),
        Expr::app(at, Expr::var(at, "f"), int(at, 3)),
    );
    let root = assert_ok(&result);
    // The result of `f 3` stays an unconstrained variable.
    assert_eq!(result.root_type.as_deref(), Some("a"));
    assert_coordinates(root);

    let globals: rustc_hash::FxHashMap<&str, &str> = result
        .global_types
        .iter()
        .map(|(n, t)| (n.as_str(), t.as_str()))
        .collect();
    assert_eq!(globals.get("f"), Some(&"a => b"));
}

#[test]
fn generalized_function_is_usable_at_two_types() {
    let at = loc(1);
    // first (id 1) (id "s") -- fails unless id is let-polymorphic.
    let result = bind_program(
        defmap(
            1,
            vec![
                ("id", Expr::lambda(at, "x", Expr::var(at, "x"))),
                (
                    "first",
                    Expr::lambda(at, "a", Expr::lambda(at, "b", Expr::var(at, "a"))),
                ),
            ],
            vec![],
        ),
        app2(
            at,
            Expr::var(at, "first"),
            Expr::app(at, Expr::var(at, "id"), int(at, 1)),
            Expr::app(
                at,
                Expr::var(at, "id"),
                Expr::literal(at, LitValue::Str("s".into())),
            ),
        ),
    );
    assert_ok(&result);
    assert_eq!(result.root_type.as_deref(), Some("Integer"));
}

#[test]
fn self_recursion_within_a_group_stays_monomorphic() {
    let at = loc(1);
    // f = \x f (f x) -- argument and result of f must unify.
    let result = bind_program(
        defmap(
            1,
            vec![(
                "f",
                Expr::lambda(
                    at,
                    "x",
                    Expr::app(
                        at,
                        Expr::var(at, "f"),
                        Expr::app(at, Expr::var(at, "f"), Expr::var(at, "x")),
                    ),
                ),
            )],
            vec![],
        ),
        Expr::app(at, Expr::var(at, "f"), int(at, 1)),
    );
    assert_ok(&result);
    assert_eq!(result.root_type.as_deref(), Some("Integer"));
    let globals: rustc_hash::FxHashMap<&str, &str> = result
        .global_types
        .iter()
        .map(|(n, t)| (n.as_str(), t.as_str()))
        .collect();
    assert_eq!(globals.get("f"), Some(&"a => a"));
}

#[test]
fn unbound_reference_is_reported_by_the_type_pass() {
    let at = loc(1);
    let result = bind_program(defmap(1, vec![], vec![]), Expr::var(at, "nope"));
    assert!(result.root.is_none());
    assert!(result
        .type_errors
        .iter()
        .any(|e| matches!(e, TypeError::Unbound { name, .. } if name == "nope")));
}

#[test]
fn applying_a_literal_is_a_function_position_error() {
    let at = loc(1);
    let result = bind_program(
        defmap(1, vec![], vec![]),
        Expr::app(at, int(at, 1), int(at, 2)),
    );
    assert!(result.root.is_none());
    assert!(result.type_errors.iter().any(|e| matches!(
        e,
        TypeError::Mismatch {
            context: ErrorContext::Function { .. },
            ..
        }
    )));
}

#[test]
fn argument_mismatch_reports_both_sides() {
    let at = loc(1);
    // binary + "s" 1 -- the first argument must be an Integer.
    let result = bind_program(
        defmap(1, vec![], vec![]),
        app2(
            at,
            Expr::var(at, "binary +"),
            Expr::literal(at, LitValue::Str("s".into())),
            int(at, 1),
        ),
    );
    assert!(result.root.is_none());
    let (has_type, used_as) = result
        .type_errors
        .iter()
        .find_map(|e| match e {
            TypeError::Mismatch {
                context: ErrorContext::Argument { .. },
                has_type,
                used_as,
            } => Some((has_type.as_str(), used_as.as_str())),
            _ => None,
        })
        .expect("expected an argument mismatch");
    assert_eq!(has_type, "Integer");
    assert_eq!(used_as, "String");
}

#[test]
fn primitive_arity_counts_open_enclosing_lambdas() {
    let at = loc(1);
    let result = bind_program(
        defmap(1, vec![], vec![]),
        Expr::app(at, Expr::var(at, "binary +"), int(at, 1)),
    );
    let root = assert_ok(&result);

    // Find the `binary +` lambda chain and its primitive.
    let mut cursor = root;
    let prim = loop {
        match cursor {
            Expr::DefBinding(def) => {
                if let Some(slot) = def.order.get("binary +") {
                    let mut body: &Expr = &def.fun[slot.index - def.val.len()].body;
                    while let Expr::Lambda(inner) = body {
                        body = &inner.body;
                    }
                    break body;
                }
                cursor = &def.body;
            }
            other => panic!("expected a binding stack, found {other:?}"),
        }
    };
    let Expr::Prim(prim) = prim else {
        panic!("expected the operator to end in a primitive");
    };
    let resolved = prim.resolved.expect("primitive must be settled");
    assert_eq!(resolved.arity, 2);
    assert!(resolved.flags.contains(PrimFlags::PURE));
}

#[test]
fn unknown_primitive_is_reported() {
    let at = loc(1);
    let result = bind_program(
        defmap(
            1,
            vec![("p", Expr::lambda(at, "a", Expr::prim(at, "nosuch")))],
            vec![],
        ),
        Expr::var(at, "p"),
    );
    assert!(result.root.is_none());
    assert!(result
        .type_errors
        .iter()
        .any(|e| matches!(e, TypeError::UnknownPrimitive { name, .. } if name == "nosuch")));
}

// ── Pattern matching end-to-end ────────────────────────────────────────

fn match_expr(at: Location, args: Vec<Expr>, arms: Vec<(Vec<Pattern>, Option<Expr>, Expr)>) -> Expr {
    Expr::Match(Match {
        location: at,
        args,
        arms: arms
            .into_iter()
            .map(|(patterns, guard, body)| MatchArm {
                patterns,
                guard,
                body,
            })
            .collect(),
    })
}

#[test]
fn option_match_types_as_its_arm_bodies() {
    let at = loc(1);
    let scrutinee = Expr::app(at, Expr::var(at, "Some"), int(at, 5));
    let m = match_expr(
        at,
        vec![scrutinee],
        vec![
            (
                vec![Pattern::cons("Some", vec![Pattern::bind("x", at)], at)],
                None,
                Expr::var(at, "x"),
            ),
            (
                vec![Pattern::cons("None", vec![], at)],
                None,
                int(at, 0),
            ),
        ],
    );
    let result = bind_program(defmap(1, vec![("m", m)], vec![]), Expr::var(at, "m"));
    let root = assert_ok(&result);
    assert_eq!(result.root_type.as_deref(), Some("Integer"));
    assert_coordinates(root);
}

#[test]
fn guarded_match_requires_a_boolean_guard() {
    let at = loc(1);
    let m = match_expr(
        at,
        vec![Expr::app(at, Expr::var(at, "Some"), int(at, 1))],
        vec![
            (
                vec![Pattern::cons("Some", vec![Pattern::bind("x", at)], at)],
                Some(app2(
                    at,
                    Expr::var(at, "binary <"),
                    Expr::var(at, "x"),
                    int(at, 2),
                )),
                Expr::var(at, "x"),
            ),
            (
                vec![Pattern::wildcard(at)],
                None,
                int(at, 0),
            ),
        ],
    );
    let result = bind_program(defmap(1, vec![("m", m)], vec![]), Expr::var(at, "m"));
    let root = assert_ok(&result);
    assert_eq!(result.root_type.as_deref(), Some("Integer"));
    assert_coordinates(root);
}

#[test]
fn mismatched_arm_bodies_are_a_type_error() {
    let at = loc(1);
    let m = match_expr(
        at,
        vec![Expr::app(at, Expr::var(at, "Some"), int(at, 1))],
        vec![
            (
                vec![Pattern::cons("Some", vec![Pattern::bind("x", at)], at)],
                None,
                Expr::var(at, "x"),
            ),
            (
                vec![Pattern::cons("None", vec![], at)],
                None,
                Expr::literal(at, LitValue::Str("empty".into())),
            ),
        ],
    );
    let result = bind_program(defmap(1, vec![("m", m)], vec![]), Expr::var(at, "m"));
    assert!(result.root.is_none());
    assert!(!result.type_errors.is_empty());
}

// ── Publish / subscribe end-to-end ─────────────────────────────────────

#[test]
fn published_lists_type_through_the_chain() {
    let at = loc(1);
    let singleton = app2(
        at,
        Expr::var(at, "Cons"),
        int(at, 1),
        Expr::var(at, "Nil"),
    );
    let result = bind_program(
        defmap(1, vec![], vec![("p", singleton)]),
        Expr::Subscribe(wake_ast::expr::Subscribe {
            location: at,
            name: "p".to_string(),
        }),
    );
    let root = assert_ok(&result);
    assert_eq!(result.root_type.as_deref(), Some("List Integer"));
    assert_coordinates(root);
}

#[test]
fn publishing_a_non_list_fails_the_append_argument() {
    let at = loc(1);
    let result = bind_program(
        defmap(1, vec![], vec![("p", int(at, 1))]),
        Expr::Subscribe(wake_ast::expr::Subscribe {
            location: at,
            name: "p".to_string(),
        }),
    );
    assert!(result.root.is_none());
    assert!(!result.type_errors.is_empty());
}
