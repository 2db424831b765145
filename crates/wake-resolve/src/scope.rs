//! The scope resolver.
//!
//! Walks the parsed tree with a stack of resolve frames, rewriting every
//! surface construct into evaluator-facing form:
//!
//! - variable references are rewritten to their qualified names (unbound
//!   ones are left intact for the type pass to report)
//! - `subscribe` becomes a reference to the innermost publish chain
//! - `match` is compiled to destructor dispatch (see the pattern module)
//! - every definition map is fractured into a stack of `DefBinding` levels
//!   (see the fracture module)
//!
//! While a definition's right-hand side is being resolved, its frame
//! remembers which definition is in flight; every name that resolves into
//! that frame records a dependency edge, which is exactly the graph the
//! fracturer levels and SCC-decomposes afterwards.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use wake_ast::expr::{DefMap, Expr, PubDef, Top};
use wake_ast::sum::SumRegistry;
use wake_common::Location;

use crate::error::ResolveError;

/// One definition in a frame being resolved.
pub(crate) struct ResolveDef {
    pub(crate) name: String,
    pub(crate) location: Location,
    /// `None` for lambda parameters, while the definition itself is being
    /// resolved, and permanently after a lowering step failed.
    pub(crate) expr: Option<Expr>,
    /// Definitions in the same frame this one references. Ordered so the
    /// fracturer visits edges deterministically.
    pub(crate) edges: BTreeSet<usize>,
}

impl ResolveDef {
    fn new(name: String, location: Location, expr: Option<Expr>) -> Self {
        ResolveDef {
            name,
            location,
            expr,
            edges: BTreeSet::new(),
        }
    }
}

/// One level of the scope stack.
pub(crate) struct ResolveFrame {
    /// File prefix for qualified lookup; only the top frame has one, and
    /// it tracks whichever file's definitions are being resolved.
    pub(crate) prefix: Option<u32>,
    /// Nesting depth: incremented at every lambda or definition map.
    pub(crate) depth: u32,
    /// Index of the definition currently being resolved in this frame.
    pub(crate) current: Option<usize>,
    pub(crate) index: FxHashMap<String, usize>,
    pub(crate) defs: Vec<ResolveDef>,
}

impl ResolveFrame {
    fn new(prefix: Option<u32>, depth: u32) -> Self {
        ResolveFrame {
            prefix,
            depth,
            current: None,
            index: FxHashMap::default(),
            defs: Vec::new(),
        }
    }

    fn push_def(&mut self, name: String, location: Location, expr: Option<Expr>) {
        self.index.insert(name.clone(), self.defs.len());
        self.defs.push(ResolveDef::new(name, location, expr));
    }
}

/// The resolver: frame stack, sum registry view, and error sink.
pub(crate) struct Resolver<'a> {
    pub(crate) sums: &'a SumRegistry,
    pub(crate) frames: Vec<ResolveFrame>,
    pub(crate) errors: Vec<ResolveError>,
}

/// Result of resolving a top-level tree. `root` is `None` whenever any
/// error was recorded; no partial tree is surfaced.
pub struct ResolveResult {
    pub root: Option<Expr>,
    pub errors: Vec<ResolveError>,
}

/// Resolve a parsed top-level tree against a sum registry.
pub fn resolve(top: Top, sums: &SumRegistry) -> ResolveResult {
    let mut resolver = Resolver {
        sums,
        frames: Vec::new(),
        errors: Vec::new(),
    };
    let root = resolver.resolve_expr(Expr::Top(top));
    let root = if resolver.errors.is_empty() { root } else { None };
    ResolveResult {
        root,
        errors: resolver.errors,
    }
}

impl<'a> Resolver<'a> {
    // ── Name lookup ─────────────────────────────────────────────────────

    /// Try `key` in one frame. On a hit, record a dependency edge from the
    /// definition that frame is currently resolving (if any) to the target.
    fn reference_frame(&mut self, fi: usize, key: &str) -> bool {
        let frame = &mut self.frames[fi];
        match frame.index.get(key) {
            Some(&target) => {
                if let Some(current) = frame.current {
                    frame.defs[current].edges.insert(target);
                }
                true
            }
            None => false,
        }
    }

    /// Resolve a reference, rewriting `name` to its qualified form. At each
    /// frame the file-qualified key is tried before the bare key, so
    /// same-file definitions win over globals of the same name.
    pub(crate) fn rebind_ref(&mut self, name: &mut String) -> bool {
        for fi in (0..self.frames.len()).rev() {
            if let Some(prefix) = self.frames[fi].prefix {
                let qualified = format!("{prefix} {name}");
                if self.reference_frame(fi, &qualified) {
                    *name = qualified;
                    return true;
                }
            }
            if self.reference_frame(fi, name.as_str()) {
                return true;
            }
        }
        false
    }

    /// Replace a subscribe with a reference to the innermost publish chain
    /// for `name`, or to the constant `Nil` if nobody publishes it.
    pub(crate) fn rebind_subscribe(&mut self, location: Location, name: &str) -> Expr {
        for fi in (0..self.frames.len()).rev() {
            let key = format!("publish {} {}", self.frames[fi].depth, name);
            if self.reference_frame(fi, &key) {
                return Expr::var(location, key);
            }
        }
        Expr::var(location, "Nil")
    }

    // ── Publish lowering ────────────────────────────────────────────────

    /// Lower the publish declarations of one definition map into chained
    /// definitions on the newest frame.
    ///
    /// Each published body becomes `binary ++ body tail`. The per-file list
    /// is folded from the back, so the last publish in a file sits at the
    /// tail end of the chain, and the previous holder of the channel name
    /// is renamed to a fresh `publish <d> <k> <n>` alias each time the head
    /// moves.
    fn chain_publish(
        &mut self,
        pubs: std::collections::BTreeMap<String, Vec<PubDef>>,
        chain: &mut u32,
    ) {
        let fi = self.frames.len() - 1;
        let depth = self.frames[fi].depth;
        for (pub_name, bodies) in pubs {
            let key = format!("publish {depth} {pub_name}");
            for published in bodies.into_iter().rev() {
                let at = published.body.location();
                let tail = match self.frames[fi].index.get(&key).copied() {
                    None => self.rebind_subscribe(at, &pub_name),
                    Some(previous) => {
                        *chain += 1;
                        let alias = format!("publish {depth} {chain} {pub_name}");
                        let frame = &mut self.frames[fi];
                        frame.index.insert(alias.clone(), previous);
                        frame.defs[previous].name = alias.clone();
                        Expr::var(at, alias)
                    }
                };
                let append = Expr::app(
                    at,
                    Expr::app(at, Expr::var(at, "binary ++"), published.body),
                    tail,
                );
                self.frames[fi].push_def(key.clone(), published.location, Some(append));
            }
        }
    }

    // ── The walk ────────────────────────────────────────────────────────

    /// Resolve one expression, returning the rewritten tree or `None` if a
    /// lowering step inside it failed (the failure is already recorded).
    pub(crate) fn resolve_expr(&mut self, expr: Expr) -> Option<Expr> {
        match expr {
            Expr::VarRef(mut var) => {
                // Unbound names stay put; the type pass reports them.
                self.rebind_ref(&mut var.name);
                Some(Expr::VarRef(var))
            }
            Expr::Subscribe(sub) => {
                let mut out = self.rebind_subscribe(sub.location, &sub.name);
                out.mark_source();
                Some(out)
            }
            Expr::App(mut app) => {
                let func = self.resolve_expr(*app.func)?;
                let arg = self.resolve_expr(*app.arg)?;
                app.func = Box::new(func);
                app.arg = Box::new(arg);
                Some(Expr::App(app))
            }
            Expr::Lambda(mut lambda) => {
                let depth = self.frames.last().map_or(0, |f| f.depth + 1);
                let mut frame = ResolveFrame::new(None, depth);
                frame.push_def(lambda.name.clone(), lambda.location, None);
                frame.current = Some(0);
                self.frames.push(frame);
                let body = self.resolve_expr(*lambda.body);
                self.frames.pop();
                lambda.body = Box::new(body?);
                Some(Expr::Lambda(lambda))
            }
            Expr::Match(m) => {
                let compiled = self.rebind_match(m)?;
                let mut compiled = compiled;
                compiled.mark_source();
                self.resolve_expr(compiled)
            }
            Expr::DefMap(def) => self.resolve_defmap(def),
            Expr::Top(top) => self.resolve_top(top),
            // Literal / Prim / Construct / Destruct have no names to bind.
            other => Some(other),
        }
    }

    fn resolve_defmap(&mut self, def: DefMap) -> Option<Expr> {
        let DefMap {
            location,
            map,
            publishes,
            body,
            flags,
        } = def;
        let depth = self.frames.last().map_or(0, |f| f.depth + 1);
        self.frames.push(ResolveFrame::new(None, depth));
        for (name, value) in map {
            let fi = self.frames.len() - 1;
            self.frames[fi].push_def(name, value.location, Some(value.body));
        }
        let mut chain = 0;
        self.chain_publish(publishes, &mut chain);

        let out = self.resolve_frame_defs_and_body(location, *body);
        match out {
            Some(mut out) => {
                if flags.contains(wake_ast::expr::ExprFlags::SOURCE) {
                    out.mark_source();
                }
                Some(out)
            }
            None => None,
        }
    }

    fn resolve_top(&mut self, top: Top) -> Option<Expr> {
        let Top {
            location,
            defmaps,
            globals,
            body,
        } = top;
        let depth = self.frames.last().map_or(0, |f| f.depth + 1);
        self.frames.push(ResolveFrame::new(Some(0), depth));

        let file_count = defmaps.len() as u32;
        let mut chain = 0;
        let mut defs_per_file = Vec::with_capacity(defmaps.len());
        for (prefix, defmap) in defmaps.into_iter().enumerate() {
            let prefix = prefix as u32;
            let fi = self.frames.len() - 1;
            self.frames[fi].prefix = Some(prefix);
            let mut count = defmap.map.len();
            for bodies in defmap.publishes.values() {
                count += bodies.len();
            }
            for (name, value) in defmap.map {
                // The owning file gets the global name; everyone else's
                // definition of it is file-local.
                let key = if globals.get(&name) == Some(&prefix) {
                    name
                } else {
                    format!("{prefix} {name}")
                };
                self.frames[fi].push_def(key, value.location, Some(value.body));
            }
            self.chain_publish(defmap.publishes, &mut chain);
            defs_per_file.push(count);
        }

        // Resolve each file's definitions under that file's prefix.
        let mut di = 0;
        for (prefix, count) in defs_per_file.into_iter().enumerate() {
            let fi = self.frames.len() - 1;
            self.frames[fi].prefix = Some(prefix as u32);
            for _ in 0..count {
                self.resolve_def_at(di);
                di += 1;
            }
        }

        // The top body sees only global names.
        let fi = self.frames.len() - 1;
        self.frames[fi].prefix = Some(file_count);
        self.frames[fi].current = None;
        self.resolve_frame_body(location, *body)
    }

    /// Resolve definition `di` of the newest frame in place.
    fn resolve_def_at(&mut self, di: usize) {
        let fi = self.frames.len() - 1;
        self.frames[fi].current = Some(di);
        let taken = self.frames[fi].defs[di].expr.take();
        let resolved = taken.and_then(|e| self.resolve_expr(e));
        let fi = self.frames.len() - 1;
        self.frames[fi].defs[di].expr = resolved;
    }

    /// Resolve all definitions of the newest frame, then its body, then
    /// fracture the frame into a `DefBinding` stack.
    fn resolve_frame_defs_and_body(&mut self, location: Location, body: Expr) -> Option<Expr> {
        let count = self.frames.last().map_or(0, |f| f.defs.len());
        for di in 0..count {
            self.resolve_def_at(di);
        }
        let fi = self.frames.len() - 1;
        self.frames[fi].current = None;
        self.resolve_frame_body(location, body)
    }

    fn resolve_frame_body(&mut self, location: Location, body: Expr) -> Option<Expr> {
        let body = self.resolve_expr(body);
        let frame = self.frames.pop().expect("a frame was pushed for this map");
        let body = body?;
        self.fracture_binding(location, frame.defs, body)
    }
}
