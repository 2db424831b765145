//! The wake frontend's type pass and pipeline entry.
//!
//! [`bind`] is the whole frontend in one call: it resolves a parsed
//! top-level tree (scope resolution, pattern compilation, binding
//! fracturing -- see `wake-resolve`) and then runs unification-based type
//! inference over the result. The returned [`BindResult`] either carries a
//! fully resolved, typed root expression ready for the evaluator, or the
//! collected errors and no tree at all.
//!
//! # Architecture
//!
//! - [`ty`]: type variables and bound terms (`ena` union-find keys)
//! - [`unify`]: the inference context -- unification, occurs check,
//!   generation stamps, generation-bounded instantiation
//! - [`infer`]: the walk that assigns frame coordinates and infers types,
//!   with generalization per function SCC group
//! - [`prims`]: the primitive registry consumed during inference
//! - [`error`] / [`diagnostics`]: contextual errors and their rendering

pub mod diagnostics;
pub mod error;
pub mod prims;
pub mod ty;
pub mod unify;

mod infer;

use wake_ast::expr::{Expr, Top};
use wake_ast::sum::SumRegistry;
use wake_common::SourceMap;
use wake_resolve::ResolveError;

pub use crate::diagnostics::DiagnosticOptions;
pub use crate::error::{ErrorContext, TypeError};
pub use crate::prims::{PrimDesc, PrimRegistry, PrimTyper};

use crate::infer::Inference;

/// The result of running the frontend over one top-level tree.
///
/// `root` is present only when every pass succeeded; the evaluator must
/// never see a partial tree. Errors from both passes are kept separate so
/// embedders can report them in phase order.
pub struct BindResult {
    /// The resolved, typed root expression.
    pub root: Option<Expr>,
    /// The inferred type of the root expression, rendered.
    pub root_type: Option<String>,
    /// `(name, type)` for every globally visible definition, sorted by
    /// name.
    pub global_types: Vec<(String, String)>,
    pub resolve_errors: Vec<ResolveError>,
    pub type_errors: Vec<TypeError>,
}

impl BindResult {
    /// Whether the frontend succeeded. Any error prevents execution.
    pub fn is_ok(&self) -> bool {
        self.root.is_some() && self.resolve_errors.is_empty() && self.type_errors.is_empty()
    }

    /// Render every collected error, resolution errors first.
    pub fn render_errors(&self, sources: &SourceMap, options: &DiagnosticOptions) -> Vec<String> {
        let mut out = Vec::with_capacity(self.resolve_errors.len() + self.type_errors.len());
        for error in &self.resolve_errors {
            out.push(diagnostics::render_resolve_error(error, sources, options));
        }
        for error in &self.type_errors {
            out.push(diagnostics::render_type_error(error, sources, options));
        }
        out
    }
}

/// Resolve and type-check a parsed top-level tree.
pub fn bind(top: Top, prims: &PrimRegistry, sums: &SumRegistry) -> BindResult {
    let global_names: Vec<String> = top.globals.keys().cloned().collect();

    let resolved = wake_resolve::resolve(top, sums);
    let mut result = BindResult {
        root: None,
        root_type: None,
        global_types: Vec::new(),
        resolve_errors: resolved.errors,
        type_errors: Vec::new(),
    };
    let Some(mut root) = resolved.root else {
        return result;
    };

    let mut inference = Inference::new(prims, sums);
    let (root_var, ok) = inference.explore(&mut root);

    if ok && inference.ctx.errors.is_empty() {
        result.root_type = Some(inference.ctx.format_var(root_var));
        let mut globals: Vec<(String, String)> = global_names
            .into_iter()
            .filter_map(|name| inference.top_types.get(&name).map(|ty| (name, ty.clone())))
            .collect();
        globals.sort();
        result.global_types = globals;
        result.root = Some(root);
    }
    result.type_errors = std::mem::take(&mut inference.ctx.errors);
    result
}
