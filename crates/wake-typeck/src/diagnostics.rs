//! Ariadne-based diagnostic rendering.
//!
//! Renders resolution and type errors into formatted, labeled reports.
//! Output is terse, with error codes and labeled source spans; type
//! mismatches get the two-sided "has type ... but is used as ..." layout.
//! With `json` set, each diagnostic renders instead as one JSON object per
//! line for tooling.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use wake_common::{Location, SourceMap};
use wake_resolve::ResolveError;

use crate::error::{ErrorContext, TypeError};

/// Rendering configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticOptions {
    /// Colorize human-readable output.
    pub color: bool,
    /// Emit one JSON object per diagnostic instead of human-readable text.
    pub json: bool,
}

// ── Error codes ────────────────────────────────────────────────────────

fn resolve_error_code(error: &ResolveError) -> &'static str {
    match error {
        ResolveError::ValueCycle { .. } => "E0001",
        ResolveError::NonExhaustiveMatch { .. } => "E0002",
        ResolveError::UnknownConstructor { .. } => "E0003",
        ResolveError::ConstructorArity { .. } => "E0004",
        ResolveError::ForeignConstructor { .. } => "E0005",
        ResolveError::UnreachablePattern { .. } => "E0006",
    }
}

fn type_error_code(error: &TypeError) -> &'static str {
    match error {
        TypeError::Unbound { .. } => "E0007",
        TypeError::UnknownPrimitive { .. } => "E0008",
        TypeError::PrimitiveSignature { .. } => "E0009",
        TypeError::Mismatch { context, .. } => match context {
            ErrorContext::Function { .. } => "E0010",
            ErrorContext::Argument { .. } => "E0011",
            ErrorContext::RecursiveReturn { .. } => "E0012",
            ErrorContext::Expression { .. } => "E0013",
        },
        TypeError::InfiniteType { .. } => "E0014",
    }
}

// ── Span helpers ───────────────────────────────────────────────────────

fn location_range(location: Location, source_len: usize) -> Range<usize> {
    let start = (location.span.start as usize).min(source_len);
    let end = (location.span.end as usize).min(source_len).max(start);
    if start == end {
        // Ariadne needs at least a one-character span.
        start..end.saturating_add(1).min(source_len.max(1))
    } else {
        start..end
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

struct Piece {
    location: Location,
    label: String,
    primary: bool,
}

fn render(
    code: &'static str,
    message: String,
    pieces: Vec<Piece>,
    help: Option<String>,
    sources: &SourceMap,
    options: &DiagnosticOptions,
) -> String {
    let primary = pieces
        .iter()
        .find(|p| p.primary)
        .or_else(|| pieces.first())
        .map(|p| p.location);

    if options.json {
        let spans: Vec<serde_json::Value> = pieces
            .iter()
            .map(|p| {
                serde_json::json!({
                    "file": sources.name(p.location.file),
                    "start": p.location.span.start,
                    "end": p.location.span.end,
                    "label": p.label,
                })
            })
            .collect();
        let file = primary.map(|l| sources.name(l.file)).unwrap_or("");
        return serde_json::json!({
            "code": code,
            "severity": "error",
            "message": message,
            "file": file,
            "spans": spans,
            "fix": help,
        })
        .to_string();
    }

    let Some(primary) = primary else {
        return format!("error[{code}]: {message}");
    };
    let text = sources.text(primary.file);
    let config = Config::default().with_color(options.color);
    let span = location_range(primary, text.len());

    let mut builder = Report::build(ReportKind::Error, span)
        .with_code(code)
        .with_message(&message)
        .with_config(config);
    for piece in &pieces {
        // Ariadne renders against one source; keep labels in the primary
        // file and fold foreign-file context into the message instead.
        if piece.location.file != primary.file {
            continue;
        }
        let range = location_range(piece.location, text.len());
        let color = if piece.primary { Color::Red } else { Color::Blue };
        builder.add_label(Label::new(range).with_message(&piece.label).with_color(color));
    }
    if let Some(help) = help {
        builder.set_help(help);
    }
    let report = builder.finish();

    let mut buf = Vec::new();
    report
        .write(Source::from(text), &mut buf)
        .expect("diagnostic rendering cannot fail on an in-memory buffer");
    let mut out = String::from_utf8(buf).expect("ariadne emits UTF-8");
    out.insert_str(0, &format!("at {}\n", sources.describe(primary)));
    out
}

/// Render a resolution error.
pub fn render_resolve_error(
    error: &ResolveError,
    sources: &SourceMap,
    options: &DiagnosticOptions,
) -> String {
    let code = resolve_error_code(error);
    let message = error.to_string();
    let (pieces, help) = match error {
        ResolveError::ValueCycle { members } => {
            let pieces = members
                .iter()
                .enumerate()
                .map(|(i, (name, location))| Piece {
                    location: *location,
                    label: format!("`{name}` is part of the cycle"),
                    primary: i == 0,
                })
                .collect();
            (
                pieces,
                Some("break the cycle by turning one definition into a function".to_string()),
            )
        }
        ResolveError::NonExhaustiveMatch { location, missing } => (
            vec![Piece {
                location: *location,
                label: format!("no arm matches `{missing}`"),
                primary: true,
            }],
            Some(format!("add an arm for `{missing}`")),
        ),
        ResolveError::UnknownConstructor { name, location } => (
            vec![Piece {
                location: *location,
                label: format!("`{name}` is not a known constructor"),
                primary: true,
            }],
            None,
        ),
        ResolveError::ConstructorArity {
            location,
            given,
            expected,
            ..
        } => (
            vec![Piece {
                location: *location,
                label: format!("has {given} parameters, needs {expected}"),
                primary: true,
            }],
            None,
        ),
        ResolveError::ForeignConstructor { name, sum, location } => (
            vec![Piece {
                location: *location,
                label: format!("`{name}` does not belong to `{sum}`"),
                primary: true,
            }],
            None,
        ),
        ResolveError::UnreachablePattern { location } => (
            vec![Piece {
                location: *location,
                label: "this arm can never be selected".to_string(),
                primary: true,
            }],
            Some("earlier arms already cover every case".to_string()),
        ),
    };
    render(code, message, pieces, help, sources, options)
}

/// Render a type error.
pub fn render_type_error(
    error: &TypeError,
    sources: &SourceMap,
    options: &DiagnosticOptions,
) -> String {
    let code = type_error_code(error);
    let message = error.to_string();
    let pieces = match error {
        TypeError::Unbound { name, location } => vec![Piece {
            location: *location,
            label: format!("`{name}` not found in any enclosing scope"),
            primary: true,
        }],
        TypeError::UnknownPrimitive { name, location } => vec![Piece {
            location: *location,
            label: format!("no primitive named `{name}` is registered"),
            primary: true,
        }],
        TypeError::PrimitiveSignature { location, .. } => vec![Piece {
            location: *location,
            label: "used at a type its registration rejects".to_string(),
            primary: true,
        }],
        TypeError::Mismatch {
            context,
            has_type,
            used_as,
        }
        | TypeError::InfiniteType {
            context,
            has_type,
            used_as,
        } => match context {
            ErrorContext::Function { location } => vec![Piece {
                location: *location,
                label: format!("has type `{has_type}` but is applied as a function"),
                primary: true,
            }],
            ErrorContext::Argument {
                function,
                argument,
                param,
            } => {
                let expected = match param {
                    Some(param) => format!("expects argument `{param}` of type `{has_type}`"),
                    None => format!("expects an argument of type `{has_type}`"),
                };
                vec![
                    Piece {
                        location: *argument,
                        label: format!("this argument has type `{used_as}`"),
                        primary: true,
                    },
                    Piece {
                        location: *function,
                        label: expected,
                        primary: false,
                    },
                ]
            }
            ErrorContext::RecursiveReturn { location } => vec![Piece {
                location: *location,
                label: format!("returns `{used_as}`, recursion requires `{has_type}`"),
                primary: true,
            }],
            ErrorContext::Expression { location } => vec![Piece {
                location: *location,
                label: format!("has type `{has_type}` but is used as `{used_as}`"),
                primary: true,
            }],
        },
    };
    render(code, message, pieces, None, sources, options)
}
