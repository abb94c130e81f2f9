//! The pattern-matching / term-rewriting engine: commutative, capture-binding tree matching
//! and fixed-point simplification over ordered rule sets.

mod pattern_match;
mod registry;
mod rule;

pub use pattern_match::{match_pattern, Captures};
pub use registry::{collect_ruleset, default_rulesets, Ruleset};
pub use rule::Rule;

use crate::common::Span;
use crate::diagnostics::Diagnostic;

use core::fmt;
use std::error::Error;

/// A rewrite-engine failure.
#[derive(Clone, Debug, PartialEq)]
pub enum RewriteError {
    /// A rule string that does not scan, parse, or is empty.
    InvalidRule { source: String, message: String },
    /// A `pattern ; name` binding whose right side is not a name.
    MalformedBinding { found: String },
    /// Rule application revisited an identical intermediate tree; the rule set does not
    /// terminate on this input.
    StuckInLoop { expr: String },
    /// An `eval(...)` escape inside a simplified tree failed to evaluate.
    EvalEscape { message: String },
}

impl RewriteError {
    /// Lowers the error into a [Diagnostic] anchored at `span`.
    pub fn diagnostic<S: Into<Span>>(&self, span: S) -> Diagnostic {
        let diag = Diagnostic::span_err(span, "Rewrite error", self.to_string());
        match self {
            RewriteError::StuckInLoop { .. } => {
                diag.with_note("the rule set keeps producing a tree it has already produced")
            }
            RewriteError::MalformedBinding { .. } => {
                diag.with_help("the right side of \";\" names the capture, like \"?;x\"")
            }
            _ => diag,
        }
    }
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteError::InvalidRule { source, message } => {
                write!(f, "Invalid rule \"{}\": {}", source, message)
            }
            RewriteError::MalformedBinding { found } => {
                write!(f, "The right side of a \";\" binding must be a name, found \"{}\"", found)
            }
            RewriteError::StuckInLoop { expr } => {
                write!(f, "Rule application is stuck in a loop on \"{}\"", expr)
            }
            RewriteError::EvalEscape { message } => {
                write!(f, "Could not evaluate an eval(...) escape: {}", message)
            }
        }
    }
}

impl Error for RewriteError {}
