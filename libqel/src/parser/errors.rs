//! Typed errors produced by the parser.

use crate::common::Span;
use crate::diagnostics::Diagnostic;

use core::fmt;
use std::error::Error;

/// A parse failure.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseError {
    /// An opening or closing bracket with no partner.
    UnmatchedBracket { bracket: char, span: Span },
    /// Two adjacent values with no operator between them.
    MissingOperator { span: Span },
    /// An operator with too few operands.
    MissingOperand { op: String, span: Span },
    /// A function call whose argument list is never closed.
    UnterminatedCall { name: String, span: Span },
    /// A list literal mixing key-pair and plain entries.
    MixedKeyPairs { span: Span },
    /// A comma outside any bracket.
    UnexpectedComma { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnmatchedBracket { span, .. }
            | ParseError::MissingOperator { span }
            | ParseError::MissingOperand { span, .. }
            | ParseError::UnterminatedCall { span, .. }
            | ParseError::MixedKeyPairs { span }
            | ParseError::UnexpectedComma { span } => *span,
        }
    }

    /// Lowers the error into a presentation-agnostic [Diagnostic].
    pub fn diagnostic(&self) -> Diagnostic {
        match self {
            ParseError::UnmatchedBracket { bracket, span } => Diagnostic::span_err(
                *span,
                "Unmatched bracket",
                format!("this '{}' has no partner", bracket),
            ),
            ParseError::MissingOperator { span } => {
                Diagnostic::span_err(*span, "Missing operator", None)
                    .with_note("two values are adjacent with no operator between them")
            }
            ParseError::MissingOperand { op, span } => Diagnostic::span_err(
                *span,
                "Missing operand",
                format!("\"{}\" is missing an operand", op),
            ),
            ParseError::UnterminatedCall { name, span } => Diagnostic::span_err(
                *span,
                "Unterminated function call",
                format!("the argument list of \"{}\" is never closed", name),
            ),
            ParseError::MixedKeyPairs { span } => {
                Diagnostic::span_err(*span, "Mixed list and dictionary entries", None)
                    .with_note("a literal must be all key-pairs (a dictionary) or none (a list)")
            }
            ParseError::UnexpectedComma { span } => {
                Diagnostic::span_err(*span, "Unexpected comma", None)
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnmatchedBracket { bracket, .. } => {
                write!(f, "Unmatched bracket '{}'", bracket)
            }
            ParseError::MissingOperator { .. } => write!(f, "Missing operator between values"),
            ParseError::MissingOperand { op, .. } => {
                write!(f, "Operator \"{}\" is missing an operand", op)
            }
            ParseError::UnterminatedCall { name, .. } => {
                write!(f, "Function call \"{}\" is never closed", name)
            }
            ParseError::MixedKeyPairs { .. } => {
                write!(f, "A literal cannot mix key-pair and plain entries")
            }
            ParseError::UnexpectedComma { .. } => write!(f, "Unexpected comma"),
        }
    }
}

impl Error for ParseError {}
