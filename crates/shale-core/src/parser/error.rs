//! Parser error type.

use crate::lexer::{Span, TokenKind};

/// A syntax error, carrying the offending token's source position.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// Line of the offending token (1-based).
    pub line: u32,
    /// Column of the offending token (1-based).
    pub column: u32,
}

impl ParseError {
    /// Creates a new parse error at the given position.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }

    /// Creates an "unexpected token" error.
    #[must_use]
    pub fn unexpected(expected: impl Into<String>, found: &TokenKind, span: Span) -> Self {
        Self::new(
            format!("expected {}, found {}", expected.into(), found),
            span,
        )
    }
}
