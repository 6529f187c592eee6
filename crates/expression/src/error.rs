//! Expression errors.

use thiserror::Error;

/// Errors produced while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The source text could not be tokenized.
    #[error("lex error at offset {offset}: {message}")]
    Lex {
        /// Byte offset of the offending character.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// The token stream could not be parsed.
    #[error("parse error at offset {offset}: {message}")]
    Parse {
        /// Byte offset of the offending token.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// An identifier did not resolve to any context root.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// A function name is not in the helper set.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A helper was called with the wrong number of arguments.
    #[error("{function} expects {expected} argument(s), got {got}")]
    Arity {
        /// Helper name.
        function: &'static str,
        /// Expected argument count.
        expected: usize,
        /// Actual argument count.
        got: usize,
    },

    /// An operand had the wrong type.
    #[error("type error: expected {expected}, got {found}")]
    Type {
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        found: &'static str,
    },

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The expression nested deeper than the evaluation cap.
    #[error("maximum expression depth ({0}) exceeded")]
    DepthExceeded(usize),
}

impl ExpressionError {
    /// Build a type error from an expected type name and an actual value.
    #[must_use]
    pub fn type_error(expected: &'static str, found: &serde_json::Value) -> Self {
        Self::Type {
            expected,
            found: crate::value_utils::value_type_name(found),
        }
    }
}
