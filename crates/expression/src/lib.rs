#![forbid(unsafe_code)]

//! # Gantry Expression
//!
//! A small, total, side-effect-free expression language over JSON values,
//! used for edge conditions, input/output mappings, and transform
//! templates. Supported forms:
//!
//! - literals: numbers, strings, `true`, `false`, `null`, arrays
//! - field access (`data.user.name`) and index access (`items[0]`)
//! - arithmetic: `+ - * / %` (with `+` doubling as string concatenation)
//! - comparison: `== != < <= > >=`
//! - boolean: `&& || !`
//! - membership: `x in collection`
//! - a fixed helper set: `len`, `contains`, `lower`, `upper`, `toNumber`,
//!   `toString`
//!
//! There is no user-supplied code execution and no unbounded recursion:
//! evaluation is depth-capped and every operation is total (errors are
//! values, not panics).

pub mod ast;
pub mod context;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value_utils;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use context::EvalContext;
pub use error::ExpressionError;
pub use eval::Evaluator;

use serde_json::Value;

/// Parse and evaluate an expression in one step.
pub fn evaluate(source: &str, context: &EvalContext) -> Result<Value, ExpressionError> {
    let expr = parser::parse(source)?;
    Evaluator::new().eval(&expr, context)
}

/// Parse and evaluate an expression, coercing the result to a boolean via
/// truthiness (null, false, 0, `""`, `[]`, `{}` are falsy).
pub fn evaluate_bool(source: &str, context: &EvalContext) -> Result<bool, ExpressionError> {
    Ok(value_utils::is_truthy(&evaluate(source, context)?))
}
