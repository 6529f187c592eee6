//! AST evaluation.

use serde_json::Value;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::context::EvalContext;
use crate::error::ExpressionError;
use crate::value_utils::{is_truthy, number_as_f64, value_type_name};

/// Maximum recursion depth for expression evaluation.
const MAX_DEPTH: usize = 64;

/// Evaluator for expression ASTs. Stateless; total over all inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    /// Create a new evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Evaluate an expression in the given context.
    pub fn eval(&self, expr: &Expr, context: &EvalContext) -> Result<Value, ExpressionError> {
        self.eval_depth(expr, context, 0)
    }

    fn eval_depth(
        &self,
        expr: &Expr,
        context: &EvalContext,
        depth: usize,
    ) -> Result<Value, ExpressionError> {
        if depth > MAX_DEPTH {
            return Err(ExpressionError::DepthExceeded(MAX_DEPTH));
        }
        match expr {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Identifier(name) => context
                .resolve(name)
                .cloned()
                .ok_or_else(|| ExpressionError::UnknownIdentifier(name.clone())),

            Expr::Property { object, property } => {
                let obj = self.eval_depth(object, context, depth + 1)?;
                match obj {
                    // Missing fields evaluate to null, so conditions can
                    // probe optional payload shapes without erroring.
                    Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
                    Value::Null => Ok(Value::Null),
                    other => Err(ExpressionError::type_error("object", &other)),
                }
            }

            Expr::Index { object, index } => {
                let obj = self.eval_depth(object, context, depth + 1)?;
                let idx = self.eval_depth(index, context, depth + 1)?;
                match (&obj, &idx) {
                    (Value::Array(items), Value::Number(n)) => {
                        let i = n
                            .as_i64()
                            .ok_or_else(|| ExpressionError::type_error("integer index", &idx))?;
                        let len = items.len() as i64;
                        // Negative indices count from the end.
                        let effective = if i < 0 { len + i } else { i };
                        if effective < 0 || effective >= len {
                            Ok(Value::Null)
                        } else {
                            Ok(items[effective as usize].clone())
                        }
                    }
                    (Value::Object(map), Value::String(key)) => {
                        Ok(map.get(key).cloned().unwrap_or(Value::Null))
                    }
                    (Value::Null, _) => Ok(Value::Null),
                    _ => Err(ExpressionError::Type {
                        expected: "array with integer index or object with string key",
                        found: value_type_name(&obj),
                    }),
                }
            }

            Expr::Unary { op, operand } => {
                let value = self.eval_depth(operand, context, depth + 1)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!is_truthy(&value))),
                    UnaryOp::Neg => match &value {
                        Value::Number(n) => {
                            if let Some(i) = n.as_i64() {
                                Ok(Value::from(-i))
                            } else if let Some(f) = n.as_f64() {
                                Ok(serde_json::json!(-f))
                            } else {
                                Err(ExpressionError::type_error("number", &value))
                            }
                        }
                        _ => Err(ExpressionError::type_error("number", &value)),
                    },
                }
            }

            Expr::Binary { left, op, right } => {
                // Short-circuit the logical operators.
                match op {
                    BinaryOp::And => {
                        let l = self.eval_depth(left, context, depth + 1)?;
                        if !is_truthy(&l) {
                            return Ok(Value::Bool(false));
                        }
                        let r = self.eval_depth(right, context, depth + 1)?;
                        return Ok(Value::Bool(is_truthy(&r)));
                    }
                    BinaryOp::Or => {
                        let l = self.eval_depth(left, context, depth + 1)?;
                        if is_truthy(&l) {
                            return Ok(Value::Bool(true));
                        }
                        let r = self.eval_depth(right, context, depth + 1)?;
                        return Ok(Value::Bool(is_truthy(&r)));
                    }
                    _ => {}
                }
                let l = self.eval_depth(left, context, depth + 1)?;
                let r = self.eval_depth(right, context, depth + 1)?;
                eval_binary(*op, &l, &r)
            }

            Expr::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_depth(arg, context, depth + 1)?);
                }
                call_helper(name, &values)
            }

            Expr::Array(elements) => {
                let values: Result<Vec<_>, _> = elements
                    .iter()
                    .map(|e| self.eval_depth(e, context, depth + 1))
                    .collect();
                Ok(Value::Array(values?))
            }
        }
    }
}

fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match op {
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited by caller"),
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, left, right),
        BinaryOp::In => eval_in(left, right),
        BinaryOp::Add => eval_add(left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            eval_arithmetic(op, left, right)
        }
    }
}

/// Equality with numeric cross-representation tolerance (`1 == 1.0`).
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (number_as_f64(l), number_as_f64(r)) {
            (Some(lf), Some(rf)) => lf == rf,
            _ => l == r,
        },
        _ => left == right,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            let lf = number_as_f64(l).ok_or_else(|| ExpressionError::type_error("number", left))?;
            let rf =
                number_as_f64(r).ok_or_else(|| ExpressionError::type_error("number", right))?;
            lf.partial_cmp(&rf)
                .ok_or(ExpressionError::Type { expected: "comparable number", found: "NaN" })?
        }
        (Value::String(l), Value::String(r)) => l.cmp(r),
        _ => {
            return Err(ExpressionError::Type {
                expected: "two numbers or two strings",
                found: value_type_name(if left.is_number() || left.is_string() {
                    right
                } else {
                    left
                }),
            });
        }
    };
    Ok(Value::Bool(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => unreachable!("compare only handles ordering operators"),
    }))
}

fn eval_in(item: &Value, collection: &Value) -> Result<Value, ExpressionError> {
    match collection {
        Value::Array(items) => Ok(Value::Bool(items.iter().any(|v| loose_eq(v, item)))),
        Value::Object(map) => match item {
            Value::String(key) => Ok(Value::Bool(map.contains_key(key))),
            other => Err(ExpressionError::type_error("string key", other)),
        },
        Value::String(haystack) => match item {
            Value::String(needle) => Ok(Value::Bool(haystack.contains(needle.as_str()))),
            other => Err(ExpressionError::type_error("string", other)),
        },
        other => Err(ExpressionError::type_error("array, object, or string", other)),
    }
}

fn eval_add(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            if let (Some(li), Some(ri)) = (l.as_i64(), r.as_i64()) {
                return Ok(Value::from(li.wrapping_add(ri)));
            }
            let lf = number_as_f64(l).ok_or_else(|| ExpressionError::type_error("number", left))?;
            let rf =
                number_as_f64(r).ok_or_else(|| ExpressionError::type_error("number", right))?;
            Ok(serde_json::json!(lf + rf))
        }
        (Value::String(l), r) => Ok(Value::String(format!("{l}{}", stringify_scalar(r)?))),
        (l, Value::String(r)) => Ok(Value::String(format!("{}{r}", stringify_scalar(l)?))),
        _ => Err(ExpressionError::Type {
            expected: "numbers or strings",
            found: value_type_name(left),
        }),
    }
}

fn eval_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    let (Value::Number(l), Value::Number(r)) = (left, right) else {
        let bad = if left.is_number() { right } else { left };
        return Err(ExpressionError::type_error("number", bad));
    };

    if let (Some(li), Some(ri)) = (l.as_i64(), r.as_i64()) {
        return match op {
            BinaryOp::Sub => Ok(Value::from(li.wrapping_sub(ri))),
            BinaryOp::Mul => Ok(Value::from(li.wrapping_mul(ri))),
            BinaryOp::Div => {
                if ri == 0 {
                    Err(ExpressionError::DivisionByZero)
                } else if li % ri == 0 {
                    Ok(Value::from(li / ri))
                } else {
                    Ok(serde_json::json!(li as f64 / ri as f64))
                }
            }
            BinaryOp::Mod => {
                if ri == 0 {
                    Err(ExpressionError::DivisionByZero)
                } else {
                    Ok(Value::from(li % ri))
                }
            }
            _ => unreachable!("arithmetic only"),
        };
    }

    let lf = number_as_f64(l).ok_or_else(|| ExpressionError::type_error("number", left))?;
    let rf = number_as_f64(r).ok_or_else(|| ExpressionError::type_error("number", right))?;
    match op {
        BinaryOp::Sub => Ok(serde_json::json!(lf - rf)),
        BinaryOp::Mul => Ok(serde_json::json!(lf * rf)),
        BinaryOp::Div => {
            if rf == 0.0 {
                Err(ExpressionError::DivisionByZero)
            } else {
                Ok(serde_json::json!(lf / rf))
            }
        }
        BinaryOp::Mod => {
            if rf == 0.0 {
                Err(ExpressionError::DivisionByZero)
            } else {
                Ok(serde_json::json!(lf % rf))
            }
        }
        _ => unreachable!("arithmetic only"),
    }
}

fn stringify_scalar(value: &Value) -> Result<String, ExpressionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        other => Err(ExpressionError::type_error("scalar", other)),
    }
}

/// Dispatch to the fixed helper set.
fn call_helper(name: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    match name {
        "len" => {
            expect_arity("len", 1, args)?;
            match &args[0] {
                Value::String(s) => Ok(Value::from(s.chars().count() as i64)),
                Value::Array(items) => Ok(Value::from(items.len() as i64)),
                Value::Object(map) => Ok(Value::from(map.len() as i64)),
                other => Err(ExpressionError::type_error("string, array, or object", other)),
            }
        }
        "contains" => {
            expect_arity("contains", 2, args)?;
            eval_in(&args[1], &args[0])
        }
        "lower" => {
            expect_arity("lower", 1, args)?;
            match &args[0] {
                Value::String(s) => Ok(Value::String(s.to_lowercase())),
                other => Err(ExpressionError::type_error("string", other)),
            }
        }
        "upper" => {
            expect_arity("upper", 1, args)?;
            match &args[0] {
                Value::String(s) => Ok(Value::String(s.to_uppercase())),
                other => Err(ExpressionError::type_error("string", other)),
            }
        }
        "toNumber" => {
            expect_arity("toNumber", 1, args)?;
            match &args[0] {
                Value::Number(n) => Ok(Value::Number(n.clone())),
                Value::String(s) => {
                    let trimmed = s.trim();
                    if let Ok(i) = trimmed.parse::<i64>() {
                        Ok(Value::from(i))
                    } else if let Ok(f) = trimmed.parse::<f64>() {
                        Ok(serde_json::json!(f))
                    } else {
                        Err(ExpressionError::Type {
                            expected: "numeric string",
                            found: "string",
                        })
                    }
                }
                Value::Bool(b) => Ok(Value::from(i64::from(*b))),
                other => Err(ExpressionError::type_error("number, string, or boolean", other)),
            }
        }
        "toString" => {
            expect_arity("toString", 1, args)?;
            match &args[0] {
                Value::String(s) => Ok(Value::String(s.clone())),
                scalar @ (Value::Number(_) | Value::Bool(_) | Value::Null) => {
                    Ok(Value::String(stringify_scalar(scalar)?))
                }
                composite => Ok(Value::String(composite.to_string())),
            }
        }
        other => Err(ExpressionError::UnknownFunction(other.to_string())),
    }
}

fn expect_arity(
    function: &'static str,
    expected: usize,
    args: &[Value],
) -> Result<(), ExpressionError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ExpressionError::Arity { function, expected, got: args.len() })
    }
}
