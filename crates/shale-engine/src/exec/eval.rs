//! Expression evaluation against in-flight rows.

use indexmap::IndexMap;
use regex::RegexBuilder;
use shale_core::ast::{BinaryOp, Expr, Literal, UnaryOp};
use shale_core::schema::Row;
use shale_core::Value;

use crate::error::{EngineError, Result};

/// Converts an AST literal into a runtime value.
#[must_use]
pub fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Integer(i) => Value::Integer(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::Text(s.clone()),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Null => Value::Null,
    }
}

/// Case-insensitive column lookup in a row.
pub(crate) fn get_column<'r>(row: &'r Row, name: &str) -> Option<&'r Value> {
    row.get(name).or_else(|| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// Evaluates expressions against a flat row, with an optional per-alias map
/// for qualified references.
///
/// Column lookups are case-insensitive and resolve in this order: the
/// qualified alias (when given), then the flat row, then any aliased table.
/// A reference that resolves nowhere yields NULL.
pub struct Evaluator<'a> {
    row: &'a Row,
    tables: Option<&'a IndexMap<String, Row>>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator over a flat row.
    #[must_use]
    pub fn new(row: &'a Row) -> Self {
        Self { row, tables: None }
    }

    /// Creates an evaluator over a flat row plus per-alias rows.
    #[must_use]
    pub fn with_tables(row: &'a Row, tables: &'a IndexMap<String, Row>) -> Self {
        Self {
            row,
            tables: Some(tables),
        }
    }

    /// Evaluates an expression to a value.
    ///
    /// # Errors
    ///
    /// Returns an execution error for unsupported operand combinations.
    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(literal_value(literal)),
            Expr::Column { table, name, .. } => Ok(self.column_value(table.as_deref(), name)),
            Expr::Binary { left, op, right } => self.eval_binary(left, *op, right),
            Expr::Unary { op, operand } => self.eval_unary(*op, operand),
            // Aggregates are computed by the grouping stage and stored in
            // the flat row under their alias or canonical name.
            Expr::Function(call) => Ok(get_column(self.row, &call.canonical_name())
                .cloned()
                .unwrap_or(Value::Null)),
            Expr::IsNull { expr, negated } => {
                let value = self.eval(expr)?;
                Ok(Value::Boolean(value.is_null() != *negated))
            }
            Expr::In { expr, list } => {
                let probe = self.eval(expr)?;
                if probe.is_null() {
                    return Ok(Value::Boolean(false));
                }
                for item in list {
                    if probe.loosely_equals(&self.eval(item)?) {
                        return Ok(Value::Boolean(true));
                    }
                }
                Ok(Value::Boolean(false))
            }
            Expr::Wildcard => Ok(Value::Null),
        }
    }

    /// Evaluates a predicate expression to a boolean.
    ///
    /// # Errors
    ///
    /// Returns an execution error for unsupported operand combinations.
    pub fn eval_predicate(&self, expr: &Expr) -> Result<bool> {
        Ok(self.eval(expr)?.is_truthy())
    }

    fn column_value(&self, table: Option<&str>, name: &str) -> Value {
        if let (Some(alias), Some(tables)) = (table, self.tables) {
            for (key, row) in tables {
                if key.eq_ignore_ascii_case(alias) {
                    return get_column(row, name).cloned().unwrap_or(Value::Null);
                }
            }
        }

        if let Some(value) = get_column(self.row, name) {
            return value.clone();
        }

        if let Some(tables) = self.tables {
            for row in tables.values() {
                if let Some(value) = get_column(row, name) {
                    return value.clone();
                }
            }
        }

        Value::Null
    }

    fn eval_binary(&self, left: &Expr, op: BinaryOp, right: &Expr) -> Result<Value> {
        match op {
            BinaryOp::And => {
                if !self.eval(left)?.is_truthy() {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(self.eval(right)?.is_truthy()))
            }
            BinaryOp::Or => {
                if self.eval(left)?.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(self.eval(right)?.is_truthy()))
            }
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                // Comparisons involving NULL yield false.
                if l.is_null() || r.is_null() {
                    return Ok(Value::Boolean(false));
                }
                let result = match op {
                    BinaryOp::Eq => l.loosely_equals(&r),
                    BinaryOp::NotEq => !l.loosely_equals(&r),
                    BinaryOp::Lt => l.compare(&r) == std::cmp::Ordering::Less,
                    BinaryOp::LtEq => l.compare(&r) != std::cmp::Ordering::Greater,
                    BinaryOp::Gt => l.compare(&r) == std::cmp::Ordering::Greater,
                    BinaryOp::GtEq => l.compare(&r) != std::cmp::Ordering::Less,
                    _ => unreachable!("comparison operators only"),
                };
                Ok(Value::Boolean(result))
            }
            BinaryOp::Like => {
                let value = self.eval(left)?;
                let pattern = self.eval(right)?;
                if value.is_null() || pattern.is_null() {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(like_match(
                    &value.to_string(),
                    &pattern.to_string(),
                )?))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                arithmetic(&l, op, &r)
            }
            BinaryOp::Div => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                // NULL operands count as zero, so a NULL divisor divides by
                // zero, which yields NULL.
                let divisor = numeric_operand(&r, op)?;
                if divisor == 0.0 {
                    return Ok(Value::Null);
                }
                Ok(Value::Float(numeric_operand(&l, op)? / divisor))
            }
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr) -> Result<Value> {
        let value = self.eval(operand)?;
        match op {
            UnaryOp::Not => Ok(Value::Boolean(!value.is_truthy())),
            UnaryOp::Neg => match value {
                Value::Null => Ok(Value::Integer(0)),
                Value::Integer(i) => i.checked_neg().map(Value::Integer).ok_or_else(|| {
                    EngineError::Execution("integer overflow in negation".to_string())
                }),
                Value::Float(f) => Ok(Value::Float(-f)),
                Value::Boolean(b) => Ok(Value::Integer(-i64::from(b))),
                other => Err(EngineError::Execution(format!(
                    "cannot negate {} value",
                    other.type_name()
                ))),
            },
        }
    }
}

/// NULL-as-zero numeric view of an operand.
fn numeric_operand(value: &Value, op: BinaryOp) -> Result<f64> {
    if value.is_null() {
        return Ok(0.0);
    }
    value.as_f64().ok_or_else(|| {
        EngineError::Execution(format!(
            "unsupported operand type {} for '{}'",
            value.type_name(),
            op.as_str()
        ))
    })
}

/// Arithmetic with NULL treated as zero. Integer inputs stay integral.
fn arithmetic(l: &Value, op: BinaryOp, r: &Value) -> Result<Value> {
    let integral = |v: &Value| v.is_null() || v.as_i64().is_some();
    if integral(l) && integral(r) {
        let a = l.as_i64().unwrap_or(0);
        let b = r.as_i64().unwrap_or(0);
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            _ => unreachable!("arithmetic operators only"),
        };
        return result.map(Value::Integer).ok_or_else(|| {
            EngineError::Execution(format!("integer overflow in '{}'", op.as_str()))
        });
    }

    let a = numeric_operand(l, op)?;
    let b = numeric_operand(r, op)?;
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        _ => unreachable!("arithmetic operators only"),
    };
    Ok(Value::Float(result))
}

/// SQL LIKE matching: `%` matches any run, `_` a single character,
/// case-insensitively. All other pattern characters match literally.
fn like_match(text: &str, pattern: &str) -> Result<bool> {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');

    RegexBuilder::new(&regex)
        .case_insensitive(true)
        .build()
        .map_err(|e| EngineError::Execution(format!("invalid LIKE pattern: {e}")))
        .map(|re| re.is_match(text))
}
