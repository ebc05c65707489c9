//! Tree-walking evaluator

use std::cell::Cell;
use std::collections::BTreeMap;

use super::error::ExprError;
use super::parser::{BinaryOp, Expr, MAX_DEPTH, Parser, UnaryOp};
use super::value::Value;

/// Evaluates one expression against a fixed set of top-level bindings
pub struct Evaluator<'a> {
    source: &'a str,
    bindings: &'a BTreeMap<String, Value>,
    depth: Cell<usize>,
}

/// Deepest tree the evaluator walks; parenthesised operator chains can nest
/// past the parser's own limit.
const MAX_EVAL_DEPTH: usize = 2 * MAX_DEPTH;

impl<'a> Evaluator<'a> {
    pub fn new(source: &'a str, bindings: &'a BTreeMap<String, Value>) -> Self {
        Self {
            source,
            bindings,
            depth: Cell::new(0),
        }
    }

    /// Parses and evaluates the source expression
    pub fn run(&self) -> Result<Value, ExprError> {
        let ast = Parser::parse_str(self.source).map_err(|e| ExprError::Syntax {
            expression: self.source.to_string(),
            message: e.message,
        })?;
        self.eval(&ast)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, ExprError> {
        let depth = self.depth.get() + 1;
        if depth > MAX_EVAL_DEPTH {
            return Err(self.failure(format!(
                "expression nested deeper than {} levels",
                MAX_EVAL_DEPTH
            )));
        }
        self.depth.set(depth);
        let value = self.eval_node(expr);
        self.depth.set(depth - 1);
        value
    }

    fn eval_node(&self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Ident(name) => self.bindings.get(name).cloned().ok_or_else(|| {
                ExprError::Undeclared {
                    expression: self.source.to_string(),
                    name: name.clone(),
                }
            }),
            Expr::Member { object, property } => {
                let object = self.eval(object)?;
                self.select(object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                self.index(object, index)
            }
            Expr::Call {
                function,
                target,
                args,
            } => {
                let target = match target {
                    Some(t) => Some(self.eval(t)?),
                    None => None,
                };
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(function, target, args)
            }
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                    (op, value) => Err(self.no_overload(format!(
                        "{} applied to {}",
                        match op {
                            UnaryOp::Not => "!",
                            UnaryOp::Neg => "-",
                        },
                        value.kind()
                    ))),
                }
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
            } => match self.eval(condition)? {
                Value::Bool(true) => self.eval(then_expr),
                Value::Bool(false) => self.eval(else_expr),
                other => Err(self.no_overload(format!(
                    "ternary condition must be bool, got {}",
                    other.kind()
                ))),
            },
            Expr::List(items) => items
                .iter()
                .map(|i| self.eval(i))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
        }
    }

    fn select(&self, object: Value, key: &str) -> Result<Value, ExprError> {
        match object {
            Value::Map(mut map) => map.remove(key).ok_or_else(|| ExprError::NoSuchKey {
                expression: self.source.to_string(),
                key: key.to_string(),
            }),
            other => Err(self.no_overload(format!(
                "cannot select field '{}' from {}",
                key,
                other.kind()
            ))),
        }
    }

    fn index(&self, object: Value, index: Value) -> Result<Value, ExprError> {
        match (object, index) {
            (Value::Map(map), Value::String(key)) => self.select(Value::Map(map), &key),
            (Value::List(items), Value::Number(n)) => {
                if n.fract() != 0.0 || n < 0.0 || n as usize >= items.len() {
                    return Err(self.failure(format!("index out of range: {}", n)));
                }
                Ok(items[n as usize].clone())
            }
            (object, index) => Err(self.no_overload(format!(
                "cannot index {} with {}",
                object.kind(),
                index.kind()
            ))),
        }
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, ExprError> {
        // Logical operators only evaluate the right side when needed.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let short_circuit = op == BinaryOp::Or;
            let left = self.expect_bool(op, self.eval(left)?)?;
            if left == short_circuit {
                return Ok(Value::Bool(left));
            }
            let right = self.expect_bool(op, self.eval(right)?)?;
            return Ok(Value::Bool(right));
        }

        let left = self.eval(left)?;
        let right = self.eval(right)?;

        match op {
            // Only values of one kind compare; null compares with anything.
            BinaryOp::Eq | BinaryOp::Ne => {
                let comparable = left.kind() == right.kind()
                    || matches!(left, Value::Null)
                    || matches!(right, Value::Null);
                if !comparable {
                    return Err(self.mismatch(op, &left, &right));
                }
                Ok(Value::Bool((left == right) == (op == BinaryOp::Eq)))
            }
            BinaryOp::In => match right {
                Value::Map(map) => match left {
                    Value::String(key) => Ok(Value::Bool(map.contains_key(&key))),
                    other => Err(self.no_overload(format!("{} in map", other.kind()))),
                },
                Value::List(items) => Ok(Value::Bool(items.contains(&left))),
                other => Err(self.no_overload(format!("in applied to {}", other.kind()))),
            },
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
                    _ => return Err(self.mismatch(op, &left, &right)),
                };
                let Some(ordering) = ordering else {
                    return Ok(Value::Bool(false));
                };
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            BinaryOp::Add => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                (Value::List(mut a), Value::List(b)) => {
                    a.extend(b);
                    Ok(Value::List(a))
                }
                (left, right) => Err(self.mismatch(op, &left, &right)),
            },
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
                    return Err(self.mismatch(op, &left, &right));
                };
                let (a, b) = (*a, *b);
                match op {
                    BinaryOp::Sub => Ok(Value::Number(a - b)),
                    BinaryOp::Mul => Ok(Value::Number(a * b)),
                    _ if b == 0.0 => Err(self.failure("division by zero".to_string())),
                    BinaryOp::Div => Ok(Value::Number(a / b)),
                    _ => Ok(Value::Number(a % b)),
                }
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn call(
        &self,
        function: &str,
        target: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, ExprError> {
        match (function, target, args.as_slice()) {
            ("size", Some(value), []) => self.size(&value),
            ("size", None, [value]) => self.size(value),
            ("startsWith", Some(Value::String(s)), [Value::String(prefix)]) => {
                Ok(Value::Bool(s.starts_with(prefix.as_str())))
            }
            ("endsWith", Some(Value::String(s)), [Value::String(suffix)]) => {
                Ok(Value::Bool(s.ends_with(suffix.as_str())))
            }
            ("contains", Some(Value::String(s)), [Value::String(needle)]) => {
                Ok(Value::Bool(s.contains(needle.as_str())))
            }
            (function, target, args) => {
                let mut signature: Vec<&str> = target.iter().map(Value::kind).collect();
                signature.extend(args.iter().map(Value::kind));
                Err(self.no_overload(format!(
                    "found no matching overload for '{}' applied to ({})",
                    function,
                    signature.join(", ")
                )))
            }
        }
    }

    fn size(&self, value: &Value) -> Result<Value, ExprError> {
        let len = match value {
            Value::String(s) => s.chars().count(),
            Value::List(items) => items.len(),
            Value::Map(map) => map.len(),
            other => {
                return Err(self.no_overload(format!("size applied to {}", other.kind())));
            }
        };
        Ok(Value::Number(len as f64))
    }

    fn expect_bool(&self, op: BinaryOp, value: Value) -> Result<bool, ExprError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(self.no_overload(format!("{} applied to {}", op, other.kind()))),
        }
    }

    fn mismatch(&self, op: BinaryOp, left: &Value, right: &Value) -> ExprError {
        self.no_overload(format!(
            "found no matching overload for '{}' applied to ({}, {})",
            op,
            left.kind(),
            right.kind()
        ))
    }

    fn no_overload(&self, message: String) -> ExprError {
        ExprError::NoSuchOverload {
            expression: self.source.to_string(),
            message,
        }
    }

    fn failure(&self, message: String) -> ExprError {
        ExprError::Evaluation {
            expression: self.source.to_string(),
            message,
        }
    }
}
