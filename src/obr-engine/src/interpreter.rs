// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use float_cmp::approx_eq;
use obr_core::eval_err;

use crate::ast::{BinaryOp, Expr, UnaryOp, Visitor};
use crate::builtins::{FunctionRegistry, STANDARD_REGISTRY, UntypedBuiltinFn, elem_name};
use crate::common::{Error, ErrorCode, Result};
use crate::env::Env;
use crate::lag::lag_shift;
use crate::parser::parse;

/// Nested `d`/`dlog` evaluation deeper than this is rejected.
pub const MAX_DEPTH: usize = 32;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    /// as_f64 coerces booleans to 1/0 for arithmetic contexts.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(*b as i8 as f64),
            Value::Str(s) => eval_err!(StringInNumericContext, format!("\"{s}\"")),
        }
    }

    pub fn is_truthy(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(is_truthy(*n)),
            Value::Str(s) => eval_err!(StringInNumericContext, format!("\"{s}\"")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(s) => Ok(s.as_str()),
            other => eval_err!(ExpectedString, format!("{other}")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

#[inline(always)]
fn is_truthy(n: f64) -> bool {
    let is_false = approx_eq!(f64, n, 0.0);
    !is_false
}

/// check_finite reports a NaN or infinite `result` computed from finite
/// operands as an arithmetic error; non-finite inputs pass through.
pub(crate) fn check_finite(op: &str, l: f64, r: f64, result: f64) -> Result<Value> {
    if l.is_finite() && r.is_finite() && !result.is_finite() {
        return eval_err!(NonFiniteResult, format!("{l} {op} {r}"));
    }
    Ok(Value::Number(result))
}

/// Evaluator walks parsed equations against a read-only Env.
///
/// Function calls are resolved through a FunctionRegistry; functions such
/// as `d` re-enter the evaluator on rewritten text via `eval_nested`,
/// which tracks depth so pathological nesting fails instead of recursing
/// without bound.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    env: &'a Env,
    registry: &'a FunctionRegistry,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(env: &'a Env) -> Self {
        Evaluator::with_registry(env, &STANDARD_REGISTRY)
    }

    pub fn with_registry(env: &'a Env, registry: &'a FunctionRegistry) -> Self {
        Evaluator {
            env,
            registry,
            depth: 0,
        }
    }

    pub fn env(&self) -> &'a Env {
        self.env
    }

    /// evaluate parses and evaluates one normalized equation.  Failures
    /// carry the equation text.  A bare string result is rejected, since
    /// an equation has to produce a number or a condition.
    pub fn evaluate(&self, equation: &str) -> Result<Value> {
        let result = self.eval_text(equation).and_then(|value| match value {
            Value::Str(s) => eval_err!(StringInNumericContext, format!("\"{s}\"")),
            value => Ok(value),
        });
        result.map_err(|err| err.with_equation(equation))
    }

    /// eval_nested evaluates derived text (a lag-shifted body, say) one
    /// level deeper than this evaluator.
    pub fn eval_nested(&self, text: &str) -> Result<Value> {
        if self.depth >= MAX_DEPTH {
            return eval_err!(RecursionLimit, text.to_owned());
        }
        let child = Evaluator {
            depth: self.depth + 1,
            ..*self
        };
        child.eval_text(text)
    }

    fn eval_text(&self, text: &str) -> Result<Value> {
        let expr = match parse(text) {
            Ok(Some(expr)) => expr,
            Ok(None) => return eval_err!(EmptyEquation),
            Err(err) => return Err(Error::from_equation_error(&err, text)),
        };

        // report missing identifiers ahead of any other failure
        ReferenceChecker {
            env: self.env,
            depth: self.depth,
        }
        .walk(&expr)?;

        self.eval(&expr)
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Const(_, n, _) => Ok(Value::Number(*n)),
            Expr::Str(s, _) => Ok(Value::Str(s.clone())),
            Expr::Var(id, _) => Ok(Value::Number(self.env.get(id)?)),
            Expr::App(UntypedBuiltinFn(name, args), loc) => {
                let builtin = match self.registry.get(name) {
                    Some(builtin) => builtin,
                    None => return eval_err!(UnknownBuiltin, name.clone()),
                };
                if args.len() != builtin.arity {
                    return eval_err!(
                        BadBuiltinArgs,
                        format!(
                            "{} expects {} argument{}, got {}",
                            name,
                            builtin.arity,
                            if builtin.arity == 1 { "" } else { "s" },
                            args.len()
                        )
                    );
                }
                // arguments are evaluated eagerly, left to right
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                (builtin.func)(self, &args, *loc)
            }
            Expr::Op1(op, l, _) => {
                let l = self.eval(l)?;
                match op {
                    UnaryOp::Positive => Ok(Value::Number(l.as_f64()?)),
                    UnaryOp::Negative => Ok(Value::Number(-l.as_f64()?)),
                    UnaryOp::Not => Ok(Value::Bool(!l.is_truthy()?)),
                }
            }
            Expr::Op2(op, l, r, _) => {
                let l = self.eval(l)?;
                let r = self.eval(r)?;
                match op {
                    BinaryOp::Eq => Ok(Value::Bool(values_eq(&l, &r)?)),
                    BinaryOp::Neq => Ok(Value::Bool(!values_eq(&l, &r)?)),
                    BinaryOp::And => Ok(Value::Bool(l.is_truthy()? && r.is_truthy()?)),
                    BinaryOp::Or => Ok(Value::Bool(l.is_truthy()? || r.is_truthy()?)),
                    _ => arith(*op, l.as_f64()?, r.as_f64()?),
                }
            }
        }
    }
}

fn values_eq(l: &Value, r: &Value) -> Result<bool> {
    match (l, r) {
        (Value::Str(l), Value::Str(r)) => Ok(l == r),
        _ => Ok(approx_eq!(f64, l.as_f64()?, r.as_f64()?)),
    }
}

fn arith(op: BinaryOp, l: f64, r: f64) -> Result<Value> {
    let result = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r == 0.0 {
                return eval_err!(DivisionByZero, format!("{l} / {r}"));
            }
            l / r
        }
        BinaryOp::Exp => l.powf(r),
        BinaryOp::Gt => return Ok(Value::Bool(l > r)),
        BinaryOp::Gte => return Ok(Value::Bool(l >= r)),
        BinaryOp::Lt => return Ok(Value::Bool(l < r)),
        BinaryOp::Lte => return Ok(Value::Bool(l <= r)),
        BinaryOp::Eq | BinaryOp::Neq | BinaryOp::And | BinaryOp::Or => unreachable!(),
    };
    check_finite(op.as_str(), l, r, result)
}

/// ReferenceChecker finds the first identifier, in source order, that the
/// equation would look up and the Env doesn't hold.  This includes the
/// identifiers inside `d`/`dlog` bodies and their lag-shifted forms, and
/// the names `elem` builds from two literals.
struct ReferenceChecker<'a> {
    env: &'a Env,
    depth: usize,
}

impl ReferenceChecker<'_> {
    fn check_text(&mut self, text: &str) -> Result<()> {
        // bodies nest inside string literals, so this always terminates,
        // but the evaluator's own bound applies here too
        if self.depth >= MAX_DEPTH {
            return Ok(());
        }
        // syntax problems in a body are reported by the evaluation itself
        if let Ok(Some(expr)) = parse(text) {
            let mut inner = ReferenceChecker {
                env: self.env,
                depth: self.depth + 1,
            };
            inner.walk(&expr)?;
        }
        Ok(())
    }
}

impl Visitor<Result<()>> for ReferenceChecker<'_> {
    fn walk(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Const(..) | Expr::Str(..) => Ok(()),
            Expr::Var(id, _) => {
                if self.env.contains(id) {
                    Ok(())
                } else {
                    Err(Error::new(ErrorCode::UnknownVariable, Some(id.clone())))
                }
            }
            Expr::App(UntypedBuiltinFn(name, args), _) => {
                match (name.as_str(), args.as_slice()) {
                    ("d" | "dlog", [Expr::Str(body, _)]) => {
                        self.check_text(body)?;
                        if let Ok(shifted) = lag_shift(body) {
                            self.check_text(&shifted)?;
                        }
                        Ok(())
                    }
                    ("elem", [Expr::Str(base, _), Expr::Str(label, _)]) => {
                        let id = elem_name(base, label);
                        if self.env.contains(&id) {
                            Ok(())
                        } else {
                            Err(Error::new(ErrorCode::UnknownVariable, Some(id)))
                        }
                    }
                    _ => args.iter().try_for_each(|arg| self.walk(arg)),
                }
            }
            Expr::Op1(_, l, _) => self.walk(l),
            Expr::Op2(_, l, r, _) => {
                self.walk(l)?;
                self.walk(r)
            }
        }
    }
}
