// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use obr_core::eval_err;

use crate::common::Result;
use crate::interpreter::{Evaluator, Value, check_finite};
use crate::lag::lag_shift;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Loc {
    pub start: u16,
    pub end: u16,
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl Loc {
    pub fn new(start: usize, end: usize) -> Self {
        Loc {
            start: start as u16,
            end: end as u16,
        }
    }

    /// union takes a second Loc and returns the inclusive range from the
    /// start of the earlier token to the end of the later token.
    pub fn union(&self, rhs: &Self) -> Self {
        Loc {
            start: self.start.min(rhs.start),
            end: self.end.max(rhs.end),
        }
    }
}

/// A call as written: the lowercased function name and its arguments.
/// Resolution against a FunctionRegistry happens at evaluation time.
#[derive(PartialEq, Clone, Debug)]
pub struct UntypedBuiltinFn<Expr>(pub String, pub Vec<Expr>);

/// BuiltinImpl receives the calling evaluator so that functions like `d`
/// can evaluate derived sub-expressions against the same environment.
pub type BuiltinImpl = fn(&Evaluator<'_>, &[Value], Loc) -> Result<Value>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub func: BuiltinImpl,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// FunctionRegistry maps lowercase function names to fixed-arity
/// implementations.  It is plain data, composed once and then shared
/// read-only by every evaluation.
#[derive(Clone, Debug, Default)]
pub struct FunctionRegistry {
    fns: HashMap<&'static str, Builtin>,
}

const STANDARD_BUILTINS: &[Builtin] = &[
    Builtin {
        name: "dateval",
        arity: 1,
        func: dateval,
    },
    Builtin {
        name: "recode",
        arity: 3,
        func: recode,
    },
    Builtin {
        name: "d",
        arity: 1,
        func: d,
    },
    Builtin {
        name: "dlog",
        arity: 1,
        func: dlog,
    },
    Builtin {
        name: "elem",
        arity: 2,
        func: elem,
    },
    Builtin {
        name: "log",
        arity: 1,
        func: ln,
    },
    Builtin {
        name: "ln",
        arity: 1,
        func: ln,
    },
    Builtin {
        name: "log10",
        arity: 1,
        func: log10,
    },
    Builtin {
        name: "exp",
        arity: 1,
        func: exp,
    },
    Builtin {
        name: "sqrt",
        arity: 1,
        func: sqrt,
    },
    Builtin {
        name: "abs",
        arity: 1,
        func: abs,
    },
    Builtin {
        name: "round",
        arity: 1,
        func: round,
    },
    Builtin {
        name: "floor",
        arity: 1,
        func: floor,
    },
    Builtin {
        name: "ceil",
        arity: 1,
        func: ceil,
    },
    Builtin {
        name: "min",
        arity: 2,
        func: min,
    },
    Builtin {
        name: "max",
        arity: 2,
        func: max,
    },
];

lazy_static! {
    pub static ref STANDARD_REGISTRY: FunctionRegistry = FunctionRegistry::standard();
}

impl FunctionRegistry {
    /// new returns an empty registry.
    pub fn new() -> Self {
        FunctionRegistry {
            fns: HashMap::new(),
        }
    }

    /// standard returns a registry holding the model functions (`dateval`,
    /// `recode`, `d`, `dlog`, `elem`) and the arithmetic helpers.
    pub fn standard() -> Self {
        let mut registry = FunctionRegistry::new();
        for builtin in STANDARD_BUILTINS {
            registry.insert(*builtin);
        }
        registry
    }

    /// insert adds or replaces a function, returning the previous entry
    /// under the same name.
    pub fn insert(&mut self, builtin: Builtin) -> Option<Builtin> {
        self.fns.insert(builtin.name, builtin)
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.fns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fns.contains_key(name)
    }

    /// names lists the registered functions in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.fns.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// parse_date_literal turns a colon separated `YYYY:PP` token into the
/// integer encoding used by the `date` entry.
pub fn parse_date_literal(literal: &str) -> Result<i64> {
    let digits: String = literal.trim().chars().filter(|c| *c != ':').collect();
    match digits.parse::<i64>() {
        Ok(n) => Ok(n),
        Err(_) => eval_err!(BadDateLiteral, literal.to_owned()),
    }
}

fn dateval(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    let n = parse_date_literal(args[0].as_str()?)?;
    Ok(Value::Number(n as f64))
}

// both branches were already evaluated by the caller, so an error in the
// branch not taken still surfaces.
fn recode(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    if args[0].is_truthy()? {
        Ok(args[1].clone())
    } else {
        Ok(args[2].clone())
    }
}

fn d(ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    let body = args[0].as_str()?;
    let shifted = lag_shift(body)?;
    tracing::trace!(body, shifted = shifted.as_str(), "d");

    let curr = ev.eval_nested(body)?.as_f64()?;
    let prev = ev.eval_nested(&shifted)?.as_f64()?;
    check_finite("-", curr, prev, curr - prev)
}

fn dlog(ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    let body = args[0].as_str()?;
    let shifted = lag_shift(body)?;
    tracing::trace!(body, shifted = shifted.as_str(), "dlog");

    let curr = ev.eval_nested(&format!("log({body})"))?.as_f64()?;
    let prev = ev.eval_nested(&format!("log({shifted})"))?.as_f64()?;
    check_finite("-", curr, prev, curr - prev)
}

/// elem_name joins a series name and a period label the way series
/// tables store per-period observations: `PBRENT` + `2009Q3`.
pub fn elem_name(base: &str, label: &str) -> String {
    format!("{base}_{label}")
}

fn elem_label(value: &Value) -> Result<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        // an unquoted label such as 2009 arrives as a number
        Value::Number(n) if n.fract() == 0.0 => Ok(format!("{}", *n as i64)),
        Value::Number(n) => Ok(format!("{n}")),
        Value::Bool(_) => eval_err!(ExpectedString, "elem".to_owned()),
    }
}

fn elem(ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    let base = args[0].as_str()?;
    let label = elem_label(&args[1])?;
    let value = ev.env().get(&elem_name(base, &label))?;
    Ok(Value::Number(value))
}

fn unary(name: &'static str, args: &[Value], f: fn(f64) -> f64) -> Result<Value> {
    let x = args[0].as_f64()?;
    let result = f(x);
    if x.is_finite() && !result.is_finite() {
        return eval_err!(NonFiniteResult, format!("{name}({x})"));
    }
    Ok(Value::Number(result))
}

fn ln(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    unary("log", args, f64::ln)
}

fn log10(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    unary("log10", args, f64::log10)
}

fn exp(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    unary("exp", args, f64::exp)
}

fn sqrt(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    unary("sqrt", args, f64::sqrt)
}

fn abs(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    unary("abs", args, f64::abs)
}

fn round(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    unary("round", args, f64::round)
}

fn floor(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    unary("floor", args, f64::floor)
}

fn ceil(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    unary("ceil", args, f64::ceil)
}

fn min(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    Ok(Value::Number(args[0].as_f64()?.min(args[1].as_f64()?)))
}

fn max(_ev: &Evaluator<'_>, args: &[Value], _loc: Loc) -> Result<Value> {
    Ok(Value::Number(args[0].as_f64()?.max(args[1].as_f64()?)))
}

#[test]
fn test_loc_basics() {
    let a = Loc { start: 3, end: 7 };
    assert_eq!(a, Loc::new(3, 7));

    let b = Loc { start: 4, end: 11 };
    assert_eq!(Loc::new(3, 11), a.union(&b));

    let c = Loc { start: 1, end: 5 };
    assert_eq!(Loc::new(1, 7), a.union(&c));

    assert_eq!("3:7", format!("{a}"));
}
