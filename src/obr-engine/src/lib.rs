// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub mod ast;
pub mod builtins;
pub mod common;
pub mod env;
pub mod interpreter;
pub mod lag;
mod lexer;
pub mod model_spec;
pub mod normalizer;
pub mod parser;
pub mod series;

#[cfg(test)]
mod normalizer_proptest;

pub use self::builtins::{Builtin, BuiltinImpl, FunctionRegistry, Loc};
pub use self::common::{Error, ErrorCode, ErrorKind, Result};
pub use self::env::Env;
pub use self::interpreter::{Evaluator, Value};
pub use self::lag::{lag_name, lag_shift};
pub use self::model_spec::{Outcome, SpecRow, evaluate_row, evaluate_rows, ons_identifiers};
pub use self::normalizer::normalize;
pub use self::series::{Period, SeriesTable, period_code};

/// evaluate evaluates one normalized equation against `env` with the
/// standard functions.
pub fn evaluate(equation: &str, env: &Env) -> Result<Value> {
    Evaluator::new(env).evaluate(equation)
}

/// evaluate_raw normalizes a spreadsheet equation and evaluates it.
pub fn evaluate_raw(equation: &str, env: &Env) -> Result<Value> {
    evaluate(&normalize(equation), env)
}
