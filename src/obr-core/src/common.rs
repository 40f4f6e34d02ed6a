// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidToken,
    UnrecognizedEof,
    UnrecognizedToken,
    ExtraToken,
    UnclosedString,
    ExpectedNumber,
    EmptyEquation,
    UnknownBuiltin,
    ExpectedString,
    StringInNumericContext,
    RecursionLimit,
    UnknownVariable,
    BadBuiltinArgs,
    BadDateLiteral,
    DivisionByZero,
    NonFiniteResult,
}

impl ErrorCode {
    /// kind maps every code onto the coarse taxonomy callers branch on.
    pub fn kind(&self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            InvalidToken | UnrecognizedEof | UnrecognizedToken | ExtraToken | UnclosedString
            | ExpectedNumber | EmptyEquation | UnknownBuiltin | ExpectedString
            | StringInNumericContext | RecursionLimit => ErrorKind::Syntax,
            UnknownVariable => ErrorKind::UnresolvedVariable,
            BadBuiltinArgs => ErrorKind::Arity,
            BadDateLiteral => ErrorKind::Format,
            DivisionByZero | NonFiniteResult => ErrorKind::Arithmetic,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            InvalidToken => "invalid_token",
            UnrecognizedEof => "unrecognized_eof",
            UnrecognizedToken => "unrecognized_token",
            ExtraToken => "extra_token",
            UnclosedString => "unclosed_string",
            ExpectedNumber => "expected_number",
            EmptyEquation => "empty_equation",
            UnknownBuiltin => "unknown_builtin",
            ExpectedString => "expected_string",
            StringInNumericContext => "string_in_numeric_context",
            RecursionLimit => "recursion_limit",
            UnknownVariable => "unknown_variable",
            BadBuiltinArgs => "bad_builtin_args",
            BadDateLiteral => "bad_date_literal",
            DivisionByZero => "division_by_zero",
            NonFiniteResult => "non_finite_result",
        };

        write!(f, "{name}")
    }
}

/// EquationError is a positional failure from the lexer or parser;
/// start and end are byte offsets into the equation text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquationError {
    pub start: u16,
    pub end: u16,
    pub code: ErrorCode,
}

impl fmt::Display for EquationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.code)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    UnresolvedVariable,
    Arity,
    Format,
    Arithmetic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::UnresolvedVariable => "UnresolvedVariableError",
            ErrorKind::Arity => "ArityError",
            ErrorKind::Format => "FormatError",
            ErrorKind::Arithmetic => "ArithmeticError",
        };
        write!(f, "{kind}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    /// the offending token, substring or identifier, when known
    pub details: Option<String>,
    /// the text of the outermost equation being evaluated
    pub equation: Option<String>,
}

impl Error {
    pub fn new(code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind: code.kind(),
            code,
            details,
            equation: None,
        }
    }

    /// from_equation_error converts a positional lexer/parser error into an
    /// Error whose details hold the offending slice of `text`.
    pub fn from_equation_error(err: &EquationError, text: &str) -> Self {
        let start = (err.start as usize).min(text.len());
        let end = (err.end as usize).clamp(start, text.len());
        let snippet = text.get(start..end).unwrap_or_default();
        let details = if snippet.is_empty() {
            format!("at {}", err.start)
        } else {
            format!("`{}` at {}", snippet, err.start)
        };
        Error::new(err.code, Some(details))
    }

    /// with_equation records the equation text, keeping any text an inner
    /// evaluation already attached.
    pub fn with_equation(mut self, equation: &str) -> Self {
        if self.equation.is_none() {
            self.equation = Some(equation.to_owned());
        }
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", self.kind, self.code, details)?,
            None => write!(f, "{}{{{}}}", self.kind, self.code)?,
        }
        if let Some(ref equation) = self.equation {
            write!(f, " in `{equation}`")?;
        }
        Ok(())
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;
pub type EquationResult<T> = result::Result<T, EquationError>;

#[macro_export]
macro_rules! eval_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! eqn_err {
    ($code:tt, $start:expr, $end:expr) => {{
        use $crate::common::{EquationError, ErrorCode};
        Err(EquationError {
            start: $start as u16,
            end: $end as u16,
            code: ErrorCode::$code,
        })
    }};
}

#[test]
fn test_error_code_kinds() {
    assert_eq!(ErrorKind::UnresolvedVariable, ErrorCode::UnknownVariable.kind());
    assert_eq!(ErrorKind::Arity, ErrorCode::BadBuiltinArgs.kind());
    assert_eq!(ErrorKind::Format, ErrorCode::BadDateLiteral.kind());
    assert_eq!(ErrorKind::Arithmetic, ErrorCode::DivisionByZero.kind());
    assert_eq!(ErrorKind::Syntax, ErrorCode::ExtraToken.kind());
}

#[test]
fn test_error_display() {
    let err = Error::new(ErrorCode::UnknownVariable, Some("income_minus3".to_owned()));
    assert_eq!(
        "UnresolvedVariableError{unknown_variable: income_minus3}",
        format!("{err}")
    );

    let err = err.with_equation("d(\"income_minus2\")");
    assert_eq!(
        "UnresolvedVariableError{unknown_variable: income_minus3} in `d(\"income_minus2\")`",
        format!("{err}")
    );

    // the first equation text attached is kept
    let err = err.with_equation("outer");
    assert_eq!(Some("d(\"income_minus2\")".to_owned()), err.equation);
}

#[test]
fn test_eval_err_macro() {
    let r: Result<f64> = eval_err!(BadDateLiteral, "2011-12x".to_owned());
    let err = r.unwrap_err();
    assert_eq!(ErrorKind::Format, err.kind);
    assert_eq!(Some("2011-12x".to_owned()), err.details);

    let r: EquationResult<()> = eqn_err!(ExtraToken, 2, 3);
    assert_eq!(ErrorCode::ExtraToken, r.unwrap_err().code);
}

#[test]
fn test_from_equation_error() {
    let eqn_err = EquationError {
        start: 4,
        end: 5,
        code: ErrorCode::UnrecognizedToken,
    };
    let err = Error::from_equation_error(&eqn_err, "1 + ) 2");
    assert_eq!(ErrorKind::Syntax, err.kind);
    assert_eq!(Some("`)` at 4".to_owned()), err.details);

    let eof = EquationError {
        start: 3,
        end: 4,
        code: ErrorCode::UnrecognizedEof,
    };
    let err = Error::from_equation_error(&eof, "1 +");
    assert_eq!(Some("at 3".to_owned()), err.details);
}
