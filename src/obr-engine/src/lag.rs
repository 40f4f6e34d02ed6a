// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Lagged identifiers encode a time offset in the name itself:
//! `income_minus2` is `income` two periods back.  The rewrite here shifts
//! every variable in an expression one period further back, which is what
//! `d` and `dlog` need to compute a difference.

use obr_core::eval_err;

use crate::common::{Error, Result};
use crate::lexer::{Lexer, Token};

pub const LAG_SUFFIX: &str = "_minus";

/// lag_name returns the identifier for `base` lagged `n` periods.
pub fn lag_name(base: &str, n: u32) -> String {
    if n == 0 {
        base.to_owned()
    } else {
        format!("{base}{LAG_SUFFIX}{n}")
    }
}

/// split_lag splits an identifier into its base name and lag, treating a
/// name without a numeric `_minus<N>` suffix as lag 0.
pub fn split_lag(ident: &str) -> (&str, Option<&str>) {
    if let Some(pos) = ident.rfind(LAG_SUFFIX) {
        let digits = &ident[pos + LAG_SUFFIX.len()..];
        if pos > 0 && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return (&ident[..pos], Some(digits));
        }
    }
    (ident, None)
}

/// lagged_ident shifts one identifier a single period back:
/// `income` becomes `income_minus1`, `income_minus1` becomes
/// `income_minus2`.
pub fn lagged_ident(ident: &str) -> Result<String> {
    match split_lag(ident) {
        (base, Some(digits)) => {
            let n = match digits.parse::<u32>().ok().and_then(|n| n.checked_add(1)) {
                Some(n) => n,
                None => return eval_err!(UnknownVariable, ident.to_owned()),
            };
            Ok(lag_name(base, n))
        }
        (base, None) => Ok(lag_name(base, 1)),
    }
}

fn is_lag_fn(tok: Option<&Token<'_>>) -> bool {
    matches!(tok, Some(Token::Ident(name)) if name.eq_ignore_ascii_case("d") || name.eq_ignore_ascii_case("dlog"))
}

/// lag_shift rewrites `expr` term by term, shifting every variable one
/// period back.  Function names, numbers and string literals are kept,
/// except that the quoted body of a nested `d`/`dlog` call is shifted
/// as well.  Tokens are re-joined with single spaces, so
/// `GPW/APH` becomes `GPW_minus1 / APH_minus1`.
pub fn lag_shift(expr: &str) -> Result<String> {
    let tokens = Lexer::new(expr)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| Error::from_equation_error(&err, expr))?;

    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    for (i, (start, tok, end)) in tokens.iter().enumerate() {
        let next = tokens.get(i + 1).map(|(_, t, _)| t);
        let text = &expr[*start..*end];
        let shifted = match tok {
            // a call: the name isn't a variable
            Token::Ident(_) if next == Some(&Token::LParen) => text.to_owned(),
            Token::Ident(ident) => lagged_ident(ident)?,
            Token::Str(body)
                if i >= 2
                    && tokens[i - 1].1 == Token::LParen
                    && is_lag_fn(Some(&tokens[i - 2].1)) =>
            {
                let quote = &text[..1];
                format!("{quote}{}{quote}", lag_shift(body)?)
            }
            _ => text.to_owned(),
        };
        out.push(shifted);
    }

    let shifted = out.join(" ");
    tracing::trace!(expr, shifted = shifted.as_str(), "lag shift");
    Ok(shifted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    #[test]
    fn test_lag_name() {
        assert_eq!("income", lag_name("income", 0));
        assert_eq!("income_minus1", lag_name("income", 1));
        assert_eq!("PBRENT_minus12", lag_name("PBRENT", 12));
    }

    #[test]
    fn test_split_lag() {
        assert_eq!(("income", None), split_lag("income"));
        assert_eq!(("income", Some("2")), split_lag("income_minus2"));
        assert_eq!(("income_minus", None), split_lag("income_minus"));
        assert_eq!(("a_minusb", None), split_lag("a_minusb"));
        assert_eq!(("_minus1", None), split_lag("_minus1"));
    }

    #[test]
    fn test_lagged_ident() {
        assert_eq!("income_minus1", lagged_ident("income").unwrap());
        assert_eq!("income_minus2", lagged_ident("income_minus1").unwrap());
        assert_eq!("income_minus10", lagged_ident("income_minus9").unwrap());
        let err = lagged_ident("x_minus4294967295").unwrap_err();
        assert_eq!(ErrorCode::UnknownVariable, err.code);
    }

    #[test]
    fn test_lag_shift() {
        let cases = [
            ("income", "income_minus1"),
            ("income_minus1", "income_minus2"),
            ("GPW / APH", "GPW_minus1 / APH_minus1"),
            ("GPW/APH", "GPW_minus1 / APH_minus1"),
            ("income / income_minus1", "income_minus1 / income_minus2"),
            ("2 * x + 1.5e3", "2 * x_minus1 + 1.5e3"),
            ("log(x) - log(y)", "log ( x_minus1 ) - log ( y_minus1 )"),
            ("elem(\"A\", \"2009Q3\")", "elem ( \"A\" , \"2009Q3\" )"),
            ("d('x')", "d ( 'x_minus1' )"),
            ("  x  ", "x_minus1"),
        ];

        for (input, expected) in cases {
            assert_eq!(expected, lag_shift(input).unwrap(), "for input '{input}'");
        }
    }

    #[test]
    fn test_lag_shift_bad_input() {
        let err = lag_shift("x $ y").unwrap_err();
        assert_eq!(ErrorCode::InvalidToken, err.code);
        assert_eq!(Some("`$` at 2".to_owned()), err.details);
    }
}
