// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Text-to-text cleanup of equations as they appear in the model
//! spreadsheet, producing something the parser accepts.
//!
//! The rewrites run in a fixed order and later ones rely on earlier ones
//! having fired: `@` markers are dropped, whitespace is collapsed, the
//! one place a bare `=` means equality (`date = `) is fixed up, doubled
//! quotes are collapsed, lag offsets like `income(-1)` become
//! `income_minus1`, and finally the arguments of `d`, `dlog` and `elem`
//! are quoted.  Normalization never fails; anything it doesn't recognize
//! passes through for the parser to report.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

use crate::builtins::STANDARD_REGISTRY;

const LEGACY_MARKER: char = '@';

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref QUOTES_RE: Regex = Regex::new(r#""{2,}"#).unwrap();
    static ref LAG_RE: Regex = Regex::new(r"\(-(\d+)\)").unwrap();
}

/// normalize applies every rewrite, in order.
pub fn normalize(equation: &str) -> String {
    let eqn = strip_marker(equation);
    let eqn = collapse_whitespace(&eqn);
    let eqn = fix_date_equality(&eqn);
    let eqn = collapse_quotes(&eqn);
    let eqn = rewrite_lags(&eqn);
    let eqn = quote_call_args(&eqn);

    if eqn != equation {
        tracing::debug!(raw = equation, normalized = eqn.as_str(), "normalized equation");
    }
    eqn
}

/// strip_marker drops every legacy `@` function prefix.
pub fn strip_marker(eqn: &str) -> Cow<'_, str> {
    if eqn.contains(LEGACY_MARKER) {
        Cow::Owned(eqn.replace(LEGACY_MARKER, ""))
    } else {
        Cow::Borrowed(eqn)
    }
}

pub fn collapse_whitespace(eqn: &str) -> Cow<'_, str> {
    WHITESPACE_RE.replace_all(eqn, " ")
}

/// fix_date_equality turns `date = ` into `date == `.  The source sheets
/// only use a bare `=` as a comparison in that one context.
pub fn fix_date_equality(eqn: &str) -> Cow<'_, str> {
    if eqn.contains("date = ") {
        Cow::Owned(eqn.replace("date = ", "date == "))
    } else {
        Cow::Borrowed(eqn)
    }
}

/// collapse_quotes undoes the spreadsheet's `""` escaping.
pub fn collapse_quotes(eqn: &str) -> Cow<'_, str> {
    QUOTES_RE.replace_all(eqn, "\"")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn trailing_word(s: &str) -> &str {
    let start = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map_or(s.len(), |(i, _)| i);
    &s[start..]
}

/// rewrite_lags turns a parenthesized negative offset directly after a
/// name into the lag suffix: `income(-1)` becomes `income_minus1`.  An
/// offset after anything else (`base^(-1)`, `2 * (-1)`) is arithmetic and
/// is left alone, as is a call to a standard function (`exp(-1)`).
pub fn rewrite_lags(eqn: &str) -> String {
    let mut out = String::with_capacity(eqn.len());
    let mut last = 0;
    for caps in LAG_RE.captures_iter(eqn) {
        let (Some(m), Some(digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&eqn[last..m.start()]);
        // look at what we've written, so chained offsets like x(-1)(-1)
        // are handled in a single pass
        let word = trailing_word(&out);
        if !word.is_empty() && !STANDARD_REGISTRY.contains(&word.to_ascii_lowercase()) {
            out.push_str("_minus");
            out.push_str(digits.as_str());
        } else {
            out.push_str(m.as_str());
        }
        last = m.end();
    }
    out.push_str(&eqn[last..]);
    out
}

/// Which call arguments get quoted, and how.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum QuotedCall {
    /// `d`/`dlog`: the whole argument is one expression body
    Body,
    /// `elem`: each argument is a separate name or label
    EachArg,
}

fn quoted_call(name: &str) -> Option<QuotedCall> {
    match name.to_ascii_lowercase().as_str() {
        "d" | "dlog" => Some(QuotedCall::Body),
        "elem" => Some(QuotedCall::EachArg),
        _ => None,
    }
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// is_quoted reports whether `s` is exactly one string literal.
fn is_quoted(s: &str) -> bool {
    let mut chars = s.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close)) if is_quote(open) && open == close => {
            !s[1..s.len() - 1].contains(open)
        }
        _ => false,
    }
}

/// quote wraps `s` in whichever quote character it doesn't contain, or
/// returns None if it contains both.
fn quote(s: &str) -> Option<String> {
    if !s.contains('"') {
        Some(format!("\"{s}\""))
    } else if !s.contains('\'') {
        Some(format!("'{s}'"))
    } else {
        None
    }
}

/// matching_paren returns the byte offset of the `)` closing the `(` at
/// `open`, skipping over quoted text.
fn matching_paren(eqn: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote: Option<char> = None;
    for (i, c) in eqn[open..].char_indices() {
        match in_quote {
            Some(q) if c == q => in_quote = None,
            Some(_) => {}
            None if is_quote(c) => in_quote = Some(c),
            None if c == '(' => depth += 1,
            None if c == ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            None => {}
        }
    }
    None
}

/// split_args splits call arguments on top-level commas.
fn split_args(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match in_quote {
            Some(q) if c == q => in_quote = None,
            Some(_) => {}
            None if is_quote(c) => in_quote = Some(c),
            None if c == '(' => depth += 1,
            None if c == ')' => depth = depth.saturating_sub(1),
            None if c == ',' && depth == 0 => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            None => {}
        }
    }
    parts.push(&args[start..]);
    parts
}

fn quote_body(inner: &str) -> String {
    let body = inner.trim();
    if body.is_empty() || is_quoted(body) {
        return inner.to_owned();
    }
    // a nested d(...) inside the body needs its own quotes first
    let body = quote_call_args(body);
    quote(&body).unwrap_or_else(|| inner.to_owned())
}

fn quote_each_arg(inner: &str) -> String {
    split_args(inner)
        .into_iter()
        .map(|arg| {
            let core = arg.trim();
            if core.is_empty() || is_quoted(core) {
                return arg.to_owned();
            }
            match quote(core) {
                Some(quoted) => {
                    let lead = arg.len() - arg.trim_start().len();
                    let trail_start = lead + core.len();
                    format!("{}{}{}", &arg[..lead], quoted, &arg[trail_start..])
                }
                None => arg.to_owned(),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// quote_call_args quotes the arguments of `d`, `dlog` and `elem` calls
/// that aren't quoted yet: `dlog(GPW / APH)` becomes `dlog("GPW / APH")`
/// and `elem(PBRENT, 2009Q3)` becomes `elem("PBRENT", "2009Q3")`.  Calls
/// inside string literals, and calls without a closing paren, are left
/// alone.
pub fn quote_call_args(eqn: &str) -> String {
    let mut out = String::with_capacity(eqn.len() + 8);
    let mut in_quote: Option<char> = None;
    let mut i = 0;

    while let Some(c) = eqn[i..].chars().next() {
        match in_quote {
            Some(q) => {
                if c == q {
                    in_quote = None;
                }
            }
            None if is_quote(c) => in_quote = Some(c),
            None if is_word_char(c) => {
                // take the whole word, so `add(x)` is never mistaken for `d(x)`
                let end = eqn[i..]
                    .find(|c: char| !is_word_char(c))
                    .map_or(eqn.len(), |n| i + n);
                let word = &eqn[i..end];
                out.push_str(word);
                i = end;

                let call = quoted_call(word).filter(|_| eqn[end..].starts_with('('));
                if let Some(call) = call
                    && let Some(close) = matching_paren(eqn, end)
                {
                    let inner = &eqn[end + 1..close];
                    let inner = match call {
                        QuotedCall::Body => quote_body(inner),
                        QuotedCall::EachArg => quote_each_arg(inner),
                    };
                    out.push('(');
                    out.push_str(&inner);
                    out.push(')');
                    i = close + 1;
                }
                continue;
            }
            None => {}
        }
        out.push(c);
        i += c.len_utf8();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_marker() {
        assert_eq!("d(x)", strip_marker("@d(x)"));
        assert_eq!("income", strip_marker("income"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!("a + b", collapse_whitespace("a  +\t\nb"));
        assert_eq!(" a ", collapse_whitespace("   a   "));
    }

    #[test]
    fn test_fix_date_equality() {
        assert_eq!(
            "recode(date == dateval(\"2023:03\"), 1, 0)",
            fix_date_equality("recode(date = dateval(\"2023:03\"), 1, 0)")
        );
        assert_eq!("date == 1", fix_date_equality("date == 1"));
        // only the literal `date = ` form
        assert_eq!("x = 1", fix_date_equality("x = 1"));
    }

    #[test]
    fn test_collapse_quotes() {
        assert_eq!("dateval(\"2011:12\")", collapse_quotes("dateval(\"\"2011:12\"\")"));
        assert_eq!("\"a\"", collapse_quotes("\"\"\"a\"\"\""));
    }

    #[test]
    fn test_rewrite_lags() {
        let cases = [
            ("income(-1)", "income_minus1"),
            ("income(-12) + x(-2)", "income_minus12 + x_minus2"),
            ("9(-12)", "9_minus12"),
            ("x(-1)(-1)", "x_minus1_minus1"),
            ("base^(-1)", "base^(-1)"),
            ("8^(-1)", "8^(-1)"),
            ("2 * (-1)", "2 * (-1)"),
            ("(-1)", "(-1)"),
            ("income(- 1)", "income(- 1)"),
            ("exp(-1)", "exp(-1)"),
            ("LOG(-2) + income(-1)", "LOG(-2) + income_minus1"),
            ("max(-1)(-1)", "max(-1)(-1)"),
            ("exponent(-1)", "exponent_minus1"),
        ];
        for (input, expected) in cases {
            assert_eq!(expected, rewrite_lags(input), "for input '{input}'");
        }
    }

    #[test]
    fn test_quote_call_args() {
        let cases = [
            ("d(income)", "d(\"income\")"),
            ("dlog(GPW / APH)", "dlog(\"GPW / APH\")"),
            ("d( income_minus1 )", "d(\"income_minus1\")"),
            ("d(\"income\")", "d(\"income\")"),
            ("d('income')", "d('income')"),
            ("DLOG(x)", "DLOG(\"x\")"),
            ("elem(PBRENT, 2009Q3)", "elem(\"PBRENT\", \"2009Q3\")"),
            ("elem(dave, 'Q1_1970')", "elem(\"dave\", 'Q1_1970')"),
            ("elem(\"PBRENT\" , \"2009Q3\")", "elem(\"PBRENT\" , \"2009Q3\")"),
            ("add(x) + d(y)", "add(x) + d(\"y\")"),
            ("d(x) * dlog(log(y))", "d(\"x\") * dlog(\"log(y)\")"),
            ("d(elem(A, B))", "d('elem(\"A\", \"B\")')"),
            ("\"d(x)\"", "\"d(x)\""),
            ("d(x", "d(x"),
            ("d()", "d()"),
            ("d (x)", "d (x)"),
        ];
        for (input, expected) in cases {
            assert_eq!(expected, quote_call_args(input), "for input '{input}'");
        }
    }

    #[test]
    fn test_normalize() {
        let cases = [
            ("@d(income(-1))", "d(\"income_minus1\")"),
            ("@dlog(income(-1))", "dlog(\"income_minus1\")"),
            ("8^(-1)", "8^(-1)"),
            ("base^(-1)", "base^(-1)"),
            ("income(-1)", "income_minus1"),
            ("9(-12)", "9_minus12"),
            ("dlog(GPW  / APH)", "dlog(\"GPW / APH\")"),
            ("@elem(dave, 'Q1_1970')", "elem(\"dave\", 'Q1_1970')"),
            (
                "@recode(date = @dateval(\"\"2011:12\"\"), 1, 0)",
                "recode(date == dateval(\"2011:12\"), 1, 0)",
            ),
            (
                "0.5 * @dlog(GDPM(-1)) + 0.3 * d(X)",
                "0.5 * dlog(\"GDPM_minus1\") + 0.3 * d(\"X\")",
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(expected, normalize(input), "for input '{input}'");
        }
    }

    #[test]
    fn test_normalize_identity() {
        for eqn in [
            "income / income_minus1",
            "d(\"income\") * 2",
            "recode(7 <= 7, 1, 0)",
            "base^(-1)",
            "elem(\"PBRENT\", \"2009Q3\")",
        ] {
            assert_eq!(eqn, normalize(eqn));
        }
    }
}
