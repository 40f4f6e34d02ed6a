// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Property-based tests for the equation normalizer.
//!
//! These check that:
//! 1. every rewrite, alone and composed, is idempotent
//! 2. equations already in normalized form are left untouched

use proptest::prelude::*;

use crate::normalizer::*;

// identifiers always carry an underscore, so they can never be one of
// the quoted-argument functions
fn ident_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z]{1,5}_[a-zA-Z0-9]{1,4}".prop_map(|s| s.to_string())
}

fn number_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..1000).prop_map(|n| n.to_string()),
        (0u32..1000).prop_map(|n| format!("{}.{}", n / 10, n % 10)),
    ]
}

fn op_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("+".to_string()),
        Just("-".to_string()),
        Just("*".to_string()),
        Just("/".to_string()),
        Just("^".to_string()),
        Just("==".to_string()),
        Just("<=".to_string()),
        Just("(".to_string()),
        Just(")".to_string()),
        Just(",".to_string()),
    ]
}

/// tokens of an equation that is already in normalized form
fn normalized_token_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => ident_strategy(),
        2 => number_strategy(),
        4 => op_strategy(),
        1 => (1u32..24).prop_map(|n| format!("^(-{n})")),
        1 => ident_strategy().prop_map(|id| format!("d(\"{id}\")")),
        1 => (ident_strategy(), ident_strategy())
            .prop_map(|(a, b)| format!("dlog('{a} / {b}')")),
        1 => (ident_strategy(), 1990u32..2030, 1u32..5)
            .prop_map(|(id, y, q)| format!("elem(\"{id}\", \"{y}Q{q}\")")),
        1 => (1990u32..2030, 1u32..13)
            .prop_map(|(y, m)| format!("dateval(\"{y}:{m:02}\")")),
    ]
}

fn normalized_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(normalized_token_strategy(), 1..12).prop_map(|toks| toks.join(" "))
}

/// fragments of raw spreadsheet equations, including every idiom the
/// normalizer rewrites
fn raw_fragment_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => ident_strategy(),
        2 => number_strategy(),
        4 => op_strategy(),
        2 => " {1,3}".prop_map(|s| s.to_string()),
        1 => Just("\t".to_string()),
        1 => Just("@".to_string()),
        1 => Just("date = ".to_string()),
        2 => (1u32..24).prop_map(|n| format!("(-{n})")),
        1 => (1u32..24).prop_map(|n| format!("^(-{n})")),
        1 => ident_strategy().prop_map(|id| format!("@d({id})")),
        1 => (ident_strategy(), ident_strategy())
            .prop_map(|(a, b)| format!("dlog({a}  / {b}(-1))")),
        1 => (ident_strategy(), 1990u32..2030, 1u32..5)
            .prop_map(|(id, y, q)| format!("elem({id}, {y}Q{q})")),
        1 => (1990u32..2030, 1u32..13)
            .prop_map(|(y, m)| format!("dateval(\"\"{y}:{m:02}\"\")")),
    ]
}

fn raw_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(raw_fragment_strategy(), 1..12).prop_map(|frags| frags.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn normalize_is_idempotent(eqn in raw_strategy()) {
        let once = normalize(&eqn);
        let twice = normalize(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn each_rule_is_idempotent(eqn in raw_strategy()) {
        let s = strip_marker(&eqn).into_owned();
        prop_assert_eq!(&s, &strip_marker(&s).into_owned());

        let s = collapse_whitespace(&eqn).into_owned();
        prop_assert_eq!(&s, &collapse_whitespace(&s).into_owned());

        let s = fix_date_equality(&eqn).into_owned();
        prop_assert_eq!(&s, &fix_date_equality(&s).into_owned());

        let s = collapse_quotes(&eqn).into_owned();
        prop_assert_eq!(&s, &collapse_quotes(&s).into_owned());

        let s = rewrite_lags(&eqn);
        prop_assert_eq!(&s, &rewrite_lags(&s));

        let s = quote_call_args(&eqn);
        prop_assert_eq!(&s, &quote_call_args(&s));
    }

    #[test]
    fn normalized_input_is_unchanged(eqn in normalized_strategy()) {
        prop_assert_eq!(&eqn, &normalize(&eqn));
    }

    #[test]
    fn no_lag_notation_survives(eqn in raw_strategy()) {
        let normalized = normalize(&eqn);
        prop_assert!(!normalized.contains('@'));
        prop_assert!(!normalized.contains("  "));
        prop_assert!(!normalized.contains("date = "));
    }
}
