// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Batch evaluation of a model spec table against series loaded from
//! CSV, the way the `obr run` command drives the engine.

use std::io::Write;

use obr_engine::model_spec::{load_spec_path, ons_identifiers};
use obr_engine::{Env, SeriesTable, evaluate_rows, period_code};

const SPEC: &str = "\
number,variable,model_identifier,ons_identifier_code,equation,equation_type,group
1+,Household income,INC,ABJR,@d(ABJR),Behavioural,Households
2+,Income growth,INCG,ABJR,dlog(ABJR(-1)),Behavioural,Households
3+,Brent oil price,PBRENT,,\"elem(\"\"PBRT\"\", \"\"2009Q2\"\")\",Exogenous,Oil
4+,Post-2009 dummy,D09,,\"recode(date >= dateval(\"\"2009:03\"\"), 1, 0)\",Dummy,Misc
5+,Broken,BRK,HAYO NMRP,HAYO / 0,Identity,Misc
6+,Missing series,MISS,KLMN,KLMN + 1,Identity,Misc
";

const SERIES: &str = "\
series,period,value
ABJR,2009 Q1,100
ABJR,2009 Q3,121
ABJR,2009 Q2,110
PBRT,2009 Q2,62.5
HAYO,2009 Q3,3
";

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn load_env(period: &str) -> Env {
    let series = write_temp(SERIES);
    let table = SeriesTable::load_csv(series.path().to_str().unwrap()).unwrap();
    let mut env = Env::with_date(period_code(period).unwrap());
    table.populate(&mut env, period, 4);
    env
}

#[test]
fn batch_run_isolates_failures() {
    let spec = write_temp(SPEC);
    let rows = load_spec_path(spec.path().to_str().unwrap()).unwrap();
    assert_eq!(6, rows.len());

    let env = load_env("2009Q3");
    let outcomes = evaluate_rows(&rows, &env);
    assert_eq!(rows.len(), outcomes.len());

    // in row order, whatever order rayon finished them in
    let ids: Vec<_> = outcomes
        .iter()
        .map(|o| o.model_identifier.clone().unwrap())
        .collect();
    assert_eq!(vec!["INC", "INCG", "PBRENT", "D09", "BRK", "MISS"], ids);

    assert_eq!(Some(11.0), outcomes[0].value);
    assert_eq!("d(\"ABJR\")", outcomes[0].normalized);

    let expected = 110.0f64.ln() - 100.0f64.ln();
    let got = outcomes[1].value.unwrap();
    assert!((expected - got).abs() < 1e-12, "{got}");
    assert_eq!("dlog(\"ABJR_minus1\")", outcomes[1].normalized);

    assert_eq!(Some(62.5), outcomes[2].value);
    assert_eq!(Some(1.0), outcomes[3].value);

    assert_eq!(None, outcomes[4].value);
    assert_eq!(Some("ArithmeticError".to_owned()), outcomes[4].error_kind);

    assert_eq!(None, outcomes[5].value);
    assert_eq!(
        Some("UnresolvedVariableError".to_owned()),
        outcomes[5].error_kind
    );
    assert!(outcomes[5].error.as_ref().unwrap().contains("KLMN"));
}

#[test]
fn outcomes_serialize() {
    let spec = write_temp(SPEC);
    let rows = load_spec_path(spec.path().to_str().unwrap()).unwrap();
    let env = load_env("2009Q3");
    let outcomes = evaluate_rows(&rows[..1], &env);

    let json = serde_json::to_value(&outcomes).unwrap();
    assert_eq!("INC", json[0]["model_identifier"]);
    assert_eq!(11.0, json[0]["value"]);
    assert!(json[0]["error"].is_null());
}

#[test]
fn identifiers_from_spec() {
    let spec = write_temp(SPEC);
    let rows = load_spec_path(spec.path().to_str().unwrap()).unwrap();
    assert_eq!(vec!["ABJR", "HAYO", "NMRP", "KLMN"], ons_identifiers(&rows));
}

#[test]
fn missing_spec_file() {
    assert!(load_spec_path("/nonexistent/model_spec.csv").is_err());
}
