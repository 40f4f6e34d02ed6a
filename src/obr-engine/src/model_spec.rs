// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The cleaned model specification table: one row per model variable,
//! with the raw equation as it appears in the published spreadsheet.

#[cfg(feature = "file_io")]
use std::error::Error;
#[cfg(feature = "file_io")]
use std::io::Read;
#[cfg(feature = "file_io")]
use std::result::Result as StdResult;

use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::env::Env;
use crate::interpreter::Evaluator;
use crate::normalizer::normalize;

lazy_static! {
    static ref ONS_CODE_RE: Regex = Regex::new(r"[A-Za-z]{4}").unwrap();
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRow {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub variable: Option<String>,
    #[serde(default)]
    pub model_identifier: Option<String>,
    #[serde(default)]
    pub ons_identifier_code: Option<String>,
    pub equation: String,
    #[serde(default)]
    pub equation_type: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

impl SpecRow {
    pub fn new(equation: &str) -> Self {
        SpecRow {
            equation: equation.to_owned(),
            ..Default::default()
        }
    }

    /// name identifies the row in logs: the model identifier, else the
    /// variable description, else the row number.
    pub fn name(&self) -> &str {
        self.model_identifier
            .as_deref()
            .or(self.variable.as_deref())
            .or(self.number.as_deref())
            .unwrap_or("?")
    }
}

/// ons_identifiers pulls the four-letter series codes out of the
/// `ons_identifier_code` column, which holds them in free text
/// ("ABJR + HAYO", "see NMRP"), uppercased and in first-seen order.
pub fn ons_identifiers(rows: &[SpecRow]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut codes = Vec::new();
    for field in rows.iter().filter_map(|r| r.ons_identifier_code.as_deref()) {
        for m in ONS_CODE_RE.find_iter(field) {
            let code = m.as_str().to_ascii_uppercase();
            if seen.insert(code.clone()) {
                codes.push(code);
            }
        }
    }
    codes
}

/// Outcome is the result of evaluating one row, in a shape that can be
/// written straight out as CSV or JSON.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Outcome {
    pub number: Option<String>,
    pub variable: Option<String>,
    pub model_identifier: Option<String>,
    pub equation: String,
    pub normalized: String,
    pub value: Option<f64>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// evaluate_row normalizes and evaluates one row's equation.  Failures
/// are recorded in the Outcome rather than returned.
pub fn evaluate_row(row: &SpecRow, env: &Env) -> Outcome {
    let normalized = normalize(&row.equation);
    let result = Evaluator::new(env)
        .evaluate(&normalized)
        .and_then(|value| value.as_f64());

    let (value, error_kind, error) = match result {
        Ok(value) => (Some(value), None, None),
        Err(err) => {
            tracing::warn!(row = row.name(), error = %err, "equation failed");
            (None, Some(err.kind.to_string()), Some(err.to_string()))
        }
    };

    Outcome {
        number: row.number.clone(),
        variable: row.variable.clone(),
        model_identifier: row.model_identifier.clone(),
        equation: row.equation.clone(),
        normalized,
        value,
        error_kind,
        error,
    }
}

/// evaluate_rows evaluates every row in parallel against one shared,
/// read-only Env.  Outcomes come back in row order.
pub fn evaluate_rows(rows: &[SpecRow], env: &Env) -> Vec<Outcome> {
    let outcomes: Vec<Outcome> = rows.par_iter().map(|row| evaluate_row(row, env)).collect();
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    tracing::info!(rows = rows.len(), failed, "evaluated model spec");
    outcomes
}

#[cfg(feature = "file_io")]
pub fn load_spec_csv<R: Read>(reader: R) -> StdResult<Vec<SpecRow>, Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: SpecRow = result?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(feature = "file_io")]
pub fn load_spec_path(file_path: &str) -> StdResult<Vec<SpecRow>, Box<dyn Error>> {
    let file = std::fs::File::open(file_path)?;
    load_spec_csv(std::io::BufReader::new(file))
}
