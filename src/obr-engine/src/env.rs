// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;

use chrono::{Datelike, Local};

use crate::common::{Error, ErrorCode, Result};

/// The reserved entry holding the current period as a `YYYYMM` integer.
pub const DATE: &str = "date";

/// current_date_code returns today's year and two-digit month concatenated
/// into an integer, e.g. 202303 for March 2023.
pub fn current_date_code() -> i64 {
    let now = Local::now();
    now.year() as i64 * 100 + now.month() as i64
}

/// Env is the name to value mapping an equation is evaluated against.
///
/// Evaluation only ever reads an Env, so one instance can be shared
/// across threads evaluating a batch of equations.  Names are
/// case-sensitive, and lagged values live under their own derived names
/// (`income_minus1`), so there is no notion of time inside the Env itself.
#[derive(Clone, Debug, PartialEq)]
pub struct Env {
    values: HashMap<String, f64>,
}

impl Env {
    /// new returns an Env holding only the `date` entry, seeded from the
    /// local clock.
    pub fn new() -> Self {
        Env::with_date(current_date_code())
    }

    /// with_date returns an Env whose `date` entry is `yyyymm` rather
    /// than today, for reproducible evaluation of date-coded equations.
    pub fn with_date(yyyymm: i64) -> Self {
        let mut values = HashMap::new();
        values.insert(DATE.to_owned(), yyyymm as f64);
        Env { values }
    }

    /// from_values builds an Env from existing values, seeding `date`
    /// from the local clock only if the caller didn't supply one.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut env = Env {
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        };
        env.values
            .entry(DATE.to_owned())
            .or_insert_with(|| current_date_code() as f64);
        env
    }

    pub fn get(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| Error::new(ErrorCode::UnknownVariable, Some(name.to_owned())))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn set<S: Into<String>>(&mut self, name: S, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn date(&self) -> Option<i64> {
        self.values.get(DATE).map(|d| *d as i64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}

impl<S: Into<String>> Extend<(S, f64)> for Env {
    fn extend<T: IntoIterator<Item = (S, f64)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.set(name, value);
        }
    }
}
