// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Long-format time series (one row per series, period and value) and
//! the code that lays them out in an Env under the names equations use:
//! `ABJR` for the current period, `ABJR_minus1` for the one before, and
//! `ABJR_2009Q3` for `elem("ABJR", "2009Q3")`.

use std::collections::BTreeMap;
#[cfg(feature = "file_io")]
use std::error::Error;
#[cfg(feature = "file_io")]
use std::io::Read;
#[cfg(feature = "file_io")]
use std::result::Result as StdResult;

use lazy_static::lazy_static;
use regex::Regex;
#[cfg(feature = "file_io")]
use serde::Deserialize;

use crate::builtins::elem_name;
use crate::env::Env;
use crate::lag::lag_name;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

lazy_static! {
    static ref QUARTER_RE: Regex = Regex::new(r"^(\d{4})[-:_]?Q([1-4])$").unwrap();
    static ref MONTH_RE: Regex = Regex::new(r"^(\d{4})[-:_]?M?(\d{1,2})$").unwrap();
    static ref MONTH_NAME_RE: Regex = Regex::new(r"^(\d{4})[-:_]?([A-Z]{3})[A-Z]*$").unwrap();
}

/// A reporting period, as published by the statistics office.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Period {
    Quarter { year: i32, quarter: u32 },
    Month { year: i32, month: u32 },
}

impl Period {
    /// parse understands `2009Q3`, `2009 Q3`, `2009-Q3`, `2011M12`,
    /// `2011-12`, `2011:12`, `201112` and `2011 DEC`.
    pub fn parse(label: &str) -> Option<Period> {
        let label: String = label
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        if let Some(caps) = QUARTER_RE.captures(&label) {
            return Some(Period::Quarter {
                year: caps[1].parse().ok()?,
                quarter: caps[2].parse().ok()?,
            });
        }
        if let Some(caps) = MONTH_RE.captures(&label) {
            let month: u32 = caps[2].parse().ok()?;
            if !(1..=12).contains(&month) {
                return None;
            }
            return Some(Period::Month {
                year: caps[1].parse().ok()?,
                month,
            });
        }
        if let Some(caps) = MONTH_NAME_RE.captures(&label) {
            let name = &caps[2];
            let month = MONTHS.iter().position(|m| *m == name)? as u32 + 1;
            return Some(Period::Month {
                year: caps[1].parse().ok()?,
                month,
            });
        }
        None
    }

    /// code is the `YYYYMM` (or `YYYYQQ`) integer `dateval` produces.
    pub fn code(&self) -> i64 {
        match *self {
            Period::Quarter { year, quarter } => year as i64 * 100 + quarter as i64,
            Period::Month { year, month } => year as i64 * 100 + month as i64,
        }
    }

    /// label is the canonical spelling used in `elem` names.
    pub fn label(&self) -> String {
        match *self {
            Period::Quarter { year, quarter } => format!("{year}Q{quarter}"),
            Period::Month { year, month } => format!("{year}M{month:02}"),
        }
    }
}

/// period_code converts a period label into its date code.
pub fn period_code(label: &str) -> Option<i64> {
    Period::parse(label).map(|p| p.code())
}

/// sanitize_label makes an unrecognized period label usable as part of
/// an identifier.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub label: String,
    pub period: Option<Period>,
    pub value: f64,
}

impl Observation {
    fn new(label: &str, value: f64) -> Self {
        let period = Period::parse(label);
        let label = match period {
            Some(p) => p.label(),
            None => sanitize_label(label),
        };
        Observation {
            label,
            period,
            value,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeriesTable {
    series: BTreeMap<String, Vec<Observation>>,
}

#[cfg(feature = "file_io")]
#[derive(Debug, Deserialize)]
struct SeriesRecord {
    #[serde(alias = "timeseries_id", alias = "series_id")]
    series: String,
    #[serde(alias = "date")]
    period: String,
    value: Option<f64>,
}

impl SeriesTable {
    pub fn new() -> Self {
        SeriesTable {
            series: BTreeMap::new(),
        }
    }

    /// push appends an observation.  Series codes are uppercased to match
    /// the four-letter identifiers used in equations.
    pub fn push(&mut self, code: &str, label: &str, value: f64) {
        self.series
            .entry(code.trim().to_ascii_uppercase())
            .or_default()
            .push(Observation::new(label, value));
    }

    /// len is the number of distinct series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// sort orders each series chronologically.  A series with any label
    /// that isn't a recognized period keeps its input order.
    pub fn sort(&mut self) {
        for obs in self.series.values_mut() {
            if obs.iter().all(|o| o.period.is_some()) {
                obs.sort_by_key(|o| o.period.map(|p| p.code()));
            }
        }
    }

    /// populate loads every series into `env` relative to `period`: the
    /// value at `period` under the bare code, up to `max_lag` earlier
    /// observations as `<code>_minus<N>`, and every observation as
    /// `<code>_<label>`.  Series with no observation at `period` only get
    /// the per-label entries.  Returns the number of entries written.
    pub fn populate(&self, env: &mut Env, period: &str, max_lag: u32) -> usize {
        let wanted = Observation::new(period, 0.0).label;
        let mut count = 0;

        for (code, obs) in self.series.iter() {
            for o in obs.iter() {
                env.set(elem_name(code, &o.label), o.value);
                count += 1;
            }

            let Some(idx) = obs.iter().position(|o| o.label == wanted) else {
                tracing::debug!(series = code.as_str(), period, "no observation for period");
                continue;
            };
            for lag in 0..=max_lag as usize {
                if lag > idx {
                    break;
                }
                env.set(lag_name(code, lag as u32), obs[idx - lag].value);
                count += 1;
            }
        }

        count
    }

    /// from_reader reads `series,period,value` CSV records (the columns
    /// may also be named `timeseries_id` and `date`).  Rows with an empty
    /// value are skipped.
    #[cfg(feature = "file_io")]
    pub fn from_reader<R: Read>(reader: R) -> StdResult<Self, Box<dyn Error>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = SeriesTable::new();
        let mut skipped = 0;
        for result in rdr.deserialize() {
            let record: SeriesRecord = result?;
            match record.value {
                Some(value) => table.push(&record.series, &record.period, value),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(skipped, "skipped series rows without a value");
        }
        table.sort();

        Ok(table)
    }

    #[cfg(feature = "file_io")]
    pub fn load_csv(file_path: &str) -> StdResult<Self, Box<dyn Error>> {
        let file = std::fs::File::open(file_path)?;
        SeriesTable::from_reader(std::io::BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parse() {
        let q3 = Some(Period::Quarter {
            year: 2009,
            quarter: 3,
        });
        assert_eq!(q3, Period::parse("2009Q3"));
        assert_eq!(q3, Period::parse("2009 Q3"));
        assert_eq!(q3, Period::parse("2009-q3"));

        let dec = Some(Period::Month {
            year: 2011,
            month: 12,
        });
        for label in ["2011M12", "2011-12", "2011:12", "201112", "2011 DEC", "2011 December"] {
            assert_eq!(dec, Period::parse(label), "{label}");
        }

        assert_eq!(None, Period::parse("2011:13"));
        assert_eq!(None, Period::parse("Q1_1970"));
        assert_eq!(None, Period::parse("2011 FOO"));
    }

    #[test]
    fn test_period_code() {
        assert_eq!(Some(200903), period_code("2009Q3"));
        assert_eq!(Some(201112), period_code("2011:12"));
        assert_eq!(Some(202302), period_code("2023 FEB"));
        assert_eq!(None, period_code("latest"));
    }

    #[test]
    fn test_labels() {
        assert_eq!("2011M02", Period::parse("2011 FEB").unwrap().label());
        assert_eq!("2009Q3", Period::parse("2009 Q3").unwrap().label());
        assert_eq!("Q1_1970", sanitize_label("Q1 1970"));
        assert_eq!("Q1_1970", sanitize_label("Q1_1970"));
        assert_eq!("a_b", sanitize_label("a/b"));
    }

    fn table() -> SeriesTable {
        let mut table = SeriesTable::new();
        // out of order on purpose
        table.push("abjr", "2009 Q3", 12.0);
        table.push("ABJR", "2009 Q1", 10.0);
        table.push("ABJR", "2009 Q2", 11.0);
        table.push("PBRT", "2009 Q2", 70.0);
        table.sort();
        table
    }

    #[test]
    fn test_sort() {
        let table = table();
        // codes are uppercased, so `abjr` and `ABJR` are one series
        assert_eq!(2, table.len());

        // lags follow the chronological order, not the push order
        let mut env = Env::with_date(200902);
        table.populate(&mut env, "2009Q2", 4);
        assert_eq!(11.0, env.get("ABJR").unwrap());
        assert_eq!(10.0, env.get("ABJR_minus1").unwrap());
        assert!(!env.contains("ABJR_minus2"));
    }

    #[test]
    fn test_populate() {
        let table = table();
        let mut env = Env::with_date(200903);
        let count = table.populate(&mut env, "2009Q3", 4);

        assert_eq!(12.0, env.get("ABJR").unwrap());
        assert_eq!(11.0, env.get("ABJR_minus1").unwrap());
        assert_eq!(10.0, env.get("ABJR_minus2").unwrap());
        assert!(!env.contains("ABJR_minus3"));
        assert_eq!(11.0, env.get("ABJR_2009Q2").unwrap());
        assert_eq!(70.0, env.get("PBRT_2009Q2").unwrap());
        // PBRT has nothing for 2009Q3
        assert!(!env.contains("PBRT"));
        // 4 labelled entries plus ABJR and two lags
        assert_eq!(7, count);
    }

    #[cfg(feature = "file_io")]
    #[test]
    fn test_from_reader() {
        let csv = "timeseries_id,date,value\n\
                   ABJR,2009 Q1,10\n\
                   ABJR,2009 Q2, \n\
                   ABJR,2009 Q3,12.5\n";
        let table = SeriesTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(1, table.len());

        let mut env = Env::with_date(200903);
        // the row without a value is skipped: two labels, ABJR and one lag
        assert_eq!(4, table.populate(&mut env, "2009Q3", 4));
        assert_eq!(12.5, env.get("ABJR").unwrap());
        assert_eq!(10.0, env.get("ABJR_minus1").unwrap());
        assert!(!env.contains("ABJR_2009Q2"));
    }
}
