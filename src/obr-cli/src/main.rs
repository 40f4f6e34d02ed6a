// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

mod logging;

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use obr_engine::ast::print_eqn;
use obr_engine::model_spec::{Outcome, load_spec_path};
use obr_engine::parser::parse;
use obr_engine::{
    Env, Error, Period, SeriesTable, evaluate_raw, evaluate_rows, normalize, ons_identifiers,
    period_code,
};

#[derive(Debug, Parser)]
#[command(name = "obr", version, about = "Normalize and evaluate macroeconomic model equations")]
struct Cli {
    /// Log more (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print each equation in normalized form
    Normalize {
        #[arg(required = true)]
        equations: Vec<String>,
    },

    /// Print how each equation groups, fully parenthesized
    Parse {
        #[arg(required = true)]
        equations: Vec<String>,
    },

    /// Normalize and evaluate a single equation
    Eval(EvalArgs),

    /// Evaluate every row of a model spec table
    Run(RunArgs),

    /// List the ONS series codes a model spec table references
    Identifiers {
        /// Cleaned model spec CSV
        #[arg(long)]
        spec: String,
    },
}

#[derive(Debug, Args)]
struct EnvArgs {
    /// Long-format series CSV (series,period,value)
    #[arg(long)]
    series: Option<String>,

    /// Current period, e.g. 2009Q3 or 2011:12
    #[arg(long)]
    period: Option<String>,

    /// How many earlier periods to load as NAME_minusN
    #[arg(long, default_value_t = 4)]
    max_lag: u32,

    /// Value for `date` as YYYYMM or YYYY:MM (default: the period, else today)
    #[arg(long, value_parser = parse_date)]
    date: Option<i64>,

    /// Set a variable directly, e.g. --set income=6
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    assignments: Vec<(String, f64)>,
}

#[derive(Debug, Args)]
struct EvalArgs {
    #[command(flatten)]
    env: EnvArgs,

    equation: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Cleaned model spec CSV
    #[arg(long)]
    spec: String,

    #[command(flatten)]
    env: EnvArgs,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Path to write results to instead of stdout
    #[arg(long)]
    output: Option<String>,
}

fn parse_assignment(s: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{s}'"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("bad value for {name}: {err}"))?;
    Ok((name.to_owned(), value))
}

fn parse_date(s: &str) -> std::result::Result<i64, String> {
    match Period::parse(s) {
        Some(period) => Ok(period.code()),
        None => Err(format!("expected a date like 202302 or 2023:02, got '{s}'")),
    }
}

fn build_env(args: &EnvArgs) -> Result<Env> {
    let date = args
        .date
        .or_else(|| args.period.as_deref().and_then(period_code));
    let mut env = match date {
        Some(date) => Env::with_date(date),
        None => Env::new(),
    };

    if let Some(path) = args.series.as_deref() {
        let Some(period) = args.period.as_deref() else {
            bail!("--series needs --period to know which observation is current");
        };
        let table =
            SeriesTable::load_csv(path).map_err(|err| anyhow!("reading {path}: {err}"))?;
        let count = table.populate(&mut env, period, args.max_lag);
        tracing::debug!(series = table.len(), entries = count, period, "loaded series");
    }

    for (name, value) in args.assignments.iter() {
        env.set(name.as_str(), *value);
    }

    Ok(env)
}

fn cmd_normalize(equations: &[String]) -> Result<()> {
    let mut out = io::stdout().lock();
    for eqn in equations {
        writeln!(out, "{}", normalize(eqn))?;
    }
    Ok(())
}

fn cmd_parse(equations: &[String]) -> Result<()> {
    let mut out = io::stdout().lock();
    let mut failed = 0;
    for eqn in equations {
        let normalized = normalize(eqn);
        match parse(&normalized) {
            Ok(Some(expr)) => writeln!(out, "{}", print_eqn(&expr))?,
            Ok(None) => writeln!(out)?,
            Err(err) => {
                let err = Error::from_equation_error(&err, &normalized).with_equation(&normalized);
                eprintln!("{err}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} equations failed to parse", equations.len());
    }
    Ok(())
}

fn cmd_eval(args: &EvalArgs) -> Result<()> {
    let env = build_env(&args.env)?;
    let value = evaluate_raw(&args.equation, &env)?;
    println!("{value}");
    Ok(())
}

fn write_outcomes(outcomes: &[Outcome], format: Format, out: Box<dyn Write>) -> Result<()> {
    match format {
        Format::Csv => {
            let mut wtr = csv::Writer::from_writer(out);
            for outcome in outcomes {
                wtr.serialize(outcome)?;
            }
            wtr.flush()?;
        }
        Format::Json => {
            let mut out = out;
            serde_json::to_writer_pretty(&mut out, outcomes)?;
            writeln!(out)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn cmd_run(args: &RunArgs) -> Result<()> {
    let rows = load_spec_path(&args.spec).map_err(|err| anyhow!("reading {}: {err}", args.spec))?;
    let env = build_env(&args.env)?;
    let outcomes = evaluate_rows(&rows, &env);

    let out: Box<dyn Write> = match args.output.as_deref() {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {path}"))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    write_outcomes(&outcomes, args.format, out)
}

fn cmd_identifiers(spec: &str) -> Result<()> {
    let rows = load_spec_path(spec).map_err(|err| anyhow!("reading {spec}: {err}"))?;
    let mut out = io::stdout().lock();
    for code in ons_identifiers(&rows) {
        writeln!(out, "{code}")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Normalize { equations } => cmd_normalize(&equations),
        Commands::Parse { equations } => cmd_parse(&equations),
        Commands::Eval(args) => cmd_eval(&args),
        Commands::Run(args) => cmd_run(&args),
        Commands::Identifiers { spec } => cmd_identifiers(&spec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(("income".to_owned(), 6.0), parse_assignment("income=6").unwrap());
        assert_eq!(("x".to_owned(), -1.5), parse_assignment(" x = -1.5").unwrap());
        assert!(parse_assignment("income").is_err());
        assert!(parse_assignment("=6").is_err());
        assert!(parse_assignment("income=six").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(Ok(202302), parse_date("202302"));
        assert_eq!(Ok(201112), parse_date("2011:12"));
        assert_eq!(Ok(200903), parse_date("2009Q3"));
        assert!(parse_date("5").is_err());
        assert!(parse_date("202313").is_err());
        assert!(parse_date("2023:00").is_err());
    }

    #[test]
    fn test_build_env_date_from_period() {
        let args = EnvArgs {
            series: None,
            period: Some("2009Q3".to_owned()),
            max_lag: 4,
            date: None,
            assignments: vec![("income".to_owned(), 6.0)],
        };
        let env = build_env(&args).unwrap();
        assert_eq!(Some(200903), env.date());
        assert_eq!(6.0, env.get("income").unwrap());
    }

    #[test]
    fn test_series_needs_period() {
        let args = EnvArgs {
            series: Some("series.csv".to_owned()),
            period: None,
            max_lag: 4,
            date: Some(202302),
            assignments: vec![],
        };
        assert!(build_env(&args).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
