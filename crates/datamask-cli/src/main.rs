mod input;
mod logging;
mod settings;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use datamask_engine::{CoverageMode, MaskError, MaskResult};
use datamask_plan::{
    PlanError, ValidatedPlan, ValidationReport, compile_plan, plan_json_schema, plan_json_schema_value,
    validate_plan,
};
use datamask_rules::RuleCatalog;
use serde_json::Value;
use thiserror::Error;

use crate::input::parse_records;
use crate::logging::init_logging;
use crate::settings::{Settings, load_settings};

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("plan is invalid ({} error(s))", .0.errors.len())]
    InvalidPlan(ValidationReport),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Mask(#[from] MaskError),
}

#[derive(Parser, Debug)]
#[command(name = "datamask", version, about = "Mask sensitive properties of JSON records")]
struct Cli {
    /// Settings file (defaults to ./datamask.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Append JSON logs to this file.
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mask a records file with a plan.
    Mask(MaskArgs),
    /// Validate a plan and print its issues.
    Validate(ValidateArgs),
    /// List the rule catalog.
    Rules(RulesArgs),
    /// Print the plan JSON Schema.
    Schema,
}

#[derive(Args, Debug)]
struct MaskArgs {
    /// Plan file (mask.plan.json).
    #[arg(long)]
    plan: PathBuf,
    /// Records as a JSON array or JSON lines.
    #[arg(long)]
    input: PathBuf,
    /// Output path for the results; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Override the plan's coverage mode.
    #[arg(long)]
    coverage: Option<CoverageMode>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[arg(long)]
    plan: PathBuf,
}

#[derive(Args, Debug)]
struct RulesArgs {
    /// Print descriptors as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(CliError::InvalidPlan(report)) => {
            print_report(&report);
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let settings = load_settings(cli.config.as_deref())?;
    let log_file = cli.log_file.as_deref().or(settings.log_file.as_deref());
    init_logging(&settings.log_level, log_file)?;

    match cli.command {
        Command::Mask(args) => run_mask(args, &settings),
        Command::Validate(args) => run_validate(args),
        Command::Rules(args) => run_rules(args),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&plan_json_schema())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_mask(args: MaskArgs, settings: &Settings) -> Result<ExitCode, CliError> {
    let MaskArgs {
        plan,
        input,
        out,
        coverage,
    } = args;

    let ValidatedPlan { mut plan, warnings } = load_plan(&plan)?;
    for warning in &warnings {
        tracing::warn!(code = %warning.code, path = %warning.path, "{}", warning.message);
    }
    if let Some(coverage) = coverage.or(settings.coverage) {
        plan.coverage = coverage;
    }

    let masker = compile_plan(&plan, &RuleCatalog::new())?;
    let records = parse_records(&read_file(&input)?)?;
    tracing::info!(event = "mask_started", records = records.len(), coverage = %plan.coverage);

    let results = records
        .iter()
        .map(|record| masker.mask_value(record))
        .collect::<Result<Vec<MaskResult>, _>>()?;
    let failed = results.iter().filter(|result| !result.is_success()).count();

    let encoded = serde_json::to_string_pretty(&results)?;
    match out {
        Some(path) => {
            std::fs::write(&path, encoded)?;
            tracing::info!(event = "results_written", path = %path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{encoded}")?;
        }
    }

    tracing::info!(event = "mask_finished", records = results.len(), failed);
    if failed > 0 {
        eprintln!("{failed} of {} record(s) had property errors", results.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_validate(args: ValidateArgs) -> Result<ExitCode, CliError> {
    let validated = load_plan(&args.plan)?;
    let report = ValidationReport {
        errors: Vec::new(),
        warnings: validated.warnings,
    };
    print_report(&report);
    println!("plan is valid");
    Ok(ExitCode::SUCCESS)
}

fn run_rules(args: RulesArgs) -> Result<ExitCode, CliError> {
    let catalog = RuleCatalog::new();
    if args.json {
        let descriptors: Vec<_> = catalog.descriptors().collect();
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(ExitCode::SUCCESS);
    }

    for descriptor in catalog.descriptors() {
        let kinds: Vec<_> = descriptor.kinds.iter().map(|kind| kind.as_str()).collect();
        let params: Vec<_> = descriptor
            .params
            .iter()
            .map(|param| {
                let marker = if param.required { "" } else { "?" };
                format!("{}{marker}: {}", param.key, param.kind.as_str())
            })
            .collect();
        println!(
            "{:<24} {:<24} {:<7} {}",
            descriptor.id,
            kinds.join("|"),
            if descriptor.seeded { "seeded" } else { "-" },
            descriptor.summary
        );
        if !params.is_empty() {
            println!("{:<24} params: {}", "", params.join(", "));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn load_plan(path: &Path) -> Result<ValidatedPlan, CliError> {
    let plan_json: Value = serde_json::from_str(&read_file(path)?)?;
    let plan_schema = plan_json_schema_value()?;
    validate_plan(&plan_json, &plan_schema, &RuleCatalog::new()).map_err(CliError::InvalidPlan)
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn print_report(report: &ValidationReport) {
    for issue in &report.errors {
        eprintln!("error {issue}");
    }
    for issue in &report.warnings {
        eprintln!("warning {issue}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_mask_arguments() {
        let cli = Cli::try_parse_from([
            "datamask",
            "mask",
            "--plan",
            "p.json",
            "--input",
            "r.jsonl",
            "--coverage",
            "include",
            "--log-file",
            "logs/run.jsonl",
        ])
        .expect("parse");
        assert_eq!(cli.log_file, Some(PathBuf::from("logs/run.jsonl")));
        match cli.command {
            Command::Mask(args) => {
                assert_eq!(args.coverage, Some(CoverageMode::Include));
                assert_eq!(args.out, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_coverage() {
        assert!(
            Cli::try_parse_from([
                "datamask", "mask", "--plan", "p", "--input", "i", "--coverage", "partial",
            ])
            .is_err()
        );
    }
}
