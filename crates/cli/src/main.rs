// reregion - census, tax bracket and local tax ETL into SQLite

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use reregion_cli::exit_codes::{config_exit_code, EXIT_LOG_FILE, EXIT_SUCCESS, EXIT_USAGE};
use reregion_cli::{census_client, open_engine, EtlError, Pipeline, RunOptions, Stage, StageSelection};
use reregion_config::EtlConfig;
use reregion_extract::WorkbookReader;
use reregion_recon::LogDiagnostics;

#[derive(Parser)]
#[command(name = "reregion")]
#[command(about = "Load census geography and income tax tables into SQLite")]
#[command(version)]
#[command(after_help = "\
Stages:
  1  federal brackets and standard deductions
  2  states and state brackets
  3  counties (runs 2 first)
  4  local tax jurisdictions (runs 2 and 3 first)

Examples:
  reregion -l                 load every stage
  reregion -c -l 4            clear, then reload stages 2-4
  reregion -v                 refresh views only
  reregion -l -v --log-file etl.log")]
struct Cli {
    /// Clear the tables of every stage that runs before loading
    #[arg(short = 'c', long)]
    clear: bool,

    /// Run the extract-load stages
    #[arg(short = 'l', long)]
    load: bool,

    /// Refresh the derived views
    #[arg(short = 'v', long)]
    views: bool,

    /// Config file (default: ./reregion.toml, then the user config dir)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Append log output to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Stages to run with -l (default: all)
    #[arg(value_name = "STAGES", value_parser = clap::value_parser!(u8).range(1..=4))]
    stages: Vec<u8>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(message) = init_logging(cli.log_file.as_deref()) {
        eprintln!("error: {message}");
        return ExitCode::from(EXIT_LOG_FILE);
    }

    if !cli.load && !cli.views {
        eprintln!("error: nothing to do");
        eprintln!("hint:  pass -l to load tables, -v to refresh views, or both");
        return ExitCode::from(EXIT_USAGE);
    }

    let (config, used) = match EtlConfig::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            let code = config_exit_code(&e);
            log::error!("{}", EtlError::config(e));
            return ExitCode::from(code);
        }
    };
    match &used {
        Some(path) => log::info!("using config {}", path.display()),
        None => log::info!("no config file found, using defaults"),
    }

    let options = RunOptions {
        load: cli.load,
        clear: cli.clear,
        refresh_views: cli.views,
        stages: StageSelection::from_requested(&cli.stages),
    };

    match run(&config, &options) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(config: &EtlConfig, options: &RunOptions) -> Result<(), EtlError> {
    let mut engine = open_engine(config).map_err(|e| EtlError::store(Stage::Database, e))?;
    let census = census_client(config).map_err(|e| EtlError::extract(Stage::Census, e))?;

    let pipeline = Pipeline {
        config,
        geography: &census,
        sheets: &WorkbookReader,
        diagnostics: &LogDiagnostics,
    };
    let report = pipeline.run(&mut engine, options)?;

    for (stage, rows) in &report.loaded {
        log::info!("{stage}: {rows} rows");
    }
    if let Some(summary) = report.reconcile {
        log::info!(
            "local tax: {} of {} jurisdictions unmatched",
            summary.unmatched,
            summary.total
        );
    }
    Ok(())
}

/// `info` unless `RUST_LOG` says otherwise.
fn init_logging(log_file: Option<&Path>) -> Result<(), String> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("cannot open log file {}: {e}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
