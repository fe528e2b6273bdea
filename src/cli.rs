//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::dataset_generator::{DatasetSpec, generate_dataset};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::ServiceSettings;
use crate::domain::error::RebalanceError;
use crate::domain::rebalance::{BacktestResult, run_backtest};
use crate::domain::request::{BacktestRequest, BacktestResponse, RebalanceRequest};
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "rebalancer", about = "Periodic portfolio rebalancing backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one backtest from a JSON request file
    Run {
        #[arg(short, long)]
        request: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Start the HTTP service
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Write a synthetic dataset
    Generate {
        #[arg(short, long)]
        output: PathBuf,
        /// Comma-separated field names
        #[arg(long)]
        fields: Option<String>,
        #[arg(long)]
        securities: Option<usize>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate a JSON request file without running it
    Validate {
        #[arg(short, long)]
        request: PathBuf,
    },
    /// Show fields, or the date range of one field, in a dataset
    Info {
        #[arg(short, long)]
        dataset: String,
        #[arg(long)]
        field: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Command {
    fn config_path(&self) -> Option<&PathBuf> {
        match self {
            Command::Run { config, .. } | Command::Info { config, .. } => config.as_ref(),
            Command::Serve { config } => Some(config),
            Command::Generate { .. } | Command::Validate { .. } => None,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let settings = match load_settings(cli.command.config_path()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    init_logging(&settings.log_level, settings.log_ansi);

    let outcome = match cli.command {
        Command::Run {
            request, output, ..
        } => run_request(&request, &settings, output.as_ref()),
        Command::Serve { .. } => run_serve(settings),
        Command::Generate {
            output,
            fields,
            securities,
            start,
            end,
            seed,
        } => {
            let mut spec = DatasetSpec::default();
            if let Some(fields) = fields {
                spec.fields = parse_fields(&fields);
            }
            spec.securities = securities.unwrap_or(spec.securities);
            spec.start = start.unwrap_or(spec.start);
            spec.end = end.unwrap_or(spec.end);
            spec.seed = seed;
            run_generate(&output, &spec)
        }
        Command::Validate { request } => run_validate(&request),
        Command::Info { dataset, field, .. } => run_info(&dataset, field.as_deref(), &settings),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Install the process-wide tracing subscriber. `RUST_LOG` overrides `level`.
/// Later calls are no-ops.
pub fn init_logging(level: &str, ansi: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(ansi))
        .try_init();
}

pub fn load_settings(config_path: Option<&PathBuf>) -> Result<ServiceSettings, RebalanceError> {
    match config_path {
        Some(path) => ServiceSettings::from_config(&FileConfigAdapter::from_file(path)?),
        None => Ok(ServiceSettings::default()),
    }
}

pub fn load_request(path: &Path) -> Result<RebalanceRequest, RebalanceError> {
    let content = fs::read_to_string(path)?;
    let request = BacktestRequest::from_json(&content).map_err(|e| match e {
        RebalanceError::ConfigParse { reason, .. } => RebalanceError::ConfigParse {
            file: path.display().to_string(),
            reason,
        },
        other => other,
    })?;
    request.validate()
}

pub fn parse_fields(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn run_request(
    request_path: &Path,
    settings: &ServiceSettings,
    output_path: Option<&PathBuf>,
) -> Result<(), RebalanceError> {
    let request = load_request(request_path)?;
    let data_port = CsvAdapter::new(settings.data_root.clone());
    let result = run_backtest(&data_port, &request, settings.run_end)?;

    print_summary(&result);

    let json = render_response(&result)?;
    match output_path {
        Some(path) => {
            fs::write(path, json)?;
            eprintln!("\nWeights written to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub fn render_response(result: &BacktestResult) -> Result<String, RebalanceError> {
    serde_json::to_string_pretty(&BacktestResponse::from(result))
        .map_err(|e| RebalanceError::Io(std::io::Error::other(e)))
}

fn print_summary(result: &BacktestResult) {
    eprintln!("\n=== Backtest Summary ===");
    eprintln!("Recorded dates:   {}", result.recorded_count());
    eprintln!("Skipped dates:    {}", result.skipped.len());
    eprintln!("Execution time:   {:.4}s", result.execution_time);
    for skip in &result.skipped {
        eprintln!("  {}: {}", skip.date, skip.reason);
    }
}

fn run_generate(output: &Path, spec: &DatasetSpec) -> Result<(), RebalanceError> {
    eprintln!(
        "Generating {} fields x {} securities, {} to {}",
        spec.fields.len(),
        spec.securities,
        spec.start,
        spec.end
    );
    let written = generate_dataset(output, spec)?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_validate(request_path: &Path) -> Result<(), RebalanceError> {
    eprintln!("Validating request: {}", request_path.display());
    let request = load_request(request_path)?;

    eprintln!("  dataset:   {}", request.dataset_path);
    eprintln!("  calendar:  {:?}", request.calendar);
    eprintln!("  filter:    {:?}", request.filter);
    eprintln!("  weighting: {:?}", request.weighting);
    if let Some(end) = request.run_end {
        eprintln!("  run end:   {}", end);
    }
    eprintln!("\nRequest is valid.");
    Ok(())
}

fn run_info(
    dataset: &str,
    field: Option<&str>,
    settings: &ServiceSettings,
) -> Result<(), RebalanceError> {
    let adapter = CsvAdapter::new(settings.data_root.clone());

    let Some(field) = field else {
        let fields = adapter.list_fields(dataset)?;
        if fields.is_empty() {
            eprintln!("No fields found in {}", adapter.dataset_dir(dataset).display());
        }
        for f in &fields {
            println!("{}", f);
        }
        return Ok(());
    };

    let table = adapter.load_field(dataset, field)?;
    match (table.first_date(), table.last_date()) {
        (Some(first), Some(last)) => println!(
            "{}: {} dates, {} securities, {} to {}",
            field,
            table.date_count(),
            table.securities().len(),
            first,
            last
        ),
        _ => println!("{}: no rows, {} securities", field, table.securities().len()),
    }
    Ok(())
}

fn run_serve(settings: ServiceSettings) -> Result<(), RebalanceError> {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{AppState, serve};
        use std::sync::Arc;

        let mut builder = tokio::runtime::Builder::new_multi_thread();
        if let Some(workers) = settings.workers {
            builder.worker_threads(workers);
        }
        let runtime = builder.enable_all().build()?;

        eprintln!("Starting web server on {}", settings.listen);
        let addr = settings.listen;
        let state = AppState {
            data_port: Arc::new(CsvAdapter::new(settings.data_root.clone())),
            settings: Arc::new(settings),
        };
        runtime.block_on(serve(state, addr))
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = settings;
        Err(RebalanceError::invalid(
            "server",
            "listen",
            "serve requires the web feature",
        ))
    }
}
