use std::{
    num::{NonZeroU64, NonZeroUsize},
    path::PathBuf,
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use clap::Parser;
use serde_with::serde_as;
use sqlread::{
    fixture, probe::DEFAULT_SPIN_ITERATIONS, query, BenchmarkRunner, ConfigError,
    ConnectionConfig, Connector, ExecutionMode, MssqlConnector, RunnerConfig,
};
use tracing::{error, info};

mod measure;

use measure::{Iteration, MeasurePolicy, MeasurementSummary};

const CONNECTION_STRING_ENV: &str = "SQLREAD_CONNECTION_STRING";

#[derive(serde::Serialize, clap::Parser, Clone)]
struct Args {
    /// ADO-style connection string, e.g. "Data Source=host;Initial Catalog=db;User ID=sa;Password=..;Trust Server Certificate=True;Pooling=False;"
    #[clap(long, env = CONNECTION_STRING_ENV, hide_env_values = true)]
    #[serde(skip)]
    connection_string: Option<String>,
    #[clap(long, default_value = query::DEFAULT_TABLE)]
    table: String,
    #[clap(long, default_value_t = NonZeroU64::new(query::DEFAULT_TOTAL_ROWS).unwrap())]
    total_rows: NonZeroU64,
    #[clap(long, default_value_t = NonZeroU64::new(query::DEFAULT_PARTITIONS).unwrap())]
    partitions: NonZeroU64,
    /// Executor threads; defaults to one per core.
    #[clap(long)]
    worker_threads: Option<NonZeroUsize>,
    #[clap(subcommand)]
    command: Command,
}

#[serde_as]
#[derive(Clone, clap::Subcommand, serde::Serialize)]
enum Command {
    /// Time full reads of the fixture table.
    Run {
        mode: ExecutionMode,
        #[clap(long, default_value_t = 1)]
        warmup: u64,
        #[clap(long, default_value_t = NonZeroU64::new(1).unwrap())]
        iterations: NonZeroU64,
        /// Start no new iteration after this much time, e.g. "10m".
        #[clap(long, value_parser = humantime::parse_duration)]
        #[serde_as(as = "Option<serde_with::DurationSeconds<f64>>")]
        time_limit: Option<Duration>,
        #[clap(long, default_value = "benchmark.output.json")]
        output: PathBuf,
    },
    /// Spin on cancellation checks without touching the database.
    Probe {
        mode: ExecutionMode,
        #[clap(long, default_value_t = DEFAULT_SPIN_ITERATIONS)]
        iterations: u64,
    },
    /// Print the T-SQL that provisions the fixture table.
    FixtureSql,
}

#[derive(Debug, thiserror::Error)]
enum BenchmarkError {
    #[error("no connection string, pass --connection-string or set {CONNECTION_STRING_ENV}")]
    MissingConnectionString,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Run(#[from] sqlread::RunError),
    #[error("building runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("no iteration of the {0} run succeeded")]
    NoSamples(ExecutionMode),
    #[error("writing results to {path:?}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(serde::Serialize)]
struct BenchmarkOutput {
    args: Args,
    connection: ConnectionConfig,
    iterations: Vec<Iteration>,
    summary: MeasurementSummary,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), BenchmarkError> {
    match &args.command {
        Command::FixtureSql => {
            print!("{}", fixture::CREATE_TABLE_SQL);
            Ok(())
        }
        Command::Probe { mode, iterations } => {
            // no queries are issued, any host will do
            let config = runner_config(&args, ConnectionConfig::new("localhost"));
            let connector = Arc::new(MssqlConnector::new(config.connection.clone()));
            let runner = BenchmarkRunner::new(&config, connector)?;
            let report = build_runtime(&args)?.block_on(runner.spin_probe(*mode, *iterations))?;
            info!(
                "probe {mode}: {} tasks x {} iterations in {}",
                report.iterations.len(),
                iterations,
                humantime::format_duration(report.elapsed)
            );
            Ok(())
        }
        Command::Run {
            mode,
            warmup,
            iterations,
            time_limit,
            output,
        } => {
            let connection: ConnectionConfig = args
                .connection_string
                .as_deref()
                .ok_or(BenchmarkError::MissingConnectionString)?
                .parse()?;
            info!("target: {connection}");
            let config = runner_config(&args, connection);
            let connector: Arc<dyn Connector> =
                Arc::new(MssqlConnector::new(config.connection.clone()));
            let runner = BenchmarkRunner::new(&config, connector)?;
            let stop = install_stop_handler();
            let policy = MeasurePolicy {
                warmup: *warmup,
                iterations: iterations.get(),
                time_limit: *time_limit,
            };

            let rt = build_runtime(&args)?;
            let measurement = rt.block_on(measure::measure(&runner, *mode, policy, &stop));
            let summary = measurement
                .summary()
                .ok_or(BenchmarkError::NoSamples(*mode))?;
            info!("total: {summary}");

            let out = BenchmarkOutput {
                connection: config.connection,
                iterations: measurement.iterations,
                summary,
                args: args.clone(),
            };
            info!("writing results to {:?}", output);
            let json = serde_json::to_string(&out).expect("benchmark output serializes");
            std::fs::write(output, json).map_err(|source| BenchmarkError::Output {
                path: output.clone(),
                source,
            })
        }
    }
}

fn runner_config(args: &Args, connection: ConnectionConfig) -> RunnerConfig {
    RunnerConfig {
        table: args.table.clone(),
        total_rows: args.total_rows.get(),
        partitions: args.partitions.get(),
        ..RunnerConfig::new(connection)
    }
}

fn build_runtime(args: &Args) -> Result<tokio::runtime::Runtime, BenchmarkError> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(n) = args.worker_threads {
        builder.worker_threads(n.get());
    }
    builder.build().map_err(BenchmarkError::Runtime)
}

/// First ctrl-c lets the current iteration finish, the second aborts.
fn install_stop_handler() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let res = ctrlc::set_handler({
        let stop = Arc::clone(&stop);
        move || {
            if stop.fetch_or(true, Ordering::Relaxed) {
                error!("stop flag was already set, aborting");
                std::process::abort();
            } else {
                info!("ctrl-c, finishing the current iteration");
            }
        }
    });
    if let Err(e) = res {
        error!("cannot install ctrl-c handler: {e}");
    }
    stop
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_command() {
        let args = Args::try_parse_from([
            "benchmark",
            "--connection-string",
            "Data Source=h",
            "--partitions",
            "3",
            "run",
            "async-token-source",
            "--iterations",
            "4",
            "--time-limit",
            "90s",
        ])
        .unwrap();
        assert_eq!(args.partitions.get(), 3);
        assert_eq!(args.total_rows.get(), query::DEFAULT_TOTAL_ROWS);
        match args.command {
            Command::Run {
                mode,
                warmup,
                iterations,
                time_limit,
                ..
            } => {
                assert_eq!(mode, ExecutionMode::AsyncWithTokenSource);
                assert_eq!(warmup, 1);
                assert_eq!(iterations.get(), 4);
                assert_eq!(time_limit, Some(Duration::from_secs(90)));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Args::try_parse_from(["benchmark", "probe", "threads"]).is_err());
    }

    #[test]
    fn run_requires_connection_string() {
        let mut args =
            Args::try_parse_from(["benchmark", "run", "sync", "--output", "/nonexistent/out.json"])
                .unwrap();
        args.connection_string = None;
        assert!(matches!(
            run(args),
            Err(BenchmarkError::MissingConnectionString)
        ));
    }
}
