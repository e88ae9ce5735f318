//! Fan the range reads of one iteration out onto the runtime and join them.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::StreamExt;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    cancel, CancelSignal, ConfigError, Connector, ExecutionMode, QueryPlan, QueryRange, ReadError,
    RunError, RunnerConfig, TaskFailure,
};


#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TaskReport {
    pub range: QueryRange,
    pub rows: u64,
    /// How often the task looked at its cancellation signal. Always zero in sync mode.
    pub cancellation_checks: u64,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: ExecutionMode,
    /// In range order.
    pub tasks: Vec<TaskReport>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn total_rows(&self) -> u64 {
        self.tasks.iter().map(|t| t.rows).sum()
    }
}

#[derive(Debug, Default)]
struct TaskOutcome {
    rows: u64,
    cancellation_checks: u64,
}

/// Runs one iteration of the benchmark per call.
///
/// The query text is built once here and shared by every run, so each run reads
/// exactly the same rows.
pub struct BenchmarkRunner {
    connector: Arc<dyn Connector>,
    plan: Arc<QueryPlan>,
}

impl BenchmarkRunner {
    pub fn new(config: &RunnerConfig, connector: Arc<dyn Connector>) -> Result<Self, ConfigError> {
        let plan = QueryPlan::partition(&config.table, config.total_rows, config.partitions)?;
        Ok(Self::with_plan(plan, connector))
    }

    pub fn with_plan(plan: QueryPlan, connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            plan: Arc::new(plan),
        }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Reads every row of every range in `mode`.
    ///
    /// Returns once all tasks have settled. Failed tasks never stop their
    /// siblings; they are all reported together in the [`RunError`].
    ///
    /// Must be called from within a tokio runtime. Sync mode occupies one
    /// blocking-pool thread per range for the whole run.
    pub async fn run(&self, mode: ExecutionMode) -> Result<RunReport, RunError> {
        let start = Instant::now();
        // the source has to outlive every task that holds one of its tokens
        let (signal, _source) = cancel::signal_for(mode);

        let mut handles: Vec<(QueryRange, JoinHandle<Result<TaskOutcome, ReadError>>)> =
            Vec::with_capacity(self.plan.len());
        for i in 0..self.plan.len() {
            let connector = Arc::clone(&self.connector);
            let plan = Arc::clone(&self.plan);
            let handle = if mode.is_blocking() {
                let rt = Handle::current();
                tokio::task::spawn_blocking(move || {
                    read_blocking(&rt, connector.as_ref(), i, plan.query(i))
                })
            } else {
                let signal = signal.clone();
                tokio::spawn(async move {
                    read_cooperative(connector.as_ref(), i, plan.query(i), &signal).await
                })
            };
            handles.push((self.plan.range(i), handle));
        }
        debug!("{mode}: dispatched {} read tasks", handles.len());

        let total_tasks = handles.len();
        let mut tasks = Vec::with_capacity(total_tasks);
        let mut failures = Vec::new();
        for (range, handle) in handles {
            match handle.await {
                Ok(Ok(outcome)) => tasks.push(TaskReport {
                    range,
                    rows: outcome.rows,
                    cancellation_checks: outcome.cancellation_checks,
                }),
                Ok(Err(e)) => {
                    warn!("{mode}: read of range {range} failed: {e}");
                    failures.push(TaskFailure {
                        range,
                        error: e.into(),
                    });
                }
                Err(e) => {
                    warn!("{mode}: read task for range {range} did not complete: {e}");
                    failures.push(TaskFailure {
                        range,
                        error: e.into(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(RunError {
                mode,
                total_tasks,
                failures,
            });
        }
        let report = RunReport {
            mode,
            tasks,
            elapsed: start.elapsed(),
        };
        info!(
            "{mode}: read {} rows in {:.3}s",
            report.total_rows(),
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }
}

/// Connects, queries and drains on the calling thread, blocking it on every fetch.
fn read_blocking(
    rt: &Handle,
    connector: &dyn Connector,
    i: usize,
    sql: &str,
) -> Result<TaskOutcome, ReadError> {
    debug!("read task {i} starting (blocking)");
    let mut conn = rt.block_on(connector.connect())?;
    let mut rows = rt.block_on(conn.query(sql))?;
    let mut outcome = TaskOutcome::default();
    while let Some(row) = rt.block_on(rows.next()) {
        row?;
        outcome.rows += 1;
    }
    debug!("read task {i} done, {} rows", outcome.rows);
    Ok(outcome)
}

/// Like [`read_blocking`], but every fetch is awaited.
async fn read_cooperative(
    connector: &dyn Connector,
    i: usize,
    sql: &str,
    cancel: &CancelSignal,
) -> Result<TaskOutcome, ReadError> {
    debug!("read task {i} starting");
    let mut conn = connector.connect().await?;
    let mut rows = conn.query(sql).await?;
    let mut outcome = TaskOutcome::default();
    loop {
        outcome.cancellation_checks += 1;
        if cancel.is_cancelled() {
            return Err(ReadError::CancellationRequested);
        }
        match rows.next().await {
            Some(row) => {
                row?;
                outcome.rows += 1;
            }
            None => break,
        }
    }
    debug!("read task {i} done, {} rows", outcome.rows);
    Ok(outcome)
}
