//! Cancellation-check overhead without any I/O.
//!
//! Not part of a benchmark run; call [`BenchmarkRunner::spin_probe`] explicitly.

use std::time::{Duration, Instant};

use tracing::info;

use crate::{cancel, BenchmarkRunner, CancelSignal, ExecutionMode, RunError, TaskFailure};

pub const DEFAULT_SPIN_ITERATIONS: u64 = 1_000_000_000;

#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub mode: ExecutionMode,
    /// Iterations completed by each task, in range order.
    pub iterations: Vec<u64>,
    pub elapsed: Duration,
}

impl BenchmarkRunner {
    /// Spins one counting loop per range on the blocking pool, checking the
    /// mode's cancellation signal on every iteration.
    ///
    /// Nothing cancels the signal, so every loop runs to `iterations`.
    pub async fn spin_probe(
        &self,
        mode: ExecutionMode,
        iterations: u64,
    ) -> Result<ProbeReport, RunError> {
        let start = Instant::now();
        let (signal, _source) = cancel::signal_for(mode);

        let handles: Vec<_> = self
            .plan()
            .ranges()
            .iter()
            .map(|range| {
                let signal = signal.clone();
                (
                    *range,
                    tokio::task::spawn_blocking(move || spin(&signal, iterations)),
                )
            })
            .collect();

        let total_tasks = handles.len();
        let mut completed = Vec::with_capacity(total_tasks);
        let mut failures = Vec::new();
        for (range, handle) in handles {
            match handle.await {
                Ok(n) => completed.push(n),
                Err(e) => failures.push(TaskFailure {
                    range,
                    error: e.into(),
                }),
            }
        }
        if !failures.is_empty() {
            return Err(RunError {
                mode,
                total_tasks,
                failures,
            });
        }

        let report = ProbeReport {
            mode,
            iterations: completed,
            elapsed: start.elapsed(),
        };
        info!(
            "{mode}: spin probe, {} tasks x {iterations} checks in {:.3}s",
            total_tasks,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }
}

fn spin(cancel: &CancelSignal, iterations: u64) -> u64 {
    let mut i = 0;
    while i < iterations {
        // keep the check inside the loop
        if std::hint::black_box(cancel).is_cancelled() {
            break;
        }
        i += 1;
    }
    i
}
