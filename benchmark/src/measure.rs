use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use itertools::Itertools;
use serde_with::serde_as;
use sqlread::{BenchmarkRunner, ExecutionMode};
use tracing::{info, warn};

const LATENCY_PERCENTILES: [f64; 3] = [50.0, 90.0, 99.0];

/// How many runs to do and when to give up.
#[derive(Clone, Copy)]
pub(crate) struct MeasurePolicy {
    pub(crate) warmup: u64,
    pub(crate) iterations: u64,
    pub(crate) time_limit: Option<Duration>,
}

#[serde_as]
#[derive(serde::Serialize, Clone)]
pub(crate) struct Iteration {
    #[serde_as(as = "serde_with::DurationMicroSeconds")]
    pub(crate) elapsed_us: Duration,
    pub(crate) rows: u64,
}

pub(crate) struct Measurement {
    pub(crate) mode: ExecutionMode,
    pub(crate) iterations: Vec<Iteration>,
    pub(crate) failed: u64,
    histo: hdrhistogram::Histogram<u64>,
}

impl Measurement {
    fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            iterations: Vec::new(),
            failed: 0,
            // one microsecond up to an hour per run
            histo: hdrhistogram::Histogram::new_with_bounds(1, 3_600_000_000, 3)
                .expect("static histogram bounds are valid"),
        }
    }

    fn record(&mut self, iteration: Iteration) {
        let us = u64::try_from(iteration.elapsed_us.as_micros()).unwrap_or(u64::MAX);
        self.histo.saturating_record(us.max(1));
        self.iterations.push(iteration);
    }

    pub(crate) fn summary(&self) -> Option<MeasurementSummary> {
        if self.histo.is_empty() {
            return None;
        }
        let h = &self.histo;
        Some(MeasurementSummary {
            mode: self.mode,
            samples: h.len(),
            failed: self.failed,
            mean_us: h.mean(),
            stddev_us: h.stdev(),
            min_us: h.min(),
            max_us: h.max(),
            percentiles_us: LATENCY_PERCENTILES
                .iter()
                .map(|p| (format!("p{p}"), h.value_at_percentile(*p)))
                .collect(),
        })
    }
}

#[derive(serde::Serialize, Clone)]
pub(crate) struct MeasurementSummary {
    pub(crate) mode: ExecutionMode,
    pub(crate) samples: u64,
    pub(crate) failed: u64,
    pub(crate) mean_us: f64,
    pub(crate) stddev_us: f64,
    pub(crate) min_us: u64,
    pub(crate) max_us: u64,
    pub(crate) percentiles_us: BTreeMap<String, u64>,
}

impl std::fmt::Display for MeasurementSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} n={} failed={} TIME(ms): mean={:.1} stddev={:.1} min={:.1} max={:.1} {}",
            self.mode,
            self.samples,
            self.failed,
            self.mean_us / 1000.0,
            self.stddev_us / 1000.0,
            self.min_us as f64 / 1000.0,
            self.max_us as f64 / 1000.0,
            self.percentiles_us
                .iter()
                .map(|(p, v)| format!("{p}={:.1}", *v as f64 / 1000.0))
                .join(" "),
        )
    }
}

/// Runs `policy.warmup` unrecorded and then up to `policy.iterations` recorded runs.
///
/// Stops starting new runs once `stop` is set or the time limit has passed.
/// Failed runs are counted but not recorded.
pub(crate) async fn measure(
    runner: &BenchmarkRunner,
    mode: ExecutionMode,
    policy: MeasurePolicy,
    stop: &AtomicBool,
) -> Measurement {
    let started = Instant::now();
    let keep_going = || {
        !stop.load(Ordering::Relaxed)
            && policy
                .time_limit
                .map_or(true, |limit| started.elapsed() < limit)
    };

    for i in 0..policy.warmup {
        if !keep_going() {
            break;
        }
        match runner.run(mode).await {
            Ok(report) => info!(
                "warmup {i}: {} rows in {}",
                report.total_rows(),
                humantime::format_duration(report.elapsed)
            ),
            Err(e) => warn!("warmup {i} failed: {e}"),
        }
    }

    let mut measurement = Measurement::new(mode);
    for i in 0..policy.iterations {
        if !keep_going() {
            info!("stopping after {i} iterations");
            break;
        }
        match runner.run(mode).await {
            Ok(report) => {
                info!(
                    "iteration {i}: {} rows in {}",
                    report.total_rows(),
                    humantime::format_duration(report.elapsed)
                );
                measurement.record(Iteration {
                    elapsed_us: report.elapsed,
                    rows: report.total_rows(),
                });
            }
            Err(e) => {
                warn!("iteration {i} failed, not recorded: {e}");
                measurement.failed += 1;
            }
        }
    }
    measurement
}
