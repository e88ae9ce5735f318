//! Criterion timing of one full fixture read per execution mode.
//!
//! Needs a provisioned fixture; set `SQLREAD_CONNECTION_STRING` to run it.

use std::{sync::Arc, time::Instant};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sqlread::{BenchmarkRunner, ConnectionConfig, ExecutionMode, MssqlConnector, RunnerConfig};

fn read_modes(c: &mut Criterion) {
    let Ok(connection_string) = std::env::var("SQLREAD_CONNECTION_STRING") else {
        eprintln!("SQLREAD_CONNECTION_STRING not set, skipping read_modes");
        return;
    };
    let connection: ConnectionConfig = connection_string
        .parse()
        .expect("valid SQLREAD_CONNECTION_STRING");
    let config = RunnerConfig::new(connection.clone());
    let runner = BenchmarkRunner::new(&config, Arc::new(MssqlConnector::new(connection)))
        .expect("default partitioning is valid");
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("read_modes");
    group.sample_size(10);
    for mode in ExecutionMode::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(mode), &mode, |b, &mode| {
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    rt.block_on(runner.run(mode)).expect("benchmark run failed");
                }
                start.elapsed()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, read_modes);
criterion_main!(benches);
