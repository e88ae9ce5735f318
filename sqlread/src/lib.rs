//! Measure what it costs to read a large SQL Server result set with blocking
//! versus cooperatively suspending row fetches.
//!
//! # Usage
//!
//! 1. Build a [`RunnerConfig`], usually from an ADO-style connection string.
//! 2. Construct a [`BenchmarkRunner`] with a [`Connector`], e.g. [`MssqlConnector`].
//! 3. Call [`BenchmarkRunner::run`] with an [`ExecutionMode`] from inside a
//!    multi-threaded tokio runtime, once per measured iteration.
//!
//! Every run splits the fixture table into contiguous key ranges, opens one
//! connection per range, drains each range's rows without materializing them,
//! and returns after all of those reads have settled.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use sqlread::{BenchmarkRunner, ConnectionConfig, ExecutionMode, MssqlConnector, RunnerConfig};
//!
//! let connection: ConnectionConfig =
//!     "Data Source=localhost;Initial Catalog=db;User ID=sa;Password=secret;".parse()?;
//! let config = RunnerConfig::new(connection.clone());
//! let runner = BenchmarkRunner::new(&config, Arc::new(MssqlConnector::new(connection)))?;
//! let report = runner.run(ExecutionMode::Async).await?;
//! println!("read {} rows in {:?}", report.total_rows(), report.elapsed);
//! # Ok(())
//! # }
//! ```
//!
//! Timing many iterations is left to the caller; the `benchmark` binary in this
//! workspace does that.

pub mod cancel;
pub mod config;
pub mod connection;
mod error;
pub mod fixture;
pub mod mode;
pub mod mssql;
pub mod probe;
pub mod query;
mod runner;

#[cfg(test)]
pub(crate) mod test_util;

pub use cancel::{CancelSignal, TokenSource};
pub use config::{ConfigError, ConnectionConfig, RunnerConfig};
pub use connection::{Connection, Connector, RowStream};
pub use error::{ReadError, RunError, TaskError, TaskFailure};
pub use mode::ExecutionMode;
pub use mssql::MssqlConnector;
pub use probe::ProbeReport;
pub use query::{QueryPlan, QueryRange};
pub use runner::{BenchmarkRunner, RunReport, TaskReport};
