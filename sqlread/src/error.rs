use std::fmt;

use crate::{ExecutionMode, QueryRange};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single read task stopped early.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("connection failure: {0}")]
    ConnectionFailure(BoxError),
    #[error("query execution failure: {0}")]
    QueryExecutionFailure(BoxError),
    #[error("cancellation requested")]
    CancellationRequested,
}

impl ReadError {
    pub fn connection(err: impl Into<BoxError>) -> Self {
        ReadError::ConnectionFailure(err.into())
    }

    pub fn query(err: impl Into<BoxError>) -> Self {
        ReadError::QueryExecutionFailure(err.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("read task panicked: {0}")]
    Panicked(String),
    /// The task was dropped before it finished, e.g. by a runtime shutdown.
    #[error("read task was cancelled before it completed")]
    Cancelled,
}

impl From<tokio::task::JoinError> for TaskError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            let payload = err.into_panic();
            let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_owned()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "<non-string panic payload>".to_owned()
            };
            TaskError::Panicked(msg)
        } else {
            TaskError::Cancelled
        }
    }
}

#[derive(Debug)]
pub struct TaskFailure {
    pub range: QueryRange,
    pub error: TaskError,
}

/// Every failed task of one run, collected after all tasks settled.
#[derive(Debug)]
pub struct RunError {
    pub mode: ExecutionMode,
    pub total_tasks: usize,
    pub failures: Vec<TaskFailure>,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} run: {} of {} read tasks failed",
            self.mode,
            self.failures.len(),
            self.total_tasks
        )?;
        for failure in &self.failures {
            write!(f, "; range {}: {}", failure.range, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|failure| &failure.error as &(dyn std::error::Error + 'static))
    }
}
