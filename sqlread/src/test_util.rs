//! An in-memory [`Connector`] whose row fetches record how they were driven.

use std::{
    cell::Cell,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
    thread::ThreadId,
};

use futures::{future::BoxFuture, FutureExt, Stream, StreamExt};

use crate::{Connection, Connector, ReadError, RowStream};

thread_local! {
    /// Row-fetch polls seen on this thread, across all fake streams.
    static FETCH_POLLS: Cell<u64> = Cell::new(0);
}

#[derive(Default)]
pub(crate) struct FakeStats {
    connects: AtomicU64,
    closes: AtomicU64,
    suspensions: AtomicU64,
    /// Suspended fetches whose thread went on to poll some other fetch before resuming.
    released: AtomicU64,
    /// Suspended fetches resumed on a different thread.
    migrated: AtomicU64,
    drained: AtomicU64,
}

impl FakeStats {
    pub(crate) fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }
    pub(crate) fn closes(&self) -> u64 {
        self.closes.load(Ordering::Relaxed)
    }
    pub(crate) fn suspensions(&self) -> u64 {
        self.suspensions.load(Ordering::Relaxed)
    }
    pub(crate) fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
    pub(crate) fn migrated(&self) -> u64 {
        self.migrated.load(Ordering::Relaxed)
    }
    pub(crate) fn drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }
}

/// Serves a fully populated fixture: a range `(lo, hi]` yields `hi - lo` rows.
#[derive(Default)]
pub(crate) struct FakeConnector {
    stats: Arc<FakeStats>,
    /// Queries for the range starting here fail with a connection error.
    failing_lo: Option<u64>,
    /// Queries for the range starting here panic.
    panicking_lo: Option<u64>,
    /// `(lo, n)`: the range starting at `lo` yields `n` rows, then a row error.
    failing_row: Option<(u64, u64)>,
    refuse_connections: bool,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_range(lo: u64) -> Self {
        Self {
            failing_lo: Some(lo),
            ..Self::default()
        }
    }

    pub(crate) fn panicking_range(lo: u64) -> Self {
        Self {
            panicking_lo: Some(lo),
            ..Self::default()
        }
    }

    pub(crate) fn failing_row(lo: u64, rows_before: u64) -> Self {
        Self {
            failing_row: Some((lo, rows_before)),
            ..Self::default()
        }
    }

    pub(crate) fn refusing() -> Self {
        Self {
            refuse_connections: true,
            ..Self::default()
        }
    }

    pub(crate) fn stats(&self) -> &FakeStats {
        &self.stats
    }
}

impl Connector for FakeConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, ReadError>> {
        async move {
            if self.refuse_connections {
                return Err(ReadError::connection("connection refused"));
            }
            self.stats.connects.fetch_add(1, Ordering::Relaxed);
            Ok(Box::new(FakeConnection {
                stats: Arc::clone(&self.stats),
                failing_lo: self.failing_lo,
                panicking_lo: self.panicking_lo,
                failing_row: self.failing_row,
            }) as Box<dyn Connection>)
        }
        .boxed()
    }
}

struct FakeConnection {
    stats: Arc<FakeStats>,
    failing_lo: Option<u64>,
    panicking_lo: Option<u64>,
    failing_row: Option<(u64, u64)>,
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.stats.closes.fetch_add(1, Ordering::Relaxed);
    }
}

impl Connection for FakeConnection {
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<RowStream<'a>, ReadError>> {
        async move {
            let (lo, hi) = parse_range(sql);
            if self.failing_lo == Some(lo) {
                return Err(ReadError::connection("connection reset by peer"));
            }
            if self.panicking_lo == Some(lo) {
                panic!("boom in range {lo}");
            }
            let fail_after = self
                .failing_row
                .and_then(|(failing_lo, n)| (failing_lo == lo).then_some(n));
            Ok(FakeRows {
                stats: Arc::clone(&self.stats),
                remaining: hi - lo,
                fail_after,
                parked: None,
                finished: false,
            }
            .boxed())
        }
        .boxed()
    }
}

fn parse_range(sql: &str) -> (u64, u64) {
    let tokens: Vec<&str> = sql.split_whitespace().collect();
    let operand = |op: &str| -> u64 {
        let at = tokens
            .iter()
            .position(|t| *t == op)
            .unwrap_or_else(|| panic!("no {op} in {sql:?}"));
        tokens[at + 1].parse().unwrap()
    };
    (operand(">"), operand("<="))
}

/// Each row suspends once, like a fetch waiting on the network, then arrives.
struct FakeRows {
    stats: Arc<FakeStats>,
    remaining: u64,
    /// Rows to yield before every further fetch fails.
    fail_after: Option<u64>,
    parked: Option<(ThreadId, u64)>,
    finished: bool,
}

impl Stream for FakeRows {
    type Item = Result<(), ReadError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let epoch = FETCH_POLLS.with(|polls| {
            polls.set(polls.get() + 1);
            polls.get()
        });
        let thread = std::thread::current().id();

        if this.remaining == 0 {
            if !this.finished {
                this.finished = true;
                this.stats.drained.fetch_add(1, Ordering::Relaxed);
            }
            return Poll::Ready(None);
        }

        match this.parked.take() {
            None => {
                this.parked = Some((thread, epoch));
                this.stats.suspensions.fetch_add(1, Ordering::Relaxed);
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Some((parked_thread, parked_epoch)) => {
                if parked_thread != thread {
                    this.stats.migrated.fetch_add(1, Ordering::Relaxed);
                } else if epoch != parked_epoch + 1 {
                    this.stats.released.fetch_add(1, Ordering::Relaxed);
                }
                match &mut this.fail_after {
                    Some(0) => Poll::Ready(Some(Err(ReadError::query("row decode")))),
                    Some(n) => {
                        *n -= 1;
                        this.remaining -= 1;
                        Poll::Ready(Some(Ok(())))
                    }
                    None => {
                        this.remaining -= 1;
                        Poll::Ready(Some(Ok(())))
                    }
                }
            }
        }
    }
}
