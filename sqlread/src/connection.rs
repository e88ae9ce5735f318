//! The seam between the runner and a database.

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::ReadError;

/// One item per row. Row contents are dropped as soon as they are decoded.
pub type RowStream<'a> = BoxStream<'a, Result<(), ReadError>>;

/// Opens a fresh, unpooled connection per call.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, ReadError>>;
}

/// A connection exclusively owned by one read task. Dropping it closes it.
pub trait Connection: Send {
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<RowStream<'a>, ReadError>>;
}
