// The RDBMS seam of the write-behind pipeline.

use thiserror::Error;

use super::request::WriteRequest;

/// Failure classification the worker's state machine keys off.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection-level failure: the request is re-enqueued and retried
    /// after reconnecting. Not counted as an error.
    #[error("transient store error: {0}")]
    Transient(String),

    /// Statement-level failure on a live connection: logged, counted, and
    /// the request is dropped.
    #[error("permanent store error: {0}")]
    Permanent(String),
}

/// One open connection to the mirror, with its prepared statements.
pub trait MirrorConnection: Send {
    /// Executes one request in its own short transaction.
    fn write(&mut self, request: &WriteRequest) -> Result<(), StoreError>;
}

/// Connection factory for the mirror store.
pub trait MirrorBackend: Send + Sync {
    fn connect(&self) -> Result<Box<dyn MirrorConnection>, StoreError>;
}
