//! Scoped device transactions.
//!
//! A batch groups the removals for one object into a single device round
//! trip. It is a throughput optimization only: a failed removal inside the
//! batch does not roll back the ones before it.
//!
//! Every successful `batch_begin` is paired with exactly one `batch_end`.
//! [`BatchScope::close`] consumes the scope, so a second close does not
//! type-check, and [`with_batch`] always closes after the body, whatever
//! the body returned.

use cheetah_bfrt::{BfrtError, BfrtResult, BfrtSession};
use log::{debug, error};
use std::future::Future;

/// An open batch on a session.
pub struct BatchScope<'a> {
    session: &'a dyn BfrtSession,
    closed: bool,
}

impl<'a> BatchScope<'a> {
    /// Opens a batch. Nothing needs closing if this fails.
    pub async fn open(session: &'a dyn BfrtSession) -> BfrtResult<BatchScope<'a>> {
        session.batch_begin().await?;
        debug!("batch opened on {}", session.program());
        Ok(Self {
            session,
            closed: false,
        })
    }

    /// Closes the batch, flushing queued writes.
    ///
    /// The scope counts as closed even if the device reports an error.
    pub async fn close(mut self) -> BfrtResult<()> {
        self.closed = true;
        let result = self.session.batch_end().await;
        debug!("batch closed on {}", self.session.program());
        result
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        if !self.closed {
            // Only reachable if the owning future was cancelled or panicked.
            error!(
                "batch on {} dropped without batch_end; session is still batching",
                self.session.program()
            );
        }
    }
}

/// The body's result plus any error reported while closing the batch.
#[derive(Debug)]
pub struct Batched<T> {
    pub value: T,
    pub close_error: Option<BfrtError>,
}

/// Runs `body` inside a batch when `enabled`, otherwise runs it directly.
///
/// Returns `Err` only if the batch could not be opened, in which case
/// `body` is not run.
pub async fn with_batch<T, F, Fut>(
    session: &dyn BfrtSession,
    enabled: bool,
    body: F,
) -> BfrtResult<Batched<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    if !enabled {
        return Ok(Batched {
            value: body().await,
            close_error: None,
        });
    }

    let scope = BatchScope::open(session).await?;
    let value = body().await;
    let close_error = scope.close().await.err();
    Ok(Batched { value, close_error })
}
