//! Cancellation and progress reporting for long store operations.
//!
//! Bulk ingestion, pre-parsing and match collection check a
//! [`CancellationToken`] between records and report to a [`Progress`] sink
//! every [`PROGRESS_INTERVAL`] records. Cancelling returns the partial result;
//! it is not an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Records processed between progress reports.
pub const PROGRESS_INTERVAL: usize = 1024;

/// Shared flag asking a running operation to stop early.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Receives progress of a long operation.
pub trait Progress: Send + Sync {
    /// `done` of `total` records processed.
    fn report(&self, done: usize, total: usize);

    /// Called once when the operation stops, finished or cancelled.
    fn finish(&self) {}
}

/// Progress sink that ignores every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&self, _done: usize, _total: usize) {}
}

impl<F> Progress for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, done: usize, total: usize) {
        self(done, total)
    }
}

/// Drive `step` over `0..total`, checking `cancel` and reporting progress.
///
/// Returns the number of steps run, which is less than `total` only when
/// cancelled.
pub(crate) fn run_steps(
    total: usize,
    cancel: &CancellationToken,
    progress: &dyn Progress,
    mut step: impl FnMut(usize),
) -> usize {
    let mut done = 0;
    while done < total {
        if cancel.is_cancelled() {
            break;
        }
        step(done);
        done += 1;
        if done % PROGRESS_INTERVAL == 0 {
            progress.report(done, total);
        }
    }
    progress.report(done, total);
    progress.finish();
    done
}
