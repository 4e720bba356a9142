//! Parallel-collection operations behind a private seam.
//!
//! Both passes of the optimizer fan out over independent units of work:
//! classes during UPDATE PASS, scheduled methods during PROCESS PASS. This
//! module hides the choice between a plain sequential loop and the
//! work-stealing backend so that nothing outside it depends on the
//! execution strategy.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

/// How a fan-out over independent items executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecMode {
    /// A plain loop on the calling thread.
    Sequential,
    /// Work-stealing fan-out across the global thread pool.
    Parallel,
}

impl ExecMode {
    /// Apply `f` to every item. Items must be independent: `f` sees them
    /// in no particular order, possibly from multiple threads.
    pub(crate) fn for_each<T, F>(self, items: &[T], f: F)
    where
        T: Sync,
        F: Fn(&T) + Send + Sync,
    {
        match self {
            ExecMode::Sequential => items.iter().for_each(f),
            ExecMode::Parallel => items.par_iter().for_each(f),
        }
    }
}
