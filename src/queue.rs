//! Task queue: runs chunk work over a rayon thread pool sized to the
//! caller's requested thread count, with a single-threaded fast path for
//! `nthreads == 1` or when there are too few chunks to bother.
//!
//! Unlike the rest of the crate's dependency on rayon's implicit global
//! pool, `nthreads` is a per-call knob (the public API takes it as an
//! argument), so each call builds its own pool rather than reconfiguring
//! the process-wide one.

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::error::{CsvError, Result};

/// Below this many chunks, per-item rayon dispatch overhead outweighs any
/// benefit — just run the work on the calling thread.
const SINGLE_THREAD_THRESHOLD: usize = 2;

/// Run `work` over every item in `items`, in order, returning the results
/// in the same order. Uses a dedicated pool of `nthreads` workers unless
/// `nthreads == 1` or `items.len() < SINGLE_THREAD_THRESHOLD`, in which
/// case it runs sequentially on the calling thread instead.
pub fn map_chunks<T, R, F>(items: Vec<T>, nthreads: usize, work: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    if nthreads <= 1 || items.len() < SINGLE_THREAD_THRESHOLD {
        return Ok(items.into_iter().map(work).collect());
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(nthreads)
        .build()
        .map_err(|e| CsvError::InvalidArgument(format!("failed to start thread pool: {e}")))?;

    Ok(pool.install(|| items.into_par_iter().map(work).collect()))
}

/// Same as [`map_chunks`] but for work that can itself fail; the first
/// error encountered is returned (rayon still runs every item before this
/// function looks at results, so failures on other chunks are dropped).
pub fn try_map_chunks<T, R, F>(items: Vec<T>, nthreads: usize, work: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> Result<R> + Sync,
{
    if nthreads <= 1 || items.len() < SINGLE_THREAD_THRESHOLD {
        return items.into_iter().map(work).collect();
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(nthreads)
        .build()
        .map_err(|e| CsvError::InvalidArgument(format!("failed to start thread pool: {e}")))?;

    pool.install(|| items.into_par_iter().map(work).collect())
}
