//! Replay sampler: drives the callback over a fixed list of points.
//!
//! Stands in for the native library when the bridge is exercised without
//! it (dry runs, tests). It follows the native calling contract: each
//! evaluation gets its own sampler-owned buffer of exactly `ndim` doubles,
//! and in parallel mode evaluations run concurrently on the rayon pool. A
//! callback that unwinds ends the run at once and no results are recorded.

use crate::abi::{InputFileBuffer, LogFuncFn, SamplerAdapter};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Status returned when a replay point does not have `ndim` elements.
pub const STATUS_DIMENSION_MISMATCH: i32 = 71;

/// Status returned when the callback wrote into the sampler's buffer.
pub const STATUS_BUFFER_WRITTEN: i32 = 72;

/// Configuration path and length seen by the most recent run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedInputFile {
    pub path: String,
    pub native_len: i32,
}

/// Deterministic sampler that evaluates the callback on known points.
#[derive(Debug)]
pub struct ReplaySampler {
    points: Vec<Vec<f64>>,
    parallel: bool,
    status: i32,
    results: Mutex<Vec<f64>>,
    runs: AtomicUsize,
    last_input_file: Mutex<Option<ReceivedInputFile>>,
}

impl ReplaySampler {
    /// Create a sequential replay over `points`, finishing with status 0.
    pub fn new(points: Vec<Vec<f64>>) -> Self {
        Self {
            points,
            parallel: false,
            status: 0,
            results: Mutex::new(Vec::new()),
            runs: AtomicUsize::new(0),
            last_input_file: Mutex::new(None),
        }
    }

    /// Evaluate points concurrently.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Status code to report after a run that otherwise went well.
    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    /// Callback results of the last run, in point order.
    pub fn results(&self) -> Vec<f64> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times `run` was entered.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn last_input_file(&self) -> Option<ReceivedInputFile> {
        self.last_input_file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Evaluate one point in a fresh buffer; report whether the buffer survived
/// the call bit-for-bit.
fn evaluate(log_func: LogFuncFn, ndim: i32, point: &[f64]) -> (f64, bool) {
    let mut buffer = point.to_vec();
    // SAFETY: `buffer` holds exactly `ndim` doubles and lives across the call.
    let value = unsafe { log_func(ndim, buffer.as_mut_ptr()) };
    let untouched = buffer
        .iter()
        .zip(point)
        .all(|(after, before)| after.to_bits() == before.to_bits());
    (value, untouched)
}

impl SamplerAdapter for ReplaySampler {
    fn name(&self) -> &str {
        "replay"
    }

    fn run(&self, ndim: i32, log_func: LogFuncFn, input_file: &mut InputFileBuffer) -> i32 {
        self.runs.fetch_add(1, Ordering::SeqCst);
        *self
            .last_input_file
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(ReceivedInputFile {
            path: input_file.path_lossy().into_owned(),
            native_len: input_file.native_len(),
        });

        let expected = usize::try_from(ndim).ok();
        if let Some(index) = self.points.iter().position(|p| Some(p.len()) != expected) {
            tracing::error!(
                ndim,
                index,
                len = self.points[index].len(),
                "Replay point does not match the run dimension"
            );
            return STATUS_DIMENSION_MISMATCH;
        }

        let outcomes: Vec<(f64, bool)> = if self.parallel {
            self.points
                .par_iter()
                .map(|p| evaluate(log_func, ndim, p))
                .collect()
        } else {
            self.points
                .iter()
                .map(|p| evaluate(log_func, ndim, p))
                .collect()
        };

        let buffer_written = outcomes.iter().any(|(_, untouched)| !untouched);
        *self.results.lock().unwrap_or_else(PoisonError::into_inner) =
            outcomes.into_iter().map(|(value, _)| value).collect();

        tracing::debug!(
            points = self.points.len(),
            parallel = self.parallel,
            "Replay run completed"
        );

        if buffer_written {
            tracing::error!("Callback modified a sampler-owned point buffer");
            return STATUS_BUFFER_WRITTEN;
        }
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    static ABORTING_CALLS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C-unwind" fn sum_of_point(ndim: i32, point: *mut f64) -> f64 {
        let slice = unsafe { std::slice::from_raw_parts(point, ndim as usize) };
        slice.iter().sum()
    }

    unsafe extern "C-unwind" fn scribble(ndim: i32, point: *mut f64) -> f64 {
        if ndim > 0 {
            unsafe { *point = 42.0 };
        }
        0.0
    }

    unsafe extern "C-unwind" fn abort_run(_ndim: i32, _point: *mut f64) -> f64 {
        ABORTING_CALLS.fetch_add(1, Ordering::SeqCst);
        panic::resume_unwind(Box::new("abort"))
    }

    fn input_file() -> InputFileBuffer {
        InputFileBuffer::new("replay.nml").unwrap()
    }

    #[test]
    fn test_sequential_replay() {
        let sampler = ReplaySampler::new(vec![vec![1.0, 2.0], vec![-3.0, 0.5]]);
        let status = sampler.run(2, sum_of_point, &mut input_file());
        assert_eq!(status, 0);
        assert_eq!(sampler.results(), vec![3.0, -2.5]);
        assert_eq!(sampler.runs(), 1);

        let seen = sampler.last_input_file().unwrap();
        assert_eq!(seen.path, "replay.nml");
        assert_eq!(seen.native_len, 11);
    }

    #[test]
    fn test_parallel_replay_keeps_point_order() {
        let points: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64, 1.0, 2.0]).collect();
        let sampler = ReplaySampler::new(points).parallel(true);
        assert_eq!(sampler.run(3, sum_of_point, &mut input_file()), 0);

        let expected: Vec<f64> = (0..200).map(|i| i as f64 + 3.0).collect();
        assert_eq!(sampler.results(), expected);
    }

    #[test]
    fn test_dimension_mismatch_status() {
        let sampler = ReplaySampler::new(vec![vec![1.0, 2.0, 3.0]]);
        let status = sampler.run(2, sum_of_point, &mut input_file());
        assert_eq!(status, STATUS_DIMENSION_MISMATCH);
        assert!(sampler.results().is_empty());
    }

    #[test]
    fn test_configured_status() {
        let sampler = ReplaySampler::new(vec![vec![0.0]]).with_status(5);
        assert_eq!(sampler.run(1, sum_of_point, &mut input_file()), 5);
    }

    #[test]
    fn test_buffer_write_is_detected() {
        let sampler = ReplaySampler::new(vec![vec![1.0]]);
        assert_eq!(
            sampler.run(1, scribble, &mut input_file()),
            STATUS_BUFFER_WRITTEN
        );
    }

    #[test]
    fn test_unwinding_callback_ends_run() {
        let sampler = ReplaySampler::new(vec![vec![1.0]; 5]);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            sampler.run(1, abort_run, &mut input_file())
        }));
        assert!(outcome.is_err());
        assert_eq!(ABORTING_CALLS.load(Ordering::SeqCst), 1);
        assert!(sampler.results().is_empty());
        assert_eq!(sampler.runs(), 1);
    }
}
