//! The distance-matrix engine
//!
//! Decomposes the upper triangle of the N×N result into one task per index
//! pair, feeds the tasks to a fresh worker pool, and drains the pool within
//! whatever is left of the overall deadline. A calculator instance runs at
//! most one computation at a time; the reentrancy flag and the pool are both
//! released on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::core::deadline::DeadlineClock;
use crate::core::error::{Error, Result};
use crate::core::matrix::{DistanceMatrix, SharedCells};
use crate::core::point::Point;
use crate::core::pool::{DrainStatus, Execute, PairTask, WorkerPool};

/// Wait budget applied when none is given explicitly.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Allocation budget for the dense result, mirroring the reference bound
/// `INT_MAX / N >= N * 64`. Caps the input at 5792 points.
const MATRIX_ALLOC_BUDGET: u64 = i32::MAX as u64;

/// Parallel pairwise Euclidean distance-matrix calculator.
///
/// The calculator is cheap to construct and holds no threads of its own; a
/// fresh worker pool is spun up for each [`calculate`](Self::calculate) call
/// and torn down before it returns. Instances are safe to share across
/// threads (e.g. to call [`cancel`](Self::cancel) from elsewhere), but only
/// one computation may run at a time per instance.
pub struct DistanceCalculator {
    thread_count: usize,
    timeout: Duration,
    running: AtomicBool,
    clock: DeadlineClock,
}

impl DistanceCalculator {
    /// Calculator with `thread_count` workers and the default 10 second
    /// wait budget.
    pub fn new(thread_count: usize) -> Result<Self> {
        Self::with_timeout(thread_count, DEFAULT_TIMEOUT_SECS)
    }

    /// Calculator with `thread_count` workers and an explicit wait budget.
    ///
    /// `thread_count` must be at least 1. A zero `timeout_secs` is accepted:
    /// the deadline is armed already at-or-past, so the computation always
    /// fails with [`Error::ComputationFailed`].
    pub fn with_timeout(thread_count: usize, timeout_secs: u64) -> Result<Self> {
        if thread_count == 0 {
            return Err(Error::InvalidInput(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(DistanceCalculator {
            thread_count,
            timeout: Duration::from_secs(timeout_secs),
            running: AtomicBool::new(false),
            clock: DeadlineClock::new(),
        })
    }

    /// Compute the full N×N matrix of pairwise distances.
    ///
    /// Blocks the calling thread until every pair has been computed or the
    /// deadline passes. On success the returned matrix is square, zero on
    /// the diagonal and bit-exactly symmetric. On failure no partial result
    /// escapes: the buffer is discarded with the pool.
    pub fn calculate(&self, points: &[Point]) -> Result<DistanceMatrix> {
        let _guard = RunGuard::acquire(&self.running)?;
        validate_input(points)?;

        let n = points.len();
        let started = Instant::now();
        debug!(
            "computing {n}x{n} distance matrix across {} worker(s)",
            self.thread_count
        );

        let ctx = Arc::new(ComputeContext {
            points: points.to_vec().into_boxed_slice(),
            cells: SharedCells::zeroed(n),
        });

        self.clock.arm(self.timeout);
        let exec: Arc<dyn Execute> = ctx.clone();
        let mut pool = WorkerPool::new(self.thread_count, exec)?;

        for i in 0..n {
            for j in i..n {
                // with very large inputs the submission phase alone can
                // outlive the deadline; stop admitting tasks as soon as it
                // passes
                if self.clock.expired() {
                    warn!("distance matrix abandoned after {:?}: deadline passed during task submission", started.elapsed());
                    return Err(Error::ComputationFailed(
                        "wait limit reached".to_string(),
                    ));
                }
                if i == j {
                    continue;
                }
                pool.submit(PairTask { i, j });
            }
        }

        pool.shutdown();
        if pool.wait(self.clock.remaining()) == DrainStatus::TimedOut {
            warn!("distance matrix abandoned after {:?}: deadline passed while draining workers", started.elapsed());
            return Err(Error::ComputationFailed(
                "wait limit reached".to_string(),
            ));
        }
        drop(pool); // joins the workers, releasing their context handles

        debug!(
            "distance matrix for {n} points filled in {:?}",
            started.elapsed()
        );
        match Arc::into_inner(ctx) {
            Some(ctx) => Ok(ctx.cells.into_matrix()),
            // unreachable once the workers are joined; reported rather than
            // unwrapped so a broken invariant cannot take the caller down
            None => Err(Error::ComputationFailed(
                "result buffer still shared after drain".to_string(),
            )),
        }
    }

    /// Request an early stop of the computation currently in progress.
    ///
    /// Moves the deadline into the past; the running
    /// [`calculate`](Self::calculate) observes the trip at its next
    /// submission-loop poll or at its drain wait and fails with
    /// [`Error::ComputationFailed`]. Safe to call from any thread; a no-op
    /// for the next computation, which re-arms the deadline.
    pub fn cancel(&self) {
        self.clock.trip();
    }

    /// True while a computation is in progress on this instance.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// One worker per available CPU and the default wait budget.
impl Default for DistanceCalculator {
    fn default() -> Self {
        DistanceCalculator {
            thread_count: num_cpus::get().max(1),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            running: AtomicBool::new(false),
            clock: DeadlineClock::new(),
        }
    }
}

/// Read-only points plus the shared result cells, handed to the pool.
struct ComputeContext {
    points: Box<[Point]>,
    cells: SharedCells,
}

impl Execute for ComputeContext {
    fn execute(&self, task: PairTask) {
        let distance = self.points[task.i].distance_to(&self.points[task.j]);
        // SAFETY: the submission loop enumerates each unordered pair (i, j)
        // with i < j exactly once, so no two tasks write the same cells
        unsafe { self.cells.write_symmetric(task.i, task.j, distance) };
    }
}

/// Scoped reentrancy guard: admission flips the run flag, drop clears it on
/// every exit path.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }
        Ok(RunGuard { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

fn validate_input(points: &[Point]) -> Result<()> {
    if points.is_empty() {
        return Err(Error::InvalidInput("no points were provided".to_string()));
    }
    let n = points.len() as u64;
    let result_bits = n.saturating_mul(n).saturating_mul(64);
    if result_bits > MATRIX_ALLOC_BUDGET {
        return Err(Error::InvalidInput(format!(
            "{n} points exceed the maximum supported input size (5792 points)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_input() {
        assert!(matches!(
            validate_input(&[]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_capacity_boundary() {
        let at_cap = vec![Point::new(1.0, 1.0); 5792];
        assert!(validate_input(&at_cap).is_ok());
        let over_cap = vec![Point::new(1.0, 1.0); 5793];
        assert!(matches!(
            validate_input(&over_cap),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_workers_are_rejected() {
        assert!(matches!(
            DistanceCalculator::new(0),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            DistanceCalculator::with_timeout(0, 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_small_matrix_is_exact() {
        let points = [Point::of(3, 4), Point::of(7, 1), Point::of(2, 2)];
        let calc = DistanceCalculator::new(2).unwrap();
        let matrix = calc.calculate(&points).unwrap();

        assert_eq!(matrix.len(), 3);
        for i in 0..3 {
            assert_eq!(matrix[(i, i)], 0.0);
            for j in 0..3 {
                assert_eq!(matrix[(i, j)], points[i].distance_to(&points[j]));
                assert_eq!(matrix[(i, j)].to_bits(), matrix[(j, i)].to_bits());
            }
        }
        assert_eq!(matrix[(0, 1)], 5.0);
    }

    #[test]
    fn test_calculator_is_reusable_after_success() {
        let calc = DistanceCalculator::new(1).unwrap();
        let points = [Point::of(1, 1), Point::of(4, 5)];
        let first = calc.calculate(&points).unwrap();
        let second = calc.calculate(&points).unwrap();
        assert_eq!(first, second);
        assert!(!calc.is_running());
    }

    #[test]
    fn test_default_calculator_computes() {
        let calc = DistanceCalculator::default();
        let matrix = calc.calculate(&[Point::of(1, 1)]).unwrap();
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix[(0, 0)], 0.0);
    }
}
