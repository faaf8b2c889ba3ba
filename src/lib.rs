//! # Butterfly-matrix Library
//!
//! Parallel pairwise Euclidean distance-matrix computation for planar
//! points, with a bounded overall wait time and cooperative cancellation.
//!
//! ## Features
//!
//! - **Upper-triangle decomposition**: one task per unordered index pair;
//!   both symmetric cells are written from the same computation
//! - **Fixed worker pool**: a fresh set of named OS threads per call,
//!   decoupling the O(N²) task count from the thread count
//! - **Single deadline**: one monotonic instant bounds task submission and
//!   the drain wait; cancelling moves that instant into the past
//! - **Overflow-safe kernel**: distances are computed with `f64::hypot`,
//!   so extreme coordinates never overflow to garbage
//!
//! ## Basic Usage
//!
//! ```rust
//! use butterfly_matrix::{distance_matrix, Point};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let points = vec![Point::of(3, 4), Point::of(7, 1), Point::of(2, 2)];
//!
//! // two workers, default 10 second wait budget
//! let matrix = distance_matrix(&points, 2)?;
//!
//! assert_eq!(matrix[(0, 1)], 5.0);
//! assert_eq!(matrix[(1, 0)], 5.0);
//! print!("{matrix}"); // one row per line, cells like "5.00"
//! # Ok(())
//! # }
//! ```
//!
//! ## Cancellation
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use butterfly_matrix::{DistanceCalculator, Point};
//!
//! let calc = Arc::new(DistanceCalculator::new(4)?);
//! let canceller = Arc::clone(&calc);
//! std::thread::spawn(move || {
//!     // stop the computation from another thread
//!     canceller.cancel();
//! });
//! let points = vec![Point::of(1, 1); 5000];
//! let result = calc.calculate(&points); // fails with ComputationFailed
//! # Ok::<(), butterfly_matrix::Error>(())
//! ```

// Re-export core types that users might need
pub use crate::core::{DistanceCalculator, DistanceMatrix, Error, Point, Result};

// Internal modules
mod core;

/// Compute the distance matrix for `points` with `thread_count` workers.
///
/// Stateless convenience wrapper: constructs a throwaway
/// [`DistanceCalculator`] with the default 10 second wait budget and runs a
/// single computation.
///
/// # Arguments
/// * `points` - points to measure pairwise; must be non-empty
/// * `thread_count` - fixed worker count; must be at least 1
///
/// # Examples
/// ```rust
/// use butterfly_matrix::{distance_matrix, Point};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let matrix = distance_matrix(&[Point::of(1, 1)], 1)?;
/// assert_eq!(matrix.len(), 1);
/// assert_eq!(matrix[(0, 0)], 0.0);
/// # Ok(())
/// # }
/// ```
pub fn distance_matrix(points: &[Point], thread_count: usize) -> Result<DistanceMatrix> {
    DistanceCalculator::new(thread_count)?.calculate(points)
}

/// Compute the distance matrix with an explicit wait budget in seconds.
///
/// A budget of zero is accepted and always fails with
/// [`Error::ComputationFailed`]: the deadline is armed already at-or-past.
///
/// # Examples
/// ```rust
/// use butterfly_matrix::{distance_matrix_with_timeout, Point};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let points = vec![Point::of(0, 0), Point::of(6, 8)];
/// let matrix = distance_matrix_with_timeout(&points, 2, 30)?;
/// assert_eq!(matrix[(0, 1)], 10.0);
/// # Ok(())
/// # }
/// ```
pub fn distance_matrix_with_timeout(
    points: &[Point],
    thread_count: usize,
    timeout_secs: u64,
) -> Result<DistanceMatrix> {
    DistanceCalculator::with_timeout(thread_count, timeout_secs)?.calculate(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_matrix_helper() {
        let points = [Point::of(3, 4), Point::of(7, 1)];
        let matrix = distance_matrix(&points, 2).unwrap();
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix[(0, 1)], 5.0);
    }

    #[test]
    fn test_helper_propagates_constructor_errors() {
        let points = [Point::of(1, 1)];
        assert!(matches!(
            distance_matrix(&points, 0),
            Err(Error::InvalidInput(_))
        ));
    }
}
