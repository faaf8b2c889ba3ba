//! Fixed-size worker pool for pair tasks
//!
//! The pool owns a set of named OS threads fed by one bounded channel. A
//! task is a bare index pair; the work itself lives in a shared execution
//! context, so the queue carries two words per task and no closures. The
//! bounded queue applies backpressure to the submitting thread instead of
//! letting O(N²) queued tasks pile up in memory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use crate::core::error::{Error, Result};

/// Depth of the task queue before `submit` blocks for backpressure.
const TASK_QUEUE_CAPACITY: usize = 4096;

/// One unit of work: the unordered index pair (i, j) with i < j.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PairTask {
    pub i: usize,
    pub j: usize,
}

/// Execution context shared by all workers of a pool.
///
/// The pool knows nothing about distances; it hands each accepted task to
/// this context exactly once.
pub(crate) trait Execute: Send + Sync {
    fn execute(&self, task: PairTask);
}

/// Outcome of [`WorkerPool::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainStatus {
    /// Every accepted task has completed.
    Completed,
    /// The budget elapsed with tasks still outstanding.
    TimedOut,
}

struct PoolShared {
    /// When set, workers discard queued tasks without executing them.
    abort: AtomicBool,
    /// Number of tasks taken off the queue and retired (executed or
    /// discarded). Compared against the submission count by `wait`.
    completed: Mutex<u64>,
    drained: Condvar,
}

/// A fixed-size set of worker threads with a drain-or-force shutdown.
///
/// Created fresh for each engine call and never reused. Dropping the pool
/// force-stops it: queued tasks are abandoned and every worker is joined.
pub(crate) struct WorkerPool {
    sender: Option<Sender<PairTask>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<PoolShared>,
    submitted: u64,
}

impl WorkerPool {
    /// Spawn `thread_count` workers executing tasks through `ctx`.
    pub fn new(thread_count: usize, ctx: Arc<dyn Execute>) -> Result<WorkerPool> {
        let (sender, receiver) = bounded::<PairTask>(TASK_QUEUE_CAPACITY);
        let shared = Arc::new(PoolShared {
            abort: AtomicBool::new(false),
            completed: Mutex::new(0),
            drained: Condvar::new(),
        });

        let mut pool = WorkerPool {
            sender: Some(sender),
            workers: Vec::with_capacity(thread_count),
            shared,
            submitted: 0,
        };
        for id in 0..thread_count {
            let receiver = receiver.clone();
            let ctx = Arc::clone(&ctx);
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("butterfly-matrix-{id}"))
                .spawn(move || worker_loop(receiver, ctx, shared))
                .map_err(|e| {
                    Error::ComputationFailed(format!("failed to spawn worker thread: {e}"))
                })?;
            pool.workers.push(handle);
        }
        Ok(pool)
    }

    /// Queue one task, blocking while the queue is at capacity.
    ///
    /// Returns false once the pool has been shut down (or if every worker
    /// has died); the task is not accepted in that case.
    pub fn submit(&mut self, task: PairTask) -> bool {
        match &self.sender {
            Some(sender) if sender.send(task).is_ok() => {
                self.submitted += 1;
                true
            }
            _ => false,
        }
    }

    /// Refuse new submissions and let queued tasks finish.
    pub fn shutdown(&mut self) {
        self.sender = None;
    }

    /// Refuse new submissions and abandon queued tasks: workers drain the
    /// queue without executing and then exit.
    pub fn shutdown_now(&mut self) {
        self.shared.abort.store(true, Ordering::Release);
        self.sender = None;
    }

    /// Block until every accepted task has retired or `budget` elapses.
    pub fn wait(&self, budget: Duration) -> DrainStatus {
        let start = Instant::now();
        let mut completed = self.shared.completed.lock();
        while *completed < self.submitted {
            let elapsed = start.elapsed();
            if elapsed >= budget {
                return DrainStatus::TimedOut;
            }
            self.shared
                .drained
                .wait_for(&mut completed, budget - elapsed);
        }
        DrainStatus::Completed
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_now();
        for handle in self.workers.drain(..) {
            // a worker that panicked already retired its task count; the
            // join result carries nothing further to act on
            let _ = handle.join();
        }
    }
}

fn worker_loop(tasks: Receiver<PairTask>, ctx: Arc<dyn Execute>, shared: Arc<PoolShared>) {
    while let Ok(task) = tasks.recv() {
        if !shared.abort.load(Ordering::Acquire) {
            ctx.execute(task);
        }
        let mut completed = shared.completed.lock();
        *completed += 1;
        shared.drained.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingContext {
        executed: AtomicUsize,
    }

    impl CountingContext {
        fn new() -> Arc<Self> {
            Arc::new(CountingContext {
                executed: AtomicUsize::new(0),
            })
        }
    }

    impl Execute for CountingContext {
        fn execute(&self, _task: PairTask) {
            self.executed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct SleepyContext {
        pause: Duration,
        executed: AtomicUsize,
    }

    impl Execute for SleepyContext {
        fn execute(&self, _task: PairTask) {
            thread::sleep(self.pause);
            self.executed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tasks(n: usize) -> impl Iterator<Item = PairTask> {
        (0..n).map(|i| PairTask { i, j: i + 1 })
    }

    #[test]
    fn test_drain_completes_every_task() {
        let ctx = CountingContext::new();
        let mut pool = WorkerPool::new(2, ctx.clone()).unwrap();
        for task in tasks(100) {
            assert!(pool.submit(task));
        }
        pool.shutdown();
        assert_eq!(pool.wait(Duration::from_secs(10)), DrainStatus::Completed);
        assert_eq!(ctx.executed.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_wait_times_out_on_slow_tasks() {
        let ctx = Arc::new(SleepyContext {
            pause: Duration::from_millis(50),
            executed: AtomicUsize::new(0),
        });
        let mut pool = WorkerPool::new(1, ctx).unwrap();
        for task in tasks(10) {
            pool.submit(task);
        }
        pool.shutdown();
        assert_eq!(
            pool.wait(Duration::from_millis(60)),
            DrainStatus::TimedOut
        );
    }

    #[test]
    fn test_zero_budget_times_out_unless_idle() {
        let ctx = CountingContext::new();
        let mut pool = WorkerPool::new(1, ctx).unwrap();

        // nothing submitted: an empty pool drains within any budget
        assert_eq!(pool.wait(Duration::ZERO), DrainStatus::Completed);

        let slow = Arc::new(SleepyContext {
            pause: Duration::from_millis(20),
            executed: AtomicUsize::new(0),
        });
        pool = WorkerPool::new(1, slow).unwrap();
        for task in tasks(5) {
            pool.submit(task);
        }
        pool.shutdown();
        assert_eq!(pool.wait(Duration::ZERO), DrainStatus::TimedOut);
    }

    #[test]
    fn test_submit_after_shutdown_is_refused() {
        let ctx = CountingContext::new();
        let mut pool = WorkerPool::new(1, ctx.clone()).unwrap();
        pool.shutdown();
        assert!(!pool.submit(PairTask { i: 0, j: 1 }));
        assert_eq!(pool.wait(Duration::from_secs(1)), DrainStatus::Completed);
        assert_eq!(ctx.executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shutdown_now_discards_queued_tasks() {
        let ctx = Arc::new(SleepyContext {
            pause: Duration::from_millis(5),
            executed: AtomicUsize::new(0),
        });
        let mut pool = WorkerPool::new(1, ctx.clone()).unwrap();
        for task in tasks(50) {
            pool.submit(task);
        }
        pool.shutdown_now();
        drop(pool);
        // the worker retires the whole queue but executes almost none of it
        assert!(ctx.executed.load(Ordering::SeqCst) < 50);
    }
}
