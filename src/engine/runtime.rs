//! Bounded store worker pool.
//!
//! Every record-store call made by the resolver and the miner runs on this
//! pool. A fixed number of threads pull jobs from a bounded queue; submitters
//! block while the queue is full, which rate-limits fan-outs of unbounded
//! size. Callers wait for replies up to a shared deadline and keep whatever
//! finished before it.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError,
};
use tracing::error;

use crate::config::PoolConfig;
use crate::error::{EngineError, ExecutionError};

type Task = Box<dyn FnOnce() + Send + 'static>;

const POOL_NAME: &str = "store";

/// Overall time budget of one engine call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget: Option<Duration>,
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline `budget` from now; `None` never expires.
    ///
    /// A budget too large to represent as an instant never expires either.
    #[must_use]
    pub fn after(budget: Option<Duration>) -> Self {
        Self {
            budget,
            at: budget.and_then(|b| Instant::now().checked_add(b)),
        }
    }

    /// A deadline that never expires.
    #[must_use]
    pub const fn never() -> Self {
        Self {
            budget: None,
            at: None,
        }
    }

    /// Returns true once the budget is spent.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    fn timeout_error(&self) -> ExecutionError {
        let budget = self.budget.unwrap_or_default();
        ExecutionError::Timeout {
            duration_ms: budget.as_millis().min(u128::from(u64::MAX)) as u64,
        }
    }
}

/// Reply handle for a submitted store job.
pub struct Pending<T> {
    rx: Receiver<T>,
}

impl<T> Pending<T> {
    /// Waits for the reply until `deadline`.
    pub fn wait(self, deadline: &Deadline) -> Result<T, ExecutionError> {
        let disconnected = || ExecutionError::Disconnected {
            pool: POOL_NAME.to_string(),
        };
        match deadline.at {
            None => self.rx.recv().map_err(|_| disconnected()),
            Some(at) => self.rx.recv_deadline(at).map_err(|err| match err {
                RecvTimeoutError::Timeout => deadline.timeout_error(),
                RecvTimeoutError::Disconnected => disconnected(),
            }),
        }
    }

    /// Takes the reply if it has already arrived.
    pub fn try_take(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

/// Fixed-size pool of store workers.
pub struct StorePool {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl StorePool {
    /// Spawns the workers.
    pub fn start(config: &PoolConfig) -> Result<Self, EngineError> {
        let workers = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);
        let (tx, rx) = bounded::<Task>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Task> = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("groupscope-{POOL_NAME}-{idx}"))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        // A panicking store call only loses its own reply.
                        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                            error!(worker = idx, "store job panicked");
                        }
                    }
                })
                .map_err(|e| EngineError::internal(format!("failed to spawn store worker: {e}")))?;
            handles.push(handle);
        }

        Ok(Self {
            tx: Some(tx),
            workers: handles,
            queue_capacity,
        })
    }

    /// Queue capacity.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues `job`, blocking while the queue is full until `deadline`.
    ///
    /// # Errors
    /// - `QueueFull`: the queue stayed full until the deadline
    /// - `Disconnected`: the pool has shut down
    pub fn submit<T, F>(&self, job: F, deadline: &Deadline) -> Result<Pending<T>, ExecutionError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let disconnected = || ExecutionError::Disconnected {
            pool: POOL_NAME.to_string(),
        };
        let tx = self.tx.as_ref().ok_or_else(disconnected)?;

        let (reply_tx, reply_rx) = bounded::<T>(1);
        let task: Task = Box::new(move || {
            let _ = reply_tx.send(job());
        });

        match deadline.at {
            None => tx.send(task).map_err(|_| disconnected())?,
            Some(at) => tx.send_deadline(task, at).map_err(|err| match err {
                SendTimeoutError::Timeout(_) => ExecutionError::QueueFull {
                    pool: POOL_NAME.to_string(),
                    capacity: self.queue_capacity,
                },
                SendTimeoutError::Disconnected(_) => disconnected(),
            })?,
        }
        Ok(Pending { rx: reply_rx })
    }
}

impl Drop for StorePool {
    fn drop(&mut self) {
        // Close the channel: workers drain queued jobs then exit.
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for StorePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorePool")
            .field("workers", &self.workers.len())
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn pool(workers: usize, queue_capacity: usize) -> StorePool {
        StorePool::start(&PoolConfig {
            workers,
            queue_capacity,
        })
        .unwrap()
    }

    #[test]
    fn runs_jobs_and_returns_replies() {
        let pool = pool(2, 8);
        let pending = pool.submit(|| 21 * 2, &Deadline::never()).unwrap();
        assert_eq!(pending.wait(&Deadline::never()).unwrap(), 42);
    }

    #[test]
    fn concurrency_is_bounded_by_worker_count() {
        let pool = pool(2, 64);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let pendings: Vec<_> = (0..12)
            .map(|_| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                pool.submit(
                    move || {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(10));
                        active.fetch_sub(1, Ordering::SeqCst);
                    },
                    &Deadline::never(),
                )
                .unwrap()
            })
            .collect();
        for p in pendings {
            p.wait(&Deadline::never()).unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn wait_times_out_on_slow_job() {
        let pool = pool(1, 4);
        let pending = pool
            .submit(
                || thread::sleep(Duration::from_millis(200)),
                &Deadline::never(),
            )
            .unwrap();
        let deadline = Deadline::after(Some(Duration::from_millis(20)));
        let err = pending.wait(&deadline).unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout { duration_ms: 20 }));
    }

    #[test]
    fn submit_times_out_when_queue_stays_full() {
        let pool = pool(1, 1);
        let _busy = pool
            .submit(|| thread::sleep(Duration::from_millis(200)), &Deadline::never())
            .unwrap();
        let _queued = pool
            .submit(|| thread::sleep(Duration::from_millis(200)), &Deadline::never())
            .unwrap();
        let deadline = Deadline::after(Some(Duration::from_millis(20)));
        let err = pool.submit(|| (), &deadline).err().unwrap();
        assert!(matches!(err, ExecutionError::QueueFull { capacity: 1, .. }));
    }

    #[test]
    fn panicking_job_reports_disconnected_and_worker_survives() {
        let pool = pool(1, 4);
        let pending = pool
            .submit(|| -> u8 { panic!("store exploded") }, &Deadline::never())
            .unwrap();
        let err = pending.wait(&Deadline::never()).unwrap_err();
        assert!(matches!(err, ExecutionError::Disconnected { .. }));

        let pending = pool.submit(|| 7u8, &Deadline::never()).unwrap();
        assert_eq!(pending.wait(&Deadline::never()).unwrap(), 7);
    }

    #[test]
    fn try_take_sees_finished_reply() {
        let pool = pool(1, 4);
        let pending = pool.submit(|| "done", &Deadline::never()).unwrap();
        let mut got = None;
        for _ in 0..100 {
            got = pending.try_take();
            if got.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(got, Some("done"));
    }

    #[test]
    fn never_deadline_does_not_expire() {
        assert!(!Deadline::never().expired());
        assert!(Deadline::after(Some(Duration::ZERO)).expired());
    }

    #[test]
    fn unrepresentable_budget_never_expires() {
        let deadline = Deadline::after(Some(Duration::MAX));
        assert!(!deadline.expired());

        let pool = pool(1, 4);
        let pending = pool.submit(|| 5u8, &deadline).unwrap();
        assert_eq!(pending.wait(&deadline).unwrap(), 5);
    }
}
