//! Bounded execution of CPU-bound work and in-flight call tracking.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use lo_types::{internal_error, LoResult};
use tokio::sync::{Notify, Semaphore};
use tracing::debug;

/// Runs blocking closures on tokio's blocking pool, at most `max_workers` at once.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    max_workers: usize,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `job` once a worker slot is free and await its result.
    pub async fn run<T, F>(&self, job: F) -> LoResult<T>
    where
        F: FnOnce() -> LoResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
            return Err(internal_error!("worker pool is closed"));
        };
        debug!(available = self.semaphore.available_permits(), "worker slot acquired");

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        handle
            .await
            .map_err(|e| internal_error!("worker task failed: {e}"))?
    }
}

#[derive(Debug, Default)]
struct InFlightState {
    count: AtomicUsize,
    closed: AtomicBool,
    idle: Notify,
}

/// Counts calls in progress so shutdown can wait for them.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    state: Arc<InFlightState>,
}

/// Decrements the in-flight count when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    state: Arc<InFlightState>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.state.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.state.idle.notify_waiters();
        }
    }
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new call; `None` once the tracker has been closed.
    pub fn enter(&self) -> Option<InFlightGuard> {
        // count first so a concurrent close + wait_idle always sees this call
        self.state.count.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard {
            state: self.state.clone(),
        };
        if self.state.closed.load(Ordering::Acquire) {
            drop(guard);
            return None;
        }
        Some(guard)
    }

    pub fn count(&self) -> usize {
        self.state.count.load(Ordering::Acquire)
    }

    /// Refuse new calls from now on.
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }

    /// Wait until no call is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.state.idle.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn runs_jobs_and_propagates_errors() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.run(|| Ok(21 * 2)).await.unwrap(), 42);

        let err = pool
            .run(|| -> LoResult<()> { Err(internal_error!("boom")) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let pool = WorkerPool::new(1);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..4).map(|_| {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                pool.run(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(10));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            })
        });
        for job in jobs.collect::<Vec<_>>() {
            job.await.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_idle_returns_after_last_guard() {
        let inflight = InFlight::new();
        let guard = inflight.enter().unwrap();
        assert_eq!(inflight.count(), 1);

        let waiter = {
            let inflight = inflight.clone();
            tokio::spawn(async move { inflight.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        inflight.close();
        assert!(inflight.enter().is_none());
        inflight.wait_idle().await;
    }

    #[tokio::test]
    async fn refused_entries_leave_no_count_behind() {
        let inflight = InFlight::new();
        let held = inflight.enter().unwrap();
        inflight.close();

        for _ in 0..8 {
            assert!(inflight.enter().is_none());
        }
        assert_eq!(inflight.count(), 1);

        drop(held);
        assert_eq!(inflight.count(), 0);
        tokio::time::timeout(Duration::from_secs(1), inflight.wait_idle())
            .await
            .unwrap();
    }

    #[test]
    fn close_racing_with_enter_never_strands_a_call() {
        let inflight = InFlight::new();
        let entered = Arc::new(AtomicUsize::new(0));

        let callers: Vec<_> = (0..4)
            .map(|_| {
                let inflight = inflight.clone();
                let entered = entered.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        if let Some(guard) = inflight.enter() {
                            entered.fetch_add(1, Ordering::SeqCst);
                            drop(guard);
                        }
                    }
                })
            })
            .collect();
        inflight.close();
        for caller in callers {
            caller.join().unwrap();
        }

        assert_eq!(inflight.count(), 0);
        assert!(inflight.enter().is_none());
        assert!(entered.load(Ordering::SeqCst) <= 4_000);
    }
}
