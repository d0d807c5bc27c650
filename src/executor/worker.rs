// worker thread stuff
use super::task::Task;
use crate::util::Backoff;
use crossbeam_deque::{Injector, Steal, Stealer, Worker as WorkerQueue};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

pub type WorkerId = usize;

/// Counters shared by every worker of a pool.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub pending: AtomicUsize,
    pub completed: AtomicU64,
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub local_queue: WorkerQueue<Task>,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            local_queue: WorkerQueue::new_fifo(),
        }
    }

    // main loop; keeps draining queued work after shutdown is requested
    pub fn run(
        &self,
        stealers: Vec<Stealer<Task>>,
        injector: Arc<Injector<Task>>,
        shutdown: Arc<AtomicBool>,
        counters: Arc<PoolCounters>,
    ) {
        let mut backoff = Backoff::new();

        loop {
            // read the flag before searching so work pushed ahead of the
            // shutdown signal is always found
            let stopping = shutdown.load(Ordering::Acquire);

            if let Some(task) = self.find_task(&stealers, &injector) {
                backoff.reset();
                self.execute_task(task);
                counters.pending.fetch_sub(1, Ordering::AcqRel);
                counters.completed.fetch_add(1, Ordering::Relaxed);
            } else if stopping {
                break;
            } else {
                backoff.snooze();
            }
        }

        tracing::trace!(worker = self.id, "worker exiting");
    }

    fn find_task(&self, stealers: &[Stealer<Task>], injector: &Injector<Task>) -> Option<Task> {
        // 1. local queue first (best cache locality)
        if let Some(task) = self.local_queue.pop() {
            return Some(task);
        }

        // 2. global injector queue
        loop {
            match injector.steal_batch_and_pop(&self.local_queue) {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        // 3. other workers
        self.try_steal_from_workers(stealers)
    }

    fn try_steal_from_workers(&self, stealers: &[Stealer<Task>]) -> Option<Task> {
        use rand::seq::SliceRandom;
        use rand::thread_rng;

        if stealers.len() < 2 {
            return None;
        }

        let mut indices: Vec<usize> = (0..stealers.len()).collect();
        indices.shuffle(&mut thread_rng());

        for &idx in &indices {
            if idx == self.id {
                continue;
            }

            loop {
                match stealers[idx].steal_batch_and_pop(&self.local_queue) {
                    Steal::Success(task) => return Some(task),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }

        None
    }

    fn execute_task(&self, task: Task) {
        let tid = task.id;

        // tasks built by the executor catch their own panics; this only
        // keeps the worker alive if a raw task slips through
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            task.execute();
        }));

        if result.is_err() {
            tracing::warn!(task = %tid, worker = self.id, "unhandled panic in task");
        }
    }
}
