use super::task::Task;
use super::worker::{PoolCounters, Worker, WorkerId};
use crate::config::Config;
use crate::error::{Error, Result};
use crossbeam_deque::Injector;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Fixed-size work-stealing pool. Dropping it waits for queued work to finish.
pub struct CpuPool {
    workers: Vec<WorkerHandle>,
    injector: Arc<Injector<Task>>,
    shutdown: Arc<AtomicBool>,
    num_threads: usize,
    counters: Arc<PoolCounters>,
    next_wake: AtomicUsize,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
    unparker: thread::Thread,
}

impl CpuPool {
    pub fn new(num_threads: usize, config: &Config) -> Result<Self> {
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let injector = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(num_threads);
        let mut stealers = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let worker = Worker::new(id);
            stealers.push(worker.local_queue.stealer());
            workers.push(worker);
        }

        let mut handles: Vec<WorkerHandle> = Vec::with_capacity(num_threads);

        for worker in workers {
            let id = worker.id;
            let stealers_clone = stealers.clone();
            let injector_clone = injector.clone();
            let shutdown_clone = shutdown.clone();
            let counters_clone = counters.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let spawned = builder.spawn(move || {
                worker.run(stealers_clone, injector_clone, shutdown_clone, counters_clone);
            });

            let thread = match spawned {
                Ok(thread) => thread,
                Err(e) => {
                    // don't leave the already started workers spinning
                    shutdown.store(true, Ordering::Release);
                    for handle in handles.iter_mut() {
                        handle.unparker.unpark();
                        if let Some(thread) = handle.thread.take() {
                            let _ = thread.join();
                        }
                    }
                    return Err(Error::executor(format!("spawn failed: {}", e)));
                }
            };

            let unparker = thread.thread().clone();

            handles.push(WorkerHandle {
                id,
                thread: Some(thread),
                unparker,
            });
        }

        tracing::debug!(num_threads, prefix = %config.thread_name_prefix, "worker pool started");

        Ok(Self {
            workers: handles,
            injector,
            shutdown,
            num_threads,
            counters,
            next_wake: AtomicUsize::new(0),
        })
    }

    pub(crate) fn submit(&self, task: Task) {
        self.counters.pending.fetch_add(1, Ordering::AcqRel);
        self.injector.push(task);

        // wake workers round-robin
        let idx = self.next_wake.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        self.workers[idx].unparker.unpark();
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Tasks submitted but not yet finished.
    pub fn pending_tasks(&self) -> usize {
        self.counters.pending.load(Ordering::Acquire)
    }

    pub fn completed_tasks(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    /// Signals shutdown and joins every worker once the queues drain.
    ///
    /// When called from one of the pool's own workers (the last reference
    /// to the pool was dropped inside a task), that worker is detached
    /// instead of joined; it exits on its own once the queues are empty.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);

        // wake everyone up to check shutdown flag
        for worker in &self.workers {
            worker.unparker.unpark();
        }

        let current = thread::current().id();

        for worker in &mut self.workers {
            let Some(thread) = worker.thread.take() else {
                continue;
            };

            if thread.thread().id() == current {
                tracing::debug!(worker = worker.id, "pool dropped on its own worker, detaching");
                continue;
            }

            if thread.join().is_err() {
                tracing::warn!(worker = worker.id, "worker thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for CpuPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuPool")
            .field("num_threads", &self.num_threads)
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

impl Drop for CpuPool {
    fn drop(&mut self) {
        self.shutdown();
        tracing::debug!(num_threads = self.num_threads, "worker pool stopped");
    }
}
