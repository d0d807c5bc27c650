use super::cpu_pool::CpuPool;
use super::handle::{Outcome, TaskFailure, WorkHandle};
use super::panic_handler::PanicHandler;
use super::task::{Task, TaskId};
use crate::config::Config;
use crate::error::Result;
use crate::policy::ParallelismPolicy;
use crossbeam_channel::bounded;
use parking_lot::RwLock;
use std::fmt::Display;
use std::sync::Arc;
use std::thread;

/// Hands work to a pool sized by the shared [`ParallelismPolicy`].
///
/// The pool is started on first use and replaced whenever the policy's
/// thread count no longer matches it. A replaced pool finishes the work
/// already queued on it in the background.
///
/// Blocking on a handle from inside a task can deadlock when every worker
/// is waiting; keep waits on the submitting thread.
pub struct TaskExecutor {
    policy: Arc<ParallelismPolicy>,
    config: Config,
    panic_handler: Arc<PanicHandler>,
    pool: RwLock<Option<Arc<CpuPool>>>,
}

impl TaskExecutor {
    pub fn new(config: Config, policy: Arc<ParallelismPolicy>) -> Self {
        let panic_handler = Arc::new(PanicHandler::new(config.panic_strategy));
        Self {
            policy,
            config,
            panic_handler,
            pool: RwLock::new(None),
        }
    }

    pub fn policy(&self) -> &Arc<ParallelismPolicy> {
        &self.policy
    }

    /// Schedules `work` and returns immediately.
    ///
    /// A panic inside `work` resolves the handle with
    /// [`TaskFailure::Panicked`]; it is never raised here. Side-effecting
    /// work simply returns `()`.
    pub fn submit<F, T>(&self, work: F) -> WorkHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.dispatch(move |_| Ok(work()))
    }

    /// Like [`submit`](Self::submit) for work that reports errors; an `Err`
    /// resolves the handle with [`TaskFailure::Failed`].
    pub fn submit_fallible<F, T, E>(&self, work: F) -> WorkHandle<T>
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Display,
    {
        self.dispatch(move |task| {
            work().map_err(|e| TaskFailure::Failed {
                task,
                message: e.to_string(),
            })
        })
    }

    fn dispatch<F, T>(&self, body: F) -> WorkHandle<T>
    where
        F: FnOnce(TaskId) -> Outcome<T> + Send + 'static,
        T: Send + 'static,
    {
        let id = TaskId::next();

        let pool = match self.pool() {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(task = %id, error = %e, "could not start worker pool");
                return WorkHandle::resolved(
                    id,
                    Err(TaskFailure::Rejected {
                        task: id,
                        reason: e.to_string(),
                    }),
                );
            }
        };

        let (sender, receiver) = bounded(1);
        let handler = self.panic_handler.clone();

        pool.submit(Task::new(id, move || {
            let outcome = handler.execute(id, || body(id));
            // the caller may have dropped the handle
            let _ = sender.send(outcome);
        }));

        WorkHandle::new(id, receiver)
    }

    fn pool(&self) -> Result<Arc<CpuPool>> {
        let wanted = self.policy.num_threads();

        if let Some(pool) = self.pool.read().as_ref() {
            if pool.num_threads() == wanted {
                return Ok(pool.clone());
            }
        }

        let mut slot = self.pool.write();
        if let Some(pool) = slot.as_ref() {
            if pool.num_threads() == wanted {
                return Ok(pool.clone());
            }
        }

        let pool = Arc::new(CpuPool::new(wanted, &self.config)?);
        let previous = slot.replace(pool.clone());
        drop(slot);

        if let Some(previous) = previous {
            tracing::debug!(from = previous.num_threads(), to = wanted, "resizing worker pool");
            retire(previous);
        }

        Ok(pool)
    }

    /// Worker count of the running pool, or what the next pool will use.
    pub fn num_threads(&self) -> usize {
        match self.pool.read().as_ref() {
            Some(pool) => pool.num_threads(),
            None => self.policy.num_threads(),
        }
    }

    pub fn pending_tasks(&self) -> usize {
        self.pool.read().as_ref().map_or(0, |pool| pool.pending_tasks())
    }

    /// Completed tasks on the current pool.
    pub fn completed_tasks(&self) -> u64 {
        self.pool.read().as_ref().map_or(0, |pool| pool.completed_tasks())
    }

    pub fn panic_count(&self) -> usize {
        self.panic_handler.panic_count()
    }

    /// Drops the pool after its queued work finishes. The next submit starts a new one.
    pub fn shutdown(&self) {
        let pool = self.pool.write().take();
        drop(pool);
    }
}

// joins the old pool off the submitting thread so submit never blocks
fn retire(pool: Arc<CpuPool>) {
    let spawned = thread::Builder::new()
        .name("colt-pool-retire".to_string())
        .spawn(move || drop(pool));

    if let Err(e) = spawned {
        tracing::warn!(error = %e, "could not spawn retire thread, old pool detached");
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("num_threads", &self.num_threads())
            .field("panic_strategy", &self.panic_handler.strategy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{await_all, PanicStrategy};
    use crate::policy::Thresholds;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn executor(threads: usize) -> TaskExecutor {
        let config = Config::builder()
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();
        let policy = Arc::new(ParallelismPolicy::with_settings(threads, Thresholds::default()));
        TaskExecutor::new(config, policy)
    }

    #[test]
    fn test_submit_returns_value() {
        let executor = executor(2);
        let handle = executor.submit(|| 6 * 7);
        assert_eq!(handle.join(), Ok(42));
        assert_eq!(executor.num_threads(), 2);
    }

    #[test]
    fn test_submit_side_effect() {
        let executor = executor(2);
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles: Vec<WorkHandle<()>> = (0..16)
            .map(|_| {
                let counter = counter.clone();
                executor.submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        await_all(&mut handles);
        assert_eq!(counter.load(Ordering::SeqCst), 16);
        assert!(handles.iter().all(|h| h.is_resolved()));
    }

    #[test]
    fn test_panic_surfaces_on_handle() {
        let executor = executor(2);
        let handle: WorkHandle<i32> = executor.submit(|| panic!("kernel exploded"));

        match handle.join() {
            Err(TaskFailure::Panicked { message, .. }) => assert_eq!(message, "kernel exploded"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(executor.panic_count(), 1);

        // the pool survives the panic
        assert_eq!(executor.submit(|| 1).join(), Ok(1));
    }

    #[test]
    fn test_fallible_error_surfaces_on_handle() {
        let executor = executor(1);
        let ok = executor.submit_fallible(|| Ok::<_, String>(3));
        let err = executor.submit_fallible(|| Err::<i32, _>("singular matrix"));

        assert_eq!(ok.join(), Ok(3));
        match err.join() {
            Err(TaskFailure::Failed { message, .. }) => assert_eq!(message, "singular matrix"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_pool_follows_thread_count() {
        let executor = executor(2);
        assert_eq!(executor.submit(|| 1).join(), Ok(1));
        assert_eq!(executor.num_threads(), 2);

        let slow = executor.submit(|| {
            thread::sleep(Duration::from_millis(30));
            "old pool"
        });

        executor.policy().set_num_threads(3);
        assert_eq!(executor.submit(|| 2).join(), Ok(2));
        assert_eq!(executor.num_threads(), 3);

        // work queued on the replaced pool still resolves
        assert_eq!(slow.join(), Ok("old pool"));
    }

    #[test]
    fn test_shutdown_then_submit() {
        let executor = executor(2);
        assert_eq!(executor.submit(|| 1).join(), Ok(1));

        executor.shutdown();
        assert_eq!(executor.pending_tasks(), 0);
        assert_eq!(executor.submit(|| 2).join(), Ok(2));
    }
}
