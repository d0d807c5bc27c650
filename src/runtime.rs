use crate::aggregate::aggregate;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{TaskExecutor, WorkHandle};
use crate::math::partition;
use crate::policy::{DimensionKind, ParallelismPolicy};
use parking_lot::RwLock;
use std::fmt::Display;
use std::ops::Range;
use std::sync::Arc;

/// A policy plus the executor that honours it.
///
/// Independent runtimes do not share any state, so tests and embedders can
/// run several side by side. The crate-level functions use the process-wide
/// runtime returned by [`global`].
#[derive(Debug)]
pub struct Runtime {
    policy: Arc<ParallelismPolicy>,
    executor: TaskExecutor,
    config: Config,
}

impl Runtime {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: Config) -> Self {
        let policy = Arc::new(ParallelismPolicy::from_config(&config));
        let executor = TaskExecutor::new(config.clone(), policy.clone());
        Self {
            policy,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn policy(&self) -> &Arc<ParallelismPolicy> {
        &self.policy
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub fn submit<F, T>(&self, work: F) -> WorkHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.executor.submit(work)
    }

    pub fn submit_fallible<F, T, E>(&self, work: F) -> WorkHandle<T>
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Display,
    {
        self.executor.submit_fallible(work)
    }

    /// Reduces `0..len` with `work` over contiguous ranges.
    ///
    /// Runs `work(0..len)` on the calling thread when the policy says the
    /// size is not worth splitting. Otherwise the range is cut into one
    /// piece per worker and the partial results are combined in range order.
    pub fn parallel_reduce<T, W, C>(
        &self,
        kind: DimensionKind,
        len: usize,
        work: W,
        combine: C,
    ) -> Result<T>
    where
        W: Fn(Range<usize>) -> T + Send + Sync + 'static,
        T: Send + 'static,
        C: FnMut(T, T) -> T,
    {
        if len == 0 || !self.policy.should_parallelize(kind, len) {
            return Ok(work(0..len));
        }

        let work = Arc::new(work);
        let handles: Vec<WorkHandle<T>> = partition(len, self.policy.num_threads())
            .into_iter()
            .map(|range| {
                let work = work.clone();
                self.executor.submit(move || work(range))
            })
            .collect();

        tracing::trace!(?kind, len, parts = handles.len(), "fanned out reduction");
        aggregate(handles, combine)
    }
}

// Global runtime for the crate-level API
static GLOBAL_RUNTIME: RwLock<Option<Arc<Runtime>>> = RwLock::new(None);

/// The process-wide runtime, created from `Config::default()` on first use.
pub fn global() -> Arc<Runtime> {
    if let Some(rt) = GLOBAL_RUNTIME.read().as_ref() {
        return rt.clone();
    }

    GLOBAL_RUNTIME
        .write()
        .get_or_insert_with(|| Arc::new(Runtime::build(Config::default())))
        .clone()
}

pub fn init() -> Result<()> {
    init_with_config(Config::default())
}

/// Installs the process-wide runtime; fails if one already exists.
pub fn init_with_config(config: Config) -> Result<()> {
    let mut runtime = GLOBAL_RUNTIME.write();

    if runtime.is_some() {
        return Err(Error::AlreadyInitialized);
    }

    *runtime = Some(Arc::new(Runtime::new(config)?));
    Ok(())
}

/// Drops the process-wide runtime. The next use creates a default one.
pub fn shutdown() {
    let runtime = GLOBAL_RUNTIME.write().take();
    drop(runtime);
}

pub fn submit<F, T>(work: F) -> WorkHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    global().submit(work)
}

pub fn submit_fallible<F, T, E>(work: F) -> WorkHandle<T>
where
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Display,
{
    global().submit_fallible(work)
}

pub fn num_threads() -> usize {
    global().policy().num_threads()
}

/// Values outside `1..=MAX_THREADS` are clamped.
pub fn set_num_threads(n: usize) {
    global().policy().set_num_threads(n);
}

pub fn threshold(kind: DimensionKind) -> usize {
    global().policy().threshold(kind)
}

pub fn set_threshold(kind: DimensionKind, n: usize) {
    global().policy().set_threshold(kind, n);
}

pub fn reset_fft_thresholds() {
    global().policy().reset_fft_thresholds();
}

pub fn reset_thresholds() {
    global().policy().reset_thresholds();
}

pub fn should_parallelize(kind: DimensionKind, problem_size: usize) -> bool {
    global().policy().should_parallelize(kind, problem_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Thresholds, DEFAULT_THRESHOLD_1D};

    fn runtime(threads: usize, one_d: usize) -> Runtime {
        let config = Config::builder()
            .num_threads(threads)
            .threshold(DimensionKind::OneD, one_d)
            .build()
            .unwrap();
        Runtime::new(config).unwrap()
    }

    #[test]
    fn test_runtime_from_config() {
        let rt = runtime(3, 10);
        assert_eq!(rt.policy().num_threads(), 3);
        assert_eq!(rt.policy().threshold(DimensionKind::OneD), 10);
        assert_eq!(rt.executor().num_threads(), 3);
        assert_eq!(rt.config().thread_name_prefix, "colt-worker");
    }

    #[test]
    fn test_runtime_dropped_inside_own_task() {
        let rt = Arc::new(runtime(2, 10));
        let inner = rt.clone();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);

        let handle = rt.submit(move || {
            release_rx.recv().unwrap();
            let threads = inner.policy().num_threads();
            // last reference: the pool shuts down on one of its own workers
            drop(inner);
            threads
        });

        drop(rt);
        release_tx.send(()).unwrap();
        assert_eq!(handle.join(), Ok(2));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.thread_name_prefix.clear();
        assert!(matches!(Runtime::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_parallel_reduce_small_runs_inline() {
        let rt = runtime(4, 1_000);
        let caller = std::thread::current().id();

        let ran_inline = rt
            .parallel_reduce(
                DimensionKind::OneD,
                999,
                move |_| std::thread::current().id() == caller,
                |a, b| a && b,
            )
            .unwrap();
        assert!(ran_inline);
    }

    #[test]
    fn test_parallel_reduce_splits_large() {
        let rt = runtime(4, 100);
        let data: Arc<Vec<u64>> = Arc::new((1..=10_000).collect());

        let shared = data.clone();
        let sum = rt
            .parallel_reduce(
                DimensionKind::OneD,
                data.len(),
                move |range| shared[range].iter().sum::<u64>(),
                |a, b| a + b,
            )
            .unwrap();
        assert_eq!(sum, 50_005_000);

        let ranges = rt
            .parallel_reduce(DimensionKind::OneD, 1_000, |range| vec![range], |mut a, b| {
                a.extend(b);
                a
            })
            .unwrap();
        assert_eq!(ranges, vec![0..250, 250..500, 500..750, 750..1_000]);
    }

    #[test]
    fn test_parallel_reduce_empty_len() {
        let rt = runtime(4, 0);
        let count = rt
            .parallel_reduce(DimensionKind::OneD, 0, |range| range.len(), |a, b| a + b)
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_parallel_reduce_failure() {
        let rt = runtime(2, 0);
        let err = rt
            .parallel_reduce(
                DimensionKind::OneD,
                10,
                |range| {
                    if range.start > 0 {
                        panic!("second half failed");
                    }
                    range.len()
                },
                |a, b| a + b,
            )
            .unwrap_err();
        assert_eq!(err.failed_index(), Some(1));
    }

    // the only test in this crate that touches the process-wide runtime
    #[test]
    fn test_global_runtime_lifecycle() {
        shutdown();
        assert_eq!(num_threads(), global().policy().num_threads());
        assert!(matches!(init(), Err(Error::AlreadyInitialized)));

        shutdown();
        let config = Config::builder().num_threads(2).build().unwrap();
        init_with_config(config).unwrap();
        assert_eq!(num_threads(), 2);

        set_num_threads(0);
        assert_eq!(num_threads(), 1);
        assert!(!should_parallelize(DimensionKind::OneD, usize::MAX));

        set_num_threads(2);
        set_threshold(DimensionKind::OneD, 5);
        assert_eq!(threshold(DimensionKind::OneD), 5);
        assert!(should_parallelize(DimensionKind::OneD, 5));
        reset_thresholds();
        assert_eq!(threshold(DimensionKind::OneD), DEFAULT_THRESHOLD_1D);

        set_threshold(DimensionKind::OneDFft4, 1);
        reset_fft_thresholds();
        assert_eq!(global().policy().snapshot(), Thresholds::default());

        assert_eq!(submit(|| 2 + 2).join(), Ok(4));
        assert!(submit_fallible(|| Err::<(), _>("nope")).join().is_err());

        shutdown();
    }
}
