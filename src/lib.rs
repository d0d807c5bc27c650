//! Concurrency support for numeric kernels.
//!
//! Long-running array and matrix operations are split into partitions,
//! each partition runs on a worker thread, and the partial results are
//! combined into one value.
//!
//! # Quick Start
//!
//! ```no_run
//! use colt_concurrency::{aggregate, submit, should_parallelize, DimensionKind};
//!
//! let data: Vec<f64> = (0..100_000).map(|i| i as f64).collect();
//!
//! if should_parallelize(DimensionKind::OneD, data.len()) {
//!     let data = std::sync::Arc::new(data);
//!     let handles: Vec<_> = colt_concurrency::math::partition(data.len(), 4)
//!         .into_iter()
//!         .map(|range| {
//!             let data = data.clone();
//!             submit(move || data[range].iter().sum::<f64>())
//!         })
//!         .collect();
//!
//!     let total = aggregate(handles, |a, b| a + b).unwrap();
//!     println!("sum = {}", total);
//! }
//! ```
//!
//! # Pieces
//!
//! - [`ParallelismPolicy`]: worker count and the per-dimensionality size
//!   thresholds below which work stays on the calling thread
//! - [`TaskExecutor`]: submits work to a work-stealing pool and hands back
//!   [`WorkHandle`]s; [`await_all`] is a best-effort barrier over them
//! - [`aggregate`]: waits on handles in submission order and folds the
//!   results left to right, failing with [`Error::Aggregation`] after
//!   draining every handle if any task failed
//! - [`math`]: power-of-two helpers and range partitioning

#![warn(missing_debug_implementations)]

pub mod aggregate;
pub mod config;
pub mod error;
pub mod executor;
pub mod math;
pub mod policy;
pub mod runtime;
pub mod util;

// Re-export key types at crate root
pub use aggregate::{aggregate, complex_add_f32, complex_add_f64, ComplexF32, ComplexF64};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{
    await_all, Outcome, PanicStrategy, Resolve, TaskExecutor, TaskFailure, TaskId, WorkHandle,
};
pub use math::{extend_dimension, is_power_of_two, next_exponent, next_power_of_two, prev_power_of_two};
pub use policy::{DimensionKind, ParallelismPolicy, Thresholds, MAX_THREADS};
pub use runtime::{
    global, init, init_with_config, num_threads, reset_fft_thresholds, reset_thresholds,
    set_num_threads, set_threshold, should_parallelize, shutdown, submit, submit_fallible,
    threshold, Runtime,
};
pub use util::sleep;
