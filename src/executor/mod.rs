//! Task execution infrastructure.
//!
//! Worker threads, the work-stealing CPU pool, completion handles and the
//! [`TaskExecutor`] that ties them to a [`ParallelismPolicy`](crate::ParallelismPolicy).

pub mod cpu_pool;
pub mod handle;
pub mod panic_handler;
pub mod task;
pub mod task_executor;
pub mod worker;

pub use cpu_pool::CpuPool;
pub use handle::{await_all, Outcome, Resolve, TaskFailure, WorkHandle};
pub use panic_handler::{PanicHandler, PanicStrategy};
pub use task::TaskId;
pub use task_executor::TaskExecutor;

pub(crate) use task::Task;
