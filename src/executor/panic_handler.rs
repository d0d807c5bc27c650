use super::handle::{Outcome, TaskFailure};
use super::task::TaskId;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a worker does when a unit of work panics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanicStrategy {
    /// Abort the whole process.
    Abort,
    /// Record the failure on the handle without logging.
    Isolate,
    /// Record the failure on the handle and log it at `warn`.
    #[default]
    LogAndContinue,
}

/// Turns a panic inside submitted work into a [`TaskFailure::Panicked`]
/// outcome for that task, according to the configured [`PanicStrategy`].
#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Runs the body of `task`. Its own outcome passes through untouched.
    pub fn execute<F, T>(&self, task: TaskId, body: F) -> Outcome<T>
    where
        F: FnOnce() -> Outcome<T>,
    {
        let payload = match catch_unwind(AssertUnwindSafe(body)) {
            Ok(outcome) => return outcome,
            Err(payload) => payload,
        };

        self.panic_count.fetch_add(1, Ordering::Relaxed);
        let message = panic_message(payload.as_ref());

        match self.strategy {
            PanicStrategy::Abort => {
                tracing::error!(%task, %message, "task panicked, aborting");
                std::process::abort();
            }
            PanicStrategy::Isolate => {}
            PanicStrategy::LogAndContinue => {
                tracing::warn!(%task, %message, "task panicked");
            }
        }

        Err(TaskFailure::Panicked { task, message })
    }

    /// Panics caught since the handler was created.
    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_becomes_task_failure() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);
        let task = TaskId::from_raw(7);

        let outcome: Outcome<()> = handler.execute(task, || panic!("test panic"));

        assert_eq!(
            outcome,
            Err(TaskFailure::Panicked {
                task,
                message: "test panic".to_string(),
            })
        );
        assert_eq!(handler.panic_count(), 1);
    }

    #[test]
    fn test_outcome_passes_through() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);
        let task = TaskId::from_raw(1);

        assert_eq!(handler.execute(task, || Ok(42)), Ok(42));

        let failed = TaskFailure::Failed {
            task,
            message: "diverged".to_string(),
        };
        let returned = failed.clone();
        assert_eq!(handler.execute::<_, i32>(task, move || Err(returned)), Err(failed));
        assert_eq!(handler.panic_count(), 0);
    }

    #[test]
    fn test_formatted_and_opaque_payloads() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);
        let task = TaskId::from_raw(3);

        let formatted: Outcome<()> = handler.execute(task, || panic!("chunk {} out of range", 3));
        match formatted {
            Err(TaskFailure::Panicked { message, .. }) => assert_eq!(message, "chunk 3 out of range"),
            other => panic!("unexpected outcome: {:?}", other),
        }

        let opaque: Outcome<()> = handler.execute(task, || std::panic::panic_any(17u8));
        match opaque {
            Err(TaskFailure::Panicked { message, .. }) => assert_eq!(message, "unknown panic"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_panic_counter() {
        let handler = PanicHandler::new(PanicStrategy::LogAndContinue);

        for i in 0..5 {
            let _: Outcome<()> = handler.execute(TaskId::from_raw(i), || panic!("test"));
        }

        assert_eq!(handler.panic_count(), 5);
        assert_eq!(handler.strategy(), PanicStrategy::LogAndContinue);
    }
}
