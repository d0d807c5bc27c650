//! Completion handles for submitted work.

use super::task::TaskId;
use crossbeam_channel::Receiver;
use std::fmt;

/// Why a unit of work did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskFailure {
    #[error("{task} panicked: {message}")]
    Panicked { task: TaskId, message: String },

    #[error("{task} failed: {message}")]
    Failed { task: TaskId, message: String },

    #[error("{task} was rejected: {reason}")]
    Rejected { task: TaskId, reason: String },

    #[error("{task} was dropped before completing")]
    Abandoned { task: TaskId },
}

impl TaskFailure {
    pub fn task(&self) -> TaskId {
        match self {
            TaskFailure::Panicked { task, .. }
            | TaskFailure::Failed { task, .. }
            | TaskFailure::Rejected { task, .. }
            | TaskFailure::Abandoned { task } => *task,
        }
    }
}

/// Result a handle resolves to.
pub type Outcome<T> = std::result::Result<T, TaskFailure>;

/// The eventual result of one submitted unit of work.
///
/// A handle resolves exactly once. [`WorkHandle::wait`] blocks and keeps the
/// outcome inside the handle, [`WorkHandle::join`] blocks and hands it over.
pub struct WorkHandle<T> {
    id: TaskId,
    receiver: Receiver<Outcome<T>>,
    outcome: Option<Outcome<T>>,
}

impl<T> WorkHandle<T> {
    pub(crate) fn new(id: TaskId, receiver: Receiver<Outcome<T>>) -> Self {
        Self {
            id,
            receiver,
            outcome: None,
        }
    }

    /// A handle that is already resolved, used when the work never reached a worker.
    pub(crate) fn resolved(id: TaskId, outcome: Outcome<T>) -> Self {
        Self {
            id,
            receiver: crossbeam_channel::never(),
            outcome: Some(outcome),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Non-blocking check; returns true once the outcome is available.
    pub fn poll(&mut self) -> bool {
        if self.outcome.is_none() {
            match self.receiver.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(crossbeam_channel::TryRecvError::Disconnected) => {
                    self.outcome = Some(Err(TaskFailure::Abandoned { task: self.id }));
                }
                Err(crossbeam_channel::TryRecvError::Empty) => {}
            }
        }
        self.outcome.is_some()
    }

    /// True if a previous `poll` or `wait` already observed the outcome.
    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    /// Blocks until the work finishes and returns a reference to its outcome.
    pub fn wait(&mut self) -> &Outcome<T> {
        let id = self.id;
        let receiver = &self.receiver;
        self.outcome.get_or_insert_with(|| receive(receiver, id))
    }

    /// Blocks until the work finishes and returns its outcome.
    pub fn join(mut self) -> Outcome<T> {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => receive(&self.receiver, self.id),
        }
    }

    /// Non-blocking [`join`](Self::join): the outcome if the work has
    /// finished, otherwise the handle back.
    pub fn try_join(mut self) -> Result<Outcome<T>, Self> {
        if !self.poll() {
            return Err(self);
        }
        match self.outcome.take() {
            Some(outcome) => Ok(outcome),
            None => Err(self),
        }
    }
}

fn receive<T>(receiver: &Receiver<Outcome<T>>, task: TaskId) -> Outcome<T> {
    receiver
        .recv()
        .unwrap_or_else(|_| Err(TaskFailure::Abandoned { task }))
}

impl<T> fmt::Debug for WorkHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkHandle")
            .field("id", &self.id)
            .field("resolved", &self.outcome.is_some())
            .finish()
    }
}

/// Anything `await_all` can block on, regardless of the value type.
pub trait Resolve {
    fn task_id(&self) -> TaskId;

    /// Blocks until resolved; returns the failure, if any.
    fn resolve(&mut self) -> Option<&TaskFailure>;
}

impl<T> Resolve for WorkHandle<T> {
    fn task_id(&self) -> TaskId {
        self.id
    }

    fn resolve(&mut self) -> Option<&TaskFailure> {
        self.wait().as_ref().err()
    }
}

impl<R: Resolve + ?Sized> Resolve for &mut R {
    fn task_id(&self) -> TaskId {
        (**self).task_id()
    }

    fn resolve(&mut self) -> Option<&TaskFailure> {
        (**self).resolve()
    }
}

impl<R: Resolve + ?Sized> Resolve for Box<R> {
    fn task_id(&self) -> TaskId {
        (**self).task_id()
    }

    fn resolve(&mut self) -> Option<&TaskFailure> {
        (**self).resolve()
    }
}

/// Best-effort barrier: blocks until every handle has resolved.
///
/// Failures are logged and otherwise ignored; the outcomes stay inside the
/// handles, so callers that care can still inspect or join them afterwards.
pub fn await_all<H: Resolve>(handles: &mut [H]) {
    let mut failures = 0usize;

    for handle in handles.iter_mut() {
        if let Some(failure) = handle.resolve() {
            failures += 1;
            tracing::warn!(task = %failure.task(), error = %failure, "task failed while awaiting completion");
        }
    }

    if failures > 0 {
        tracing::debug!(total = handles.len(), failures, "await_all finished with failures");
    }
}
