use crate::executor::TaskFailure;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("task {index} failed during aggregation: {source}")]
    Aggregation {
        index: usize,
        #[source]
        source: TaskFailure,
    },

    #[error("cannot aggregate an empty set of handles")]
    EmptyInput,
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    /// Index of the failing task for [`Error::Aggregation`].
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            Error::Aggregation { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TaskId;
    use std::error::Error as _;

    #[test]
    fn test_aggregation_error_chains_cause() {
        let err = Error::Aggregation {
            index: 3,
            source: TaskFailure::Panicked {
                task: TaskId::from_raw(7),
                message: "boom".to_string(),
            },
        };

        assert_eq!(err.failed_index(), Some(3));
        assert!(err.to_string().contains("task 3"));
        let cause = err.source().unwrap();
        assert!(cause.to_string().contains("boom"));
    }

    #[test]
    fn test_helpers() {
        assert!(matches!(Error::config("x"), Error::Config(m) if m == "x"));
        assert!(matches!(Error::executor("y"), Error::Executor(m) if m == "y"));
        assert_eq!(Error::EmptyInput.failed_index(), None);
    }
}
