use crate::error::{Error, Result};
use crate::executor::PanicStrategy;
use crate::policy::{clamp_threads, hardware_threads, DimensionKind, Thresholds};

/// Smallest worker stack accepted by [`Config::validate`].
pub const MIN_STACK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` uses the number of logical CPUs.
    pub num_threads: Option<usize>,
    pub thresholds: Thresholds,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub panic_strategy: PanicStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            thresholds: Thresholds::default(),
            thread_name_prefix: "colt-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Thread counts are clamped rather than rejected, so only the
    /// thread naming and stack settings can fail here.
    pub fn validate(&self) -> Result<()> {
        if self.thread_name_prefix.trim().is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(Error::config(format!(
                    "stack_size must be at least {} bytes (got {})",
                    MIN_STACK_SIZE, size
                )));
            }
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        clamp_threads(self.num_threads.unwrap_or_else(hardware_threads))
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn threshold(mut self, kind: DimensionKind, n: usize) -> Self {
        self.config.thresholds.set(kind, n);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
