//! Idle backoff for worker loops.

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

/// Spin, then yield, then park until woken or the timeout expires.
#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 16;
    const PARK_TIMEOUT: Duration = Duration::from_micros(100);

    pub fn new() -> Self {
        Self { step: 0 }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// One step of backoff. Once past the yield phase the calling thread
    /// parks, so producers should `unpark` it after publishing work.
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                spin_loop();
            }
        } else if self.step <= Self::YIELD_LIMIT {
            thread::yield_now();
        } else {
            thread::park_timeout(Self::PARK_TIMEOUT);
        }

        if self.step <= Self::YIELD_LIMIT {
            self.step += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_progression() {
        let mut backoff = Backoff::new();

        for _ in 0..=Backoff::SPIN_LIMIT {
            backoff.snooze();
        }
        assert_eq!(backoff.step, Backoff::SPIN_LIMIT + 1);

        // the step stops growing once snoozing parks
        for _ in 0..20 {
            backoff.snooze();
        }
        assert_eq!(backoff.step, Backoff::YIELD_LIMIT + 1);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new();
        for _ in 0..20 {
            backoff.snooze();
        }

        backoff.reset();
        assert_eq!(backoff.step, 0);
    }
}
