pub mod backoff;

pub use backoff::Backoff;

use std::thread;
use std::time::Duration;

/// Blocks the calling thread for `millis` milliseconds.
pub fn sleep(millis: u64) {
    thread::sleep(Duration::from_millis(millis));
}
