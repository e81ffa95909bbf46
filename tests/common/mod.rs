//! Shared polling helper for the end-to-end scenario tests.
//!
//! The engine has no completion notification beyond its own callbacks and
//! busy-polling receptivities, so tests observe state the same way: poll a
//! predicate with a bounded timeout instead of sleeping a guessed duration.

use std::time::{Duration, Instant};

/// Initializes a `tracing` subscriber filtered by `RUST_LOG` (defaulting to
/// `info`) for whichever test calls it, so anomaly and activation traces
/// show up under `cargo test -- --nocapture`. Safe to call from every test:
/// a subscriber is already set on the second and later calls, and that
/// error is simply ignored.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
