#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing the benchmark packages.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How long a test may run before [`with_watchdog`] fails it.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs a test on a separate thread and fails it if it takes longer than
/// [`WATCHDOG_TIMEOUT`] (five times longer under Miri).
///
/// Benchmark tests coordinate real worker threads, so a synchronization bug shows up as a
/// hang. The watchdog turns that hang into a test failure instead of a stuck test runner.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled
/// and the test runs directly, so that mutation testing can detect hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout or if the test itself panics.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let sum = with_watchdog(|| 2 + 2);
/// assert_eq!(sum, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let timeout = if cfg!(miri) {
        WATCHDOG_TIMEOUT.saturating_mul(5)
    } else {
        WATCHDOG_TIMEOUT
    };

    let (tx, rx) = mpsc::channel();

    let test_thread = thread::spawn(move || {
        // If this fails, the watchdog has already given up on us.
        drop(tx.send(test_fn()));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_thread.join().expect("test thread sent its result, so it did not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test did not complete within {timeout:?}, assuming it hangs");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread ended without sending a result"),
            Err(payload) => std::panic::resume_unwind(payload),
        },
    }
}

/// Whether `actual` lies within `tolerance` (a fraction, e.g. `0.5` for 50%) of `expected`.
///
/// Used to compare throughput figures, where only generous relative bounds are meaningful.
///
/// # Panics
///
/// Panics if `expected` is not a positive number or `tolerance` is negative.
#[must_use]
pub fn within_ratio(actual: f64, expected: f64, tolerance: f64) -> bool {
    assert!(expected > 0.0, "expected value must be positive, got {expected}");
    assert!(tolerance >= 0.0, "tolerance must not be negative, got {tolerance}");

    let ratio = actual / expected;

    (1.0 - tolerance..=1.0 + tolerance).contains(&ratio)
}
