use std::ops::ControlFlow;
use std::time::Duration;

use tracing::trace;

use crate::pal::Platform;

/// How often and for how long [`poll_until()`] checks its condition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PollSchedule {
    pub(crate) interval: Duration,
    pub(crate) timeout: Duration,
}

/// Calls `probe` until it breaks, sleeping for the schedule's interval between calls.
///
/// The wait is measured on the platform clock. Returns the value `probe` broke with, or the time
/// waited if the timeout elapsed first. `probe` is always called at least once and once more
/// after the final sleep, so a condition that becomes true exactly at the deadline is observed.
pub(crate) fn poll_until<P, T, F>(
    platform: &P,
    schedule: PollSchedule,
    mut probe: F,
) -> Result<T, Duration>
where
    P: Platform,
    F: FnMut() -> ControlFlow<T>,
{
    let started = platform.now_micros();
    let mut attempts: u64 = 0;

    loop {
        attempts = attempts.saturating_add(1);

        if let ControlFlow::Break(value) = probe() {
            trace!(attempts, "poll condition satisfied");
            return Ok(value);
        }

        let waited = Duration::from_micros(platform.now_micros().saturating_sub(started));

        if waited >= schedule.timeout {
            trace!(attempts, waited_us = waited.as_micros(), "poll timed out");
            return Err(waited);
        }

        trace!(attempts, "poll condition not yet satisfied");
        platform.sleep(schedule.interval);
    }
}
