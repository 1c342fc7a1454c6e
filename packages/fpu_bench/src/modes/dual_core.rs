use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::modes::prepare_primary_core;
use crate::pal::{Platform, PlatformFacade};
use crate::poll::{PollSchedule, poll_until};
use crate::worker::Worker;
use crate::{
    AggregateMetrics, BenchmarkConfig, BenchmarkContext, Error, Result, SECONDARY_CORE, StartGate,
    WorkerPhase, WorkerRole,
};

/// Runs the kernel on both cores at the same time and combines the two timing windows.
///
/// The secondary worker is spawned on the other core and waits at the start gate until it has
/// reported itself bound. The gate then opens and the primary worker runs inline. Once the
/// primary kernel returns, the secondary's completion flag is polled until it is set or the
/// completion timeout elapses.
///
/// `context` must be fresh or reset. If the secondary worker does not finish in time it is
/// detached and keeps its reference to `context`, so the caller must not reuse it.
pub(crate) fn run_dual_core(
    platform: &PlatformFacade,
    config: &BenchmarkConfig,
    context: &Arc<BenchmarkContext>,
) -> Result<AggregateMetrics> {
    let core_count = platform.core_count();

    if !config.dual_core() {
        return Err(Error::DualCoreDisabled);
    }

    if core_count < 2 {
        return Err(Error::DualCoreUnavailable { core_count });
    }

    prepare_primary_core(platform)?;

    let ops_per_run = config.ops_per_run();

    // Unless the gate opened first, leaving early releases the secondary without running.
    let gate = scopeguard::guard(context.start_gate(), StartGate::cancel);

    let secondary = platform
        .spawn_bound(SECONDARY_CORE, config.secondary_priority(), {
            let platform = platform.clone();
            let context = Arc::clone(context);

            move || {
                Worker::new(WorkerRole::Secondary, ops_per_run).run_when_released(&platform, &context);
            }
        })
        .inspect_err(|error| error!(%error, core = SECONDARY_CORE, "failed to start worker"))?;

    let settle = PollSchedule {
        interval: config.poll_interval(),
        timeout: config.settle_timeout(),
    };

    match poll_until(platform, settle, || {
        if context.secondary().phase() != WorkerPhase::NotStarted {
            ControlFlow::Break(Ok(()))
        } else if secondary.is_finished() {
            ControlFlow::Break(Err(Error::WorkerExited {
                core: SECONDARY_CORE,
            }))
        } else {
            ControlFlow::Continue(())
        }
    }) {
        Ok(settled) => settled?,
        Err(waited) => {
            warn!(core = SECONDARY_CORE, waited_us = waited.as_micros(), "worker never started, detaching it");
            return Err(Error::SettleTimeout {
                core: SECONDARY_CORE,
                waited,
            });
        }
    }

    gate.open();
    debug!(core = SECONDARY_CORE, "start gate opened");

    let primary = Worker::new(WorkerRole::Primary, ops_per_run).run_inline(platform, context);

    let completion = PollSchedule {
        interval: config.poll_interval(),
        timeout: config.completion_timeout(),
    };

    let secondary_result = match poll_until(platform, completion, || {
        if let Some(result) = context.secondary().try_result() {
            return ControlFlow::Break(Ok(result));
        }

        if secondary.is_finished() {
            // The flag may have been set between the check above and the thread ending.
            return ControlFlow::Break(context.secondary().try_result().ok_or(
                Error::WorkerExited {
                    core: SECONDARY_CORE,
                },
            ));
        }

        ControlFlow::Continue(())
    }) {
        Ok(completed) => completed?,
        Err(waited) => {
            warn!(core = SECONDARY_CORE, waited_us = waited.as_micros(), "worker did not complete, detaching it");
            return Err(Error::WorkerTimeout {
                core: SECONDARY_CORE,
                waited,
            });
        }
    };

    // Publishing is the worker's last action, so this returns promptly.
    secondary.join()?;

    AggregateMetrics::from_results(ops_per_run, &primary, &secondary_result)
}
