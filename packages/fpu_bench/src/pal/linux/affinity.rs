use std::{fs, io, mem};

use crate::pal::linux::Bindings;

/// Operating system identifier of a processor, as used by `taskset` and `/sys`.
pub(crate) type ProcessorId = u32;

// Fixed size of the libc cpu_set_t, in processors.
#[expect(
    clippy::cast_sign_loss,
    reason = "CPU_SETSIZE is a small positive constant"
)]
const MAX_PROCESSORS: usize = libc::CPU_SETSIZE as usize;

/// Lists the processors the current thread is allowed to run on, in ascending ID order.
pub(crate) fn allowed_processors(bindings: &impl Bindings) -> io::Result<Vec<ProcessorId>> {
    let affinity = bindings.sched_getaffinity_current()?;

    Ok((0..MAX_PROCESSORS)
        // SAFETY: The index is below CPU_SETSIZE and the set is initialized.
        .filter(|processor| unsafe { libc::CPU_ISSET(*processor, &affinity) })
        .map(|processor| {
            ProcessorId::try_from(processor).expect("CPU_SETSIZE fits in a processor ID")
        })
        .collect())
}

/// Restricts the current thread to run only on the given processor.
pub(crate) fn pin_current_thread_to(
    bindings: &impl Bindings,
    processor: ProcessorId,
) -> io::Result<()> {
    let index = usize::try_from(processor).expect("processor IDs fit in usize on Linux targets");

    if index >= MAX_PROCESSORS {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("processor {processor} is beyond the {MAX_PROCESSORS} supported processors"),
        ));
    }

    // SAFETY: All zeroes is a valid cpu_set_t.
    let mut cpu_set: libc::cpu_set_t = unsafe { mem::zeroed() };

    // SAFETY: The index was checked against CPU_SETSIZE above.
    unsafe {
        libc::CPU_SET(index, &mut cpu_set);
    }

    bindings.sched_setaffinity_current(&cpu_set)
}

/// The maximum frequency of a processor in MHz, if the kernel exposes it.
#[cfg_attr(test, mutants::skip)] // Depends on the host's cpufreq driver.
pub(crate) fn max_frequency_mhz(processor: ProcessorId) -> Option<u32> {
    let path = format!("/sys/devices/system/cpu/cpu{processor}/cpufreq/cpuinfo_max_freq");

    let khz: u32 = fs::read_to_string(path).ok()?.trim().parse().ok()?;

    Some(khz / 1000)
}
