//! The floating-point workload whose throughput every benchmark mode measures.

use std::hint::black_box;
use std::num::NonZero;

/// Floating-point operations counted per kernel iteration.
///
/// Each iteration updates four accumulators with one multiply-add each. Following the
/// established convention for this benchmark, one multiply-add is counted as one operation.
pub const FLOPS_PER_ITERATION: u64 = 4;

/// The kernel writes into at most this many leading elements of a supplied buffer,
/// cycling through them.
pub const WRITE_WINDOW: usize = 1024;

const INITIAL_A: f32 = 1.5;
const INITIAL_B: f32 = 2.3;
const INITIAL_C: f32 = 3.7;
const INITIAL_D: f32 = 4.2;

/// Runs `iterations` rounds of a dependent multiply-add chain over four accumulators and
/// returns the sum of the final accumulator values.
///
/// When a buffer is supplied, one accumulator is stored into it every iteration, cycling
/// through the first [`WRITE_WINDOW`] elements (or the whole buffer, if shorter). This exercises
/// write bandwidth of whatever memory backs the buffer. An empty buffer disables the writes.
///
/// The returned value depends only on `iterations`; the buffer never feeds back into the chain.
///
/// # Example
///
/// ```
/// use fpu_bench::run_kernel;
/// use new_zealand::nz;
///
/// let first = run_kernel(nz!(1000), None);
/// let second = run_kernel(nz!(1000), None);
///
/// assert_eq!(first.to_bits(), second.to_bits());
/// ```
#[must_use]
pub fn run_kernel(iterations: NonZero<u64>, buffer: Option<&mut [f32]>) -> f32 {
    // Opaque starting values stop the optimizer from folding the whole chain at compile time.
    let mut a = black_box(INITIAL_A);
    let mut b = black_box(INITIAL_B);
    let mut c = black_box(INITIAL_C);
    let mut d = black_box(INITIAL_D);

    let mut buffer = buffer.filter(|buffer| !buffer.is_empty());
    let window = buffer
        .as_ref()
        .map_or(0, |buffer| buffer.len().min(WRITE_WINDOW));

    let mut position = 0_usize;

    for _ in 0..iterations.get() {
        // Every accumulator reads values produced earlier in the same or previous iteration.
        a = a * b + c;
        b = b * c + d;
        c = c * d + a;
        d = d * a + b;

        if let Some(buffer) = buffer.as_deref_mut() {
            if let Some(slot) = buffer.get_mut(position) {
                *slot = a;
                black_box(&*slot);
            }

            position = position.wrapping_add(1);
            if position == window {
                position = 0;
            }
        }
    }

    black_box(a + b + c + d)
}

/// Total floating-point operations performed by one kernel run of `iterations` rounds.
#[must_use]
pub fn flops_per_run(iterations: NonZero<u64>) -> u64 {
    iterations.get().saturating_mul(FLOPS_PER_ITERATION)
}
