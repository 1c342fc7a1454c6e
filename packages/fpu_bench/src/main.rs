#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Runs the FPU benchmark modes and prints one report block per mode.
//!
//! This module is excluded from mutation testing because it only wires the command line to the
//! library and testing process entry/exit behavior requires spawning subprocesses.

use std::num::NonZero;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use argh::FromArgs;
use fpu_bench::{BenchmarkConfig, BenchmarkMode, Orchestrator, write_banner};
use tracing_subscriber::EnvFilter;

/// Measures floating-point throughput of one and two cores and the cost of a slower memory tier.
///
/// Diagnostics are written to stderr; set RUST_LOG (e.g. RUST_LOG=debug) to see more of them.
#[derive(FromArgs)]
struct Args {
    /// TOML configuration file; command line options override its settings
    #[argh(option)]
    config: Option<PathBuf>,

    /// mode to run (capability, single-core, dual-core, memory-tier); repeat to run several,
    /// omit to run all of them
    #[argh(option)]
    mode: Vec<BenchmarkMode>,

    /// kernel iterations per run
    #[argh(option)]
    ops: Option<NonZero<u64>>,

    /// how many times the single-core and memory-tier modes repeat the kernel
    #[argh(option)]
    iterations: Option<NonZero<u32>>,

    /// how long to wait for the secondary worker to complete, in milliseconds
    #[argh(option)]
    completion_timeout_ms: Option<u64>,

    /// size of the auxiliary memory tier in bytes; 0 disables the tier
    #[argh(option)]
    aux_tier_bytes: Option<usize>,

    /// do not use a second core
    #[argh(switch)]
    single_core: bool,

    /// do not pause between modes
    #[argh(switch)]
    no_pause: bool,
}

impl Args {
    fn into_config(self) -> fpu_bench::Result<(BenchmarkConfig, Vec<BenchmarkMode>)> {
        let mut config = match &self.config {
            Some(path) => BenchmarkConfig::load(path)?,
            None => BenchmarkConfig::new(),
        };

        if let Some(ops) = self.ops {
            config = config.with_ops_per_run(ops);
        }

        if let Some(iterations) = self.iterations {
            config = config.with_iterations(iterations);
        }

        if let Some(timeout_ms) = self.completion_timeout_ms {
            config = config.with_completion_timeout(Duration::from_millis(timeout_ms));
        }

        if let Some(bytes) = self.aux_tier_bytes {
            config = config.with_auxiliary_tier_bytes(bytes);
        }

        if self.single_core {
            config = config.with_dual_core(false);
        }

        if self.no_pause {
            config = config.with_inter_mode_delay(Duration::ZERO);
        }

        let modes = if self.mode.is_empty() {
            BenchmarkMode::ALL.to_vec()
        } else {
            self.mode
        };

        Ok((config, modes))
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init()
    {
        eprintln!("failed to initialize logging: {error}");
    }
}

fn banner(title: &str) -> String {
    let mut text = String::new();
    write_banner(&mut text, title).expect("writing to a String cannot fail");
    text
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    init_logging();

    let args: Args = argh::from_env();

    let (config, modes) = match args.into_config() {
        Ok(parsed) => parsed,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };

    println!();
    print!("{}", banner("FPU PERFORMANCE BENCHMARK"));

    let mut failures = 0_usize;

    for report in orchestrator.run(&modes) {
        println!();
        print!("{report}");

        // Modes skipped for an unmet precondition do not count as failures.
        if matches!(report.outcome(), Err(error) if !error.is_precondition()) {
            failures = failures.saturating_add(1);
        }
    }

    println!();
    print!("{}", banner("ALL MODES COMPLETED"));

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
