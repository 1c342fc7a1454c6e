use std::fs;
use std::num::NonZero;
use std::path::Path;
use std::time::Duration;

use new_zealand::nz;
use serde::Deserialize;

use crate::{Error, Result, TaskPriority};

/// Settings shared by all benchmark modes.
///
/// Every setting has a default; use the `with_*` methods to change individual settings or
/// [`from_toml_str()`][Self::from_toml_str] to read them from a configuration file.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use fpu_bench::BenchmarkConfig;
/// use new_zealand::nz;
///
/// let config = BenchmarkConfig::new()
///     .with_ops_per_run(nz!(100_000))
///     .with_completion_timeout(Duration::from_secs(5));
///
/// config.validate().unwrap();
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BenchmarkConfig {
    ops_per_run: NonZero<u64>,
    iterations: NonZero<u32>,
    poll_interval: Duration,
    settle_timeout: Duration,
    completion_timeout: Duration,
    inter_mode_delay: Duration,
    tier_buffer_len: NonZero<usize>,
    auxiliary_tier_bytes: usize,
    dual_core: bool,
    secondary_priority: TaskPriority,
}

impl BenchmarkConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ops_per_run: nz!(1_000_000),
            iterations: nz!(10),
            poll_interval: Duration::from_millis(10),
            settle_timeout: Duration::from_secs(1),
            completion_timeout: Duration::from_secs(30),
            inter_mode_delay: Duration::from_secs(1),
            tier_buffer_len: nz!(1024),
            auxiliary_tier_bytes: 8 * 1024 * 1024,
            dual_core: true,
            secondary_priority: TaskPriority(5),
        }
    }

    /// Kernel iterations per run. The same count is used by every mode so that their results
    /// are comparable.
    #[must_use]
    pub fn ops_per_run(&self) -> NonZero<u64> {
        self.ops_per_run
    }

    /// How many times the single-core and memory-tier modes repeat the kernel.
    #[must_use]
    pub fn iterations(&self) -> NonZero<u32> {
        self.iterations
    }

    /// Pause between two checks of a dual-core worker's state.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How long the secondary worker may take to start executing on its core.
    #[must_use]
    pub fn settle_timeout(&self) -> Duration {
        self.settle_timeout
    }

    /// How long the orchestrator waits for the secondary worker once its own kernel is done.
    #[must_use]
    pub fn completion_timeout(&self) -> Duration {
        self.completion_timeout
    }

    /// Pause between consecutive benchmark modes.
    #[must_use]
    pub fn inter_mode_delay(&self) -> Duration {
        self.inter_mode_delay
    }

    /// Length, in floats, of the buffer used by the memory-tier mode.
    #[must_use]
    pub fn tier_buffer_len(&self) -> NonZero<usize> {
        self.tier_buffer_len
    }

    /// Size of the auxiliary memory tier. Zero disables the tier.
    #[must_use]
    pub fn auxiliary_tier_bytes(&self) -> usize {
        self.auxiliary_tier_bytes
    }

    /// Whether the dual-core mode may use a second core.
    #[must_use]
    pub fn dual_core(&self) -> bool {
        self.dual_core
    }

    /// Priority requested for the secondary worker.
    #[must_use]
    pub fn secondary_priority(&self) -> TaskPriority {
        self.secondary_priority
    }

    /// Sets [`ops_per_run()`][Self::ops_per_run].
    #[must_use]
    pub fn with_ops_per_run(mut self, value: NonZero<u64>) -> Self {
        self.ops_per_run = value;
        self
    }

    /// Sets [`iterations()`][Self::iterations].
    #[must_use]
    pub fn with_iterations(mut self, value: NonZero<u32>) -> Self {
        self.iterations = value;
        self
    }

    /// Sets [`poll_interval()`][Self::poll_interval].
    #[must_use]
    pub fn with_poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }

    /// Sets [`settle_timeout()`][Self::settle_timeout].
    #[must_use]
    pub fn with_settle_timeout(mut self, value: Duration) -> Self {
        self.settle_timeout = value;
        self
    }

    /// Sets [`completion_timeout()`][Self::completion_timeout].
    #[must_use]
    pub fn with_completion_timeout(mut self, value: Duration) -> Self {
        self.completion_timeout = value;
        self
    }

    /// Sets [`inter_mode_delay()`][Self::inter_mode_delay].
    #[must_use]
    pub fn with_inter_mode_delay(mut self, value: Duration) -> Self {
        self.inter_mode_delay = value;
        self
    }

    /// Sets [`tier_buffer_len()`][Self::tier_buffer_len].
    #[must_use]
    pub fn with_tier_buffer_len(mut self, value: NonZero<usize>) -> Self {
        self.tier_buffer_len = value;
        self
    }

    /// Sets [`auxiliary_tier_bytes()`][Self::auxiliary_tier_bytes].
    #[must_use]
    pub fn with_auxiliary_tier_bytes(mut self, value: usize) -> Self {
        self.auxiliary_tier_bytes = value;
        self
    }

    /// Sets [`dual_core()`][Self::dual_core].
    #[must_use]
    pub fn with_dual_core(mut self, value: bool) -> Self {
        self.dual_core = value;
        self
    }

    /// Sets [`secondary_priority()`][Self::secondary_priority].
    #[must_use]
    pub fn with_secondary_priority(mut self, value: TaskPriority) -> Self {
        self.secondary_priority = value;
        self
    }

    /// Checks that the settings are consistent with each other.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the poll interval is zero or longer than one of the
    /// timeouts it paces.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(invalid("poll interval must not be zero"));
        }

        for (name, timeout) in [
            ("settle timeout", self.settle_timeout),
            ("completion timeout", self.completion_timeout),
        ] {
            if self.poll_interval > timeout {
                return Err(invalid(format!(
                    "poll interval {:?} is longer than the {name} {timeout:?}",
                    self.poll_interval
                )));
            }
        }

        Ok(())
    }

    /// Parses a TOML configuration document. Settings absent from the document keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the document is not valid TOML, names an unknown
    /// setting or has a value of the wrong type, and [`Error::InvalidConfig`] if the resulting
    /// configuration fails [`validate()`][Self::validate].
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(document)?;

        let config = file.apply_to(Self::new());
        config.validate()?;

        Ok(config)
    }

    /// Reads a TOML configuration file. See [`from_toml_str()`][Self::from_toml_str].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigRead`] if the file cannot be read, otherwise the errors of
    /// [`from_toml_str()`][Self::from_toml_str].
    pub fn load(path: &Path) -> Result<Self> {
        let document = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&document)
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(problem: impl Into<String>) -> Error {
    Error::InvalidConfig {
        problem: problem.into(),
    }
}

/// The configuration file schema. Durations are whole milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    ops_per_run: Option<NonZero<u64>>,
    iterations: Option<NonZero<u32>>,
    poll_interval_ms: Option<u64>,
    settle_timeout_ms: Option<u64>,
    completion_timeout_ms: Option<u64>,
    inter_mode_delay_ms: Option<u64>,
    tier_buffer_len: Option<NonZero<usize>>,
    auxiliary_tier_bytes: Option<usize>,
    dual_core: Option<bool>,
    secondary_priority: Option<u8>,
}

impl ConfigFile {
    fn apply_to(self, mut config: BenchmarkConfig) -> BenchmarkConfig {
        if let Some(value) = self.ops_per_run {
            config.ops_per_run = value;
        }

        if let Some(value) = self.iterations {
            config.iterations = value;
        }

        if let Some(value) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(value);
        }

        if let Some(value) = self.settle_timeout_ms {
            config.settle_timeout = Duration::from_millis(value);
        }

        if let Some(value) = self.completion_timeout_ms {
            config.completion_timeout = Duration::from_millis(value);
        }

        if let Some(value) = self.inter_mode_delay_ms {
            config.inter_mode_delay = Duration::from_millis(value);
        }

        if let Some(value) = self.tier_buffer_len {
            config.tier_buffer_len = value;
        }

        if let Some(value) = self.auxiliary_tier_bytes {
            config.auxiliary_tier_bytes = value;
        }

        if let Some(value) = self.dual_core {
            config.dual_core = value;
        }

        if let Some(value) = self.secondary_priority {
            config.secondary_priority = TaskPriority(value);
        }

        config
    }
}
