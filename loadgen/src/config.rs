//! Configuration for the load generator.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables prefixed with `LOADGEN__`
//! 2. The plain environment variables `N_COPIES`, `SEED`, `SCHEDULER_DNS` and
//!    `FUNCTION_PROBABILITIES`
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! `n_copies`, `seed` and `scheduler_dns` have no defaults and must be provided by one of the
//! sources. See [`Config`] for a description of all configuration fields.
//!
//! # Environment Variables
//!
//! Prefixed variables use double underscores (`__`) to denote nested configuration structures. For
//! example:
//!
//! - `LOADGEN__SCHEDULER_PORT=9020` sets the scheduler port
//! - `LOADGEN__LOGGING__LEVEL=debug` sets the log level
//!
//! # YAML Configuration File
//!
//! ```yaml
//! scheduler_dns: scheduler.internal
//! n_copies: 4
//! seed: 42
//! function_probabilities: evaluation/azure_function_probabilities.json
//!
//! phases:
//!   - name: warmup
//!     users: 10
//!     start: 0s
//!     duration: 1m
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Yaml};
use loadgen_workload::{BenchmarkKind, Catalog, Phase, Schedule};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "LOADGEN__";

/// Unprefixed environment variables accepted for compatibility with existing deployments.
const ENV_PLAIN: &[&str] = &["n_copies", "seed", "scheduler_dns", "function_probabilities"];

/// Port of the scheduler's HTTP API.
pub const DEFAULT_SCHEDULER_PORT: u16 = 9020;

/// Runtime configuration for the Tokio async runtime.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads driving the virtual users.
    ///
    /// # Default
    ///
    /// Defaults to the number of CPU cores on the host machine.
    ///
    /// # Environment Variable
    ///
    /// `LOADGEN__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

mod display_fromstr {
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, the final report goes to stdout.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable overrides this if set. At `DEBUG`, every invocation is
    /// logged.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `LOADGEN__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `LOADGEN__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for the load generator.
#[derive(Deserialize)]
pub struct Config {
    /// Host name or IP address of the scheduler under test.
    ///
    /// # Environment Variable
    ///
    /// `SCHEDULER_DNS`
    pub scheduler_dns: String,

    /// Port of the scheduler's HTTP API.
    ///
    /// # Default
    ///
    /// `9020`
    #[serde(default = "default_scheduler_port")]
    pub scheduler_port: u16,

    /// Number of deployed copies of every benchmark.
    ///
    /// # Environment Variable
    ///
    /// `N_COPIES`
    pub n_copies: usize,

    /// Global seed from which the plan and every virtual user's random stream are derived.
    ///
    /// # Environment Variable
    ///
    /// `SEED`
    pub seed: u64,

    /// Path to the JSON popularity table.
    ///
    /// # Default
    ///
    /// `azure_function_probabilities.json`
    ///
    /// # Environment Variable
    ///
    /// `FUNCTION_PROBABILITIES`
    #[serde(default = "default_function_probabilities")]
    pub function_probabilities: PathBuf,

    /// Timeout for a single invocation, after which its check counts as failed.
    ///
    /// # Default
    ///
    /// `60s`
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Benchmarks hosted by the scheduler, in the order they are assigned to sampled functions.
    ///
    /// # Default
    ///
    /// All benchmarks: `chameleon`, `dd`, `float_operation`, `gzip_compression`,
    /// `json_dumps_loads`, `linpack`, `matmul`, `pyaes`.
    #[serde(default = "default_catalog")]
    pub catalog: Vec<BenchmarkKind>,

    /// Load phases of the run.
    ///
    /// # Default
    ///
    /// 20, 50 and 100 users for 100 seconds each.
    #[serde(default = "default_phases")]
    pub phases: Vec<Phase>,

    /// Configuration of the internal task runtime.
    #[serde(default)]
    pub runtime: Runtime,

    /// Logging configuration.
    #[serde(default)]
    pub logging: Logging,
}

fn default_scheduler_port() -> u16 {
    DEFAULT_SCHEDULER_PORT
}

fn default_function_probabilities() -> PathBuf {
    PathBuf::from("azure_function_probabilities.json")
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_catalog() -> Vec<BenchmarkKind> {
    Catalog::default().kinds().to_vec()
}

fn default_phases() -> Vec<Phase> {
    Schedule::default().phases().to_vec()
}

impl Config {
    /// Loads configuration from an optional YAML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    /// - Required fields are missing
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::raw().only(ENV_PLAIN))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Base URL of the scheduler under test.
    pub fn scheduler_url(&self) -> String {
        format!("http://{}:{}", self.scheduler_dns, self.scheduler_port)
    }

    /// Validates and returns the benchmark catalog.
    pub fn catalog(&self) -> Result<Catalog> {
        Ok(Catalog::new(self.catalog.clone())?)
    }

    /// Validates and returns the phase schedule.
    pub fn schedule(&self) -> Result<Schedule> {
        Ok(Schedule::new(self.phases.clone())?)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("scheduler", &self.scheduler_url())
            .field("n_copies", &self.n_copies)
            .field("seed", &self.seed)
            .field("function_probabilities", &self.function_probabilities)
            .field("request_timeout", &self.request_timeout)
            .field("catalog", &self.catalog)
            .field("phases", &self.phases.len())
            .field("runtime", &self.runtime)
            .field("logging", &self.logging)
            .finish()
    }
}
