//! A load generator for function-invocation schedulers.
//!
//! The generator replays synthetic benchmarks against a scheduler's `/run/{function}` endpoint,
//! weighted by an empirical function popularity distribution. A run is split into phases with an
//! increasing number of concurrent virtual users:
//!
//!  - The [`WorkloadPlan`](loadgen_workload::WorkloadPlan) is sampled once from the popularity
//!    table and shared by all users.
//!  - Each [`VirtualUser`](driver::VirtualUser) loops over choose, invoke and think with its own
//!    seeded random stream.
//!  - The [`runner`] starts and stops users according to the phase schedule and collects the
//!    pass/fail [`Checks`](checks::Checks) of every phase.
//!
//! The binary is configured through [`config::Config`] and driven by [`cli::execute`].
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod checks;
pub mod cli;
pub mod config;
pub mod driver;
pub mod http;
pub mod observability;
pub mod runner;
pub mod trace;
