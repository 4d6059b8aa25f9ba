//! Workload generation for load tests against a function-invocation scheduler.
//!
//! A run replays a mixture of synthetic benchmarks, weighted by an empirical function
//! popularity distribution such as the Azure Functions invocation trace:
//!
//!  - [`PopularityTable`] holds the relative invocation probability of every known function.
//!  - [`WorkloadPlan`] samples a fixed subset of those functions once per run, normalizes their
//!    probabilities and assigns each of them to one copy of a benchmark in the [`Catalog`].
//!  - Every virtual user owns an [`Sfc32`] stream derived from the run seed and its identity, and
//!    uses it to [`choose`](WorkloadPlan::choose) its next invocation.
//!  - A [`Schedule`] describes how many users run during which phase of the test.
//!
//! All randomness flows through explicitly seeded generators, so two runs with the same seed
//! produce the same plan and the same per-user sequences.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod benchmark;
pub mod error;
pub mod plan;
pub mod popularity;
pub mod rng;
pub mod sampler;
pub mod schedule;

pub use benchmark::{BenchmarkInstance, BenchmarkKind, Catalog, Payload, build_payload};
pub use error::{Result, WorkloadError};
pub use plan::{Assignment, WorkloadPlan};
pub use popularity::PopularityTable;
pub use rng::Sfc32;
pub use sampler::FunctionMix;
pub use schedule::{Phase, Schedule};
