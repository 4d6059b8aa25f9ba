//! The read-only artifact shared by all virtual users of a run.

use std::collections::BTreeMap;

use bytes::Bytes;
use rand::RngCore;

use crate::benchmark::{BenchmarkInstance, BenchmarkKind, Catalog, build_payload};
use crate::error::{Result, WorkloadError};
use crate::popularity::PopularityTable;
use crate::rng::Sfc32;
use crate::sampler::FunctionMix;

/// Which benchmark instance a sampled function drives, and how often it is chosen.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment<'a> {
    /// The function identifier from the popularity table.
    pub function: &'a str,
    /// Normalized selection probability within the run.
    pub probability: f64,
    /// The benchmark instance invoked when this function is chosen.
    pub instance: BenchmarkInstance,
}

/// Everything a virtual user needs to pick and build its next request.
///
/// A plan is computed once per run and never mutated, so it can be shared freely between users.
#[derive(Clone, Debug)]
pub struct WorkloadPlan {
    catalog: Catalog,
    copies: usize,
    mix: FunctionMix,
    payloads: BTreeMap<BenchmarkKind, Bytes>,
}

impl WorkloadPlan {
    /// Samples `catalog.len() * copies` functions from `table` using the run stream of `seed`.
    pub fn new(table: &PopularityTable, catalog: Catalog, copies: usize, seed: u64) -> Result<Self> {
        if copies == 0 {
            return Err(WorkloadError::InvalidCatalog(
                "at least one copy is required".into(),
            ));
        }

        let size = catalog.len().checked_mul(copies).ok_or_else(|| {
            WorkloadError::InvalidCatalog(format!("{copies} copies exceed the addressable range"))
        })?;

        let mut rng = Sfc32::for_run(seed);
        let mix = FunctionMix::sample(table, size, &mut rng)?;

        let payloads = catalog
            .kinds()
            .iter()
            .map(|&kind| (kind, build_payload(kind)))
            .collect();

        tracing::info!(
            functions = size,
            candidates = table.len(),
            benchmarks = catalog.len(),
            copies,
            "sampled workload plan"
        );

        Ok(Self {
            catalog,
            copies,
            mix,
            payloads,
        })
    }

    /// Picks the function for the next invocation.
    pub fn choose<R>(&self, rng: &mut R) -> &str
    where
        R: RngCore + ?Sized,
    {
        self.mix.choose(rng)
    }

    /// Maps a sampled function onto the benchmark instance it drives.
    pub fn resolve(&self, function: &str) -> Result<BenchmarkInstance> {
        let position = self
            .mix
            .position(function)
            .ok_or_else(|| WorkloadError::UnknownFunction(function.to_owned()))?;
        self.catalog.resolve(position, self.copies)
    }

    /// Returns the serialized request body for `kind`.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is not part of the catalog. [`resolve`](Self::resolve) only yields
    /// catalog kinds.
    pub fn payload(&self, kind: BenchmarkKind) -> Bytes {
        match self.payloads.get(&kind) {
            Some(payload) => payload.clone(),
            None => panic!("benchmark `{kind}` is not part of the catalog"),
        }
    }

    /// Lists every sampled function with its probability and benchmark instance.
    pub fn assignments(&self) -> impl Iterator<Item = Assignment<'_>> {
        self.mix
            .iter()
            .enumerate()
            .filter_map(|(position, (function, probability))| {
                let instance = self.catalog.resolve(position, self.copies).ok()?;
                Some(Assignment {
                    function,
                    probability,
                    instance,
                })
            })
    }

    /// Returns the sampled, normalized functions.
    pub fn mix(&self) -> &FunctionMix {
        &self.mix
    }

    /// Returns the benchmark catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the number of copies of each benchmark.
    pub fn copies(&self) -> usize {
        self.copies
    }
}
