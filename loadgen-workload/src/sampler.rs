//! Weighted sampling of functions from a popularity table.
//!
//! A run first draws a fixed subset of function identifiers from the full table
//! ([`sample_subset`]), then renormalizes their probabilities so they sum to one ([`normalize`]).
//! Every iteration afterwards picks one identifier from that [`FunctionMix`] with
//! [`FunctionMix::choose`].

use std::collections::HashMap;

use rand::RngCore;
use rand::seq::SliceRandom;

use crate::error::{Result, WorkloadError};
use crate::popularity::PopularityTable;
use crate::rng::unit_f64;

/// Draws `size` distinct identifiers from `table`.
///
/// The full key set is shuffled with a uniform Fisher-Yates shuffle driven only by `rng`, and the
/// first `size` keys are kept. The returned order is the enumeration order used for both
/// selection and benchmark mapping.
pub fn sample_subset<R>(table: &PopularityTable, size: usize, rng: &mut R) -> Result<Vec<String>>
where
    R: RngCore + ?Sized,
{
    if size > table.len() {
        return Err(WorkloadError::InsufficientCandidates {
            required: size,
            available: table.len(),
        });
    }

    let mut functions: Vec<&str> = table.functions().collect();
    functions.shuffle(rng);
    functions.truncate(size);

    Ok(functions.into_iter().map(str::to_owned).collect())
}

/// Renormalizes the probabilities of `subset` so that they sum to one.
///
/// Identifiers missing from `table` are rejected with [`WorkloadError::UnknownFunction`].
pub fn normalize(table: &PopularityTable, subset: Vec<String>) -> Result<FunctionMix> {
    if subset.is_empty() {
        return Err(WorkloadError::InsufficientCandidates {
            required: 1,
            available: 0,
        });
    }

    let mut weights = Vec::with_capacity(subset.len());
    for function in &subset {
        let probability = table
            .probability(function)
            .ok_or_else(|| WorkloadError::UnknownFunction(function.clone()))?;
        weights.push(probability);
    }

    let total: f64 = weights.iter().sum();
    let entries: Vec<_> = subset
        .into_iter()
        .zip(weights)
        .map(|(function, weight)| (function, weight / total))
        .collect();

    let positions = entries
        .iter()
        .enumerate()
        .map(|(position, (function, _))| (function.clone(), position))
        .collect();

    Ok(FunctionMix { entries, positions })
}

/// A sampled, normalized set of functions to invoke.
///
/// This is read-only after construction and shared between all virtual users.
#[derive(Clone, Debug)]
pub struct FunctionMix {
    /// Functions with their normalized probabilities, in enumeration order.
    entries: Vec<(String, f64)>,
    /// Position of every function within `entries`.
    positions: HashMap<String, usize>,
}

impl FunctionMix {
    /// Samples `size` functions from `table` and normalizes their probabilities.
    pub fn sample<R>(table: &PopularityTable, size: usize, rng: &mut R) -> Result<Self>
    where
        R: RngCore + ?Sized,
    {
        let subset = sample_subset(table, size, rng)?;
        normalize(table, subset)
    }

    /// Picks one function, weighted by its normalized probability.
    pub fn choose<R>(&self, rng: &mut R) -> &str
    where
        R: RngCore + ?Sized,
    {
        self.select(unit_f64(rng))
    }

    /// Returns the first function whose cumulative probability reaches `r`.
    ///
    /// If floating point rounding leaves `r` above the final cumulative probability, the last
    /// function is returned.
    pub fn select(&self, r: f64) -> &str {
        let mut accumulated = 0.0;
        for (function, probability) in &self.entries {
            accumulated += probability;
            if r <= accumulated {
                return function.as_str();
            }
        }

        // `normalize` never produces an empty mix.
        match self.entries.last() {
            Some((function, _)) => function.as_str(),
            None => unreachable!("function mix is never empty"),
        }
    }

    /// Returns the enumeration position of `function`.
    pub fn position(&self, function: &str) -> Option<usize> {
        self.positions.get(function).copied()
    }

    /// Returns the normalized probability of `function`.
    pub fn probability(&self, function: &str) -> Option<f64> {
        self.position(function).map(|position| self.entries[position].1)
    }

    /// Iterates functions and their normalized probabilities in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(function, probability)| (function.as_str(), *probability))
    }

    /// Returns the number of functions in the mix.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`, a mix holds at least one function.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::rng::Sfc32;

    use super::*;

    /// Emits the same `u32` forever.
    struct FixedRng(u32);

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.0
        }

        fn next_u64(&mut self) -> u64 {
            u64::from(self.0)
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    impl FixedRng {
        fn unit(value: f64) -> Self {
            Self((value * 4_294_967_296.0) as u32)
        }
    }

    fn skewed_table(len: usize) -> PopularityTable {
        PopularityTable::new((0..len).map(|i| (format!("func-{i:03}"), 1.0 / (i + 1) as f64)))
            .unwrap()
    }

    #[test]
    fn subset_is_distinct_and_reproducible() {
        let table = skewed_table(100);

        let first = sample_subset(&table, 16, &mut Sfc32::for_run(7)).unwrap();
        let second = sample_subset(&table, 16, &mut Sfc32::for_run(7)).unwrap();
        let other = sample_subset(&table, 16, &mut Sfc32::for_run(8)).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.iter().collect::<HashSet<_>>().len(), 16);
        assert!(first.iter().all(|f| table.probability(f).is_some()));
    }

    #[test]
    fn subset_may_take_whole_table() {
        let table = skewed_table(8);
        let subset = sample_subset(&table, 8, &mut Sfc32::for_run(1)).unwrap();
        assert_eq!(subset.iter().collect::<HashSet<_>>().len(), 8);
    }

    #[test]
    fn insufficient_candidates() {
        let table = skewed_table(10);
        let err = sample_subset(&table, 16, &mut Sfc32::for_run(1)).unwrap_err();
        assert!(matches!(
            err,
            WorkloadError::InsufficientCandidates {
                required: 16,
                available: 10
            }
        ));
    }

    #[test]
    fn shuffle_is_unbiased_in_first_position() {
        const TRIALS: usize = 40_000;
        // chi-squared critical value for 7 degrees of freedom at p = 0.001
        const CRITICAL: f64 = 24.322;

        let table = skewed_table(8);
        let mut rng = Sfc32::for_run(11);
        let mut counts = HashMap::<String, usize>::new();
        for _ in 0..TRIALS {
            let subset = sample_subset(&table, 1, &mut rng).unwrap();
            *counts.entry(subset[0].clone()).or_default() += 1;
        }

        let expected = TRIALS as f64 / 8.0;
        let chi_squared: f64 = table
            .functions()
            .map(|f| {
                let count = counts.get(f).copied().unwrap_or_default() as f64;
                (count - expected).powi(2) / expected
            })
            .sum();
        assert!(chi_squared < CRITICAL, "chi-squared {chi_squared}");
    }

    #[test]
    fn normalized_probabilities_sum_to_one() {
        let table = skewed_table(500);
        for seed in 0..20 {
            let mix = FunctionMix::sample(&table, 24, &mut Sfc32::for_run(seed)).unwrap();
            let total: f64 = mix.iter().map(|(_, p)| p).sum();
            assert!((total - 1.0).abs() < 1e-9, "seed {seed}: sum {total}");
        }
    }

    #[test]
    fn normalize_keeps_ratios() {
        let table = PopularityTable::new([("a", 0.1), ("b", 0.3)]).unwrap();
        let mix = normalize(&table, vec!["b".into(), "a".into()]).unwrap();

        assert_eq!(mix.iter().map(|(f, _)| f).collect::<Vec<_>>(), ["b", "a"]);
        assert!((mix.probability("a").unwrap() - 0.25).abs() < 1e-12);
        assert!((mix.probability("b").unwrap() - 0.75).abs() < 1e-12);
        assert_eq!(mix.position("b"), Some(0));
        assert_eq!(mix.position("c"), None);
    }

    #[test]
    fn normalize_rejects_unknown_function() {
        let table = PopularityTable::new([("a", 0.1)]).unwrap();
        let err = normalize(&table, vec!["zzz".into()]).unwrap_err();
        assert!(matches!(err, WorkloadError::UnknownFunction(f) if f == "zzz"));
    }

    #[test]
    fn normalize_rejects_empty_subset() {
        let table = PopularityTable::new([("a", 0.1)]).unwrap();
        assert!(normalize(&table, Vec::new()).is_err());
    }

    #[test]
    fn uniform_table_selects_fifteenth() {
        let table = PopularityTable::new((0..16).map(|i| (format!("f{i}"), 1.0))).unwrap();
        let mix = FunctionMix::sample(&table, 16, &mut Sfc32::for_run(3)).unwrap();

        for (_, probability) in mix.iter() {
            assert_eq!(probability, 0.0625);
        }

        let fifteenth = mix.iter().nth(14).unwrap().0;
        assert_eq!(mix.choose(&mut FixedRng::unit(0.9)), fifteenth);
        assert_eq!(mix.select(0.9), fifteenth);
    }

    #[test]
    fn select_boundaries() {
        let table = PopularityTable::new([("a", 0.5), ("b", 0.5)]).unwrap();
        let mix = normalize(&table, vec!["a".into(), "b".into()]).unwrap();

        assert_eq!(mix.select(0.0), "a");
        assert_eq!(mix.select(0.5), "a");
        assert_eq!(mix.select(0.500001), "b");
        // rounding fallback
        assert_eq!(mix.select(1.0 + 1e-12), "b");
    }

    #[test]
    fn choose_converges_to_probabilities() {
        const DRAWS: usize = 200_000;
        // chi-squared critical value for 7 degrees of freedom at p = 0.001
        const CRITICAL: f64 = 24.322;

        let table = skewed_table(50);
        let mix = FunctionMix::sample(&table, 8, &mut Sfc32::for_run(21)).unwrap();
        let mut rng = Sfc32::for_user(21, 1);

        let mut counts = HashMap::<&str, usize>::new();
        for _ in 0..DRAWS {
            *counts.entry(mix.choose(&mut rng)).or_default() += 1;
        }

        let chi_squared: f64 = mix
            .iter()
            .map(|(function, probability)| {
                let expected = probability * DRAWS as f64;
                let observed = counts.get(function).copied().unwrap_or_default() as f64;
                (observed - expected).powi(2) / expected
            })
            .sum();
        assert!(chi_squared < CRITICAL, "chi-squared {chi_squared}");
    }
}
