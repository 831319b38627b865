// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use anyhow::Result;
use bio::stats::{LogProb, Prob};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use vec_map::VecMap;

use crate::errors;
use crate::utils::{NumericFaults, NUMERICAL_EPSILON};
use crate::variants::model::combination::GenotypeCombo;
use crate::variants::model::prior::PriorProb;

/// A scored genotype combination.
#[derive(new, Debug, Clone, PartialEq, Serialize, Getters, CopyGetters)]
pub struct GenotypeComboResult {
    #[getset(get = "pub")]
    combo: GenotypeCombo,
    #[getset(get_copy = "pub")]
    data_likelihood: LogProb,
    #[getset(get_copy = "pub")]
    prior: PriorProb,
}

impl GenotypeComboResult {
    /// Unnormalized posterior contribution: data likelihood times prior.
    pub fn score(&self) -> LogProb {
        self.data_likelihood + self.prior.total
    }

    pub fn is_homozygous(&self) -> bool {
        self.combo.homozygous()
    }
}

/// Posterior probability of one genotype of one sample.
#[derive(new, Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenotypeMarginal {
    /// Index of the genotype within the sample's genotype table.
    pub genotype: usize,
    pub prob: LogProb,
}

/// Normalized posterior over the retained combinations.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Posterior {
    /// Retained combinations, sorted by descending score.
    #[getset(get = "pub")]
    results: Vec<GenotypeComboResult>,
    #[getset(get_copy = "pub")]
    normalizer: LogProb,
    /// Per sample, the marginal genotype probabilities in descending order.
    #[getset(get = "pub")]
    marginals: VecMap<Vec<GenotypeMarginal>>,
    #[getset(get_copy = "pub")]
    p_var: Prob,
    /// Index into `results` of the reported combination.
    #[getset(get_copy = "pub")]
    best: usize,
}

impl Posterior {
    pub fn best_result(&self) -> &GenotypeComboResult {
        &self.results[self.best]
    }

    pub fn marginals_of(&self, sample: usize) -> Option<&[GenotypeMarginal]> {
        self.marginals.get(sample).map(|m| m.as_slice())
    }
}

/// Turns scored combinations into a normalized posterior.
///
/// If `integration_depth` is positive, only that many combinations are kept for
/// normalization, except that homozygous combinations are never dropped.
#[derive(new, Debug, Clone, Copy, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct PosteriorAggregator {
    integration_depth: usize,
}

impl PosteriorAggregator {
    pub fn aggregate(
        &self,
        mut results: Vec<GenotypeComboResult>,
        faults: &mut NumericFaults,
    ) -> Result<Posterior> {
        sort(&mut results);
        if self.integration_depth > 0 {
            let before = results.len();
            trim(&mut results, self.integration_depth);
            debug!(
                "trimmed {} of {} combinations",
                before - results.len(),
                before
            );
        }
        if results.is_empty() {
            return Err(errors::Error::EmptyCandidateSet.into());
        }

        let normalizer = normalizer(&results, faults);
        let marginals = marginals(&results, normalizer, faults);
        let p_var = p_var(&results, normalizer);
        let best = best(&results);
        debug!("pVar = {:.4}", *p_var);

        Ok(Posterior {
            results,
            normalizer,
            marginals,
            p_var,
            best,
        })
    }
}

/// Sort by descending score. The sort is stable, such that equal scores keep their
/// search order.
pub(crate) fn sort(results: &mut [GenotypeComboResult]) {
    results.sort_by_key(|r| Reverse(OrderedFloat(*r.score())));
}

/// Drop combinations from the tail until at most `depth` remain, setting homozygous ones
/// aside and reinserting them afterwards.
pub(crate) fn trim(results: &mut Vec<GenotypeComboResult>, depth: usize) {
    if results.len() <= depth {
        return;
    }
    let mut homozygous = Vec::new();
    while !results.is_empty() && results.len() + homozygous.len() > depth {
        if let Some(result) = results.pop() {
            if result.is_homozygous() {
                homozygous.push(result);
            }
        }
    }
    results.extend(homozygous);
    sort(results);
}

pub(crate) fn normalizer(results: &[GenotypeComboResult], faults: &mut NumericFaults) -> LogProb {
    let scores = results.iter().map(|r| r.score()).collect_vec();
    faults.ln_sum_exp(&scores, "posterior normalizer")
}

/// Posterior of each (sample, genotype) pair occurring in any combination.
pub(crate) fn marginals(
    results: &[GenotypeComboResult],
    normalizer: LogProb,
    faults: &mut NumericFaults,
) -> VecMap<Vec<GenotypeMarginal>> {
    let mut summands: VecMap<BTreeMap<usize, Vec<LogProb>>> = VecMap::new();
    for result in results {
        let score = result.score();
        for entry in result.combo().entries() {
            summands
                .entry(entry.sample)
                .or_insert_with(BTreeMap::new)
                .entry(entry.genotype)
                .or_insert_with(Vec::new)
                .push(score);
        }
    }

    summands
        .into_iter()
        .map(|(sample, genotypes)| {
            let marginals = genotypes
                .into_iter()
                .map(|(genotype, scores)| {
                    let prob =
                        faults.ln_sum_exp(&scores, "marginal genotype probability") - normalizer;
                    let prob = prob.cap_numerical_overshoot(NUMERICAL_EPSILON);
                    GenotypeMarginal::new(genotype, prob)
                })
                .sorted_by_key(|m| (Reverse(OrderedFloat(*m.prob)), m.genotype))
                .collect_vec();
            (sample, marginals)
        })
        .collect()
}

/// Probability that the samples are not all homozygous for the same allele.
pub(crate) fn p_var(results: &[GenotypeComboResult], normalizer: LogProb) -> Prob {
    let homozygous: f64 = results
        .iter()
        .filter(|r| r.is_homozygous())
        .map(|r| (r.score() - normalizer).exp())
        .sum();
    Prob((1.0 - homozygous).max(0.0).min(1.0))
}

/// The first non-homozygous combination, or the best one if all are homozygous.
pub(crate) fn best(results: &[GenotypeComboResult]) -> usize {
    results
        .iter()
        .position(|r| !r.is_homozygous())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::genotype::enumerate;
    use crate::variants::model::combination::GenotypeComboEntry;
    use crate::variants::model::likelihood::{GenotypeLikelihood, RankedGenotypes};
    use crate::variants::Allele;
    use std::sync::Arc;

    fn tables(n_samples: usize) -> Vec<RankedGenotypes> {
        let alleles = vec![Allele::reference(b"A"), Allele::snv(b'T')];
        let genotypes = Arc::new(enumerate(2, &alleles).unwrap());
        (0..n_samples)
            .map(|i| {
                RankedGenotypes::new(
                    format!("s{}", i),
                    Arc::clone(&genotypes),
                    (0..3)
                        .map(|g| GenotypeLikelihood::new(g, LogProb(-(g as f64))))
                        .collect(),
                )
            })
            .collect()
    }

    /// A result with the given genotype per sample and the given score.
    fn result(tables: &[RankedGenotypes], genotypes: &[usize], score: f64) -> GenotypeComboResult {
        let entries = genotypes
            .iter()
            .enumerate()
            .map(|(sample, &g)| GenotypeComboEntry::new(sample, g, LogProb(score)))
            .collect();
        let prior = PriorProb::new(LogProb::ln_one(), LogProb::ln_one(), LogProb::ln_one());
        GenotypeComboResult::new(GenotypeCombo::new(entries, tables), LogProb(score), prior)
    }

    #[test]
    fn test_sort_descending() {
        let t = tables(1);
        let mut results = vec![
            result(&t, &[0], -3.0),
            result(&t, &[1], -1.0),
            result(&t, &[2], -2.0),
        ];
        sort(&mut results);
        let scores = results.iter().map(|r| *r.score()).collect_vec();
        assert_eq!(scores, vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_trim_preserves_homozygous() {
        let t = tables(2);
        let mut results = vec![
            result(&t, &[1, 1], -1.0),
            result(&t, &[1, 0], -2.0),
            result(&t, &[0, 1], -3.0),
            result(&t, &[1, 2], -4.0),
            result(&t, &[0, 0], -5.0),
            result(&t, &[2, 2], -6.0),
        ];
        trim(&mut results, 2);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_homozygous()));

        let mut results = vec![
            result(&t, &[1, 1], -1.0),
            result(&t, &[1, 0], -2.0),
            result(&t, &[0, 1], -3.0),
            result(&t, &[1, 2], -4.0),
            result(&t, &[0, 0], -5.0),
            result(&t, &[2, 2], -6.0),
        ];
        trim(&mut results, 4);
        assert_eq!(results.len(), 4);
        assert_eq!(results.iter().filter(|r| r.is_homozygous()).count(), 2);
        assert_relative_eq!(*results[0].score(), -1.0);
        assert_relative_eq!(*results[3].score(), -6.0);
    }

    #[test]
    fn test_trim_keeps_short_lists() {
        let t = tables(1);
        let mut results = vec![result(&t, &[1], -1.0), result(&t, &[0], -2.0)];
        trim(&mut results, 5);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_marginals_are_normalized() {
        let t = tables(2);
        let results = vec![
            result(&t, &[1, 1], -1.0),
            result(&t, &[1, 0], -2.0),
            result(&t, &[0, 0], -2.5),
            result(&t, &[2, 2], -7.0),
        ];
        let mut faults = NumericFaults::default();
        let posterior = PosteriorAggregator::new(0)
            .aggregate(results, &mut faults)
            .unwrap();
        for sample in 0..2 {
            let total: f64 = posterior
                .marginals_of(sample)
                .unwrap()
                .iter()
                .map(|m| m.prob.exp())
                .sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-6);
        }
        let sample0 = posterior.marginals_of(0).unwrap();
        assert_eq!(sample0[0].genotype, 1);
        assert!(sample0.windows(2).all(|w| w[0].prob >= w[1].prob));
        assert!(faults.is_empty());
    }

    #[test]
    fn test_p_var_and_best() {
        let t = tables(2);
        let results = vec![
            result(&t, &[0, 0], -1.0),
            result(&t, &[1, 0], -3.0),
            result(&t, &[2, 2], -4.0),
        ];
        let mut faults = NumericFaults::default();
        let posterior = PosteriorAggregator::new(0)
            .aggregate(results, &mut faults)
            .unwrap();
        let z = (-1.0f64).exp() + (-3.0f64).exp() + (-4.0f64).exp();
        assert_relative_eq!(*posterior.p_var(), (-3.0f64).exp() / z, epsilon = 1e-6);
        assert!(*posterior.p_var() >= 0.0 && *posterior.p_var() <= 1.0);
        assert_eq!(posterior.best(), 1);
        assert_relative_eq!(*posterior.best_result().score(), -3.0);
        assert_relative_eq!(*posterior.normalizer(), z.ln(), epsilon = 1e-6);
    }

    #[test]
    fn test_all_homozygous() {
        let t = tables(1);
        let results = vec![result(&t, &[2], -2.0), result(&t, &[0], -1.0)];
        let mut faults = NumericFaults::default();
        let posterior = PosteriorAggregator::new(1)
            .aggregate(results, &mut faults)
            .unwrap();
        assert_eq!(posterior.results().len(), 2);
        assert_eq!(posterior.best(), 0);
        assert_relative_eq!(*posterior.best_result().score(), -1.0);
        assert_relative_eq!(*posterior.p_var(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_candidate_set() {
        let mut faults = NumericFaults::default();
        let err = PosteriorAggregator::new(0)
            .aggregate(Vec::new(), &mut faults)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<errors::Error>(),
            Some(&errors::Error::EmptyCandidateSet)
        );
    }
}
