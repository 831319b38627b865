// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::cmp::Reverse;
use std::sync::Arc;

use bio::stats::LogProb;
use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::utils::{NumericFaults, PROB_033};
use crate::variants::evidence::{Observation, Sample};
use crate::variants::genotype::Genotype;
use crate::variants::Allele;

/// Data likelihood of one genotype, referring to the genotype by its index in the
/// per-sample genotype table.
#[derive(new, Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenotypeLikelihood {
    pub genotype: usize,
    pub likelihood: LogProb,
}

/// Likelihood model for the allele observations of a single sample given a genotype.
///
/// Every read is assumed to be sampled uniformly from the genome copies of the genotype.
/// Given the true allele on its copy, the read reports the same allele with probability
/// 1 - ε and any one of the other three bases with probability ε / 3, with ε combining
/// base and mapping quality. Reads are treated as partially dependent: the product over
/// n reads is taken to the power (1 + (n - 1) * d) / n for read dependence factor d.
#[derive(new, Clone, Copy, Debug)]
pub struct SampleLikelihoodModel {
    read_dependence_factor: f64,
}

impl Default for SampleLikelihoodModel {
    fn default() -> Self {
        SampleLikelihoodModel::new(1.0)
    }
}

impl SampleLikelihoodModel {
    /// Likelihood to observe the reads of one allele group given the genotype. A read is
    /// drawn from a copy carrying the observed allele with the allele's fraction in the
    /// genotype, and from any other copy otherwise.
    fn likelihood_group(
        &self,
        genotype: &Genotype,
        allele: &Allele,
        observations: &[&Observation],
    ) -> LogProb {
        let fraction = genotype.count(allele) as f64 / genotype.ploidy() as f64;
        let prob_sample = LogProb(fraction.ln());
        let prob_sample_other = LogProb((1.0 - fraction).ln());

        observations
            .iter()
            .map(|obs| {
                let prob_error = obs.prob_error();
                let mut summands = Vec::with_capacity(2);
                if fraction > 0.0 {
                    summands.push(prob_sample + prob_error.ln_one_minus_exp());
                }
                if fraction < 1.0 {
                    summands.push(prob_sample_other + prob_error + *PROB_033);
                }
                LogProb::ln_sum_exp(&summands)
            })
            .sum()
    }

    /// Likelihood to observe all reads of a sample given the genotype. Without any
    /// observations the likelihood is 1.
    pub fn likelihood(
        &self,
        sample: &Sample,
        genotype: &Genotype,
        faults: &mut NumericFaults,
    ) -> LogProb {
        let n_obs = sample.observations().len();
        if n_obs == 0 {
            return LogProb::ln_one();
        }

        let likelihood: LogProb = sample
            .groups()
            .iter()
            .map(|(allele, observations)| self.likelihood_group(genotype, allele, observations))
            .sum();
        let dependence = (1.0 + (n_obs as f64 - 1.0) * self.read_dependence_factor) / n_obs as f64;

        faults.sanitize(LogProb(*likelihood * dependence), "data likelihood")
    }

    /// Likelihoods for each of the given genotypes, in input order.
    pub fn compute(
        &self,
        sample: &Sample,
        genotypes: &[Genotype],
        faults: &mut NumericFaults,
    ) -> Vec<GenotypeLikelihood> {
        genotypes
            .iter()
            .enumerate()
            .map(|(i, genotype)| {
                GenotypeLikelihood::new(i, self.likelihood(sample, genotype, faults))
            })
            .collect()
    }
}

/// The genotype table of one sample at one position, with data likelihoods and the ranking
/// by likelihood.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct RankedGenotypes {
    sample_name: String,
    genotypes: Arc<Vec<Genotype>>,
    /// Likelihoods in genotype table order.
    likelihoods: Vec<LogProb>,
    /// Genotype indices sorted by descending likelihood, ties broken by table order.
    ranking: Vec<usize>,
}

impl RankedGenotypes {
    pub fn new(
        sample_name: String,
        genotypes: Arc<Vec<Genotype>>,
        likelihoods: Vec<GenotypeLikelihood>,
    ) -> Self {
        let ranking = likelihoods
            .iter()
            .sorted_by_key(|gl| (Reverse(OrderedFloat(*gl.likelihood)), gl.genotype))
            .map(|gl| gl.genotype)
            .collect_vec();
        let mut table = vec![LogProb::ln_zero(); genotypes.len()];
        for gl in likelihoods {
            table[gl.genotype] = gl.likelihood;
        }

        RankedGenotypes {
            sample_name,
            genotypes,
            likelihoods: table,
            ranking,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    pub fn genotype(&self, index: usize) -> &Genotype {
        &self.genotypes[index]
    }

    pub fn likelihood(&self, index: usize) -> LogProb {
        self.likelihoods[index]
    }

    /// Genotype index at the given rank.
    pub fn ranked(&self, rank: usize) -> usize {
        self.ranking[rank]
    }

    pub fn best_likelihood(&self) -> Option<LogProb> {
        self.ranking.first().map(|&i| self.likelihoods[i])
    }

    /// Index of the genotype that is homozygous for the given allele.
    pub fn homozygous_for(&self, allele: &Allele) -> Option<usize> {
        self.genotypes
            .iter()
            .position(|g| g.homozygous_allele() == Some(allele))
    }
}
