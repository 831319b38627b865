// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::BTreeMap;

use bio::stats::LogProb;
use itertools::Itertools;

use crate::utils::stats::{ln_fact, ln_multinomial_coefficient, ln_rising_factorial};
use crate::utils::NumericFaults;
use crate::variants::genotype::Genotype;
use crate::variants::Allele;

/// Prior probability of a genotype combination, decomposed into the probability of the
/// allele frequency spectrum and the probability of the genotype assignment given that
/// spectrum.
#[derive(new, Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriorProb {
    pub total: LogProb,
    pub given_frequency: LogProb,
    pub frequency: LogProb,
}

/// Population prior over genotype combinations.
///
/// Allele frequencies follow the Ewens sampling formula with population mutation rate
/// theta. Given the frequencies, all assignments of allele copies to samples are equally
/// likely. For pooled samples the assignment within a pool is not observable, such that
/// only the frequency spectrum is scored.
#[derive(new, Debug, Clone, Copy, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct PopulationPrior {
    theta: f64,
    pooled: bool,
    diffusion_scalar: f64,
}

impl PopulationPrior {
    /// Prior of the combination given by the genotypes of all its samples.
    pub fn score(&self, genotypes: &[&Genotype], faults: &mut NumericFaults) -> PriorProb {
        let spectrum = allele_spectrum(genotypes);

        let mut frequency = self.ewens(spectrum.values().cloned());
        if self.diffusion_scalar > 0.0 {
            frequency = self.diffuse(frequency, &spectrum, faults);
        }
        let frequency = faults.sanitize(frequency, "allele frequency prior");

        let given_frequency = if self.pooled {
            LogProb::ln_one()
        } else {
            prob_genotypes_given_frequency(genotypes, &spectrum)
        };
        let given_frequency = faults.sanitize(given_frequency, "genotype assignment prior");

        PriorProb::new(frequency + given_frequency, given_frequency, frequency)
    }

    /// Ewens sampling probability of the allele frequencies of the given genotypes,
    /// without diffusion.
    pub fn allele_sampling_prob(&self, genotypes: &[&Genotype]) -> LogProb {
        self.ewens(allele_spectrum(genotypes).values().cloned())
    }

    /// Ewens sampling formula for the given allele copy counts:
    /// P = n! / θ^(n) * Π_j θ^(a_j) / (j^(a_j) a_j!), with a_j the number of alleles
    /// carried by exactly j copies.
    pub(crate) fn ewens<I: IntoIterator<Item = u32>>(&self, counts: I) -> LogProb {
        let counts = counts.into_iter().filter(|&c| c > 0).sorted().collect_vec();
        let n: u32 = counts.iter().sum();
        let ln_theta = self.theta.ln();

        let spectrum: f64 = counts
            .iter()
            .dedup_with_count()
            .map(|(a_j, &j)| {
                let a_j = a_j as u32;
                a_j as f64 * ln_theta - a_j as f64 * (j as f64).ln() - ln_fact(a_j)
            })
            .sum();

        LogProb(ln_fact(n) - ln_rising_factorial(self.theta, n) + spectrum)
    }

    /// Blend the prior of the spectrum with the mean prior of all spectra that differ by
    /// one copy moved between two of its alleles: (P + s * mean(P_k)) / (1 + s).
    ///
    /// Neighbours keep the set of present alleles, so they carry the same power of theta
    /// and smoothing only reshapes the frequencies within it. Monomorphic spectra have no
    /// neighbours and stay unchanged.
    fn diffuse(
        &self,
        prob: LogProb,
        spectrum: &BTreeMap<&Allele, u32>,
        faults: &mut NumericFaults,
    ) -> LogProb {
        let counts = spectrum.values().cloned().collect_vec();

        let mut neighbours = Vec::new();
        for (from, &count) in counts.iter().enumerate() {
            if count < 2 {
                continue;
            }
            for to in (0..counts.len()).filter(|&to| to != from) {
                let mut neighbour = counts.clone();
                neighbour[from] -= 1;
                neighbour[to] += 1;
                neighbours.push(self.ewens(neighbour));
            }
        }
        if neighbours.is_empty() {
            return prob;
        }

        let ln_scalar = LogProb(self.diffusion_scalar.ln());
        let mean = faults.ln_sum_exp(&neighbours, "diffusion prior")
            - LogProb((neighbours.len() as f64).ln());
        LogProb::ln_sum_exp(&[prob, ln_scalar + mean])
            - LogProb((1.0 + self.diffusion_scalar).ln())
    }
}

/// Number of copies of each allele across all genotypes.
fn allele_spectrum<'a>(genotypes: &[&'a Genotype]) -> BTreeMap<&'a Allele, u32> {
    let mut spectrum = BTreeMap::new();
    for genotype in genotypes {
        for (allele, count) in genotype.allele_counts() {
            *spectrum.entry(allele).or_insert(0) += count;
        }
    }
    spectrum
}

/// Probability of the genotype assignment given the allele copy counts, assuming all
/// arrangements of the copies onto the genome copies of all samples are equally likely.
fn prob_genotypes_given_frequency(
    genotypes: &[&Genotype],
    spectrum: &BTreeMap<&Allele, u32>,
) -> LogProb {
    let n: u32 = spectrum.values().sum();
    let arrangements: LogProb = genotypes
        .iter()
        .map(|g| ln_multinomial_coefficient(&g.allele_counts().map(|(_, c)| c).collect_vec()))
        .sum();
    let frequency_permutations: f64 = spectrum.values().map(|&f| ln_fact(f)).sum();

    LogProb(*arrangements + frequency_permutations - ln_fact(n))
}
