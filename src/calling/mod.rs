// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Joint genotyping of all samples at a single site.

use std::sync::Arc;

use anyhow::Result;
use bio::stats::{LogProb, Prob};
use itertools::Itertools;
use rayon::prelude::*;
use strum_macros::{Display, IntoStaticStr};

use crate::constants::{REFERENCE_SAMPLE_NAME, REFERENCE_SAMPLE_PLOIDY, REFERENCE_SAMPLE_QUAL};
use crate::errors;
use crate::utils::NumericFaults;
use crate::variants::evidence::{Observation, Sample};
use crate::variants::genotype::{Genotype, GenotypeCache};
use crate::variants::model::{
    BandedSearch, GenotypeComboResult, PopulationPrior, PosteriorAggregator, PriorProb,
    RankedGenotypes, SampleLikelihoodModel,
};
use crate::variants::Allele;

pub mod parameters;

pub use parameters::{Parameters, ParametersBuilder};

/// A genomic position with candidate alleles and the observations of all samples.
#[derive(new, Debug, Clone, Serialize, Deserialize, Getters, CopyGetters)]
pub struct Site {
    #[getset(get = "pub")]
    chrom: String,
    #[getset(get_copy = "pub")]
    pos: u64,
    /// The reference allele at this position.
    #[getset(get = "pub")]
    reference: Allele,
    #[getset(get = "pub")]
    alternates: Vec<Allele>,
    #[getset(get = "pub")]
    samples: Vec<Sample>,
}

impl Site {
    /// Total number of observations over all samples.
    pub fn coverage(&self) -> usize {
        self.samples.iter().map(|s| s.observations().len()).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.reference.is_reference() {
            return Err(errors::Error::InvalidAllele {
                msg: format!("reference allele {} is not of kind REF", self.reference),
            }
            .into());
        }
        if let Some(alt) = self.alternates.iter().find(|a| a.is_reference()) {
            return Err(errors::Error::InvalidAllele {
                msg: format!("alternate allele {} is of kind REF", alt),
            }
            .into());
        }
        Ok(())
    }
}

/// Why a site has not been genotyped.
#[derive(
    Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr,
)]
pub enum SkipReason {
    /// The reference is not one of A, C, G and T.
    #[strum(serialize = "ambiguous_reference")]
    AmbiguousReference,
    #[strum(serialize = "no_coverage")]
    NoCoverage,
    /// No sample supports an alternate allele strongly enough.
    #[strum(serialize = "insufficient_alternate_observations")]
    InsufficientAlternateObservations,
    /// Fewer than two alleles to build genotypes from.
    #[strum(serialize = "insufficient_evidence")]
    InsufficientEvidence,
}

#[derive(Debug, Clone, Serialize)]
pub enum SiteOutcome {
    Called(SiteCall),
    Skipped(SkipReason),
}

impl SiteOutcome {
    pub fn call(&self) -> Option<&SiteCall> {
        match self {
            SiteOutcome::Called(call) => Some(call),
            SiteOutcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            SiteOutcome::Called(_) => None,
            SiteOutcome::Skipped(reason) => Some(*reason),
        }
    }
}

/// The genotype of one sample in the reported combination, with its marginal posterior
/// over all genotypes.
#[derive(Debug, Clone, Serialize, Getters)]
#[getset(get = "pub")]
pub struct SampleCall {
    name: String,
    genotype: Genotype,
    data_likelihood: LogProb,
    /// Marginal posterior probabilities in descending order.
    marginals: Vec<(Genotype, LogProb)>,
}

impl SampleCall {
    /// Marginal posterior of the reported genotype.
    pub fn genotype_prob(&self) -> LogProb {
        self.marginal(&self.genotype)
            .unwrap_or_else(LogProb::ln_zero)
    }

    pub fn marginal(&self, genotype: &Genotype) -> Option<LogProb> {
        self.marginals
            .iter()
            .find(|(g, _)| g == genotype)
            .map(|(_, prob)| *prob)
    }
}

/// The genotyping result of a site.
#[derive(Debug, Clone, Serialize, Getters, CopyGetters)]
pub struct SiteCall {
    #[getset(get = "pub")]
    chrom: String,
    #[getset(get_copy = "pub")]
    pos: u64,
    #[getset(get = "pub")]
    reference: Allele,
    /// Alleles genotypes have been built from, reference first.
    #[getset(get = "pub")]
    candidates: Vec<Allele>,
    /// Probability that not all samples are homozygous for the same allele.
    #[getset(get_copy = "pub")]
    p_var: Prob,
    #[getset(get_copy = "pub")]
    is_variant: bool,
    /// Posterior score of the reported combination.
    #[getset(get_copy = "pub")]
    best_combo_score: LogProb,
    #[getset(get_copy = "pub")]
    best_combo_prior: PriorProb,
    /// Ewens sampling probability of the allele frequencies of the reported combination,
    /// without diffusion.
    #[getset(get_copy = "pub")]
    best_combo_ewens_prob: LogProb,
    /// Samples with data, in input order.
    #[getset(get = "pub")]
    samples: Vec<SampleCall>,
    #[getset(get_copy = "pub")]
    posterior_normalizer: LogProb,
    #[getset(get_copy = "pub")]
    combos_tested: usize,
    #[getset(get_copy = "pub")]
    coverage: usize,
    #[getset(get_copy = "pub")]
    numeric_faults: usize,
    /// All retained combinations, sorted by descending score.
    #[getset(get = "pub")]
    combos: Vec<GenotypeComboResult>,
}

impl SiteCall {
    /// Non-reference alleles of the reported combination with their number of copies,
    /// most frequent first.
    pub fn alternate_alleles(&self) -> Vec<(Allele, u32)> {
        let mut counts: Vec<(Allele, u32)> = Vec::new();
        for sample in &self.samples {
            for (allele, count) in sample.genotype.allele_counts() {
                if *allele == self.reference {
                    continue;
                }
                match counts.iter_mut().find(|(a, _)| a == allele) {
                    Some((_, total)) => *total += count,
                    None => counts.push((allele.clone(), count)),
                }
            }
        }
        counts.sort_by(|(a, m), (b, n)| (n, a).cmp(&(m, b)));
        counts
    }

    pub fn sample(&self, name: &str) -> Option<&SampleCall> {
        self.samples.iter().find(|s| s.name == name)
    }
}

/// Joint genotyping of sites.
///
/// The genotype cache is shared across sites and may be shared across callers.
#[derive(Builder, Debug)]
#[builder(pattern = "owned")]
pub struct Caller {
    parameters: Parameters,
    #[builder(default)]
    genotype_cache: Arc<GenotypeCache>,
}

impl Caller {
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn genotype_cache(&self) -> &GenotypeCache {
        &self.genotype_cache
    }

    /// Alleles to build genotypes from, reference first.
    fn candidates(&self, site: &Site) -> Vec<Allele> {
        if self.parameters.force_canonical_alleles() {
            Allele::canonical_alleles(&site.reference)
        } else {
            std::iter::once(&site.reference)
                .chain(site.alternates.iter())
                .unique()
                .cloned()
                .collect()
        }
    }

    fn ploidy(&self, sample: &Sample) -> u32 {
        sample
            .ploidy()
            .unwrap_or_else(|| self.parameters.default_ploidy())
    }

    fn skip_reason(&self, site: &Site, candidates: &[Allele]) -> Option<SkipReason> {
        if !site.reference.is_unambiguous_nucleotide() {
            return Some(SkipReason::AmbiguousReference);
        }
        if site.samples.iter().all(|s| s.is_empty()) {
            return Some(SkipReason::NoCoverage);
        }
        // with both thresholds at zero, the given alternates are scored as they are
        let min_count = self.parameters.min_alt_count();
        let min_fraction = self.parameters.min_alt_fraction();
        if min_count > 0 || min_fraction > 0.0 {
            let has_alternate = site.samples.iter().any(|s| {
                s.has_sufficient_alternate_observations(&site.reference, min_count, min_fraction)
            });
            if !has_alternate {
                return Some(SkipReason::InsufficientAlternateObservations);
            }
        }
        if candidates.len() < 2 {
            return Some(SkipReason::InsufficientEvidence);
        }
        None
    }

    /// Per-sample genotype tables with likelihoods. Samples without observations or with
    /// ploidy 0 get an empty table and take no part in the combinations.
    fn genotype_tables(
        &self,
        samples: &[Sample],
        candidates: &[Allele],
        faults: &mut NumericFaults,
    ) -> Result<Vec<RankedGenotypes>> {
        let model = SampleLikelihoodModel::new(self.parameters.read_dependence_factor());

        samples
            .iter()
            .map(|sample| {
                let ploidy = self.ploidy(sample);
                if ploidy == 0 {
                    warn!(
                        "sample {} has ploidy 0, treating it as missing",
                        sample.name()
                    );
                }
                if ploidy == 0 || sample.is_empty() {
                    return Ok(RankedGenotypes::new(
                        sample.name().to_owned(),
                        Arc::new(Vec::new()),
                        Vec::new(),
                    ));
                }
                let genotypes = self.genotype_cache.genotypes(ploidy, candidates)?;
                let likelihoods = model.compute(sample, &genotypes, faults);
                Ok(RankedGenotypes::new(sample.name().to_owned(), genotypes, likelihoods))
            })
            .collect()
    }

    /// Genotype all samples of the site jointly.
    pub fn call_site(&self, site: &Site) -> Result<SiteOutcome> {
        site.validate()?;
        let candidates = self.candidates(site);
        if let Some(reason) = self.skip_reason(site, &candidates) {
            debug!("skipping {}:{}: {}", site.chrom, site.pos, reason);
            return Ok(SiteOutcome::Skipped(reason));
        }

        let mut samples = site.samples.clone();
        if self.parameters.use_reference_sample() {
            samples.push(Sample::new(
                REFERENCE_SAMPLE_NAME.to_owned(),
                Some(REFERENCE_SAMPLE_PLOIDY),
                vec![Observation::new(
                    site.reference.clone(),
                    REFERENCE_SAMPLE_QUAL,
                    REFERENCE_SAMPLE_QUAL,
                )],
            ));
        }

        let mut faults = NumericFaults::default();
        let tables = self.genotype_tables(&samples, &candidates, &mut faults)?;

        let search = BandedSearch::new(
            self.parameters.bandwidth(),
            self.parameters.band_threshold(),
            self.parameters.combo_step_max(),
        );
        let combos = search.search(&tables, &candidates);
        if combos.is_empty() {
            return Ok(SiteOutcome::Skipped(SkipReason::InsufficientEvidence));
        }
        let combos_tested = combos.len();

        let prior = PopulationPrior::new(
            self.parameters.theta(),
            self.parameters.pooled(),
            self.parameters.diffusion_prior_scalar(),
        );
        let results = combos
            .into_iter()
            .map(|combo| {
                let prior = prior.score(&combo.genotypes(&tables), &mut faults);
                let data_likelihood = combo.data_likelihood();
                GenotypeComboResult::new(combo, data_likelihood, prior)
            })
            .collect_vec();

        let posterior = PosteriorAggregator::new(self.parameters.posterior_integration_depth())
            .aggregate(results, &mut faults)?;
        let best = posterior.best_result();
        let best_genotypes = best.combo().genotypes(&tables);

        let sample_calls = best
            .combo()
            .entries()
            .iter()
            .map(|entry| {
                let table = &tables[entry.sample];
                let marginals = posterior
                    .marginals_of(entry.sample)
                    .unwrap_or(&[])
                    .iter()
                    .map(|m| (table.genotype(m.genotype).clone(), m.prob))
                    .collect();
                SampleCall {
                    name: table.sample_name().to_owned(),
                    genotype: table.genotype(entry.genotype).clone(),
                    data_likelihood: entry.data_likelihood,
                    marginals,
                }
            })
            .collect();

        if !faults.is_empty() {
            warn!(
                "{} numeric faults recovered at {}:{}",
                faults.count(),
                site.chrom,
                site.pos
            );
        }
        debug!(
            "{}:{}: {} combinations, pVar = {:.4}",
            site.chrom,
            site.pos,
            combos_tested,
            *posterior.p_var()
        );

        Ok(SiteOutcome::Called(SiteCall {
            chrom: site.chrom.clone(),
            pos: site.pos,
            reference: site.reference.clone(),
            p_var: posterior.p_var(),
            is_variant: *posterior.p_var() >= self.parameters.pvl(),
            best_combo_score: best.score(),
            best_combo_prior: best.prior(),
            best_combo_ewens_prob: prior.allele_sampling_prob(&best_genotypes),
            samples: sample_calls,
            posterior_normalizer: posterior.normalizer(),
            combos_tested,
            coverage: site.coverage(),
            numeric_faults: faults.count(),
            combos: posterior.results().clone(),
            candidates,
        }))
    }

    /// Genotype the given sites in parallel. Outcomes are returned in input order.
    pub fn call_sites(&self, sites: &[Site]) -> Result<Vec<SiteOutcome>> {
        let outcomes = sites
            .par_iter()
            .map(|site| self.call_site(site))
            .collect::<Result<Vec<_>>>()?;

        let processed = outcomes.iter().filter(|o| o.call().is_some()).count();
        info!(
            "processed {} of {} sites ({:.2}%)",
            processed,
            sites.len(),
            if sites.is_empty() {
                0.0
            } else {
                processed as f64 / sites.len() as f64 * 100.0
            }
        );
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, ploidy: Option<u32>, bases: &[u8]) -> Sample {
        Sample::new(
            name.to_owned(),
            ploidy,
            bases
                .iter()
                .map(|&b| Observation::new(Allele::snv(b), 30, 60))
                .collect(),
        )
    }

    fn site(reference: &[u8], samples: Vec<Sample>) -> Site {
        Site::new(
            "chr1".to_owned(),
            100,
            Allele::reference(reference),
            vec![Allele::snv(b'T')],
            samples,
        )
    }

    fn build_caller(parameters: Parameters) -> Caller {
        CallerBuilder::default()
            .parameters(parameters)
            .build()
            .unwrap()
    }

    #[test]
    fn test_skip_reasons() {
        let caller = build_caller(Parameters::default());
        let outcome = caller
            .call_site(&site(b"N", vec![sample("a", None, b"TTT")]))
            .unwrap();
        assert_eq!(outcome.skip_reason(), Some(SkipReason::AmbiguousReference));

        let outcome = caller
            .call_site(&site(b"A", vec![sample("a", None, b"")]))
            .unwrap();
        assert_eq!(outcome.skip_reason(), Some(SkipReason::NoCoverage));

        let filtering = build_caller(
            ParametersBuilder::default()
                .min_alt_count(1)
                .build()
                .unwrap(),
        );
        let outcome = filtering
            .call_site(&site(b"A", vec![sample("a", None, b"AAAA")]))
            .unwrap();
        assert_eq!(
            outcome.skip_reason(),
            Some(SkipReason::InsufficientAlternateObservations)
        );

        let lonely = Site::new(
            "chr1".to_owned(),
            100,
            Allele::reference(b"A"),
            Vec::new(),
            vec![sample("a", None, b"AAT")],
        );
        let outcome = caller.call_site(&lonely).unwrap();
        assert_eq!(
            outcome.skip_reason(),
            Some(SkipReason::InsufficientEvidence)
        );
        assert_eq!(
            SkipReason::InsufficientEvidence.to_string(),
            "insufficient_evidence"
        );
    }

    #[test]
    fn test_given_alternates_are_scored_without_support() {
        let caller = build_caller(Parameters::default());
        let outcome = caller
            .call_site(&site(
                b"A",
                vec![
                    sample("a", None, b"AAAAAAAAAA"),
                    sample("b", None, b"AAAAAAAAAA"),
                ],
            ))
            .unwrap();
        let call = outcome.call().unwrap();
        assert_eq!(
            call.candidates(),
            &vec![Allele::reference(b"A"), Allele::snv(b'T')]
        );
        assert!(*call.p_var() < 0.05);
    }

    #[test]
    fn test_invalid_alleles() {
        let caller = build_caller(Parameters::default());
        let mut s = site(b"A", vec![sample("a", None, b"AT")]);
        s.reference = Allele::snv(b'A');
        let err = caller.call_site(&s).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<errors::Error>(),
            Some(errors::Error::InvalidAllele { .. })
        ));

        let mut s = site(b"A", vec![sample("a", None, b"AT")]);
        s.alternates.push(Allele::reference(b"G"));
        assert!(caller.call_site(&s).is_err());
    }

    #[test]
    fn test_candidates() {
        let caller = build_caller(
            ParametersBuilder::default()
                .force_canonical_alleles(true)
                .build()
                .unwrap(),
        );
        let s = site(b"G", vec![sample("a", None, b"GGT")]);
        assert_eq!(caller.candidates(&s).len(), 4);

        let caller = build_caller(Parameters::default());
        let mut s = s;
        s.alternates.push(Allele::snv(b'T'));
        assert_eq!(
            caller.candidates(&s),
            vec![Allele::reference(b"G"), Allele::snv(b'T')]
        );
    }

    #[test]
    fn test_zero_ploidy_sample_is_missing() {
        let caller = build_caller(Parameters::default());
        let outcome = caller
            .call_site(&site(
                b"A",
                vec![sample("a", None, b"AATT"), sample("b", Some(0), b"TTTT")],
            ))
            .unwrap();
        let call = outcome.call().unwrap();
        assert_eq!(call.samples().len(), 1);
        assert!(call.sample("b").is_none());
        assert_eq!(call.coverage(), 8);
    }

    #[test]
    fn test_reference_sample() {
        let caller = build_caller(
            ParametersBuilder::default()
                .use_reference_sample(true)
                .build()
                .unwrap(),
        );
        let outcome = caller
            .call_site(&site(b"A", vec![sample("a", None, b"TTTTTTTT")]))
            .unwrap();
        let call = outcome.call().unwrap();
        let reference = call.sample(REFERENCE_SAMPLE_NAME).unwrap();
        assert_eq!(reference.genotype().ploidy(), 1);
        assert_eq!(reference.genotype().alleles(), &[Allele::reference(b"A")]);
        assert_eq!(call.samples().len(), 2);
    }

    #[test]
    fn test_alternate_alleles() {
        let caller = build_caller(
            ParametersBuilder::default()
                .force_canonical_alleles(true)
                .build()
                .unwrap(),
        );
        let outcome = caller
            .call_site(&site(
                b"A",
                vec![
                    sample("a", None, b"TTTTTTTTTT"),
                    sample("b", None, b"GGGGGAAAAA"),
                ],
            ))
            .unwrap();
        let call = outcome.call().unwrap();
        assert_eq!(
            call.alternate_alleles(),
            vec![(Allele::snv(b'T'), 2), (Allele::snv(b'G'), 1)]
        );
    }
}
