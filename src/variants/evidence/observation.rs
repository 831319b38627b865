// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::BTreeMap;

use bio::stats::LogProb;
use counter::Counter;

use crate::utils::stats::prob_call_error;
use crate::variants::Allele;

/// A single read's call of an allele at the current position.
#[derive(new, Clone, Debug, Serialize, Deserialize, Getters, CopyGetters)]
pub struct Observation {
    /// The allele supported by the read.
    #[getset(get = "pub")]
    allele: Allele,
    /// PHRED scaled base quality of the allele call.
    #[getset(get_copy = "pub")]
    base_qual: u8,
    /// PHRED scaled mapping quality of the read.
    #[getset(get_copy = "pub")]
    map_qual: u8,
}

impl Observation {
    /// Probability that the reported allele differs from the true allele on the read's
    /// template, either because of a miscalled base or a mismapped read.
    pub fn prob_error(&self) -> LogProb {
        LogProb::from(prob_call_error(self.base_qual, self.map_qual))
    }
}

/// A named collection of allele observations at one position.
#[derive(new, Clone, Debug, Serialize, Deserialize, Getters, CopyGetters)]
pub struct Sample {
    #[getset(get = "pub")]
    name: String,
    /// Ploidy of the sample at this position. If omitted, the configured default is used.
    #[getset(get_copy = "pub")]
    ploidy: Option<u32>,
    #[getset(get = "pub")]
    observations: Vec<Observation>,
}

impl Sample {
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations partitioned by the allele they support.
    pub fn groups(&self) -> BTreeMap<&Allele, Vec<&Observation>> {
        let mut groups: BTreeMap<&Allele, Vec<&Observation>> = BTreeMap::new();
        for obs in &self.observations {
            groups.entry(obs.allele()).or_default().push(obs);
        }
        groups
    }

    /// Number of observations supporting each allele.
    pub fn allele_counts(&self) -> Counter<&Allele> {
        self.observations.iter().map(|obs| obs.allele()).collect()
    }

    /// Whether some allele other than the reference is supported by at least `min_count`
    /// observations that make up at least `min_fraction` of all observations.
    pub fn has_sufficient_alternate_observations(
        &self,
        reference: &Allele,
        min_count: usize,
        min_fraction: f64,
    ) -> bool {
        let total = self.observations.len();
        if total == 0 {
            return false;
        }
        self.allele_counts().iter().any(|(allele, &count)| {
            *allele != reference
                && count >= min_count
                && count as f64 / total as f64 >= min_fraction
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(bases: &[u8]) -> Sample {
        Sample::new(
            "s".to_owned(),
            None,
            bases
                .iter()
                .map(|&b| Observation::new(Allele::snv(b), 30, 60))
                .collect(),
        )
    }

    #[test]
    fn test_prob_error() {
        let obs = Observation::new(Allele::snv(b'A'), 20, 255);
        assert_relative_eq!(obs.prob_error().exp(), 0.01, epsilon = 1e-6);
        let obs = Observation::new(Allele::snv(b'A'), 30, 20);
        assert_relative_eq!(obs.prob_error().exp(), 1.0 - 0.999 * 0.99, epsilon = 1e-6);
    }

    #[test]
    fn test_groups() {
        let s = sample(b"AATAC");
        let groups = s.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&Allele::snv(b'A')].len(), 3);
        assert_eq!(s.allele_counts()[&Allele::snv(b'T')], 1);
    }

    #[test]
    fn test_sufficient_alternate_observations() {
        let s = sample(b"AAAAAAAATT");
        let reference = Allele::reference(b"A");
        assert!(s.has_sufficient_alternate_observations(&reference, 2, 0.2));
        assert!(!s.has_sufficient_alternate_observations(&reference, 3, 0.0));
        assert!(!s.has_sufficient_alternate_observations(&reference, 1, 0.3));
        let e = sample(b"");
        assert!(!e.has_sufficient_alternate_observations(&reference, 0, 0.0));
    }
}
