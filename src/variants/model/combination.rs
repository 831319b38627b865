// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use bio::stats::LogProb;
use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::variants::genotype::Genotype;
use crate::variants::model::likelihood::RankedGenotypes;
use crate::variants::Allele;

/// The genotype assigned to one sample within a combination.
#[derive(new, Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenotypeComboEntry {
    /// Index of the sample within the site.
    pub sample: usize,
    /// Index of the genotype within the sample's genotype table.
    pub genotype: usize,
    pub data_likelihood: LogProb,
}

/// A joint assignment of one genotype to each sample with data. Samples without data
/// have no entry.
#[derive(Debug, Clone, PartialEq, Serialize, Getters, CopyGetters)]
pub struct GenotypeCombo {
    #[getset(get = "pub")]
    entries: Vec<GenotypeComboEntry>,
    /// All samples are homozygous for one and the same allele.
    #[getset(get_copy = "pub")]
    homozygous: bool,
}

impl GenotypeCombo {
    pub fn new(entries: Vec<GenotypeComboEntry>, tables: &[RankedGenotypes]) -> Self {
        let alleles = entries
            .iter()
            .map(|e| tables[e.sample].genotype(e.genotype).homozygous_allele())
            .collect_vec();
        let homozygous = matches!(alleles.first(), Some(Some(_))) && alleles.iter().all_equal();

        GenotypeCombo {
            entries,
            homozygous,
        }
    }

    fn from_ranks(active: &[usize], ranks: &[usize], tables: &[RankedGenotypes]) -> Self {
        let entries = active
            .iter()
            .zip(ranks)
            .map(|(&sample, &rank)| {
                let genotype = tables[sample].ranked(rank);
                GenotypeComboEntry::new(sample, genotype, tables[sample].likelihood(genotype))
            })
            .collect();
        GenotypeCombo::new(entries, tables)
    }

    /// Sum of the data likelihoods of all entries.
    pub fn data_likelihood(&self) -> LogProb {
        self.entries.iter().map(|e| e.data_likelihood).sum()
    }

    /// Genotype of the given sample, if the sample has an entry.
    pub fn genotype_of(&self, sample: usize) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.sample == sample)
            .map(|e| e.genotype)
    }

    /// The genotypes of all entries, resolved against the per-sample tables.
    pub fn genotypes<'a>(&self, tables: &'a [RankedGenotypes]) -> Vec<&'a Genotype> {
        self.entries
            .iter()
            .map(|e| tables[e.sample].genotype(e.genotype))
            .collect()
    }

    fn key(&self) -> Vec<(usize, usize)> {
        self.entries
            .iter()
            .map(|e| (e.sample, e.genotype))
            .collect()
    }
}

/// Banded search over genotype combinations.
///
/// For every sample, the genotypes ranked below `bandwidth` or within `threshold` (in log
/// space) of the sample's best likelihood are eligible. Starting from the combination of
/// all best genotypes, combinations are expanded best-first from a frontier ordered by joint
/// data likelihood. A successor moves one sample one rank down, and at most
/// `combo_step_max` samples may deviate from their best genotype at a time (0 means no
/// limit).
#[derive(new, Debug, Clone, Copy, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct BandedSearch {
    bandwidth: usize,
    threshold: f64,
    combo_step_max: usize,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct FrontierItem {
    score: OrderedFloat<f64>,
    // earlier ranks win ties
    ranks: Reverse<Vec<usize>>,
}

impl BandedSearch {
    /// Number of eligible ranks of the given sample.
    fn eligible(&self, table: &RankedGenotypes) -> usize {
        let best = match table.best_likelihood() {
            Some(best) => best,
            None => return 0,
        };
        let n = (0..table.ranking().len())
            .take_while(|&rank| {
                rank < self.bandwidth
                    || *best - *table.likelihood(table.ranked(rank)) <= self.threshold
            })
            .count();
        n.max(1)
    }

    fn budget(&self, eligible: &[usize]) -> usize {
        let steps: usize = eligible.iter().map(|n| n - 1).sum();
        self.combo_step_max.max(1) * (1 + steps)
    }

    fn score(ranks: &[usize], active: &[usize], tables: &[RankedGenotypes]) -> f64 {
        active
            .iter()
            .zip(ranks)
            .map(|(&sample, &rank)| *tables[sample].likelihood(tables[sample].ranked(rank)))
            .sum()
    }

    /// Generate the candidate combinations, followed by one fully homozygous combination
    /// per candidate allele unless the band already contains it.
    pub fn search(&self, tables: &[RankedGenotypes], candidates: &[Allele]) -> Vec<GenotypeCombo> {
        let active = tables
            .iter()
            .enumerate()
            .filter(|(_, table)| !table.is_empty())
            .map(|(i, _)| i)
            .collect_vec();
        if active.is_empty() {
            return Vec::new();
        }
        let eligible = active
            .iter()
            .map(|&sample| self.eligible(&tables[sample]))
            .collect_vec();
        let budget = self.budget(&eligible);

        let mut combos = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier = BinaryHeap::new();

        let start = vec![0; active.len()];
        frontier.push(FrontierItem {
            score: OrderedFloat(Self::score(&start, &active, tables)),
            ranks: Reverse(start.clone()),
        });
        seen.insert(start);

        while let Some(FrontierItem {
            ranks: Reverse(ranks),
            ..
        }) = frontier.pop()
        {
            combos.push(GenotypeCombo::from_ranks(&active, &ranks, tables));
            if combos.len() >= budget {
                break;
            }

            for i in 0..ranks.len() {
                if ranks[i] + 1 >= eligible[i] {
                    continue;
                }
                let mut successor = ranks.clone();
                successor[i] += 1;
                let deviating = successor.iter().filter(|&&r| r > 0).count();
                if self.combo_step_max > 0 && deviating > self.combo_step_max {
                    continue;
                }
                if seen.insert(successor.clone()) {
                    frontier.push(FrontierItem {
                        score: OrderedFloat(Self::score(&successor, &active, tables)),
                        ranks: Reverse(successor),
                    });
                }
            }
        }
        debug!(
            "banded search visited {} of at most {} combinations",
            combos.len(),
            budget
        );

        let mut keys: HashSet<_> = combos.iter().map(|c| c.key()).collect();
        for allele in candidates.iter().unique() {
            let entries: Option<Vec<_>> = active
                .iter()
                .map(|&sample| {
                    tables[sample].homozygous_for(allele).map(|genotype| {
                        GenotypeComboEntry::new(
                            sample,
                            genotype,
                            tables[sample].likelihood(genotype),
                        )
                    })
                })
                .collect();
            if let Some(entries) = entries {
                let anchor = GenotypeCombo::new(entries, tables);
                if keys.insert(anchor.key()) {
                    combos.push(anchor);
                }
            } else {
                debug!(
                    "no homozygous genotype for allele {} in all samples",
                    allele
                );
            }
        }

        combos
    }
}
