// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use itertools::Itertools;

use crate::errors;
use crate::variants::Allele;

/// An unordered multiset of alleles, one per genome copy.
///
/// Alleles are kept in canonical order, such that two genotypes are equal iff they contain
/// the same alleles with the same multiplicities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Genotype {
    alleles: Vec<Allele>,
}

impl Genotype {
    pub fn new(mut alleles: Vec<Allele>) -> Self {
        alleles.sort();
        Genotype { alleles }
    }

    pub fn alleles(&self) -> &[Allele] {
        &self.alleles
    }

    pub fn ploidy(&self) -> u32 {
        self.alleles.len() as u32
    }

    pub fn is_homozygous(&self) -> bool {
        self.alleles.iter().all_equal()
    }

    /// The single allele this genotype consists of, if it is homozygous.
    pub fn homozygous_allele(&self) -> Option<&Allele> {
        if !self.alleles.is_empty() && self.is_homozygous() {
            self.alleles.first()
        } else {
            None
        }
    }

    pub fn count(&self, allele: &Allele) -> u32 {
        self.alleles.iter().filter(|a| *a == allele).count() as u32
    }

    /// Distinct alleles with their number of copies, in canonical order.
    pub fn allele_counts(&self) -> impl Iterator<Item = (&Allele, u32)> {
        self.alleles
            .iter()
            .dedup_with_count()
            .map(|(count, allele)| (allele, count as u32))
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alleles.iter().join("/"))
    }
}

/// Enumerate all distinct genotypes of the given ploidy over the given alleles.
///
/// The result contains C(n + ploidy - 1, ploidy) genotypes for n distinct alleles, in
/// lexicographic order of allele indices (e.g. 0/0, 0/1, 0/2, 1/1, 1/2, 2/2).
/// Ploidy 0 over no alleles yields no genotypes. Otherwise, ploidy 0 or an empty allele
/// set is an error.
pub fn enumerate(ploidy: u32, alleles: &[Allele]) -> Result<Vec<Genotype>> {
    match (ploidy, alleles.is_empty()) {
        (0, true) => return Ok(Vec::new()),
        (0, false) => return Err(errors::Error::InvalidPloidy { ploidy }.into()),
        (_, true) => return Err(errors::Error::EmptyAlleleSet { ploidy }.into()),
        _ => (),
    }
    let alleles = alleles.iter().unique().collect_vec();

    Ok((0..alleles.len())
        .combinations_with_replacement(ploidy as usize)
        .map(|indices| Genotype::new(indices.into_iter().map(|i| alleles[i].clone()).collect()))
        .collect())
}

/// Genotype lists by ploidy and candidate allele set, shared across positions.
///
/// Entries are inserted once and never invalidated, so concurrent readers only contend
/// on insertion.
#[derive(Debug, Default)]
pub struct GenotypeCache {
    inner: RwLock<HashMap<(u32, Vec<Allele>), Arc<Vec<Genotype>>>>,
}

impl GenotypeCache {
    pub fn new() -> Self {
        GenotypeCache::default()
    }

    pub fn genotypes(&self, ploidy: u32, alleles: &[Allele]) -> Result<Arc<Vec<Genotype>>> {
        let key = (ploidy, alleles.to_vec());
        if let Some(genotypes) = self
            .inner
            .read()
            .expect("bug: genotype cache lock poisoned")
            .get(&key)
        {
            return Ok(Arc::clone(genotypes));
        }

        debug!("enumerating genotypes for ploidy {}", ploidy);
        let genotypes = Arc::new(enumerate(ploidy, alleles)?);
        let mut inner = self
            .inner
            .write()
            .expect("bug: genotype cache lock poisoned");
        Ok(Arc::clone(inner.entry(key).or_insert(genotypes)))
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("bug: genotype cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
