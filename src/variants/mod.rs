// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str;

use strum_macros::{Display, EnumString, IntoStaticStr};

pub mod evidence;
pub mod genotype;
pub mod model;

pub(crate) const NUCLEOTIDES: [u8; 4] = [b'A', b'T', b'G', b'C'];

#[derive(
    Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
)]
pub enum AlleleKind {
    #[strum(serialize = "REF")]
    Reference,
    #[strum(serialize = "SNV")]
    Snv,
    #[strum(serialize = "INS")]
    Insertion,
    #[strum(serialize = "DEL")]
    Deletion,
    #[strum(serialize = "MNV")]
    Mnv,
}

/// An observed or candidate allele at a position.
///
/// Two alleles are the same allele if they describe the same sequence change. Reference,
/// SNV and MNV alleles are identified by their sequence, insertions by their inserted
/// sequence and deletions by their length, such that an observation of the reference base
/// matches the reference candidate regardless of how the evidence labelled it.
#[derive(Debug, Clone, Serialize, Deserialize, Getters, CopyGetters)]
pub struct Allele {
    #[getset(get_copy = "pub")]
    kind: AlleleKind,
    #[getset(get = "pub")]
    sequence: Vec<u8>,
    #[getset(get_copy = "pub")]
    length: u32,
}

impl Allele {
    pub fn reference(sequence: &[u8]) -> Self {
        Allele {
            kind: AlleleKind::Reference,
            sequence: sequence.to_ascii_uppercase(),
            length: sequence.len() as u32,
        }
    }

    pub fn snv(base: u8) -> Self {
        Allele {
            kind: AlleleKind::Snv,
            sequence: vec![base.to_ascii_uppercase()],
            length: 1,
        }
    }

    pub fn mnv(sequence: &[u8]) -> Self {
        Allele {
            kind: AlleleKind::Mnv,
            sequence: sequence.to_ascii_uppercase(),
            length: sequence.len() as u32,
        }
    }

    pub fn insertion(sequence: &[u8]) -> Self {
        Allele {
            kind: AlleleKind::Insertion,
            sequence: sequence.to_ascii_uppercase(),
            length: sequence.len() as u32,
        }
    }

    pub fn deletion(length: u32) -> Self {
        Allele {
            kind: AlleleKind::Deletion,
            sequence: Vec::new(),
            length,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.kind == AlleleKind::Reference
    }

    /// Whether the allele consists of A, C, G and T only.
    pub fn is_unambiguous_nucleotide(&self) -> bool {
        !self.sequence.is_empty() && self.sequence.iter().all(|b| NUCLEOTIDES.contains(b))
    }

    /// The reference base together with the three other nucleotides as substitutions.
    pub fn canonical_alleles(reference: &Allele) -> Vec<Allele> {
        let mut alleles = vec![reference.clone()];
        alleles.extend(
            NUCLEOTIDES
                .iter()
                .filter(|&&base| reference.sequence != [base])
                .map(|&base| Allele::snv(base)),
        );
        alleles
    }

    fn identity(&self) -> (u8, &[u8], u32) {
        match self.kind {
            AlleleKind::Reference | AlleleKind::Snv | AlleleKind::Mnv => {
                (0, self.sequence.as_slice(), 0)
            }
            AlleleKind::Insertion => (1, self.sequence.as_slice(), 0),
            AlleleKind::Deletion => (2, &[][..], self.length),
        }
    }
}

impl PartialEq for Allele {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Allele {}

impl Hash for Allele {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state)
    }
}

impl Ord for Allele {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl PartialOrd for Allele {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seq = str::from_utf8(&self.sequence).unwrap_or("?");
        match self.kind {
            AlleleKind::Reference | AlleleKind::Snv | AlleleKind::Mnv => write!(f, "{}", seq),
            AlleleKind::Insertion => write!(f, "I{}", seq),
            AlleleKind::Deletion => write!(f, "D{}", self.length),
        }
    }
}
