// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("invalid ploidy {ploidy}, must be at least 1")]
    InvalidPloidy { ploidy: u32 },
    #[error("no alleles given to enumerate genotypes of ploidy {ploidy}")]
    EmptyAlleleSet { ploidy: u32 },
    #[error("no genotype combinations to integrate over")]
    EmptyCandidateSet,
    #[error("invalid parameter {name}: {msg}")]
    InvalidParameter { name: String, msg: String },
    #[error("invalid allele: {msg}")]
    InvalidAllele { msg: String },
}

pub(crate) fn invalid_parameter(name: &str, msg: &str) -> Error {
    Error::InvalidParameter {
        name: name.to_owned(),
        msg: msg.to_owned(),
    }
}
