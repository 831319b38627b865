// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Joint multi-sample genotyping at single positions.
//!
//! For every sample, all genotypes of the sample's ploidy over the candidate alleles are
//! scored against the sample's allele observations. A banded search then assembles joint
//! genotype combinations around the most likely one, each combination is scored with a
//! population prior, and the resulting posterior yields per-sample marginal genotype
//! probabilities and the probability that the samples carry any variation at all.

#[macro_use]
extern crate log;
#[macro_use]
extern crate approx;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate derive_builder;

pub mod calling;
pub mod constants;
pub mod errors;
pub mod utils;
pub mod variants;

pub use crate::calling::{
    Caller, CallerBuilder, Parameters, ParametersBuilder, SampleCall, Site, SiteCall,
    SiteOutcome, SkipReason,
};
pub use crate::utils::NumericFaults;
pub use crate::variants::evidence::{Observation, Sample};
pub use crate::variants::genotype::{Genotype, GenotypeCache};
pub use crate::variants::Allele;
