// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Scoring of genotype combinations: per-sample data likelihoods, banded search over
//! joint assignments, the population prior and the normalized posterior.

pub mod combination;
pub mod likelihood;
pub mod posterior;
pub mod prior;

pub use combination::{BandedSearch, GenotypeCombo, GenotypeComboEntry};
pub use likelihood::{GenotypeLikelihood, RankedGenotypes, SampleLikelihoodModel};
pub use posterior::{GenotypeComboResult, GenotypeMarginal, Posterior, PosteriorAggregator};
pub use prior::{PopulationPrior, PriorProb};
