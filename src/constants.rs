// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

/// Name of the haploid pseudo-sample that carries the reference allele.
pub const REFERENCE_SAMPLE_NAME: &str = "reference";
pub(crate) const REFERENCE_SAMPLE_PLOIDY: u32 = 1;
/// PHRED scaled base and mapping quality of the single reference pseudo-sample
/// observation.
pub(crate) const REFERENCE_SAMPLE_QUAL: u8 = 60;
