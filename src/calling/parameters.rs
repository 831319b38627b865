// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::errors;

/// Tunable parameters of the genotyping engine.
///
/// Parameters can be assembled with `ParametersBuilder` or loaded from YAML. Omitted
/// values fall back to the defaults, and both ways validate the result.
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize, CopyGetters)]
#[builder(pattern = "owned", default, build_fn(private, name = "build_unvalidated"))]
#[serde(default, deny_unknown_fields)]
#[getset(get_copy = "pub")]
pub struct Parameters {
    /// Population mutation rate of the Ewens prior.
    theta: f64,
    /// Minimum probability of variation to report a site as variant.
    pvl: f64,
    /// Number of top ranked genotypes per sample that are eligible for combinations.
    bandwidth: usize,
    /// Genotypes within this log likelihood distance of a sample's best are eligible
    /// as well.
    band_threshold: f64,
    /// Maximum number of samples deviating from their best genotype in one combination
    /// (0 means no limit).
    combo_step_max: usize,
    /// Maximum number of combinations to integrate over (0 means no limit).
    posterior_integration_depth: usize,
    pooled: bool,
    diffusion_prior_scalar: f64,
    /// Dependence between reads of one sample, between 0 (fully dependent) and 1
    /// (independent).
    read_dependence_factor: f64,
    /// Ploidy of samples that do not specify their own.
    default_ploidy: u32,
    use_reference_sample: bool,
    force_canonical_alleles: bool,
    /// Minimum number of observations of some alternate allele in at least one sample.
    /// Together with `min_alt_fraction` at 0, sites are not filtered by alternate support.
    min_alt_count: usize,
    min_alt_fraction: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            theta: 0.001,
            pvl: 0.0,
            bandwidth: 2,
            band_threshold: 0.0,
            combo_step_max: 1,
            posterior_integration_depth: 0,
            pooled: false,
            diffusion_prior_scalar: 0.0,
            read_dependence_factor: 0.9,
            default_ploidy: 2,
            use_reference_sample: false,
            force_canonical_alleles: false,
            min_alt_count: 0,
            min_alt_fraction: 0.0,
        }
    }
}

impl ParametersBuilder {
    pub fn build(self) -> Result<Parameters> {
        let parameters = self.build_unvalidated()?;
        parameters.validate()?;
        Ok(parameters)
    }
}

impl Parameters {
    pub fn from_yaml<R: Read>(reader: R) -> Result<Self> {
        let parameters: Parameters =
            serde_yaml::from_reader(reader).context("invalid parameter definition")?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open parameter file {}", path.display()))?;
        Parameters::from_yaml(file)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |name: &str, msg: &str| -> Result<()> {
            Err(errors::invalid_parameter(name, msg).into())
        };

        if !(self.theta > 0.0) || !self.theta.is_finite() {
            return fail("theta", "must be a positive number");
        }
        if !(0.0..=1.0).contains(&self.pvl) {
            return fail("pvl", "must be a probability");
        }
        if self.bandwidth == 0 {
            return fail("bandwidth", "must be at least 1");
        }
        if !(self.band_threshold >= 0.0) {
            return fail("band_threshold", "must not be negative");
        }
        if !(self.diffusion_prior_scalar >= 0.0) || !self.diffusion_prior_scalar.is_finite() {
            return fail("diffusion_prior_scalar", "must not be negative");
        }
        if !(0.0..=1.0).contains(&self.read_dependence_factor) {
            return fail("read_dependence_factor", "must be between 0 and 1");
        }
        if self.default_ploidy == 0 {
            return Err(errors::Error::InvalidPloidy {
                ploidy: self.default_ploidy,
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.min_alt_fraction) {
            return fail("min_alt_fraction", "must be between 0 and 1");
        }
        Ok(())
    }
}
