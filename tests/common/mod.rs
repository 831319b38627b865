use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use anyhow::Result;
use serde_derive::Deserialize;

use bayescombo::{Allele, Caller, CallerBuilder, Observation, Parameters, Sample, Site, SiteOutcome};

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Observations of a sample, given as one base per read with shared qualities.
#[derive(Deserialize, Debug)]
pub(crate) struct TestSample {
    name: String,
    #[serde(default)]
    ploidy: Option<u32>,
    bases: String,
    #[serde(default = "default_qual")]
    base_qual: u8,
    #[serde(default = "default_qual")]
    map_qual: u8,
}

fn default_qual() -> u8 {
    30
}

#[derive(Deserialize, Debug)]
pub(crate) struct Expected {
    #[serde(default)]
    skipped: Option<String>,
    #[serde(default)]
    p_var_min: Option<f64>,
    #[serde(default)]
    p_var_max: Option<f64>,
    #[serde(default)]
    is_variant: Option<bool>,
    /// Genotype of the reported combination per sample, e.g. "A/T".
    #[serde(default)]
    genotypes: BTreeMap<String, String>,
    /// Genotype with the highest marginal posterior per sample.
    #[serde(default)]
    top_marginals: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Testcase {
    #[serde(default)]
    parameters: Option<Parameters>,
    reference: String,
    #[serde(default)]
    alternates: Vec<String>,
    samples: Vec<TestSample>,
    expected: Expected,
}

pub(crate) fn load_testcase(path: impl AsRef<Path>) -> Result<Testcase> {
    let reader = File::open(path.as_ref().join("testcase.yaml"))?;
    Ok(serde_yaml::from_reader(reader)?)
}

pub(crate) fn sample(name: &str, ploidy: Option<u32>, bases: &str, qual: u8) -> Sample {
    Sample::new(
        name.to_owned(),
        ploidy,
        bases
            .bytes()
            .map(|b| Observation::new(Allele::snv(b), qual, 60))
            .collect(),
    )
}

pub(crate) fn site(reference: &str, alternates: &[&str], samples: Vec<Sample>) -> Site {
    Site::new(
        "chr1".to_owned(),
        1000,
        Allele::reference(reference.as_bytes()),
        alternates
            .iter()
            .map(|alt| Allele::snv(alt.as_bytes()[0]))
            .collect(),
        samples,
    )
}

pub(crate) fn caller(parameters: Parameters) -> Caller {
    CallerBuilder::default()
        .parameters(parameters)
        .build()
        .unwrap()
}

impl Testcase {
    pub(crate) fn site(&self) -> Site {
        let samples = self
            .samples
            .iter()
            .map(|s| {
                Sample::new(
                    s.name.clone(),
                    s.ploidy,
                    s.bases
                        .bytes()
                        .map(|b| Observation::new(Allele::snv(b), s.base_qual, s.map_qual))
                        .collect(),
                )
            })
            .collect();
        let alternates = self
            .alternates
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>();
        site(&self.reference, &alternates, samples)
    }

    pub(crate) fn run(&self) -> Result<SiteOutcome> {
        init_logger();
        let parameters = self.parameters.clone().unwrap_or_default();
        parameters.validate()?;
        caller(parameters).call_site(&self.site())
    }

    pub(crate) fn check(&self, outcome: &SiteOutcome) {
        if let Some(reason) = &self.expected.skipped {
            assert_eq!(
                outcome.skip_reason().map(|r| r.to_string()).as_ref(),
                Some(reason),
                "expected site to be skipped"
            );
            return;
        }

        let call = outcome.call().expect("expected site to be called");
        let p_var = *call.p_var();
        if let Some(min) = self.expected.p_var_min {
            assert!(p_var >= min, "pVar {} below {}", p_var, min);
        }
        if let Some(max) = self.expected.p_var_max {
            assert!(p_var <= max, "pVar {} above {}", p_var, max);
        }
        if let Some(is_variant) = self.expected.is_variant {
            assert_eq!(call.is_variant(), is_variant);
        }
        for (name, genotype) in &self.expected.genotypes {
            let sample = call
                .sample(name)
                .unwrap_or_else(|| panic!("sample {} not called", name));
            assert_eq!(&sample.genotype().to_string(), genotype, "sample {}", name);
        }
        for (name, genotype) in &self.expected.top_marginals {
            let sample = call
                .sample(name)
                .unwrap_or_else(|| panic!("sample {} not called", name));
            let (top, _) = &sample.marginals()[0];
            assert_eq!(&top.to_string(), genotype, "sample {}", name);
        }
    }
}
