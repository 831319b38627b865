//! stats.rs
//!
//! Combinatorial helpers for the population prior and quality conversion.

use bio::stats::{LogProb, PHREDProb, Prob};
use statrs::function::factorial::ln_factorial;
use statrs::function::gamma::ln_gamma;

/// Convert PHRED-scaled probability to linear probability.
pub(crate) fn phred_to_prob(phred: f64) -> f64 {
    *Prob::from(PHREDProb(phred))
}

/// Probability that a call is wrong, given its PHRED scaled base and mapping quality.
///
/// The call is correct only if both the base call and the mapping are correct.
pub(crate) fn prob_call_error(base_qual: u8, map_qual: u8) -> Prob {
    let base_correct = 1.0 - phred_to_prob(base_qual as f64);
    let map_correct = 1.0 - phred_to_prob(map_qual as f64);
    Prob(1.0 - base_correct * map_correct)
}

pub(crate) fn ln_fact(n: u32) -> f64 {
    ln_factorial(n as u64)
}

/// ln(θ (θ+1) ... (θ+n-1)), the rising factorial used by the Ewens sampling formula.
pub(crate) fn ln_rising_factorial(theta: f64, n: u32) -> f64 {
    if n == 0 {
        0.0
    } else {
        ln_gamma(theta + n as f64) - ln_gamma(theta)
    }
}

/// Multinomial coefficient n! / (k_1! ... k_m!) in log space.
pub(crate) fn ln_multinomial_coefficient(counts: &[u32]) -> LogProb {
    let n: u32 = counts.iter().sum();
    LogProb(ln_fact(n) - counts.iter().map(|&k| ln_fact(k)).sum::<f64>())
}
