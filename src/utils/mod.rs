// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use bio::stats::{LogProb, Prob};

pub(crate) mod stats;

pub(crate) const NUMERICAL_EPSILON: f64 = 1e-3;

lazy_static! {
    /// Smallest positive normal probability in log space. Substituted for empty or
    /// non-finite log-space terms.
    pub static ref MIN_LOG_PROB: LogProb = LogProb(f64::MIN_POSITIVE.ln());
    pub(crate) static ref PROB_033: LogProb = LogProb::from(Prob(1.0 / 3.0));
}

/// Per-position bookkeeping of recovered numeric faults.
///
/// A fault is an empty log-sum-exp input or a non-finite intermediate value. Both are
/// replaced by `MIN_LOG_PROB` so that the position can still be completed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NumericFaults {
    count: usize,
}

impl NumericFaults {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn record(&mut self, context: &str) -> LogProb {
        self.count += 1;
        warn!(
            "numeric instability in {}: substituting minimum log probability",
            context
        );
        *MIN_LOG_PROB
    }

    /// Replace a non-finite value by `MIN_LOG_PROB`.
    pub fn sanitize(&mut self, prob: LogProb, context: &str) -> LogProb {
        if prob.is_finite() {
            prob
        } else {
            self.record(context)
        }
    }

    /// Log-sum-exp that never returns a non-finite value.
    pub fn ln_sum_exp(&mut self, probs: &[LogProb], context: &str) -> LogProb {
        if probs.is_empty() {
            return self.record(context);
        }
        let total = LogProb::ln_sum_exp(probs);
        self.sanitize(total, context)
    }
}
