//! Calibration assessment for historical prediction batches.
//!
//! Raw model probabilities are often overconfident (a model says 99% but is
//! wrong a fifth of the time). Measuring how well predicted probabilities
//! match observed outcome frequencies lets trust be deflated for models that
//! are known to overstate their confidence.

use statrs::statistics::Statistics;
use tracing::debug;
use trust_core::{CalibrationReport, ReliabilityBin, TrustError, TrustResult};

/// ECE above this is treated as significant miscalibration when checking for
/// overconfidence.
const MISCALIBRATION_ECE: f64 = 0.1;

/// Slope of the linear trust deflation; saturates at zero once ECE exceeds
/// 1 / ECE_DEFLATION_SLOPE.
const ECE_DEFLATION_SLOPE: f64 = 5.0;

/// Measures whether predicted probabilities match observed outcome
/// frequencies over a batch of (outcome, probability) pairs.
#[derive(Debug, Clone)]
pub struct CalibrationAssessor {
    num_bins: usize,
}

impl Default for CalibrationAssessor {
    fn default() -> Self {
        Self::new(10)
    }
}

impl CalibrationAssessor {
    /// Creates an assessor partitioning probability space into `num_bins`
    /// equal-width bins.
    ///
    /// ECE is an approximation of the true calibration gap and is sensitive
    /// to the bin count, so `num_bins` is a tunable parameter rather than a
    /// constant.
    pub fn new(num_bins: usize) -> Self {
        Self { num_bins }
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Expected Calibration Error: the count-weighted average gap between
    /// per-bin confidence and per-bin accuracy.
    pub fn compute_ece(&self, outcomes: &[bool], probabilities: &[f64]) -> TrustResult<f64> {
        self.validate(outcomes, probabilities)?;

        let ece: f64 = self
            .bins(outcomes, probabilities)
            .iter()
            .map(|bin| bin.count as f64 * (bin.accuracy - bin.confidence).abs())
            .sum::<f64>()
            / probabilities.len() as f64;
        Ok(ece)
    }

    /// Aggregates calibration metrics for one historical batch.
    pub fn evaluate(
        &self,
        outcomes: &[bool],
        probabilities: &[f64],
    ) -> TrustResult<CalibrationReport> {
        self.validate(outcomes, probabilities)?;

        let curve = self.bins(outcomes, probabilities);
        let n = probabilities.len() as f64;
        let ece = curve
            .iter()
            .map(|bin| bin.count as f64 * (bin.accuracy - bin.confidence).abs())
            .sum::<f64>()
            / n;

        let brier_score = outcomes
            .iter()
            .zip(probabilities)
            .map(|(outcome, prob)| {
                let y = if *outcome { 1.0 } else { 0.0 };
                (prob - y).powi(2)
            })
            .sum::<f64>()
            / n;

        let mean_probability = probabilities.mean();
        let mean_outcome = outcomes.iter().filter(|o| **o).count() as f64 / n;

        // Systematic over-prediction, not just noise: the model must be both
        // miscalibrated and predicting above the observed base rate.
        let is_overconfident =
            ece > MISCALIBRATION_ECE && mean_probability > mean_outcome;

        let calibration_trust_factor = 1.0 - (ece * ECE_DEFLATION_SLOPE).min(1.0);

        debug!(
            "Calibration batch of {} samples: ECE {:.4}, Brier {:.4}",
            probabilities.len(),
            ece,
            brier_score
        );

        Ok(CalibrationReport {
            ece,
            brier_score,
            calibration_trust_factor,
            is_overconfident,
            sample_size: probabilities.len(),
            reliability_curve: curve,
        })
    }

    /// Ordered per-bin points for a calibration plot; empty bins are
    /// omitted. Recomputable any number of times with identical results.
    pub fn reliability_curve(
        &self,
        outcomes: &[bool],
        probabilities: &[f64],
    ) -> TrustResult<Vec<ReliabilityBin>> {
        self.validate(outcomes, probabilities)?;
        Ok(self.bins(outcomes, probabilities))
    }

    /// Partitions samples into half-open bins `(lo, hi]` over (0, 1].
    fn bins(&self, outcomes: &[bool], probabilities: &[f64]) -> Vec<ReliabilityBin> {
        let width = 1.0 / self.num_bins as f64;
        let mut curve = Vec::new();

        for i in 0..self.num_bins {
            let lo = i as f64 * width;
            let hi = (i + 1) as f64 * width;

            let mut count = 0usize;
            let mut prob_sum = 0.0;
            let mut positive = 0usize;
            for (outcome, prob) in outcomes.iter().zip(probabilities) {
                if *prob > lo && *prob <= hi {
                    count += 1;
                    prob_sum += prob;
                    if *outcome {
                        positive += 1;
                    }
                }
            }

            if count > 0 {
                curve.push(ReliabilityBin {
                    bin_index: i,
                    confidence: prob_sum / count as f64,
                    accuracy: positive as f64 / count as f64,
                    count,
                });
            }
        }

        curve
    }

    fn validate(&self, outcomes: &[bool], probabilities: &[f64]) -> TrustResult<()> {
        if self.num_bins == 0 {
            return Err(TrustError::Schema("num_bins must be positive".to_string()));
        }
        if outcomes.is_empty() {
            return Err(TrustError::Schema(
                "calibration batch is empty".to_string(),
            ));
        }
        if outcomes.len() != probabilities.len() {
            return Err(TrustError::Schema(format!(
                "outcome/probability length mismatch: {} vs {}",
                outcomes.len(),
                probabilities.len()
            )));
        }
        for prob in probabilities {
            if !(0.0..=1.0).contains(prob) {
                return Err(TrustError::Schema(format!(
                    "probability {prob} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}
