//! Quantifies the orthogonal uncertainty signals for a single prediction:
//!
//! 1. Ensemble disagreement (epistemic): variance across structurally
//!    different models.
//! 2. Stochastic-pass variance: variance of one model across repeated
//!    randomized evaluations, approximating its posterior predictive
//!    variance.
//! 3. Distribution similarity: feature-space outlier-ness of the input.

use std::sync::Arc;

use distribution_profiler::DistributionProfiler;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;
use trust_core::{
    EnsembleDisagreement, FeatureVector, PredictionSource, StochasticUncertainty, TrustError,
    TrustResult, UncertaintyReport,
};

/// Default number of stochastic passes; trades estimation noise for latency.
pub const DEFAULT_NUM_PASSES: usize = 50;

/// Relative weights of the fused uncertainty signals.
///
/// Declared constants, chosen so ensemble disagreement dominates; callers
/// may override them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyWeights {
    pub ensemble: f64,
    pub stochastic: f64,
    pub ood: f64,
}

impl Default for UncertaintyWeights {
    fn default() -> Self {
        Self {
            ensemble: 2.0,
            stochastic: 1.5,
            ood: 0.5,
        }
    }
}

/// Combines a prediction source and a fitted distribution profiler into a
/// structured uncertainty report per input.
pub struct UncertaintyEstimator {
    source: Arc<dyn PredictionSource>,
    profiler: Arc<DistributionProfiler>,
    weights: UncertaintyWeights,
    num_passes: usize,
}

impl UncertaintyEstimator {
    pub fn new(source: Arc<dyn PredictionSource>, profiler: Arc<DistributionProfiler>) -> Self {
        Self {
            source,
            profiler,
            weights: UncertaintyWeights::default(),
            num_passes: DEFAULT_NUM_PASSES,
        }
    }

    pub fn with_weights(mut self, weights: UncertaintyWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_num_passes(mut self, num_passes: usize) -> Self {
        self.num_passes = num_passes;
        self
    }

    pub fn weights(&self) -> &UncertaintyWeights {
        &self.weights
    }

    /// Variance and mean of the positive-class probability across all
    /// ensemble members. Zero variance (exact agreement) is a valid
    /// degenerate state, not an error.
    pub fn ensemble_disagreement(
        &self,
        features: &FeatureVector,
    ) -> TrustResult<EnsembleDisagreement> {
        let bundle = self.source.predict_all(features)?;
        if bundle.is_empty() {
            return Err(TrustError::Upstream(
                "prediction source returned an empty ensemble bundle".to_string(),
            ));
        }
        for (predictor, prob) in bundle.iter() {
            if !(0.0..=1.0).contains(&prob) {
                return Err(TrustError::Upstream(format!(
                    "member '{predictor}' produced probability {prob} outside [0, 1]"
                )));
            }
        }

        let probs: Vec<f64> = bundle.probabilities().collect();
        let probs: &[f64] = &probs;
        Ok(EnsembleDisagreement {
            variance: probs.population_variance(),
            mean: probs.mean(),
            raw_probs: bundle,
        })
    }

    /// Variance and mean of one stochastic-capable predictor over
    /// `num_passes` randomized evaluations of the identical input.
    ///
    /// A non-finite pass probability is a data-quality fault and is
    /// surfaced, never averaged away.
    pub fn stochastic_uncertainty(
        &self,
        features: &FeatureVector,
        num_passes: usize,
    ) -> TrustResult<StochasticUncertainty> {
        let samples = self.source.stochastic_passes(features, num_passes)?;
        if samples.len() != num_passes {
            return Err(TrustError::Upstream(format!(
                "expected {} stochastic passes, got {}",
                num_passes,
                samples.len()
            )));
        }
        for prob in &samples {
            if !(0.0..=1.0).contains(prob) {
                return Err(TrustError::Upstream(format!(
                    "stochastic pass produced probability {prob} outside [0, 1]"
                )));
            }
        }

        let samples: &[f64] = &samples;
        Ok(StochasticUncertainty {
            variance: samples.population_variance(),
            mean: samples.mean(),
            num_passes,
        })
    }

    /// Aggregates all uncertainty signals into one report with a combined
    /// score clamped to [0, 1].
    ///
    /// An upstream failure propagates unchanged: there is no meaningful
    /// uncertainty estimate without predictions.
    pub fn total_uncertainty(&self, features: &FeatureVector) -> TrustResult<UncertaintyReport> {
        let ensemble = self.ensemble_disagreement(features)?;
        let mc = self.stochastic_uncertainty(features, self.num_passes)?;
        let similarity = self.profiler.similarity(features)?;

        let combined = ensemble.variance * self.weights.ensemble
            + mc.variance * self.weights.stochastic
            + (1.0 - similarity.p_value) * self.weights.ood;
        let total_uncertainty_score = combined.clamp(0.0, 1.0);

        debug!(
            "Uncertainty signals: ensemble variance {:.4}, stochastic variance {:.4}, \
             p-value {:.4}, combined {:.4}",
            ensemble.variance, mc.variance, similarity.p_value, total_uncertainty_score
        );

        Ok(UncertaintyReport {
            ensemble_disagreement: ensemble,
            mc_uncertainty: mc,
            distribution_similarity: similarity,
            total_uncertainty_score,
        })
    }
}
