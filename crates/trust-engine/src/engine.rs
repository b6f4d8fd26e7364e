//! Weighted synthesis of reliability signals into a trust decision.

use serde::{Deserialize, Serialize};
use tracing::debug;
use trust_core::{ComponentScores, TrustLabel, TrustReport, UncertaintyReport};

/// Ensemble variance at or above this counts as total disagreement.
const DISAGREEMENT_SCALE: f64 = 4.0;

/// Relative weights of the trust components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustWeights {
    pub uncertainty: f64,
    pub agreement: f64,
    pub ood: f64,
    pub calibration: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            uncertainty: 0.4,
            agreement: 0.3,
            ood: 0.2,
            calibration: 0.1,
        }
    }
}

/// Synthesizes multiple reliability signals into a single trust decision.
///
/// Stateless aside from its weight configuration: `compute` is a pure,
/// total, deterministic function of the uncertainty report.
#[derive(Debug, Clone, Default)]
pub struct TrustEngine {
    weights: TrustWeights,
}

impl TrustEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: TrustWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &TrustWeights {
        &self.weights
    }

    /// Calculates the 0-100 trust score, label, and recommendation.
    pub fn compute(&self, report: &UncertaintyReport) -> TrustReport {
        let disagreement = report.ensemble_disagreement.variance;
        let agreement_score = (1.0 - disagreement * DISAGREEMENT_SCALE).clamp(0.0, 1.0);
        let uncertainty_score = (1.0 - report.total_uncertainty_score).clamp(0.0, 1.0);
        let ood_score = report.distribution_similarity.p_value.clamp(0.0, 1.0);

        let final_score = agreement_score * self.weights.agreement
            + uncertainty_score * self.weights.uncertainty
            + ood_score * self.weights.ood;
        let trust_score = round2(final_score * 100.0);

        // The OOD guard on SAFE keeps a high raw score from overriding a
        // near-certain OOD finding.
        let trust_label = if trust_score > 80.0 && ood_score > 0.05 {
            TrustLabel::Safe
        } else if trust_score > 50.0 {
            TrustLabel::Review
        } else {
            TrustLabel::Unsafe
        };

        debug!(
            "Trust synthesis: agreement {:.4}, uncertainty {:.4}, ood {:.4} -> {} ({})",
            agreement_score,
            uncertainty_score,
            ood_score,
            trust_score,
            trust_label.as_str()
        );

        TrustReport {
            trust_score,
            trust_label,
            recommendation: trust_label.recommendation().to_string(),
            component_scores: ComponentScores {
                agreement: agreement_score,
                uncertainty: uncertainty_score,
                distribution_similarity: ood_score,
            },
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
