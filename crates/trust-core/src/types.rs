use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered mapping from feature name to value for a single input row.
///
/// Iteration order is deterministic (sorted by name), so the feature order
/// fixed at profile-fit time is reproduced identically on every query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// Positive-class probability from each ensemble member for one input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionBundle {
    members: BTreeMap<String, f64>,
}

impl PredictionBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, predictor: impl Into<String>, probability: f64) {
        self.members.insert(predictor.into(), probability);
    }

    pub fn get(&self, predictor: &str) -> Option<f64> {
        self.members.get(predictor).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.members.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn probabilities(&self) -> impl Iterator<Item = f64> + '_ {
        self.members.values().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FromIterator<(String, f64)> for PredictionBundle {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, f64)> for PredictionBundle {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// Variance of positive-class probability across the ensemble members.
///
/// High variance means the structurally different models disagree, which is
/// epistemic uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleDisagreement {
    pub variance: f64,
    pub mean: f64,
    pub raw_probs: PredictionBundle,
}

/// Variance of one model's probability across repeated stochastic passes on
/// the identical input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticUncertainty {
    pub variance: f64,
    pub mean: f64,
    pub num_passes: usize,
}

/// Per-feature drift of an input relative to the reference distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureZScore {
    pub z_score: f64,
    pub is_extreme: bool,
}

/// Multivariate similarity of one input to the reference distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSimilarity {
    pub mahalanobis_distance: f64,
    pub p_value: f64,
    pub is_ood: bool,
    pub per_feature_z_scores: BTreeMap<String, FeatureZScore>,
    pub description: String,
}

/// Aggregate of the three orthogonal uncertainty signals for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyReport {
    pub ensemble_disagreement: EnsembleDisagreement,
    pub mc_uncertainty: StochasticUncertainty,
    pub distribution_similarity: DistributionSimilarity,
    /// Combined uncertainty, always clamped to [0, 1].
    pub total_uncertainty_score: f64,
}

/// Three-valued trust decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLabel {
    Safe,
    Review,
    Unsafe,
}

impl TrustLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLabel::Safe => "SAFE",
            TrustLabel::Review => "REVIEW",
            TrustLabel::Unsafe => "UNSAFE",
        }
    }

    /// Fixed operator recommendation for this label.
    pub fn recommendation(&self) -> &'static str {
        match self {
            TrustLabel::Safe => "Automated decision recommended.",
            TrustLabel::Review => {
                "Human-in-the-loop review recommended due to moderate uncertainty."
            }
            TrustLabel::Unsafe => {
                "Prediction rejected. Extreme uncertainty or OOD detected. \
                 Manual intervention REQUIRED."
            }
        }
    }
}

/// Individual [0, 1] fractions that went into the trust score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub agreement: f64,
    pub uncertainty: f64,
    pub distribution_similarity: f64,
}

/// Final trust decision for one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustReport {
    /// 0-100, rounded to two decimals.
    pub trust_score: f64,
    pub trust_label: TrustLabel,
    pub recommendation: String,
    pub component_scores: ComponentScores,
}

/// One bin of the reliability (calibration) curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityBin {
    pub bin_index: usize,
    /// Mean predicted probability within the bin.
    pub confidence: f64,
    /// Observed positive rate within the bin.
    pub accuracy: f64,
    pub count: usize,
}

/// Calibration quality of a batch of historical predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Expected Calibration Error (lower is better).
    pub ece: f64,
    /// Mean squared error between probability and outcome.
    pub brier_score: f64,
    /// `1 - min(5 * ECE, 1)`: linear deflation that saturates at zero once
    /// ECE exceeds 0.2.
    pub calibration_trust_factor: f64,
    /// True only for systematic over-prediction, not mere noise.
    pub is_overconfident: bool,
    pub sample_size: usize,
    pub reliability_curve: Vec<ReliabilityBin>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_order_is_deterministic() {
        let mut a = FeatureVector::new();
        a.insert("income", 52_000.0);
        a.insert("age", 41.0);

        let b: FeatureVector = [("age", 41.0), ("income", 52_000.0)]
            .into_iter()
            .collect();

        assert_eq!(a, b);
        assert_eq!(a.names().collect::<Vec<_>>(), vec!["age", "income"]);
    }

    #[test]
    fn test_trust_label_serializes_as_screaming_case() {
        let json = serde_json::to_string(&TrustLabel::Unsafe).unwrap();
        assert_eq!(json, "\"UNSAFE\"");

        let label: TrustLabel = serde_json::from_str("\"SAFE\"").unwrap();
        assert_eq!(label, TrustLabel::Safe);
        assert_eq!(label.as_str(), "SAFE");
    }

    #[test]
    fn test_bundle_accessors() {
        let bundle: PredictionBundle = [("rf", 0.8), ("lr", 0.6), ("nn", 0.7)]
            .into_iter()
            .collect();

        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.get("rf"), Some(0.8));
        assert_eq!(bundle.probabilities().count(), 3);
    }
}
