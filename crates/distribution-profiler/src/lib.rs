//! Statistical profiling of a reference feature distribution and
//! out-of-distribution (OOD) detection for new inputs.
//!
//! Model performance is only guaranteed on data that resembles what the
//! model was validated on. Scoring an input's multivariate similarity to the
//! reference distribution lets the trust engine deflate trust before the
//! prediction itself is ever inspected.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::statistics::Statistics;
use tracing::info;
use trust_core::{
    DistributionSimilarity, FeatureVector, FeatureZScore, TrustError, TrustResult,
};

/// Guard against division by zero on constant features.
const EPS: f64 = 1e-9;

/// Default p-value threshold below which an input is declared OOD.
pub const DEFAULT_OOD_ALPHA: f64 = 0.05;

/// Z-score above which a single feature is flagged as extreme.
const EXTREME_Z: f64 = 3.0;

/// Descriptive statistics for one reference feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
}

/// Fitted representation of one reference dataset.
///
/// Immutable once fit. Created by an offline fitting step, persisted, and
/// loaded read-only at serving time; it can be shared freely across
/// concurrent requests. The inverse covariance is stored row-major so the
/// serialized form carries only portable scalars and arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionProfile {
    feature_names: Vec<String>,
    feature_stats: BTreeMap<String, FeatureStats>,
    scaler_means: Vec<f64>,
    scaler_scales: Vec<f64>,
    mean_scaled: Vec<f64>,
    inv_cov: Vec<Vec<f64>>,
}

impl DistributionProfile {
    /// Profiles a non-empty table of schema-consistent feature rows.
    ///
    /// Computes per-feature descriptive statistics, the normalization
    /// transform, and the pseudo-inverse of the covariance of the normalized
    /// rows. The pseudo-inverse (SVD-backed) tolerates rank-deficient
    /// covariance from correlated or constant features.
    pub fn fit(rows: &[FeatureVector]) -> TrustResult<Self> {
        if rows.is_empty() {
            return Err(TrustError::Schema("reference table is empty".to_string()));
        }

        let feature_names: Vec<String> = rows[0].names().map(String::from).collect();
        if feature_names.is_empty() {
            return Err(TrustError::Schema(
                "reference table has no features".to_string(),
            ));
        }

        let n = rows.len();
        let k = feature_names.len();

        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(n); k];
        for row in rows {
            let values = ordered_values(&feature_names, row)?;
            for (col, value) in columns.iter_mut().zip(values) {
                col.push(value);
            }
        }

        let mut feature_stats = BTreeMap::new();
        let mut scaler_means = Vec::with_capacity(k);
        let mut scaler_scales = Vec::with_capacity(k);
        for (name, col) in feature_names.iter().zip(&columns) {
            let col: &[f64] = col;
            let mut sorted = col.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

            feature_stats.insert(
                name.clone(),
                FeatureStats {
                    mean: col.mean(),
                    std: sample_std(col),
                    min: sorted[0],
                    max: sorted[sorted.len() - 1],
                    q1: quantile_sorted(&sorted, 0.25),
                    q3: quantile_sorted(&sorted, 0.75),
                },
            );

            let scale = col.population_std_dev();
            scaler_means.push(col.mean());
            scaler_scales.push(if scale > EPS { scale } else { 1.0 });
        }

        // Normalize, then profile the multivariate shape of the scaled data.
        let scaled: Vec<Vec<f64>> = (0..n)
            .map(|r| {
                (0..k)
                    .map(|c| (columns[c][r] - scaler_means[c]) / scaler_scales[c])
                    .collect()
            })
            .collect();

        let mean_scaled: Vec<f64> = (0..k)
            .map(|c| scaled.iter().map(|row| row[c]).sum::<f64>() / n as f64)
            .collect();

        let denom = (n - 1).max(1) as f64;
        let cov = DMatrix::from_fn(k, k, |i, j| {
            scaled
                .iter()
                .map(|row| (row[i] - mean_scaled[i]) * (row[j] - mean_scaled[j]))
                .sum::<f64>()
                / denom
        });

        let inv = cov
            .pseudo_inverse(EPS)
            .unwrap_or_else(|_| DMatrix::zeros(k, k));
        let inv_cov: Vec<Vec<f64>> = (0..k)
            .map(|i| (0..k).map(|j| inv[(i, j)]).collect())
            .collect();

        info!(
            "Distribution profiling complete for {} features ({} reference rows)",
            k, n
        );

        Ok(Self {
            feature_names,
            feature_stats,
            scaler_means,
            scaler_scales,
            mean_scaled,
            inv_cov,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn feature_stats(&self) -> &BTreeMap<String, FeatureStats> {
        &self.feature_stats
    }

    /// Scores how similar an input is to the reference distribution.
    ///
    /// The squared Mahalanobis distance of an in-distribution point follows
    /// a chi-squared distribution with one degree of freedom per feature;
    /// the one-sided tail probability is the similarity score. Larger
    /// distance means smaller p-value means more anomalous.
    pub fn similarity(
        &self,
        input: &FeatureVector,
        ood_alpha: f64,
    ) -> TrustResult<DistributionSimilarity> {
        let values = ordered_values(&self.feature_names, input)?;
        let k = self.feature_names.len();

        let delta: Vec<f64> = (0..k)
            .map(|c| {
                (values[c] - self.scaler_means[c]) / self.scaler_scales[c] - self.mean_scaled[c]
            })
            .collect();

        let mut d_squared = 0.0;
        for i in 0..k {
            for j in 0..k {
                d_squared += delta[i] * self.inv_cov[i][j] * delta[j];
            }
        }
        // Floating-point noise can push a degenerate quadratic form slightly
        // negative.
        let d_squared = d_squared.max(0.0);
        let mahalanobis_distance = d_squared.sqrt();

        let p_value = match ChiSquared::new(k as f64) {
            Ok(chi) => (1.0 - chi.cdf(d_squared)).clamp(0.0, 1.0),
            Err(_) => 0.0,
        };

        let mut per_feature_z_scores = BTreeMap::new();
        for (name, value) in self.feature_names.iter().zip(&values) {
            let stats = &self.feature_stats[name];
            let z_score = (value - stats.mean).abs() / (stats.std + EPS);
            per_feature_z_scores.insert(
                name.clone(),
                FeatureZScore {
                    z_score,
                    is_extreme: z_score > EXTREME_Z,
                },
            );
        }

        Ok(DistributionSimilarity {
            mahalanobis_distance,
            p_value,
            is_ood: p_value < ood_alpha,
            per_feature_z_scores,
            description: format!(
                "Mahalanobis distance {:.4} (p={:.4}) across {} reference features",
                mahalanobis_distance, p_value, k
            ),
        })
    }
}

/// Fits and stores the statistical shape of a reference feature
/// distribution, then scores new inputs against it.
#[derive(Debug, Clone)]
pub struct DistributionProfiler {
    profile: Option<DistributionProfile>,
    ood_alpha: f64,
}

impl Default for DistributionProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionProfiler {
    pub fn new() -> Self {
        Self {
            profile: None,
            ood_alpha: DEFAULT_OOD_ALPHA,
        }
    }

    /// Wraps a pre-fit profile loaded from the persistence collaborator.
    pub fn from_profile(profile: DistributionProfile) -> Self {
        Self {
            profile: Some(profile),
            ood_alpha: DEFAULT_OOD_ALPHA,
        }
    }

    /// Overrides the OOD decision threshold.
    pub fn with_ood_alpha(mut self, ood_alpha: f64) -> Self {
        self.ood_alpha = ood_alpha;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.profile.is_some()
    }

    pub fn profile(&self) -> Option<&DistributionProfile> {
        self.profile.as_ref()
    }

    /// Profiles the reference data distribution.
    pub fn fit(&mut self, rows: &[FeatureVector]) -> TrustResult<()> {
        self.profile = Some(DistributionProfile::fit(rows)?);
        Ok(())
    }

    /// Scores a new input's similarity to the fitted distribution.
    pub fn similarity(&self, input: &FeatureVector) -> TrustResult<DistributionSimilarity> {
        let profile = self.profile.as_ref().ok_or(TrustError::NotFitted)?;
        profile.similarity(input, self.ood_alpha)
    }

    /// Per-feature descriptive statistics of the reference data.
    pub fn summary_stats(&self) -> TrustResult<&BTreeMap<String, FeatureStats>> {
        self.profile
            .as_ref()
            .map(DistributionProfile::feature_stats)
            .ok_or(TrustError::NotFitted)
    }
}

/// Extracts an input's values in fit-time feature order.
///
/// The feature set must exactly equal the fit-time set; missing, extra, or
/// non-finite entries are contract violations.
fn ordered_values(feature_names: &[String], input: &FeatureVector) -> TrustResult<Vec<f64>> {
    if input.len() != feature_names.len() {
        return Err(TrustError::Schema(format!(
            "expected {} features, got {}",
            feature_names.len(),
            input.len()
        )));
    }

    let mut values = Vec::with_capacity(feature_names.len());
    for name in feature_names {
        let value = input
            .get(name)
            .ok_or_else(|| TrustError::Schema(format!("missing feature '{name}'")))?;
        if !value.is_finite() {
            return Err(TrustError::Schema(format!(
                "feature '{name}' has non-finite value {value}"
            )));
        }
        values.push(value);
    }
    Ok(values)
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        0.0
    } else {
        values.std_dev()
    }
}

/// Linear-interpolated quantile of an ascending-sorted slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(seed: u64) -> f64 {
        let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z % 1000) as f64 / 1000.0
    }

    fn reference_rows() -> Vec<FeatureVector> {
        (0..80u64)
            .map(|i| {
                let age = 35.0 + 10.0 * noise(3 * i);
                let income = 50.0 + 20.0 * noise(3 * i + 1) + 0.5 * (age - 35.0);
                let tenure = 5.0 + 2.0 * noise(3 * i + 2);
                [("age", age), ("income", income), ("tenure", tenure)]
                    .into_iter()
                    .collect()
            })
            .collect()
    }

    fn fitted() -> DistributionProfiler {
        let mut profiler = DistributionProfiler::new();
        profiler.fit(&reference_rows()).unwrap();
        profiler
    }

    fn centroid(profiler: &DistributionProfiler) -> FeatureVector {
        profiler
            .summary_stats()
            .unwrap()
            .iter()
            .map(|(name, stats)| (name.clone(), stats.mean))
            .collect()
    }

    #[test]
    fn test_unfitted_profiler_rejects_queries() {
        let profiler = DistributionProfiler::new();
        let err = profiler.similarity(&FeatureVector::new()).unwrap_err();
        assert!(matches!(err, TrustError::NotFitted));
        assert!(matches!(
            profiler.summary_stats().unwrap_err(),
            TrustError::NotFitted
        ));
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let profiler = fitted();

        let missing: FeatureVector = [("age", 40.0), ("income", 60.0)].into_iter().collect();
        assert!(matches!(
            profiler.similarity(&missing).unwrap_err(),
            TrustError::Schema(_)
        ));

        let renamed: FeatureVector = [("age", 40.0), ("income", 60.0), ("years", 6.0)]
            .into_iter()
            .collect();
        assert!(matches!(
            profiler.similarity(&renamed).unwrap_err(),
            TrustError::Schema(_)
        ));

        let non_finite: FeatureVector = [("age", 40.0), ("income", f64::NAN), ("tenure", 6.0)]
            .into_iter()
            .collect();
        assert!(matches!(
            profiler.similarity(&non_finite).unwrap_err(),
            TrustError::Schema(_)
        ));
    }

    #[test]
    fn test_centroid_is_in_distribution() {
        let profiler = fitted();
        let report = profiler.similarity(&centroid(&profiler)).unwrap();

        assert!(report.mahalanobis_distance < 1.0);
        assert!(report.p_value > 0.9);
        assert!(!report.is_ood);
        assert!(report
            .per_feature_z_scores
            .values()
            .all(|z| !z.is_extreme));
    }

    #[test]
    fn test_reference_rows_are_rarely_flagged_ood() {
        let profiler = fitted();
        let rows = reference_rows();

        let flagged = rows
            .iter()
            .filter(|row| profiler.similarity(row).unwrap().is_ood)
            .count();

        // Statistical property: at alpha 0.05 roughly 5% of in-distribution
        // rows should be flagged, so anything beyond 20% means the detector
        // is miscalibrated.
        assert!(flagged * 5 < rows.len(), "{flagged} of {} flagged", rows.len());
    }

    #[test]
    fn test_scaled_copy_is_more_anomalous() {
        let profiler = fitted();
        let base = centroid(&profiler);
        let scaled: FeatureVector = base.iter().map(|(name, v)| (name, v * 10.0)).collect();

        let base_report = profiler.similarity(&base).unwrap();
        let scaled_report = profiler.similarity(&scaled).unwrap();

        assert!(scaled_report.mahalanobis_distance > base_report.mahalanobis_distance);
        assert!(scaled_report.p_value < base_report.p_value);
        assert!(scaled_report.is_ood);
    }

    #[test]
    fn test_extreme_feature_is_flagged() {
        let profiler = fitted();
        let mut outlier = centroid(&profiler);
        let age_stats = profiler.summary_stats().unwrap()["age"].clone();
        outlier.insert("age", age_stats.mean + 10.0 * age_stats.std);

        let report = profiler.similarity(&outlier).unwrap();
        let age_z = &report.per_feature_z_scores["age"];

        assert!(age_z.z_score > EXTREME_Z);
        assert!(age_z.is_extreme);
        assert!(!report.per_feature_z_scores["tenure"].is_extreme);
    }

    #[test]
    fn test_constant_feature_is_tolerated() {
        let rows: Vec<FeatureVector> = reference_rows()
            .into_iter()
            .map(|row| {
                let mut row = row;
                row.insert("flag", 1.0);
                row
            })
            .collect();

        let mut profiler = DistributionProfiler::new();
        profiler.fit(&rows).unwrap();

        let mut query = centroid(&profiler);
        query.insert("flag", 1.0);
        let report = profiler.similarity(&query).unwrap();

        assert!(report.mahalanobis_distance.is_finite());
        assert!(report.p_value.is_finite());
        assert_eq!(report.per_feature_z_scores["flag"].z_score, 0.0);
    }

    #[test]
    fn test_similarity_is_deterministic() {
        let profiler = fitted();
        let query = centroid(&profiler);

        let a = profiler.similarity(&query).unwrap();
        let b = profiler.similarity(&query).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_profile_survives_serialization() {
        let profiler = fitted();
        let query = centroid(&profiler);
        let expected = profiler.similarity(&query).unwrap();

        let blob = serde_json::to_string(profiler.profile().unwrap()).unwrap();
        let restored: DistributionProfile = serde_json::from_str(&blob).unwrap();
        let actual = DistributionProfiler::from_profile(restored)
            .similarity(&query)
            .unwrap();

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_summary_stats_quantiles() {
        let rows: Vec<FeatureVector> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .into_iter()
            .map(|v| [("x", v)].into_iter().collect())
            .collect();

        let mut profiler = DistributionProfiler::new();
        profiler.fit(&rows).unwrap();
        let stats = &profiler.summary_stats().unwrap()["x"];

        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.q1, 2.0);
        assert_eq!(stats.q3, 4.0);
    }

    #[test]
    fn test_empty_reference_table_rejected() {
        let mut profiler = DistributionProfiler::new();
        let err = profiler.fit(&[]).unwrap_err();
        assert!(matches!(err, TrustError::Schema(_)));
    }
}
