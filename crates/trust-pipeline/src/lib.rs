//! End-to-end prediction reliability assessment.
//!
//! Wires the profiler, uncertainty estimator, trust engine, calibration
//! assessor, and explainer into one explicitly constructed context object.
//! A service layer holds a single pipeline and calls [`TrustPipeline::assess`]
//! per request; the pipeline itself is immutable and shareable across
//! threads.

pub mod audit;
pub mod config;

pub use audit::AuditRecord;
pub use config::PipelineConfig;

use std::sync::Arc;

use calibration_assessor::CalibrationAssessor;
use chrono::Utc;
use distribution_profiler::{DistributionProfile, DistributionProfiler};
use serde::Serialize;
use tracing::info;
use trust_core::{
    CalibrationReport, FeatureVector, PredictionBundle, PredictionSource, TrustReport,
    TrustResult, UncertaintyReport,
};
use trust_engine::{Explainer, TrustEngine};
use uncertainty_estimator::UncertaintyEstimator;

/// Everything the service layer needs to answer one assessment request.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub prediction: PredictionBundle,
    pub uncertainty: UncertaintyReport,
    pub trust: TrustReport,
    pub explanation: String,
}

/// Dependency-injected assessment context.
///
/// Built once at startup from a prediction source and a pre-fit
/// distribution profile; a profile that fails to load is startup-fatal for
/// any service built on top, so construction takes the profile by value.
pub struct TrustPipeline {
    estimator: UncertaintyEstimator,
    engine: TrustEngine,
    explainer: Explainer,
    assessor: CalibrationAssessor,
    config: PipelineConfig,
}

impl TrustPipeline {
    pub fn new(
        source: Arc<dyn PredictionSource>,
        profile: DistributionProfile,
        config: PipelineConfig,
    ) -> Self {
        let profiler = Arc::new(
            DistributionProfiler::from_profile(profile).with_ood_alpha(config.ood_alpha),
        );
        let estimator = UncertaintyEstimator::new(source, profiler)
            .with_num_passes(config.num_passes);

        Self {
            estimator,
            engine: TrustEngine::new(),
            explainer: Explainer::new(),
            assessor: CalibrationAssessor::default(),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Assesses one input: predictions, uncertainty signals, trust
    /// decision, explanation.
    ///
    /// Upstream prediction failures propagate unchanged rather than being
    /// masked as a degraded trust score.
    pub fn assess(&self, features: &FeatureVector) -> TrustResult<Assessment> {
        let uncertainty = self.estimator.total_uncertainty(features)?;
        let prediction = uncertainty.ensemble_disagreement.raw_probs.clone();
        let trust = self.engine.compute(&uncertainty);
        let explanation = self.explainer.explain(&trust, self.config.tone);

        info!(
            "Assessed prediction: {} (score {})",
            trust.trust_label.as_str(),
            trust.trust_score
        );

        Ok(Assessment {
            prediction,
            uncertainty,
            trust,
            explanation,
        })
    }

    /// Evaluates calibration quality over a batch of historical
    /// (outcome, probability) pairs.
    pub fn fit_calibration(
        &self,
        outcomes: &[bool],
        probabilities: &[f64],
    ) -> TrustResult<CalibrationReport> {
        self.assessor.evaluate(outcomes, probabilities)
    }

    /// Builds the serializable audit record for a completed assessment.
    pub fn audit_record(&self, features: &FeatureVector, assessment: &Assessment) -> AuditRecord {
        AuditRecord {
            timestamp: Utc::now(),
            model_version: self.config.model_version.clone(),
            input: features.clone(),
            predictions: assessment.prediction.clone(),
            trust: assessment.trust.clone(),
        }
    }
}
