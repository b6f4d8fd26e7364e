use rayon::prelude::*;

use crate::{FeatureVector, PredictionBundle, TrustError, TrustResult};

/// A model-serving collaborator that produces probability estimates for one
/// input from multiple independently trained predictors.
///
/// Implementations own the actual models; the assessment core never loads or
/// trains them.
pub trait PredictionSource: Send + Sync {
    /// Positive-class probability from every ensemble member.
    fn predict_all(&self, features: &FeatureVector) -> TrustResult<PredictionBundle>;

    /// One randomized evaluation of the designated stochastic-capable
    /// predictor (e.g. a dropout-masked forward pass).
    fn stochastic_pass(&self, features: &FeatureVector) -> TrustResult<f64>;

    /// `num_passes` independent stochastic evaluations of the same input.
    ///
    /// Passes are fanned out across worker threads and joined before the
    /// result is returned; callers never observe a partial aggregate.
    /// Implementations with a batched native path may override this.
    fn stochastic_passes(
        &self,
        features: &FeatureVector,
        num_passes: usize,
    ) -> TrustResult<Vec<f64>> {
        if num_passes == 0 {
            return Err(TrustError::Schema(
                "num_passes must be positive".to_string(),
            ));
        }

        (0..num_passes)
            .into_par_iter()
            .map(|_| self.stochastic_pass(features))
            .collect()
    }
}
