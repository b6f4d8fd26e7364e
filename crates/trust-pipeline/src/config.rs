//! Runtime configuration for the assessment pipeline.

use std::env;

use trust_engine::Tone;

/// Tunable knobs for one pipeline instance.
///
/// Everything is plain owned data handed to the pipeline at construction;
/// there is no ambient global configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Stochastic passes per assessment; trades estimation noise for
    /// latency.
    pub num_passes: usize,
    /// p-value threshold below which an input is declared OOD.
    pub ood_alpha: f64,
    /// Tone used for the generated explanation.
    pub tone: Tone,
    /// Version tag stamped on every audit record.
    pub model_version: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_passes: 50,
            ood_alpha: 0.05,
            tone: Tone::Technical,
            model_version: "v1.0.0-pilot".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Reads overrides from the environment, keeping defaults for unset or
    /// unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            num_passes: env::var("TRUSTSCOPE_NUM_PASSES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.num_passes),
            ood_alpha: env::var("TRUSTSCOPE_OOD_ALPHA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ood_alpha),
            tone: env::var("TRUSTSCOPE_TONE")
                .map(|v| Tone::from_name(&v))
                .unwrap_or(defaults.tone),
            model_version: env::var("TRUSTSCOPE_MODEL_VERSION")
                .unwrap_or(defaults.model_version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.num_passes, 50);
        assert_eq!(config.ood_alpha, 0.05);
        assert_eq!(config.tone, Tone::Technical);
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("TRUSTSCOPE_NUM_PASSES", "12");
        env::set_var("TRUSTSCOPE_TONE", "simple");
        env::set_var("TRUSTSCOPE_OOD_ALPHA", "not-a-number");

        let config = PipelineConfig::from_env();

        assert_eq!(config.num_passes, 12);
        assert_eq!(config.tone, Tone::Simple);
        // Unparsable values keep the default.
        assert_eq!(config.ood_alpha, 0.05);

        env::remove_var("TRUSTSCOPE_NUM_PASSES");
        env::remove_var("TRUSTSCOPE_TONE");
        env::remove_var("TRUSTSCOPE_OOD_ALPHA");
    }
}
