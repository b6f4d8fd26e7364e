//! Natural-language rendering of trust decisions.

use serde::{Deserialize, Serialize};
use trust_core::{TrustLabel, TrustReport};

/// Component score below this reads as problematic in the technical tone.
const COMPONENT_CONCERN: f64 = 0.7;

/// Distribution similarity below this reads as out-of-distribution.
const OOD_CONCERN: f64 = 0.05;

/// Rendering tone for explanations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Technical,
    Executive,
    Simple,
}

impl Tone {
    /// Parses a tone name; unknown names fall back to technical.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "executive" => Tone::Executive,
            "simple" => Tone::Simple,
            _ => Tone::Technical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Technical => "technical",
            Tone::Executive => "executive",
            Tone::Simple => "simple",
        }
    }
}

/// Translates mathematical trust signals into human-readable explanations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Explainer;

impl Explainer {
    pub fn new() -> Self {
        Self
    }

    /// Renders a trust report in the requested tone. Pure function.
    pub fn explain(&self, report: &TrustReport, tone: Tone) -> String {
        match tone {
            Tone::Technical => Self::technical(report),
            Tone::Executive => Self::executive(report),
            Tone::Simple => Self::simple(report),
        }
    }

    /// Lists the specific deflating factors, or states that all signals are
    /// nominal.
    fn technical(report: &TrustReport) -> String {
        let components = &report.component_scores;
        let mut explanation = format!(
            "Trust Level: {} ({}/100). ",
            report.trust_label.as_str(),
            report.trust_score
        );

        let mut reasons = Vec::new();
        if components.agreement < COMPONENT_CONCERN {
            reasons.push("high ensemble variance (model disagreement)");
        }
        if components.uncertainty < COMPONENT_CONCERN {
            reasons.push("elevated epistemic uncertainty via MC dropout");
        }
        if components.distribution_similarity < OOD_CONCERN {
            reasons.push("input identified as Out-of-Distribution (OOD)");
        }

        if reasons.is_empty() {
            explanation.push_str("All reliability signals are within nominal parameters.");
        } else {
            explanation.push_str("Reliability inhibited by ");
            explanation.push_str(&reasons.join(", "));
            explanation.push('.');
        }
        explanation
    }

    fn executive(report: &TrustReport) -> String {
        match report.trust_label {
            TrustLabel::Safe => {
                "This prediction meets all corporate safety standards for automated processing."
            }
            TrustLabel::Review => {
                "Caution: System confidence is moderate. Recommend verification by an analyst."
            }
            TrustLabel::Unsafe => {
                "Warning: High risk of error. This case requires immediate human intervention."
            }
        }
        .to_string()
    }

    fn simple(report: &TrustReport) -> String {
        match report.trust_label {
            TrustLabel::Safe => "We are confident in this result.",
            TrustLabel::Review => "This case is a bit unusual, so a human should double-check it.",
            TrustLabel::Unsafe => {
                "The system is unsure about this because it hasn't seen many cases like it before."
            }
        }
        .to_string()
    }
}
