//! Serializable audit records for trust decisions.
//!
//! Every assessment can be rendered as a portable record (scalars, strings,
//! and maps only) for the audit collaborator to persist. The core never
//! writes these anywhere itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trust_core::{FeatureVector, PredictionBundle, TrustReport};

/// One trust decision with the metadata needed for later auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub model_version: String,
    pub input: FeatureVector,
    pub predictions: PredictionBundle,
    pub trust: TrustReport,
}

impl AuditRecord {
    /// One JSON document, suitable for an append-only audit log.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trust_core::{ComponentScores, TrustLabel};

    #[test]
    fn test_audit_record_round_trips_through_json() {
        let record = AuditRecord {
            timestamp: Utc::now(),
            model_version: "v1.0.0-pilot".to_string(),
            input: [("age", 41.0), ("income", 52.0)].into_iter().collect(),
            predictions: [("rf", 0.8), ("lr", 0.7)].into_iter().collect(),
            trust: TrustReport {
                trust_score: 86.0,
                trust_label: TrustLabel::Safe,
                recommendation: TrustLabel::Safe.recommendation().to_string(),
                component_scores: ComponentScores {
                    agreement: 1.0,
                    uncertainty: 0.95,
                    distribution_similarity: 0.9,
                },
            },
        };

        let json = record.to_json().unwrap();
        assert!(json.contains("\"SAFE\""));
        assert!(json.contains("\"model_version\":\"v1.0.0-pilot\""));

        let restored: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, record);
    }
}
