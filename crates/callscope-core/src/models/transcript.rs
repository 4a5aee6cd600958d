//! Transcript domain model.
//!
//! The analysis and call metadata carry explicit optional members for
//! every known key plus an `extra` map for unstructured extension data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::metrics::ScoreSample;

/// Highest score a scorecard dimension may carry.
pub const MAX_SCORE: f64 = 10.0;

/// Five 0–10 ratings assigned to an analyzed call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    #[serde(default)]
    pub customer_service: Option<f64>,
    #[serde(default)]
    pub product_knowledge: Option<f64>,
    #[serde(default)]
    pub process_efficiency: Option<f64>,
    #[serde(default)]
    pub problem_solving: Option<f64>,
    #[serde(default)]
    pub overall_score: Option<f64>,
}

impl Scorecard {
    fn fields(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("customerService", self.customer_service),
            ("productKnowledge", self.product_knowledge),
            ("processEfficiency", self.process_efficiency),
            ("problemSolving", self.problem_solving),
            ("overallScore", self.overall_score),
        ]
    }

    /// True when at least one dimension carries a value.
    pub fn is_scored(&self) -> bool {
        self.fields().iter().any(|(_, v)| v.is_some())
    }

    /// Rejects values outside `0..=10` (and NaN).
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in self.fields() {
            if let Some(v) = value
                && !(0.0..=MAX_SCORE).contains(&v)
            {
                return Err(format!("scorecard.{name} must be between 0 and 10"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptAnalysis {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub scorecard: Scorecard,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    /// Total call length in seconds.
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub talk_time_secs: Option<f64>,
    #[serde(default)]
    pub wait_time_secs: Option<f64>,
    #[serde(default)]
    pub direction: Option<CallDirection>,
    #[serde(default)]
    pub call_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub call_ended_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub call_type_id: Option<Uuid>,
    pub title: String,
    pub text: String,
    pub analysis: TranscriptAnalysis,
    pub metadata: CallMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    pub fn is_scored(&self) -> bool {
        self.analysis.scorecard.is_scored()
    }

    /// Numeric fields fed into the aggregation.
    pub fn score_sample(&self) -> ScoreSample {
        let card = &self.analysis.scorecard;
        ScoreSample {
            customer_service: card.customer_service,
            product_knowledge: card.product_knowledge,
            process_efficiency: card.process_efficiency,
            problem_solving: card.problem_solving,
            overall_score: card.overall_score,
            call_duration: self.metadata.duration_secs,
            talk_time: self.metadata.talk_time_secs,
            wait_time: self.metadata.wait_time_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTranscript {
    pub organization_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub call_type_id: Option<Uuid>,
    pub title: String,
    pub text: String,
    pub analysis: Option<TranscriptAnalysis>,
    pub metadata: Option<CallMetadata>,
    /// Defaults to now; set explicitly when importing historical calls.
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTranscript {
    pub title: Option<String>,
    pub agent_id: Option<Option<Uuid>>,
    pub call_type_id: Option<Option<Uuid>>,
    pub analysis: Option<TranscriptAnalysis>,
    pub metadata: Option<CallMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scorecard_is_unscored() {
        assert!(!Scorecard::default().is_scored());
        let card = Scorecard {
            overall_score: Some(0.0),
            ..Default::default()
        };
        assert!(card.is_scored());
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        let card = Scorecard {
            problem_solving: Some(10.5),
            ..Default::default()
        };
        let err = card.validate().unwrap_err();
        assert!(err.contains("problemSolving"));

        let nan = Scorecard {
            customer_service: Some(f64::NAN),
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn unknown_analysis_keys_land_in_extra() {
        let analysis: TranscriptAnalysis = serde_json::from_value(serde_json::json!({
            "summary": "Customer asked about billing",
            "scorecard": { "customerService": 9, "overallScore": 8.5 },
            "strengths": ["empathy"],
            "sentiment": "positive"
        }))
        .unwrap();

        assert_eq!(analysis.scorecard.customer_service, Some(9.0));
        assert_eq!(analysis.scorecard.product_knowledge, None);
        assert_eq!(analysis.extra["sentiment"], "positive");
        assert!(analysis.areas_for_improvement.is_empty());
    }
}
