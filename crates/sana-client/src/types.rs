//! Wire types for the symptom classification endpoint
//!
//! Every recognized response field carries `#[serde(default)]` so a
//! partial or misshapen payload deserializes to a degraded-but-valid
//! value instead of failing the turn. The interpreter upstream fails
//! closed to a plain follow-up question when the fields it needs are
//! absent.

use serde::{Deserialize, Serialize};

/// One prior conversation turn, as the backend expects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub message: String,
    #[serde(rename = "isBot")]
    pub is_bot: bool,
}

/// Request body for the analyze endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// The new user utterance
    pub symptom: String,
    /// Full prior message log, oldest first (excludes `symptom`)
    pub conversation_history: Vec<HistoryEntry>,
    /// Fixed instruction string for the classifier
    pub context_notes: String,
}

/// A candidate condition returned by the classifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub common_name: Option<String>,
}

/// Structured assessment block, present only on assessment responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub triage_level: Option<String>,
    #[serde(default)]
    pub care_recommendation: Option<String>,
    #[serde(default)]
    pub disclaimer: Option<String>,
}

/// Response body from the analyze endpoint (200).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub is_assessment: bool,
    #[serde(default)]
    pub requires_upgrade: bool,
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub assessment: Option<Assessment>,
    #[serde(default)]
    pub triage_level: Option<String>,
    #[serde(default)]
    pub care_recommendation: Option<String>,
    #[serde(default)]
    pub possible_conditions: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
}

/// Error body the backend may attach to non-200 responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
}

impl AnalyzeResponse {
    /// First candidate condition, if the assessment block carries any.
    pub fn first_condition(&self) -> Option<&Condition> {
        self.assessment.as_ref()?.conditions.first()
    }

    /// Effective confidence: response-level confidence, else the first
    /// condition's confidence, defaulting to 0.
    pub fn effective_confidence(&self) -> u8 {
        self.confidence
            .or_else(|| self.first_condition().and_then(|c| c.confidence))
            .unwrap_or(0)
    }

    /// Triage level string, preferring the top-level field over the
    /// assessment block.
    pub fn triage_level_str(&self) -> Option<&str> {
        self.triage_level
            .as_deref()
            .or_else(|| self.assessment.as_ref()?.triage_level.as_deref())
    }

    /// Care recommendation, preferring the top-level field.
    pub fn care_recommendation_str(&self) -> Option<&str> {
        self.care_recommendation
            .as_deref()
            .or_else(|| self.assessment.as_ref()?.care_recommendation.as_deref())
    }
}
