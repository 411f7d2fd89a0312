//! Display-ready message model

use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

/// Coarse severity classification attached to an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriageLevel {
    Mild,
    Moderate,
    Severe,
}

impl TriageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }

    /// Case-insensitive parse; unrecognized values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mild" | "low" => Some(Self::Mild),
            "moderate" | "medium" => Some(Self::Moderate),
            "severe" | "high" | "emergency" => Some(Self::Severe),
            _ => None,
        }
    }
}

impl std::fmt::Display for TriageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One turn in the conversation. `text` is display-ready plain text.
///
/// `confidence` and `triage_level` are populated together, and only for
/// assessment messages; the `assessment` constructor is the single way to
/// set them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    #[serde(default)]
    pub is_assessment: bool,
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub triage_level: Option<TriageLevel>,
    #[serde(default)]
    pub care_recommendation: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            is_assessment: false,
            confidence: None,
            triage_level: None,
            care_recommendation: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a plain conversational bot message.
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            is_assessment: false,
            confidence: None,
            triage_level: None,
            care_recommendation: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create an assessment message carrying condition metrics.
    pub fn assessment(
        text: impl Into<String>,
        confidence: u8,
        triage_level: TriageLevel,
        care_recommendation: impl Into<String>,
    ) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            is_assessment: true,
            confidence: Some(confidence),
            triage_level: Some(triage_level),
            care_recommendation: Some(care_recommendation.into()),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}
