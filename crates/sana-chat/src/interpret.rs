//! Response interpretation
//!
//! Turns a raw backend payload into either a follow-up question or an
//! assessment, applying the confidence gate: an under-confident backend
//! can never trigger the upgrade prompt, because under-threshold
//! assessments are downgraded to follow-up questions here.

use sana_client::AnalyzeResponse;

use crate::message::TriageLevel;
use crate::normalize;
use crate::state::AssessmentSnapshot;

/// Generic follow-up questions, rotated through when the backend supplies
/// none. Entries already posed are skipped.
pub const FOLLOW_UP_POOL: &[&str] = &[
    "How long have you been experiencing this?",
    "On a scale of 1 to 10, how severe is it right now?",
    "Have you noticed anything that makes it better or worse?",
    "Are you experiencing any other symptoms alongside this?",
    "Have you taken any medication for it so far?",
];

/// Last-resort prompt once the pool is exhausted.
pub const FALLBACK_QUESTION: &str =
    "Could you tell me a bit more about what you're experiencing?";

/// A classified backend response, ready to drive state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// A clarifying turn. Every posed follow-up is recorded into the
    /// asked set; `from_backend` marks whether the backend supplied the
    /// question or it was synthesized locally.
    FollowUp { question: String, from_backend: bool },
    /// A high-confidence assessment.
    Assessment {
        snapshot: AssessmentSnapshot,
        requires_upgrade: bool,
    },
}

/// Interpret a backend response.
///
/// `asked_questions` is the set of follow-ups already posed,
/// `user_text` the cumulative user-message text (for the keyword
/// heuristics), `threshold` the minimum confidence for a final assessment.
pub fn interpret(
    response: &AnalyzeResponse,
    threshold: u8,
    asked_questions: &[String],
    user_text: &str,
) -> Interpretation {
    if response.is_assessment {
        let confidence = response.effective_confidence();
        if confidence < threshold {
            // Downgrade: an under-confident diagnosis is never surfaced
            // as final.
            return follow_up_from(response, asked_questions);
        }
        return Interpretation::Assessment {
            snapshot: build_snapshot(response, confidence, user_text),
            requires_upgrade: response.requires_upgrade,
        };
    }

    follow_up_from(response, asked_questions)
}

fn follow_up_from(response: &AnalyzeResponse, asked_questions: &[String]) -> Interpretation {
    if let Some(question) = response.question.as_deref() {
        let question = question.trim();
        if !question.is_empty() {
            return Interpretation::FollowUp {
                question: question.to_string(),
                from_backend: true,
            };
        }
    }
    if !response.is_assessment {
        if let Some(text) = response.possible_conditions.as_deref() {
            let text = text.trim();
            if !text.is_empty() {
                return Interpretation::FollowUp {
                    question: text.to_string(),
                    from_backend: false,
                };
            }
        }
    }
    Interpretation::FollowUp {
        question: synthesize_question(asked_questions),
        from_backend: false,
    }
}

/// Pick the first pool entry not already posed, repeating a question never;
/// once the pool is exhausted, fall back to the generic prompt.
pub fn synthesize_question(asked_questions: &[String]) -> String {
    FOLLOW_UP_POOL
        .iter()
        .find(|q| !asked_questions.iter().any(|asked| asked == *q))
        .map(|q| q.to_string())
        .unwrap_or_else(|| FALLBACK_QUESTION.to_string())
}

fn build_snapshot(response: &AnalyzeResponse, confidence: u8, user_text: &str) -> AssessmentSnapshot {
    // Safety override first: certain keyword matches force mild triage and
    // a canned recommendation regardless of backend output.
    if let Some(over) = normalize::mild_override(user_text) {
        return AssessmentSnapshot {
            common_name: normalize::common_name_for(over.condition).map(str::to_string),
            condition: over.condition.to_string(),
            confidence,
            recommendation: over.recommendation.to_string(),
            triage_level: TriageLevel::Mild,
        };
    }

    let raw_name = response
        .first_condition()
        .map(|c| c.name.as_str())
        .unwrap_or_default();
    let free_text = response.possible_conditions.as_deref().unwrap_or_default();
    let condition = normalize::normalize_condition(raw_name, free_text, user_text);

    let common_name = response
        .first_condition()
        .and_then(|c| c.common_name.clone())
        .or_else(|| normalize::common_name_for(&condition).map(str::to_string));

    let triage_level = response
        .triage_level_str()
        .and_then(TriageLevel::parse)
        .unwrap_or(TriageLevel::Moderate);

    let recommendation = response
        .care_recommendation_str()
        .map(str::to_string)
        .unwrap_or_else(|| default_recommendation(triage_level).to_string());

    AssessmentSnapshot {
        condition,
        common_name,
        confidence,
        recommendation,
        triage_level,
    }
}

/// Human-readable guidance tied to a triage level, used when the backend
/// supplies none.
pub fn default_recommendation(triage: TriageLevel) -> &'static str {
    match triage {
        TriageLevel::Mild => {
            "Self-care at home is usually enough. Check in with a doctor if things get worse."
        }
        TriageLevel::Moderate => {
            "Consider seeing a doctor in the next day or two if this doesn't improve."
        }
        TriageLevel::Severe => "Please seek medical care promptly.",
    }
}
