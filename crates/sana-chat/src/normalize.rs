//! Condition-name normalization heuristics
//!
//! The backend sometimes returns placeholder labels ("Condition 1", a
//! masked name) instead of a usable condition. This module is the single
//! owner of every approximate lookup used to recover one: free-text
//! pattern scraping, a symptom-keyword table, a common-name alias table,
//! and the mild-override table for conditions that must never be
//! escalated. All of it is heuristic and a known source of mismatches;
//! extend the tables here rather than special-casing call sites.

use std::sync::LazyLock;

use regex::Regex;

/// Label used when every recovery heuristic misses.
pub const GENERIC_CONDITION: &str = "Unspecified Condition";

/// Placeholder patterns the backend is known to emit instead of a real
/// condition name.
static PLACEHOLDER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^condition\s*\d*$",
        r"(?i)^condition\s+[a-z]$",
        r"(?i)^(skin|unknown|unspecified|possible|general)\s+condition$",
        r"(?i)^\[?(redacted|masked|hidden)\]?$",
        r"(?i)^n/?a$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Phrases in free-text fields that name the condition outright.
static EXTRACTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)most\s+likely\s+(?:a\s+|an\s+)?([a-z][a-z '\-]{2,40})",
        r"(?i)consistent\s+with\s+(?:a\s+|an\s+)?([a-z][a-z '\-]{2,40})",
        r"(?i)suggests?\s+(?:a\s+|an\s+)?([a-z][a-z '\-]{2,40})",
        r"(?i)appears\s+to\s+be\s+(?:a\s+|an\s+)?([a-z][a-z '\-]{2,40})",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Symptom keywords in the cumulative user text, mapped to a candidate
/// condition. First match wins; order is most-specific first.
const SYMPTOM_CONDITIONS: &[(&[&str], &str)] = &[
    (&["sunburn", "sun burn", "sunburnt", "too much sun"], "Sunburn"),
    (&["sore throat", "throat hurts", "painful swallow"], "Pharyngitis"),
    (&["migraine", "headache", "head hurts", "head pain"], "Tension Headache"),
    (&["heartburn", "acid reflux", "burning in my chest"], "Acid Reflux"),
    (&["nausea", "vomit", "diarrhea", "stomach cramp"], "Gastroenteritis"),
    (&["fever", "chills", "body aches"], "Influenza"),
    (&["runny nose", "congestion", "sneez", "cough"], "Common Cold"),
    (&["rash", "itchy skin", "hives"], "Contact Dermatitis"),
];

/// Condition to consumer-friendly alias, used when the backend supplies
/// no `common_name`.
const COMMON_NAMES: &[(&str, &str)] = &[
    ("Influenza", "the flu"),
    ("Gastroenteritis", "stomach flu"),
    ("Pharyngitis", "sore throat"),
    ("Contact Dermatitis", "skin irritation"),
    ("Acid Reflux", "heartburn"),
    ("Common Cold", "a cold"),
    ("Tension Headache", "a tension headache"),
];

/// A forced-mild classification with a canned recommendation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MildOverride {
    pub condition: &'static str,
    pub recommendation: &'static str,
}

/// Conditions that must never be escalated: keyword match on the user's
/// text forces triage to mild with a canned recommendation, regardless of
/// what the backend returned.
const MILD_OVERRIDES: &[(&[&str], MildOverride)] = &[(
    &["sunburn", "sun burn", "sunburnt", "too much sun", "sun poisoning"],
    MildOverride {
        condition: "Sunburn",
        recommendation: "Cool compresses, aloe vera gel, and staying out of the \
                         sun while the skin heals are usually enough. See a doctor \
                         if you develop widespread blisters, fever, or severe pain.",
    },
)];

/// Whether `name` is a placeholder the backend uses to mask a condition.
pub fn is_placeholder(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || PLACEHOLDER_PATTERNS.iter().any(|re| re.is_match(trimmed))
}

/// Scrape a condition name from a free-text field ("most likely X", ...).
pub fn extract_from_text(text: &str) -> Option<String> {
    for re in EXTRACTION_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let raw = caps.get(1)?.as_str();
            let cleaned = raw.trim().trim_end_matches(['.', ',', ';', ':']).trim();
            if cleaned.len() >= 3 {
                return Some(title_case(cleaned));
            }
        }
    }
    None
}

/// Match the cumulative user text against the symptom keyword table.
pub fn condition_from_keywords(user_text: &str) -> Option<&'static str> {
    let lower = user_text.to_lowercase();
    SYMPTOM_CONDITIONS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, condition)| *condition)
}

/// Consumer-friendly alias for a condition, if the table knows one.
pub fn common_name_for(condition: &str) -> Option<&'static str> {
    COMMON_NAMES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(condition.trim()))
        .map(|(_, alias)| *alias)
}

/// Check the user's text against the mild-override table.
pub fn mild_override(user_text: &str) -> Option<MildOverride> {
    let lower = user_text.to_lowercase();
    MILD_OVERRIDES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, over)| over.clone())
}

/// Recover a usable condition name. Backend-supplied real names pass
/// through; placeholders go through text extraction, then the keyword
/// table, then the generic label.
pub fn normalize_condition(raw_name: &str, free_text: &str, user_text: &str) -> String {
    if !is_placeholder(raw_name) {
        return raw_name.trim().to_string();
    }
    if let Some(extracted) = extract_from_text(free_text) {
        return extracted;
    }
    if let Some(matched) = condition_from_keywords(user_text) {
        return matched.to_string();
    }
    GENERIC_CONDITION.to_string()
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
