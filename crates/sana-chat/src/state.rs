//! Conversation state: message log, quota counter, UI state, and the
//! latest high-confidence assessment.

use serde::{Deserialize, Serialize};

use crate::message::{Message, TriageLevel};

/// Which panel the view should render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    /// Free chat; accepts submissions.
    #[default]
    Default,
    /// Paywall panel, entered on a qualifying assessment or quota exhaustion.
    UpgradePrompt,
    /// Advisory reminder after a declined upgrade; does not gate chat.
    SecondaryPrompt,
}

/// The most recent high-confidence assessment, retained across turns so
/// the upgrade panel can reference it the moment it is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSnapshot {
    pub condition: String,
    pub common_name: Option<String>,
    pub confidence: u8,
    pub recommendation: String,
    pub triage_level: TriageLevel,
}

/// Text of the single welcome message every fresh conversation starts with.
pub const WELCOME_TEXT: &str =
    "Hi, I'm Sana. Describe what you're feeling and I'll ask a few questions \
     to help figure out what might be going on. I'm not a doctor, and this \
     is not a diagnosis.";

/// Session-scoped mutable conversation state.
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Ordered message log, append-only except on reset.
    pub messages: Vec<Message>,
    /// Number of user-submitted messages; never decremented except on reset.
    pub message_count: u32,
    pub ui_state: UiState,
    pub latest_assessment: Option<AssessmentSnapshot>,
    /// Follow-up questions already posed, to avoid repetition when the
    /// backend supplies none.
    pub asked_questions: Vec<String>,
    /// Set when the user dismissed the upgrade prompt.
    pub has_declined_upgrade: bool,
}

impl ConversationState {
    /// Fresh state seeded with the single welcome message.
    pub fn new() -> Self {
        Self {
            messages: vec![Message::bot(WELCOME_TEXT)],
            message_count: 0,
            ui_state: UiState::Default,
            latest_assessment: None,
            asked_questions: Vec::new(),
            has_declined_upgrade: false,
        }
    }

    /// Full replacement back to the initial state. Idempotent.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Replace the message log from a persisted snapshot. Counters derive
    /// from the restored log; UI state and heuristic bookkeeping start
    /// fresh.
    pub fn restore_messages(&mut self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        self.message_count = messages.iter().filter(|m| m.is_user()).count() as u32;
        self.messages = messages;
    }

    /// Record a follow-up question so it is not posed again.
    pub fn record_question(&mut self, question: &str) {
        if !self.asked_questions.iter().any(|q| q == question) {
            self.asked_questions.push(question.to_string());
        }
    }

    /// Triage level of the latest assessment, if any.
    pub fn latest_triage(&self) -> Option<TriageLevel> {
        self.latest_assessment.as_ref().map(|a| a.triage_level)
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
