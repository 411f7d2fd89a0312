//! Controller event types

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::state::{AssessmentSnapshot, UiState};

/// Events emitted while the controller processes a turn.
///
/// Subscribers (the view, the snapshot writer) receive these over a
/// broadcast channel; the controller never touches the view directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was appended to the log.
    MessageAppended { message: Message },

    /// The transient message at `index` was removed (retry notices only).
    MessageRemoved { index: usize },

    /// The UI state machine transitioned.
    StateChanged { ui_state: UiState },

    /// A high-confidence assessment was recorded.
    AssessmentReady { snapshot: AssessmentSnapshot },

    /// A retry attempt is about to be made.
    RetryAttempt { attempt: u32, max_attempts: u32 },

    /// The conversation was reset to its initial state.
    ConversationReset,

    /// A turn settled (success or surfaced failure); safe to persist.
    TurnSettled,

    /// Non-fatal error surfaced to the user.
    Error { message: String },
}

impl ChatEvent {
    /// Whether this event marks a settled state worth persisting.
    pub fn is_settled(&self) -> bool {
        matches!(self, ChatEvent::TurnSettled | ChatEvent::ConversationReset)
    }
}
