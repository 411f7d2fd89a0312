//! sana-chat: conversation controller for the symptom-checking chat
//!
//! This crate owns the multi-turn dialogue state: the ordered message log,
//! the free-message quota, the asynchronous request cycle against the
//! classification endpoint, response interpretation (question vs.
//! assessment), condition-name normalization heuristics, and the UI-state
//! machine that decides when the upgrade prompt is shown.

pub mod controller;
pub mod error;
pub mod events;
pub mod handle;
pub mod interpret;
pub mod message;
pub mod normalize;
pub mod state;
pub mod transport;

pub use controller::{ChatConfig, ChatController};
pub use error::{Error, Result};
pub use events::ChatEvent;
pub use handle::ChatHandle;
pub use message::{Message, Sender, TriageLevel};
pub use state::{AssessmentSnapshot, ConversationState, UiState};
pub use transport::{Classify, HttpClassify, RetryPolicy};
