//! Conversation controller: quota enforcement, the request/response
//! cycle, and UI-state transitions.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use sana_client::{AnalyzeRequest, FailureKind, HistoryEntry};

use crate::{
    events::ChatEvent,
    handle::ChatHandle,
    interpret::{self, Interpretation},
    message::{Message, TriageLevel},
    state::{ConversationState, UiState},
    transport::{Classify, RetryPolicy},
};

/// Fixed instruction string sent with every classification request.
const CONTEXT_NOTES: &str = "Do not repeat questions the user has already answered. \
                             Ask at most one focused follow-up question per message.";

/// Transient notice shown while a failed request is retried.
const RETRY_NOTICE: &str = "Hmm, that didn't go through. Retrying...";

/// Controller configuration.
///
/// The free-message ceiling and confidence threshold are deployment
/// constants to confirm against the backend contract, not universal
/// truths; both are plain fields for that reason.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Free-tier ceiling on user-submitted messages.
    pub free_message_limit: u32,
    /// Minimum confidence before an assessment is surfaced as final.
    pub confidence_threshold: u8,
    /// Maximum accepted input length, in characters.
    pub max_input_len: usize,
    /// Retry policy for classification requests.
    pub retry: RetryPolicy,
    /// Pause between the assessment message and the sales pitch.
    pub pitch_delay: Duration,
    /// Pause between the sales pitch and the upgrade prompt.
    pub prompt_delay: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            free_message_limit: 15,
            confidence_threshold: 90,
            max_input_len: 1000,
            retry: RetryPolicy::default(),
            pitch_delay: Duration::from_millis(1200),
            prompt_delay: Duration::from_millis(1500),
        }
    }
}

/// The conversation controller.
///
/// Owns the message log and UI state, accepts one user utterance at a
/// time, and drives the classification cycle. All observable output goes
/// through the event channel and the [`state`](Self::state) snapshot; the
/// controller never touches a view directly.
pub struct ChatController {
    config: ChatConfig,
    state: ConversationState,
    classifier: Arc<dyn Classify>,
    event_tx: broadcast::Sender<ChatEvent>,
    handle: ChatHandle,
}

impl ChatController {
    pub fn new(config: ChatConfig, classifier: Arc<dyn Classify>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            state: ConversationState::new(),
            classifier,
            event_tx,
            handle: ChatHandle::new(),
        }
    }

    /// Subscribe to controller events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// Observable state snapshot.
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// The ordered message log.
    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    /// Cloneable handle for cancelling from outside the controller task.
    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    /// Rehydrate the message log from a persisted snapshot.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.state.restore_messages(messages);
    }

    /// Accept one user utterance: validate, enforce the quota, classify,
    /// and drive state transitions. Classification failures surface as
    /// bot messages; the returned error covers internal plumbing only.
    pub async fn submit(&mut self, text: &str) -> crate::error::Result<()> {
        let trimmed = text.trim();

        // Validation failures surface a notice and change nothing else.
        if trimmed.is_empty() {
            self.append(Message::bot("Please type a message first."));
            return Ok(());
        }
        if trimmed.chars().count() > self.config.max_input_len {
            self.append(Message::bot(format!(
                "That message is a bit long. Please keep it under {} characters.",
                self.config.max_input_len
            )));
            return Ok(());
        }
        // The paywall gates submissions unless the pending case is mild.
        if self.state.ui_state == UiState::UpgradePrompt
            && self.state.latest_triage() != Some(TriageLevel::Mild)
        {
            self.append(Message::bot(
                "Please choose one of the options above to continue.",
            ));
            return Ok(());
        }

        // Supersede any in-flight request before touching state.
        let cancel = self.handle.begin_turn();

        // The user always sees their own text right away.
        self.append(Message::user(trimmed));
        self.state.message_count += 1;

        // History is the full prior log, excluding the utterance itself.
        // Captured here so a reminder appended below stays out of it.
        let history = self.history_entries(self.state.messages.len() - 1);

        if self.state.message_count >= self.config.free_message_limit
            && self.state.ui_state == UiState::Default
        {
            if !self.state.has_declined_upgrade {
                // Hard cutoff, independent of conversation content: no
                // network call for this turn.
                self.append(Message::bot(format!(
                    "You've reached the {} free messages for this conversation. \
                     To continue and get your full assessment, you can upgrade \
                     to Premium.",
                    self.config.free_message_limit
                )));
                self.transition(UiState::UpgradePrompt);
                let _ = self.event_tx.send(ChatEvent::TurnSettled);
                return Ok(());
            }
            // Previously declined: advisory reminder, chat continues.
            self.transition(UiState::SecondaryPrompt);
            let snippet = truncate_chars(trimmed, 40);
            self.append(Message::bot(format!(
                "Just a reminder that you're past the free limit. I'll keep \
                 helping where I can with \"{}\", but a Premium report would \
                 give you the complete picture.",
                snippet
            )));
        }

        self.run_classification(trimmed.to_string(), history, cancel)
            .await;
        Ok(())
    }

    /// Re-run classification for the most recent user utterance, without
    /// appending it again or touching the quota counter.
    pub async fn retry(&mut self) -> crate::error::Result<()> {
        let Some(last_user_idx) = self.state.messages.iter().rposition(|m| m.is_user()) else {
            return Ok(());
        };
        let symptom = self.state.messages[last_user_idx].text.clone();
        let history = self.history_entries(last_user_idx);
        let cancel = self.handle.begin_turn();
        self.run_classification(symptom, history, cancel).await;
        Ok(())
    }

    /// Dismiss the upgrade prompt. Only available while the prompt is
    /// shown for a mild case; otherwise a no-op.
    pub fn dismiss(&mut self) {
        if self.state.ui_state != UiState::UpgradePrompt
            || self.state.latest_triage() != Some(TriageLevel::Mild)
        {
            return;
        }
        self.state.has_declined_upgrade = true;
        self.transition(UiState::Default);
        self.append(Message::bot(
            "No problem. Since this looks mild, let's keep going. What else \
             can you tell me?",
        ));
        let _ = self.event_tx.send(ChatEvent::TurnSettled);
    }

    /// Reset the conversation to its initial state. The backend reset is
    /// best-effort: a failure is logged and the local reset proceeds.
    pub async fn reset(&mut self) -> crate::error::Result<()> {
        self.handle.abort();
        if let Err(e) = self.classifier.reset().await {
            tracing::warn!("Backend reset failed, resetting locally anyway: {}", e);
        }
        self.state.reset();
        let _ = self.event_tx.send(ChatEvent::ConversationReset);
        Ok(())
    }

    // ---- Private helpers ----

    fn append(&mut self, message: Message) {
        let _ = self.event_tx.send(ChatEvent::MessageAppended {
            message: message.clone(),
        });
        self.state.messages.push(message);
    }

    fn transition(&mut self, ui_state: UiState) {
        if self.state.ui_state != ui_state {
            self.state.ui_state = ui_state;
            let _ = self.event_tx.send(ChatEvent::StateChanged { ui_state });
        }
    }

    /// Map the first `end` log entries to the backend history shape.
    fn history_entries(&self, end: usize) -> Vec<HistoryEntry> {
        self.state.messages[..end]
            .iter()
            .map(|m| HistoryEntry {
                message: m.text.clone(),
                is_bot: !m.is_user(),
            })
            .collect()
    }

    /// All user-submitted text so far, for the keyword heuristics.
    fn cumulative_user_text(&self) -> String {
        self.state
            .messages
            .iter()
            .filter(|m| m.is_user())
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The bounded-retry classification cycle for one utterance.
    async fn run_classification(
        &mut self,
        symptom: String,
        history: Vec<HistoryEntry>,
        cancel: CancellationToken,
    ) {
        let request = AnalyzeRequest {
            symptom,
            conversation_history: history,
            context_notes: CONTEXT_NOTES.to_string(),
        };

        self.handle.is_busy.store(true, Ordering::Release);

        let mut attempt = 1u32;
        loop {
            let classifier = Arc::clone(&self.classifier);
            match classifier.analyze(request.clone(), cancel.clone()).await {
                Ok(response) => {
                    self.handle_response(&response, &cancel).await;
                    break;
                }
                Err(sana_client::Error::Aborted) => {
                    // Superseded by a newer submission or teardown; the
                    // result is discarded, never appended.
                    tracing::debug!("Classification aborted, discarding");
                    break;
                }
                Err(e) if self.config.retry.should_retry(attempt, &e) => {
                    tracing::warn!(
                        "Classification failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt,
                        self.config.retry.max_attempts,
                        e,
                        self.config.retry.delay
                    );
                    let _ = self.event_tx.send(ChatEvent::RetryAttempt {
                        attempt,
                        max_attempts: self.config.retry.max_attempts,
                    });
                    self.append(Message::bot(RETRY_NOTICE));
                    let interrupted = !self.pause(self.config.retry.delay, &cancel).await;
                    self.remove_retry_notice();
                    if interrupted {
                        break;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("Classification failed permanently: {}", e);
                    let _ = self.event_tx.send(ChatEvent::Error {
                        message: e.to_string(),
                    });
                    self.append(Message::bot(apology_for(e.failure_kind())));
                    let _ = self.event_tx.send(ChatEvent::TurnSettled);
                    break;
                }
            }
        }

        self.handle.is_busy.store(false, Ordering::Release);
        self.handle.idle_notify.notify_waiters();
    }

    /// Interpret a successful response and apply its state transitions.
    async fn handle_response(&mut self, response: &sana_client::AnalyzeResponse, cancel: &CancellationToken) {
        let user_text = self.cumulative_user_text();
        let interpretation = interpret::interpret(
            response,
            self.config.confidence_threshold,
            &self.state.asked_questions,
            &user_text,
        );

        match interpretation {
            Interpretation::FollowUp { question, .. } => {
                // Every posed follow-up counts as asked, synthesized ones
                // included, so the pool rotates instead of repeating.
                self.state.record_question(&question);
                self.append(Message::bot(question));
                let _ = self.event_tx.send(ChatEvent::TurnSettled);
            }
            Interpretation::Assessment { snapshot, requires_upgrade } => {
                // Recorded before any prompt is shown, so the panel can
                // reference it the moment it appears.
                self.state.latest_assessment = Some(snapshot.clone());
                let _ = self.event_tx.send(ChatEvent::AssessmentReady {
                    snapshot: snapshot.clone(),
                });

                let label = match &snapshot.common_name {
                    Some(alias) => format!("{} ({})", snapshot.condition, alias),
                    None => snapshot.condition.clone(),
                };
                self.append(Message::assessment(
                    format!(
                        "Based on what you've described, this looks most \
                         consistent with {}. Confidence: {}%. {}",
                        label, snapshot.confidence, snapshot.recommendation
                    ),
                    snapshot.confidence,
                    snapshot.triage_level,
                    snapshot.recommendation.clone(),
                ));

                if !self.pause(self.config.pitch_delay, cancel).await {
                    return;
                }
                self.append(Message::bot(sales_pitch(snapshot.triage_level)));

                if requires_upgrade {
                    if !self.pause(self.config.prompt_delay, cancel).await {
                        return;
                    }
                    self.transition(UiState::UpgradePrompt);
                }
                let _ = self.event_tx.send(ChatEvent::TurnSettled);
            }
        }
    }

    /// Sleep for `duration` unless the turn is cancelled first. Returns
    /// `false` on cancellation; no state may be mutated after that.
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        if duration.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Drop the transient retry notice before the retry's outcome lands.
    fn remove_retry_notice(&mut self) {
        if let Some(index) = self
            .state
            .messages
            .iter()
            .rposition(|m| !m.is_user() && m.text == RETRY_NOTICE)
        {
            self.state.messages.remove(index);
            let _ = self.event_tx.send(ChatEvent::MessageRemoved { index });
        }
    }
}

/// Sales-pitch wording: softer for mild cases, a stronger call to action
/// otherwise.
fn sales_pitch(triage: TriageLevel) -> &'static str {
    match triage {
        TriageLevel::Mild => {
            "The good news: this looks manageable at home. If you'd like a \
             detailed report to keep or share, a Premium report is \
             available, though with a mild case it's entirely optional."
        }
        _ => {
            "A doctor-ready report with your full assessment, care options, \
             and what to watch for is available with Premium. Based on what \
             you've shared, I'd recommend taking a closer look."
        }
    }
}

/// User-visible apology worded by failure class.
fn apology_for(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::RateLimited => {
            "I'm getting a lot of requests right now. Please wait a moment \
             and try again."
        }
        FailureKind::Server => {
            "Something went wrong on my end while analyzing that. Please try \
             again in a moment."
        }
        FailureKind::Connectivity => {
            "I'm having trouble reaching the analysis service. Please check \
             your connection and try again."
        }
    }
}

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Sender;
    use crate::state::AssessmentSnapshot;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sana_client::{AnalyzeResponse, Error, Result as ClientResult};
    use std::sync::atomic::AtomicU32;

    /// A scripted classifier: pops one result per call, repeating the
    /// last entry once the script runs out.
    struct MockClassify {
        script: Mutex<Vec<ClientResult<AnalyzeResponse>>>,
        call_count: AtomicU32,
        reset_result: Mutex<ClientResult<()>>,
        /// Per-call delay, raced against the cancel token.
        delay: Duration,
    }

    impl MockClassify {
        fn new(script: Vec<ClientResult<AnalyzeResponse>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                call_count: AtomicU32::new(0),
                reset_result: Mutex::new(Ok(())),
                delay: Duration::ZERO,
            })
        }

        fn slow(script: Vec<ClientResult<AnalyzeResponse>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                call_count: AtomicU32::new(0),
                reset_result: Mutex::new(Ok(())),
                delay,
            })
        }

        fn calls(&self) -> u32 {
            self.call_count.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl Classify for MockClassify {
        async fn analyze(
            &self,
            _request: AnalyzeRequest,
            cancel: CancellationToken,
        ) -> ClientResult<AnalyzeResponse> {
            self.call_count.fetch_add(1, Ordering::Relaxed);
            if !self.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Aborted),
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
            let mut script = self.script.lock();
            if script.len() > 1 {
                script.remove(0)
            } else if let Some(entry) = script.first() {
                clone_result(entry)
            } else {
                Ok(follow_up_response("Tell me more."))
            }
        }

        async fn reset(&self) -> ClientResult<()> {
            clone_unit_result(&self.reset_result.lock())
        }
    }

    fn clone_result(r: &ClientResult<AnalyzeResponse>) -> ClientResult<AnalyzeResponse> {
        match r {
            Ok(v) => Ok(v.clone()),
            Err(Error::Api { status, message }) => Err(Error::api(*status, message.clone())),
            Err(Error::RateLimited { retry_after }) => {
                Err(Error::RateLimited { retry_after: *retry_after })
            }
            Err(_) => Err(Error::Aborted),
        }
    }

    fn clone_unit_result(r: &ClientResult<()>) -> ClientResult<()> {
        match r {
            Ok(()) => Ok(()),
            Err(Error::Api { status, message }) => Err(Error::api(*status, message.clone())),
            Err(_) => Err(Error::Aborted),
        }
    }

    fn follow_up_response(question: &str) -> AnalyzeResponse {
        serde_json::from_value(serde_json::json!({ "question": question })).unwrap()
    }

    fn assessment_response(name: &str, confidence: u8, triage: &str, upgrade: bool) -> AnalyzeResponse {
        serde_json::from_value(serde_json::json!({
            "is_assessment": true,
            "requires_upgrade": upgrade,
            "confidence": confidence,
            "triage_level": triage,
            "assessment": {
                "conditions": [{ "name": name, "confidence": confidence }]
            }
        }))
        .unwrap()
    }

    fn test_config() -> ChatConfig {
        ChatConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
            pitch_delay: Duration::ZERO,
            prompt_delay: Duration::ZERO,
            ..ChatConfig::default()
        }
    }

    fn make_controller(classifier: Arc<MockClassify>) -> ChatController {
        ChatController::new(test_config(), classifier)
    }

    fn bot_texts(controller: &ChatController) -> Vec<&str> {
        controller
            .messages()
            .iter()
            .filter(|m| !m.is_user())
            .map(|m| m.text.as_str())
            .collect()
    }

    // ===== Validation =====

    #[tokio::test]
    async fn test_empty_input_rejected_without_counting() {
        let mock = MockClassify::new(vec![]);
        let mut controller = make_controller(mock.clone());

        controller.submit("   ").await.unwrap();

        assert_eq!(controller.state().message_count, 0);
        assert_eq!(mock.calls(), 0);
        // Only the welcome plus the validation notice.
        assert!(controller.messages().iter().all(|m| !m.is_user()));
    }

    #[tokio::test]
    async fn test_over_long_input_rejected() {
        let mock = MockClassify::new(vec![]);
        let mut controller = make_controller(mock.clone());

        let long = "a".repeat(1001);
        controller.submit(&long).await.unwrap();

        assert_eq!(controller.state().message_count, 0);
        assert_eq!(mock.calls(), 0);
        assert!(bot_texts(&controller).iter().any(|t| t.contains("1000 characters")));
    }

    #[tokio::test]
    async fn test_quota_monotonicity() {
        let mock = MockClassify::new(vec![Ok(follow_up_response("Since when?"))]);
        let mut controller = make_controller(mock);

        controller.submit("headache").await.unwrap();
        controller.submit("").await.unwrap(); // rejected
        controller.submit("two days now").await.unwrap();
        controller.submit("   ").await.unwrap(); // rejected

        assert_eq!(controller.state().message_count, 2);
    }

    // ===== Quota =====

    #[tokio::test]
    async fn test_quota_exhaustion_skips_network() {
        let mock = MockClassify::new(vec![Ok(follow_up_response("..."))]);
        let mut controller = make_controller(mock.clone());
        controller.state.message_count = 14;

        controller.submit("and my back hurts too").await.unwrap();

        assert_eq!(controller.state().message_count, 15);
        assert_eq!(controller.state().ui_state, UiState::UpgradePrompt);
        assert_eq!(mock.calls(), 0, "no network call on the cutoff turn");
        let last = controller.messages().last().unwrap();
        assert_eq!(last.sender, Sender::Bot);
        assert!(last.text.contains("15 free messages"));
    }

    #[tokio::test]
    async fn test_secondary_prompt_after_decline_is_advisory() {
        let mock = MockClassify::new(vec![Ok(follow_up_response("Anything else?"))]);
        let mut controller = make_controller(mock.clone());
        controller.state.message_count = 15;
        controller.state.has_declined_upgrade = true;

        controller.submit("still itchy around the edges").await.unwrap();

        assert_eq!(controller.state().ui_state, UiState::SecondaryPrompt);
        assert_eq!(mock.calls(), 1, "chat continues past the reminder");
        let texts = bot_texts(&controller);
        assert!(
            texts.iter().any(|t| t.contains("still itchy around the edges")),
            "reminder quotes the user's input"
        );
        assert!(texts.iter().any(|t| *t == "Anything else?"));
    }

    #[tokio::test]
    async fn test_secondary_reminder_truncates_long_input() {
        let mock = MockClassify::new(vec![Ok(follow_up_response("Go on."))]);
        let mut controller = make_controller(mock);
        controller.state.message_count = 15;
        controller.state.has_declined_upgrade = true;

        let long_input = "x".repeat(200);
        controller.submit(&long_input).await.unwrap();

        let reminder = bot_texts(&controller)
            .into_iter()
            .find(|t| t.contains("free limit"))
            .unwrap()
            .to_string();
        assert!(reminder.contains("xxx..."));
        assert!(!reminder.contains(&long_input));
    }

    // ===== Gating =====

    #[tokio::test]
    async fn test_upgrade_prompt_blocks_non_mild() {
        let mock = MockClassify::new(vec![]);
        let mut controller = make_controller(mock.clone());
        controller.state.ui_state = UiState::UpgradePrompt;
        controller.state.latest_assessment = Some(AssessmentSnapshot {
            condition: "Influenza".into(),
            common_name: None,
            confidence: 95,
            recommendation: "See a doctor".into(),
            triage_level: TriageLevel::Moderate,
        });

        controller.submit("but wait").await.unwrap();

        assert_eq!(controller.state().message_count, 0);
        assert_eq!(mock.calls(), 0);
        assert_eq!(controller.state().ui_state, UiState::UpgradePrompt);
    }

    #[tokio::test]
    async fn test_mild_case_may_chat_through_prompt() {
        let mock = MockClassify::new(vec![Ok(follow_up_response("Noted."))]);
        let mut controller = make_controller(mock.clone());
        controller.state.ui_state = UiState::UpgradePrompt;
        controller.state.latest_assessment = Some(AssessmentSnapshot {
            condition: "Sunburn".into(),
            common_name: None,
            confidence: 95,
            recommendation: "Aloe".into(),
            triage_level: TriageLevel::Mild,
        });

        controller.submit("it's peeling a little").await.unwrap();

        assert_eq!(controller.state().message_count, 1);
        assert_eq!(mock.calls(), 1);
    }

    // ===== Confidence gating =====

    #[tokio::test]
    async fn test_low_confidence_never_surfaces_as_assessment() {
        let mock = MockClassify::new(vec![Ok(assessment_response("Influenza", 60, "severe", true))]);
        let mut controller = make_controller(mock);

        controller.submit("feeling awful").await.unwrap();

        let last = controller.messages().last().unwrap();
        assert!(!last.is_assessment, "low-confidence diagnosis downgraded");
        assert!(controller.state().latest_assessment.is_none());
        assert_eq!(controller.state().ui_state, UiState::Default);
    }

    #[tokio::test]
    async fn test_high_confidence_assessment_with_upgrade() {
        let mock = MockClassify::new(vec![Ok(assessment_response("Influenza", 94, "moderate", true))]);
        let mut controller = make_controller(mock);

        controller.submit("fever and chills for three days").await.unwrap();

        let snapshot = controller.state().latest_assessment.clone().unwrap();
        assert_eq!(snapshot.condition, "Influenza");
        assert_eq!(snapshot.confidence, 94);
        assert_eq!(controller.state().ui_state, UiState::UpgradePrompt);

        let assessment = controller
            .messages()
            .iter()
            .find(|m| m.is_assessment)
            .expect("assessment message appended");
        assert_eq!(assessment.confidence, Some(94));
        assert_eq!(assessment.triage_level, Some(TriageLevel::Moderate));
        // Sales pitch follows the assessment.
        assert!(bot_texts(&controller).iter().any(|t| t.contains("Premium")));
    }

    #[tokio::test]
    async fn test_no_upgrade_prompt_without_backend_flag() {
        let mock = MockClassify::new(vec![Ok(assessment_response("Psoriasis", 95, "mild", false))]);
        let mut controller = make_controller(mock);

        controller.submit("scaly patches on my elbows").await.unwrap();

        assert!(controller.state().latest_assessment.is_some());
        assert_eq!(controller.state().ui_state, UiState::Default);
    }

    // ===== Mild override scenario =====

    #[tokio::test]
    async fn test_sunburn_override_normalizes_and_forces_mild() {
        let mock = MockClassify::new(vec![Ok(assessment_response("Skin Condition", 95, "severe", true))]);
        let mut controller = make_controller(mock);

        controller
            .submit("I got a sunburn at the beach and it stings")
            .await
            .unwrap();

        let snapshot = controller.state().latest_assessment.clone().unwrap();
        assert_eq!(snapshot.condition, "Sunburn");
        assert_eq!(snapshot.triage_level, TriageLevel::Mild);
        // Mild pitch wording, not the strong call to action.
        assert!(bot_texts(&controller).iter().any(|t| t.contains("manageable at home")));
    }

    // ===== Follow-up bookkeeping =====

    #[tokio::test]
    async fn test_backend_question_recorded_and_not_resynthesized() {
        let asked = crate::interpret::FOLLOW_UP_POOL[0];
        let mock = MockClassify::new(vec![
            Ok(follow_up_response(asked)),
            // Second turn: under-confident assessment with no question, so
            // the controller synthesizes one; it must not repeat `asked`.
            Ok(assessment_response("Condition 1", 10, "mild", false)),
        ]);
        let mut controller = make_controller(mock);

        controller.submit("my head hurts").await.unwrap();
        assert!(controller.state().asked_questions.iter().any(|q| q == asked));

        controller.submit("it's dull, behind the eyes").await.unwrap();
        let last = controller.messages().last().unwrap();
        assert_ne!(last.text, asked);
    }

    #[tokio::test]
    async fn test_synthesized_questions_rotate_through_pool() {
        // Two under-confident assessments with no backend question force
        // two synthesized follow-ups in a row; the second must not repeat
        // the first.
        let mock = MockClassify::new(vec![
            Ok(assessment_response("Condition 1", 10, "mild", false)),
            Ok(assessment_response("Condition 1", 10, "mild", false)),
        ]);
        let mut controller = make_controller(mock);

        controller.submit("my elbow clicks").await.unwrap();
        let first = controller.messages().last().unwrap().text.clone();

        controller.submit("only when I bend it").await.unwrap();
        let second = controller.messages().last().unwrap().text.clone();

        assert_eq!(first, crate::interpret::FOLLOW_UP_POOL[0]);
        assert_eq!(second, crate::interpret::FOLLOW_UP_POOL[1]);
        assert!(
            controller.state().asked_questions.contains(&first),
            "synthesized questions count as asked"
        );
    }

    // ===== Failure semantics =====

    #[tokio::test]
    async fn test_retry_exhaustion_yields_single_apology() {
        let mock = MockClassify::new(vec![
            Err(Error::api(503, "unavailable")),
            Err(Error::api(503, "unavailable")),
            Err(Error::api(503, "unavailable")),
        ]);
        let mut controller = make_controller(mock.clone());

        controller.submit("headache").await.unwrap();

        assert_eq!(mock.calls(), 3, "three attempts total");
        assert_eq!(controller.state().message_count, 1);
        let apologies = bot_texts(&controller)
            .iter()
            .filter(|t| t.contains("went wrong on my end"))
            .count();
        assert_eq!(apologies, 1, "exactly one apology");
        // Transient retry notices are removed before the outcome lands.
        assert!(bot_texts(&controller).iter().all(|t| *t != RETRY_NOTICE));
        assert_eq!(controller.state().ui_state, UiState::Default);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let mock = MockClassify::new(vec![
            Err(Error::api(502, "bad gateway")),
            Ok(follow_up_response("Since when?")),
        ]);
        let mut controller = make_controller(mock.clone());

        controller.submit("sore throat").await.unwrap();

        assert_eq!(mock.calls(), 2);
        assert_eq!(controller.messages().last().unwrap().text, "Since when?");
        assert!(bot_texts(&controller).iter().all(|t| *t != RETRY_NOTICE));
    }

    #[tokio::test]
    async fn test_rate_limited_apology_wording() {
        let mock = MockClassify::new(vec![
            Err(Error::RateLimited { retry_after: None }),
            Err(Error::RateLimited { retry_after: None }),
            Err(Error::RateLimited { retry_after: None }),
        ]);
        let mut controller = make_controller(mock);

        controller.submit("headache").await.unwrap();

        assert!(bot_texts(&controller).iter().any(|t| t.contains("a lot of requests")));
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let mock = MockClassify::new(vec![Err(Error::api(400, "bad shape"))]);
        let mut controller = make_controller(mock.clone());

        controller.submit("headache").await.unwrap();

        assert_eq!(mock.calls(), 1, "client errors are not retried");
        assert!(bot_texts(&controller).iter().any(|t| t.contains("went wrong on my end")));
    }

    // ===== Cancellation =====

    #[tokio::test]
    async fn test_aborted_request_result_is_discarded() {
        let mock = MockClassify::slow(
            vec![Ok(assessment_response("Influenza", 95, "severe", true))],
            Duration::from_millis(200),
        );
        let mut controller = make_controller(mock);
        let handle = controller.handle();

        let aborter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.abort();
        });

        controller.submit("fever").await.unwrap();
        aborter.await.unwrap();

        // The user message stands; no bot response landed after the abort.
        assert_eq!(controller.messages().last().unwrap().sender, Sender::User);
        assert!(controller.state().latest_assessment.is_none());
        assert_eq!(controller.state().ui_state, UiState::Default);
        assert!(!controller.handle().is_busy());
    }

    // ===== Reset =====

    #[tokio::test]
    async fn test_reset_is_idempotent_from_any_state() {
        let mock = MockClassify::new(vec![Ok(assessment_response("Influenza", 95, "severe", true))]);
        let mut controller = make_controller(mock);

        controller.submit("fever and chills").await.unwrap();
        assert_eq!(controller.state().ui_state, UiState::UpgradePrompt);

        controller.reset().await.unwrap();
        controller.reset().await.unwrap();

        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.state().message_count, 0);
        assert_eq!(controller.state().ui_state, UiState::Default);
        assert!(controller.state().latest_assessment.is_none());
    }

    #[tokio::test]
    async fn test_reset_proceeds_when_backend_reset_fails() {
        let mock = MockClassify::new(vec![Ok(follow_up_response("ok"))]);
        *mock.reset_result.lock() = Err(Error::api(500, "boom"));
        let mut controller = make_controller(mock);

        controller.submit("hello there").await.unwrap();
        controller.reset().await.unwrap();

        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.state().message_count, 0);
    }

    // ===== Dismiss =====

    #[tokio::test]
    async fn test_dismiss_mild_returns_to_default() {
        let mock = MockClassify::new(vec![]);
        let mut controller = make_controller(mock);
        controller.state.ui_state = UiState::UpgradePrompt;
        controller.state.latest_assessment = Some(AssessmentSnapshot {
            condition: "Sunburn".into(),
            common_name: None,
            confidence: 95,
            recommendation: "Aloe".into(),
            triage_level: TriageLevel::Mild,
        });
        let before = controller.messages().len();

        controller.dismiss();

        assert_eq!(controller.state().ui_state, UiState::Default);
        assert!(controller.state().has_declined_upgrade);
        assert_eq!(controller.messages().len(), before + 1, "exactly one acknowledgement");
    }

    #[tokio::test]
    async fn test_dismiss_non_mild_is_noop() {
        let mock = MockClassify::new(vec![]);
        let mut controller = make_controller(mock);
        controller.state.ui_state = UiState::UpgradePrompt;
        controller.state.latest_assessment = Some(AssessmentSnapshot {
            condition: "Influenza".into(),
            common_name: None,
            confidence: 95,
            recommendation: "See a doctor".into(),
            triage_level: TriageLevel::Severe,
        });
        let before = controller.messages().len();

        controller.dismiss();

        assert_eq!(controller.state().ui_state, UiState::UpgradePrompt);
        assert!(!controller.state().has_declined_upgrade);
        assert_eq!(controller.messages().len(), before);
    }

    // ===== Retry operation =====

    #[tokio::test]
    async fn test_retry_reruns_last_utterance_without_counting() {
        let mock = MockClassify::new(vec![
            Err(Error::api(400, "bad shape")),
            Ok(follow_up_response("Since when?")),
        ]);
        let mut controller = make_controller(mock.clone());

        controller.submit("headache").await.unwrap();
        assert_eq!(controller.state().message_count, 1);

        controller.retry().await.unwrap();

        assert_eq!(mock.calls(), 2);
        assert_eq!(controller.state().message_count, 1, "retry does not count");
        assert_eq!(controller.messages().last().unwrap().text, "Since when?");
    }

    #[tokio::test]
    async fn test_retry_with_no_user_message_is_noop() {
        let mock = MockClassify::new(vec![]);
        let mut controller = make_controller(mock.clone());

        controller.retry().await.unwrap();

        assert_eq!(mock.calls(), 0);
        assert_eq!(controller.messages().len(), 1);
    }

    // ===== Events =====

    #[tokio::test]
    async fn test_events_emitted_for_a_turn() {
        let mock = MockClassify::new(vec![Ok(follow_up_response("Since when?"))]);
        let mut controller = make_controller(mock);
        let mut rx = controller.subscribe();

        controller.submit("headache").await.unwrap();

        let mut appended = 0;
        let mut settled = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ChatEvent::MessageAppended { .. } => appended += 1,
                ChatEvent::TurnSettled => settled = true,
                _ => {}
            }
        }
        assert_eq!(appended, 2, "user message and bot follow-up");
        assert!(settled);
    }
}
