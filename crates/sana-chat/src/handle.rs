//! A cloneable handle for poking the controller from external code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle onto a running [`ChatController`](crate::ChatController).
///
/// All fields are `Arc`-wrapped, so cloning is cheap. The view layer holds
/// one of these to cancel an in-flight classification (e.g. on unmount or
/// when the user keeps typing) without a mutable borrow of the controller.
#[derive(Clone)]
pub struct ChatHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) is_busy: Arc<AtomicBool>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
}

impl ChatHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_busy: Arc::new(AtomicBool::new(false)),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Cancel the in-flight request and any pending scheduled appends.
    /// The superseded result is discarded on arrival, never appended.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Cancel the previous token and install a fresh one for a new turn.
    pub(crate) fn begin_turn(&self) -> CancellationToken {
        let mut guard = self.cancel.lock();
        guard.cancel();
        *guard = CancellationToken::new();
        guard.clone()
    }

    /// Whether a classification request is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.is_busy.load(Ordering::Acquire)
    }

    /// Wait until the controller finishes the current turn.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_busy.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }
}
