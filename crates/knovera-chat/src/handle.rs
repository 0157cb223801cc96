//! A cloneable handle for poking a chat session from outside.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for poking a chat session from outside.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct ChatHandle {
    cancel: Arc<Mutex<CancellationToken>>,
    idle_notify: Arc<tokio::sync::Notify>,
    is_running: Arc<AtomicBool>,
}

impl ChatHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop reading the current reply. The reply keeps whatever arrived.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Whether a reply is currently streaming.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Wait until no reply is streaming.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_running() {
            return;
        }
        notified.await;
    }

    /// Mark a reply as started and hand out a fresh token for it.
    pub(crate) fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.is_running.store(true, Ordering::Release);
        token
    }

    /// Mark the current reply as finished.
    pub(crate) fn finish(&self) {
        self.is_running.store(false, Ordering::Release);
        self.idle_notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_abort_cancels_current_token() {
        let handle = ChatHandle::new();
        let token = handle.begin();
        assert!(handle.is_running());
        handle.clone().abort();
        assert!(token.is_cancelled());

        // A new reply gets a token that is not cancelled
        handle.finish();
        assert!(!handle.begin().is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_for_idle() {
        let handle = ChatHandle::new();
        handle.wait_for_idle().await;

        handle.begin();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.wait_for_idle().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.finish();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
