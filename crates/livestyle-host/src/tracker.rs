//! Request tracking for action-correlated channels
//!
//! This module provides:
//! - Pending request registration keyed by action name + identifying fields
//! - Reply matching in registration order
//! - Cancellation of every pending request when a channel goes away

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tokio::sync::oneshot;

use livestyle_core::prelude::*;

use crate::protocol::ChannelMessage;

/// Global request counter, only used to tell pending entries apart
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique request token
pub fn next_request_token() -> u64 {
    REQUEST_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A pending request awaiting its reply
struct PendingRequest {
    token: u64,
    action: String,
    id_fields: Map<String, Value>,
    /// Channel to send the reply (or the reason there will be none)
    response_tx: oneshot::Sender<Result<Value>>,
}

/// Handle returned by [`RequestTracker::register`]
pub struct Registration {
    pub token: u64,
    pub response_rx: oneshot::Receiver<Result<Value>>,
}

/// Tracks pending requests and matches replies
#[derive(Default)]
pub struct RequestTracker {
    pending: Mutex<Vec<PendingRequest>>,
}

impl std::fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTracker")
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending request
    pub fn register(&self, action: &str, id_fields: Map<String, Value>) -> Registration {
        let token = next_request_token();
        let (tx, rx) = oneshot::channel();

        self.lock().push(PendingRequest {
            token,
            action: action.to_string(),
            id_fields,
            response_tx: tx,
        });

        Registration {
            token,
            response_rx: rx,
        }
    }

    /// Handle an incoming message.
    ///
    /// Returns true if the message answered a pending request. The oldest
    /// matching request wins.
    pub fn handle_reply(&self, msg: &ChannelMessage) -> bool {
        let mut pending = self.lock();
        let position = pending
            .iter()
            .position(|req| req.action == msg.action && msg.matches_fields(&req.id_fields));

        match position {
            Some(index) => {
                let req = pending.remove(index);
                let _ = req.response_tx.send(Ok(msg.data.clone()));
                true
            }
            None => false,
        }
    }

    /// Forget a request that its caller gave up on (e.g. after a timeout)
    pub fn forget(&self, token: u64) {
        self.lock().retain(|req| req.token != token);
    }

    /// Fail every pending request with `ChannelDisconnected`
    pub fn cancel_all(&self) {
        let drained: Vec<PendingRequest> = self.lock().drain(..).collect();
        for req in drained {
            let _ = req
                .response_tx
                .send(Err(Error::channel_disconnected(req.action)));
        }
    }

    /// Get the number of pending requests
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PendingRequest>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::id_fields;
    use serde_json::json;

    #[tokio::test]
    async fn test_reply_matches_action_and_fields() {
        let tracker = RequestTracker::new();
        let a = tracker.register("get-resource-content", id_fields([("url", "a.css")]));
        let b = tracker.register("get-resource-content", id_fields([("url", "b.css")]));

        let reply = ChannelMessage::new(
            "get-resource-content",
            json!({"url": "b.css", "content": "b{}"}),
        );
        assert!(tracker.handle_reply(&reply));
        assert_eq!(tracker.pending_count(), 1);

        let data = b.response_rx.await.unwrap().unwrap();
        assert_eq!(data["content"], "b{}");
        drop(a);
    }

    #[test]
    fn test_unmatched_reply_is_not_consumed() {
        let tracker = RequestTracker::new();
        let _reg = tracker.register("update-resource", id_fields([("url", "a.css")]));

        let other_action = ChannelMessage::new("resource-updated", json!({"url": "a.css"}));
        assert!(!tracker.handle_reply(&other_action));
        assert_eq!(tracker.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_oldest_matching_request_wins() {
        let tracker = RequestTracker::new();
        let first = tracker.register("get-stylesheets", Map::new());
        let second = tracker.register("get-stylesheets", Map::new());

        tracker.handle_reply(&ChannelMessage::new("get-stylesheets", json!({"n": 1})));
        assert_eq!(first.response_rx.await.unwrap().unwrap()["n"], 1);
        assert_eq!(tracker.pending_count(), 1);
        drop(second);
    }

    #[tokio::test]
    async fn test_cancel_all_reports_disconnect() {
        let tracker = RequestTracker::new();
        let reg = tracker.register("update-resource", Map::new());

        tracker.cancel_all();

        let err = reg.response_rx.await.unwrap().unwrap_err();
        assert!(err.is_disconnect());
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_forget_removes_only_that_request() {
        let tracker = RequestTracker::new();
        let a = tracker.register("x", Map::new());
        let _b = tracker.register("x", Map::new());
        tracker.forget(a.token);
        assert_eq!(tracker.pending_count(), 1);
    }
}
