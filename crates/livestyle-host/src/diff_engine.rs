//! Diff/patch computation engine interface
//!
//! The CSS diff algorithm lives outside this process. The core only needs two
//! asynchronous operations from it:
//! - `diff`: compute the patches turning `previous` into `content`
//! - `patch`: apply a patch list to `content`
//!
//! [`BridgeDiffEngine`] reaches an engine living on the other end of the
//! bridge transport, correlating replies through a [`RequestTracker`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use livestyle_core::prelude::*;
use livestyle_core::Patch;

use crate::protocol::{id_fields, ChannelMessage};
use crate::tracker::{next_request_token, RequestTracker};

/// Syntax tag sent with every request
pub const CSS_SYNTAX: &str = "css";

/// Bridge action names
pub const CALCULATE_DIFF: &str = "calculate-diff";
pub const APPLY_PATCH: &str = "apply-patch";

/// "Compute diff between A and B"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRequest {
    pub uri: String,
    pub syntax: String,
    pub content: String,
    pub previous: String,
}

impl DiffRequest {
    pub fn css(uri: impl Into<String>, content: impl Into<String>, previous: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            syntax: CSS_SYNTAX.to_string(),
            content: content.into(),
            previous: previous.into(),
        }
    }
}

/// "Apply patch list to content"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchRequest {
    pub uri: String,
    pub syntax: String,
    pub content: String,
    pub patches: Vec<Patch>,
}

impl PatchRequest {
    pub fn css(uri: impl Into<String>, content: impl Into<String>, patches: Vec<Patch>) -> Self {
        Self {
            uri: uri.into(),
            syntax: CSS_SYNTAX.to_string(),
            content: content.into(),
            patches,
        }
    }
}

/// External diff/patch computation engine.
///
/// Implement [`DiffEngine`]; the `Send` variant is the one the engine loop
/// spawns tasks with.
#[trait_variant::make(DiffEngine: Send)]
pub trait LocalDiffEngine {
    /// Patches that turn `request.previous` into `request.content`
    async fn diff(&self, request: DiffRequest) -> Result<Vec<Patch>>;

    /// `request.content` with `request.patches` applied in order
    async fn patch(&self, request: PatchRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// BridgeDiffEngine
// ---------------------------------------------------------------------------

/// Diff engine reached over the bridge transport
#[derive(Clone)]
pub struct BridgeDiffEngine {
    outbound: mpsc::UnboundedSender<ChannelMessage>,
    tracker: Arc<RequestTracker>,
}

impl std::fmt::Debug for BridgeDiffEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeDiffEngine")
            .field("tracker", &self.tracker)
            .finish()
    }
}

/// Forgets a pending request if its caller stops waiting (timeout, drop)
struct PendingGuard<'a> {
    tracker: &'a RequestTracker,
    token: u64,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.tracker.forget(self.token);
        }
    }
}

impl BridgeDiffEngine {
    pub fn new(outbound: mpsc::UnboundedSender<ChannelMessage>) -> Self {
        Self {
            outbound,
            tracker: Arc::new(RequestTracker::new()),
        }
    }

    /// Feed a reply from the bridge. Returns true if it answered a request.
    pub fn handle_reply(&self, msg: &ChannelMessage) -> bool {
        self.tracker.handle_reply(msg)
    }

    /// Fail every in-flight computation (bridge went away)
    pub fn disconnect(&self) {
        self.tracker.cancel_all();
    }

    async fn call(&self, action: &str, uri: &str, payload: Value) -> Result<Value> {
        let request_id = next_request_token();
        let ids = id_fields([("uri", json!(uri)), ("token", json!(request_id))]);

        let mut data = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        data.extend(ids.clone());

        let registration = self.tracker.register(action, ids);
        let mut guard = PendingGuard {
            tracker: &self.tracker,
            token: registration.token,
            armed: true,
        };

        self.outbound
            .send(ChannelMessage::new(action, Value::Object(data)))
            .map_err(|_| Error::channel_disconnected(action))?;

        let reply = registration
            .response_rx
            .await
            .map_err(|_| Error::channel_disconnected(action))?;
        guard.armed = false;

        let reply = reply?;
        if let Some(message) = reply.get("error").and_then(Value::as_str) {
            return Err(Error::diff_engine(message));
        }
        Ok(reply)
    }
}

impl DiffEngine for BridgeDiffEngine {
    async fn diff(&self, request: DiffRequest) -> Result<Vec<Patch>> {
        let uri = request.uri.clone();
        let reply = self
            .call(CALCULATE_DIFF, &uri, serde_json::to_value(&request)?)
            .await?;
        let patches = reply.get("patches").cloned().unwrap_or(Value::Array(Vec::new()));
        Ok(serde_json::from_value(patches)?)
    }

    async fn patch(&self, request: PatchRequest) -> Result<String> {
        let uri = request.uri.clone();
        let reply = self
            .call(APPLY_PATCH, &uri, serde_json::to_value(&request)?)
            .await?;
        reply
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::diff_engine("apply-patch reply without 'content'"))
    }
}
