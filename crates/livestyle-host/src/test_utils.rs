//! Test helpers: an in-memory diff engine and a scripted resource host
//!
//! Available to other crates through the `test-helpers` feature.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use livestyle_core::prelude::*;
use livestyle_core::Patch;

use crate::diff_engine::{DiffEngine, DiffRequest, PatchRequest};
use crate::protocol::{action, ChannelMessage};

/// What [`FakeDiffEngine`] produces for `content` + `patches`
pub fn fake_apply(content: &str, patches: &[Patch]) -> String {
    let mut out = content.to_string();
    for patch in patches {
        out.push('\n');
        out.push_str(&patch.to_string());
    }
    out
}

/// Deterministic diff engine: "applying" appends each patch's rendering
#[derive(Debug, Clone, Default)]
pub struct FakeDiffEngine {
    delay: Duration,
    fail_patch: Arc<Mutex<bool>>,
    patch_calls: Arc<Mutex<Vec<PatchRequest>>>,
    diff_calls: Arc<Mutex<Vec<DiffRequest>>>,
}

impl FakeDiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make subsequent `patch` calls fail
    pub fn set_fail_patch(&self, fail: bool) {
        *self.fail_patch.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    pub fn patch_calls(&self) -> Vec<PatchRequest> {
        self.patch_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn diff_calls(&self) -> Vec<DiffRequest> {
        self.diff_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl DiffEngine for FakeDiffEngine {
    async fn diff(&self, request: DiffRequest) -> Result<Vec<Patch>> {
        self.diff_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if request.content == request.previous {
            return Ok(Vec::new());
        }
        Ok(vec![Patch::update([request.uri.as_str()]).set("content", request.content)])
    }

    async fn patch(&self, request: PatchRequest) -> Result<String> {
        self.patch_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if *self.fail_patch.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(Error::diff_engine("scripted failure"));
        }
        Ok(fake_apply(&request.content, &request.patches))
    }
}

/// In-memory resource host answering one tab's channel requests
#[derive(Debug, Clone, Default)]
pub struct FakeResourceHost {
    contents: Arc<Mutex<BTreeMap<String, String>>>,
    writes: Arc<Mutex<Vec<(String, String)>>>,
    drop_writes: Arc<Mutex<bool>>,
    echo_updates: bool,
}

impl FakeResourceHost {
    pub fn new<I, K, V>(resources: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            contents: Arc::new(Mutex::new(
                resources
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            )),
            ..Self::default()
        }
    }

    /// Report every write back as a `resource-updated` notification, the way
    /// a real inspector does
    pub fn echoing_updates(mut self) -> Self {
        self.echo_updates = true;
        self
    }

    /// While set, `update-resource` requests are swallowed: nothing is
    /// written and no acknowledgement is sent
    pub fn set_drop_writes(&self, drop: bool) {
        *self.drop_writes.lock().unwrap_or_else(|e| e.into_inner()) = drop;
    }

    pub fn content(&self, url: &str) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
    }

    /// Simulate an edit made in the browser's inspector
    pub fn set_content(&self, url: &str, content: &str) {
        self.contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string(), content.to_string());
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Answer requests from `requests`, delivering replies through `deliver`
    pub fn serve<F>(
        &self,
        mut requests: mpsc::UnboundedReceiver<ChannelMessage>,
        deliver: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(ChannelMessage) + Send + 'static,
    {
        let host = self.clone();
        tokio::spawn(async move {
            while let Some(msg) = requests.recv().await {
                for reply in host.answer(&msg) {
                    deliver(reply);
                }
            }
        })
    }

    fn answer(&self, msg: &ChannelMessage) -> Vec<ChannelMessage> {
        let url = msg.str_field("url").unwrap_or_default().to_string();
        match msg.action.as_str() {
            action::GET_STYLESHEETS => {
                let urls: Vec<String> = self
                    .contents
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .keys()
                    .cloned()
                    .collect();
                vec![ChannelMessage::new(
                    action::GET_STYLESHEETS,
                    json!({ "stylesheets": urls }),
                )]
            }
            action::GET_RESOURCE_CONTENT => {
                let content = self.content(&url).unwrap_or_default();
                vec![ChannelMessage::new(
                    action::GET_RESOURCE_CONTENT,
                    json!({ "url": url, "content": content }),
                )]
            }
            action::UPDATE_RESOURCE => {
                if *self.drop_writes.lock().unwrap_or_else(|e| e.into_inner()) {
                    return Vec::new();
                }
                let content = msg
                    .data
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.set_content(&url, &content);
                self.writes
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push((url.clone(), content.clone()));

                let mut replies = Vec::new();
                if self.echo_updates {
                    replies.push(ChannelMessage::new(
                        action::RESOURCE_UPDATED,
                        json!({ "url": url, "content": content }),
                    ));
                }
                replies.push(ChannelMessage::new(
                    action::UPDATE_RESOURCE,
                    json!({ "url": url }),
                ));
                replies
            }
            _ => Vec::new(),
        }
    }
}
