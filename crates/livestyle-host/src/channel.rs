//! Per-tab resource host channel
//!
//! A [`ResourceChannel`] is a clonable handle for one tab's connection to the
//! browser-side resource host. Outgoing messages are pushed onto an mpsc
//! channel owned by whatever transport carries them; incoming messages are fed
//! back through [`ResourceChannel::handle_incoming`], which resolves pending
//! requests and hands everything else back to the caller as a notification.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use livestyle_core::prelude::*;
use livestyle_core::TabId;

use crate::protocol::{action, id_fields, ChannelMessage, HostNotification};
use crate::tracker::RequestTracker;

/// Default time to wait for a reply on a resource host channel
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Clonable handle for one tab's resource host channel
#[derive(Clone)]
pub struct ResourceChannel {
    tab: TabId,
    outbound: mpsc::UnboundedSender<ChannelMessage>,
    tracker: Arc<RequestTracker>,
    timeout: Duration,
}

impl std::fmt::Debug for ResourceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceChannel")
            .field("tab", &self.tab)
            .field("tracker", &self.tracker)
            .field("closed", &self.outbound.is_closed())
            .finish()
    }
}

impl ResourceChannel {
    pub fn new(tab: TabId, outbound: mpsc::UnboundedSender<ChannelMessage>) -> Self {
        Self {
            tab,
            outbound,
            tracker: Arc::new(RequestTracker::new()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Send a request and wait for the reply with the same action name whose
    /// data carries the same `id_fields`.
    ///
    /// `id_fields` are merged into the outgoing `data` together with `payload`.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelDisconnected`] if the channel goes away first.
    /// - [`Error::ResponseTimeout`] if no reply arrives in time.
    pub async fn request(
        &self,
        action: &str,
        id_fields: Map<String, Value>,
        payload: Map<String, Value>,
    ) -> Result<Value> {
        let mut data = id_fields.clone();
        data.extend(payload);

        let registration = self.tracker.register(action, id_fields);
        if self
            .outbound
            .send(ChannelMessage::new(action, Value::Object(data)))
            .is_err()
        {
            self.tracker.forget(registration.token);
            return Err(Error::channel_disconnected(action));
        }

        match tokio::time::timeout(self.timeout, registration.response_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(Error::channel_disconnected(action)),
            Err(_) => {
                self.tracker.forget(registration.token);
                Err(Error::response_timeout(
                    action,
                    self.timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Route an incoming message.
    ///
    /// Replies are consumed by their pending request and yield `None`;
    /// anything else is parsed as a [`HostNotification`].
    pub fn handle_incoming(&self, msg: ChannelMessage) -> Option<Result<HostNotification>> {
        if self.tracker.handle_reply(&msg) {
            return None;
        }
        Some(HostNotification::parse(&msg))
    }

    /// Fail every pending request; called when the transport reports loss
    pub fn disconnect(&self) {
        debug!("Resource channel for tab {} disconnected", self.tab);
        self.tracker.cancel_all();
    }

    // ─────────────────────────────────────────────────────────
    // Typed requests
    // ─────────────────────────────────────────────────────────

    /// List the stylesheet URLs the host knows for this tab
    pub async fn get_stylesheets(&self) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Reply {
            #[serde(default)]
            stylesheets: Vec<String>,
        }

        let data = self
            .request(action::GET_STYLESHEETS, Map::new(), Map::new())
            .await?;
        let reply: Reply = serde_json::from_value(data)?;
        Ok(reply.stylesheets)
    }

    /// Current content of a stylesheet resource
    pub async fn get_resource_content(&self, url: &str) -> Result<String> {
        let data = self
            .request(
                action::GET_RESOURCE_CONTENT,
                id_fields([("url", url)]),
                Map::new(),
            )
            .await?;
        data.get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::protocol("get-resource-content reply without 'content'"))
    }

    /// Replace a stylesheet resource's content; resolves on acknowledgement
    pub async fn update_resource(&self, url: &str, content: &str) -> Result<()> {
        let mut payload = Map::new();
        payload.insert("content".to_string(), json!(content));
        self.request(action::UPDATE_RESOURCE, id_fields([("url", url)]), payload)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (ResourceChannel, mpsc::UnboundedReceiver<ChannelMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ResourceChannel::new(TabId(1), tx), rx)
    }

    #[tokio::test]
    async fn test_get_resource_content_roundtrip() {
        let (chan, mut rx) = channel();
        let peer = chan.clone();

        let task = tokio::spawn(async move { chan.get_resource_content("a.css").await });

        let sent = rx.recv().await.unwrap();
        assert_eq!(sent.action, action::GET_RESOURCE_CONTENT);
        assert_eq!(sent.data["url"], "a.css");

        let reply = ChannelMessage::new(
            action::GET_RESOURCE_CONTENT,
            json!({"url": "a.css", "content": "a { color: red }"}),
        );
        assert!(peer.handle_incoming(reply).is_none());

        assert_eq!(task.await.unwrap().unwrap(), "a { color: red }");
    }

    #[tokio::test]
    async fn test_update_resource_sends_content() {
        let (chan, mut rx) = channel();
        let peer = chan.clone();

        let task = tokio::spawn(async move { chan.update_resource("a.css", "new").await });

        let sent = rx.recv().await.unwrap();
        assert_eq!(sent.data["content"], "new");
        peer.handle_incoming(ChannelMessage::new(
            action::UPDATE_RESOURCE,
            json!({"url": "a.css"}),
        ));

        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out() {
        let (chan, _rx) = channel();
        let chan = chan.with_timeout(Duration::from_millis(50));

        let err = chan.get_stylesheets().await.unwrap_err();
        assert!(matches!(err, Error::ResponseTimeout { .. }));
        assert_eq!(chan.tracker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_request() {
        let (chan, mut rx) = channel();
        let peer = chan.clone();

        let task = tokio::spawn(async move { chan.get_resource_content("a.css").await });
        rx.recv().await.unwrap();
        peer.disconnect();

        assert!(task.await.unwrap().unwrap_err().is_disconnect());
    }

    #[tokio::test]
    async fn test_closed_transport_is_disconnect() {
        let (chan, rx) = channel();
        drop(rx);
        let err = chan.get_stylesheets().await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_notification_passthrough() {
        let (chan, _rx) = channel();
        let msg = ChannelMessage::new(action::RESOURCE_ADDED, json!({"url": "b.css"}));
        let parsed = chan.handle_incoming(msg).unwrap().unwrap();
        assert_eq!(
            parsed,
            HostNotification::ResourceAdded {
                url: "b.css".into()
            }
        );
    }
}
