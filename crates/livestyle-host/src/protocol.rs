//! Per-tab resource host protocol
//!
//! Every message on a tab's channel is `{action, data}`. Requests and their
//! replies share the action name; the reply is matched to the request by the
//! identifying fields the requester names (usually `url`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use livestyle_core::prelude::*;

/// Action names used on the resource host channel
pub mod action {
    pub const GET_STYLESHEETS: &str = "get-stylesheets";
    pub const UPDATE_RESOURCE: &str = "update-resource";
    pub const GET_RESOURCE_CONTENT: &str = "get-resource-content";
    pub const RESOURCE_UPDATED: &str = "resource-updated";
    pub const RESOURCE_ADDED: &str = "resource-added";
    pub const ACTIVITY_STATE: &str = "activity-state";
}

/// Raw channel message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

impl ChannelMessage {
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            data,
        }
    }

    /// String field from `data`
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    /// Whether every `(key, value)` in `id_fields` appears verbatim in `data`
    pub fn matches_fields(&self, id_fields: &Map<String, Value>) -> bool {
        id_fields
            .iter()
            .all(|(key, expected)| self.data.get(key) == Some(expected))
    }
}

/// Unsolicited notifications a resource host sends
#[derive(Debug, Clone, PartialEq)]
pub enum HostNotification {
    /// A resource's content changed in the browser
    ResourceUpdated { url: String, content: String },
    /// A new stylesheet resource appeared
    ResourceAdded { url: String },
    /// The host's inspection surface became (in)active
    ActivityState { active: bool },
}

impl HostNotification {
    /// Interpret a message that did not answer a pending request
    pub fn parse(msg: &ChannelMessage) -> Result<Self> {
        match msg.action.as_str() {
            action::RESOURCE_UPDATED => {
                let url = required_str(msg, "url")?;
                let content = required_str(msg, "content")?;
                Ok(Self::ResourceUpdated { url, content })
            }
            action::RESOURCE_ADDED => Ok(Self::ResourceAdded {
                url: required_str(msg, "url")?,
            }),
            action::ACTIVITY_STATE => {
                let active = msg
                    .data
                    .get("active")
                    .and_then(Value::as_bool)
                    .ok_or_else(|| Error::protocol("activity-state without 'active'"))?;
                Ok(Self::ActivityState { active })
            }
            other => Err(Error::protocol(format!("unexpected action '{}'", other))),
        }
    }
}

fn required_str(msg: &ChannelMessage, field: &str) -> Result<String> {
    msg.str_field(field)
        .map(str::to_string)
        .ok_or_else(|| Error::protocol(format!("'{}' without '{}'", msg.action, field)))
}

/// Build an id-field map from `(key, value)` pairs
pub fn id_fields<I, K, V>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
