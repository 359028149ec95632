//! Tab → resource channel registry

use std::collections::HashMap;

use livestyle_core::prelude::*;
use livestyle_core::TabId;

use crate::channel::ResourceChannel;

/// Connected resource host channels indexed by tab
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<TabId, ResourceChannel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel, replacing (and disconnecting) any previous one
    pub fn connect(&mut self, channel: ResourceChannel) {
        let tab = channel.tab();
        if let Some(previous) = self.channels.insert(tab, channel) {
            debug!("Replacing resource channel for tab {}", tab);
            previous.disconnect();
        }
    }

    /// Drop a tab's channel, failing its pending requests
    pub fn disconnect(&mut self, tab: TabId) -> Option<ResourceChannel> {
        let channel = self.channels.remove(&tab)?;
        channel.disconnect();
        Some(channel)
    }

    /// Look up a tab's channel
    ///
    /// # Errors
    ///
    /// [`Error::NoHostChannel`] if the tab has no connected host.
    pub fn get(&self, tab: TabId) -> Result<&ResourceChannel> {
        self.channels.get(&tab).ok_or(Error::NoHostChannel { tab })
    }

    pub fn is_connected(&self, tab: TabId) -> bool {
        self.channels.contains_key(&tab)
    }
}
