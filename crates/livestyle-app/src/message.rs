//! Engine messages
//!
//! Everything the engine reacts to arrives as a [`Message`] on one channel:
//! host and editor events from the transport, and results of the tasks the
//! engine spawned itself. [`Outgoing`] is what the engine asks the transport
//! to deliver.

use std::collections::BTreeMap;
use std::sync::Arc;

use livestyle_core::prelude::*;
use livestyle_core::{Diff, Patch, Tab, TabId};
use livestyle_host::{ChannelMessage, ResourceChannel};

use crate::action::Action;
use crate::state::PageMap;
use crate::transaction::{TxEvent, TxKey};

/// All possible engine inputs
#[derive(Debug)]
pub enum Message {
    // ─────────────────────────────────────────────────────────
    // Host
    // ─────────────────────────────────────────────────────────
    /// Full open-tab list
    TabsChanged(Vec<Tab>),
    TabUpdated(Tab),
    TabClosed(TabId),

    /// A tab's developer-tools resource host connected
    ChannelConnected(ResourceChannel),
    ChannelDisconnected(TabId),
    /// Message from a tab's resource host
    ChannelInbound { tab: TabId, message: ChannelMessage },

    /// Stylesheets reported by a tab's content script
    CssomStylesheets {
        tab: TabId,
        stylesheets: Option<Vec<String>>,
    },
    /// Resolved URLs of a tab's user stylesheets
    UserStylesheets {
        tab: TabId,
        stylesheets: BTreeMap<String, String>,
    },

    // ─────────────────────────────────────────────────────────
    // Editor
    // ─────────────────────────────────────────────────────────
    EditorDiff(Diff),
    EditorFiles(Vec<String>),

    /// Page configuration change requested by the user
    Action(Action),

    // ─────────────────────────────────────────────────────────
    // Internal (subscribers and spawned tasks)
    // ─────────────────────────────────────────────────────────
    SessionsChanged {
        created: Vec<TabId>,
        destroyed: Vec<TabId>,
    },
    RequestTransaction(TxKey),
    Transaction(TxEvent),
    /// Content read to seed a resource's diff baseline
    BaselineFetched {
        key: TxKey,
        result: Result<String>,
    },
    DiffWindowElapsed { key: TxKey, generation: u64 },
    DiffComputed {
        key: TxKey,
        result: Result<Vec<Patch>>,
    },
    StylesheetsFetched {
        tab: TabId,
        result: Result<Vec<String>>,
    },
    RequestUnsavedFiles { files: Vec<String> },
    PersistPages(Arc<PageMap>),

    /// Flush pending state and stop the loop
    Shutdown,
}

/// What the engine sends out
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// A browser-side change for the editor
    EditorDiff(Diff),
    /// Ask the editor for the unsaved content of these files
    RequestUnsavedFiles { files: Vec<String> },
    /// Live-apply patches to a tab's CSSOM while the resource transaction runs
    CssomPatches {
        tab: TabId,
        url: String,
        patches: Vec<Patch>,
    },
}
