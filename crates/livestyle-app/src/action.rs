//! Store actions
//!
//! Every state change goes through one of these. Reducers live in
//! [`crate::reducers`].

use std::collections::BTreeMap;

use livestyle_core::{Direction, Mapping, Patch, Tab, TabId};

use crate::state::PageMap;

/// All possible store actions
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ─────────────────────────────────────────────────────────
    // Host tab lifecycle
    // ─────────────────────────────────────────────────────────
    /// Replace the open-tab list
    SetTabs(Vec<Tab>),
    /// A tab opened or navigated
    TabUpdated(Tab),
    TabClosed(TabId),

    /// Recompute the session set from tabs and pages
    ReconcileSessions,

    // ─────────────────────────────────────────────────────────
    // Page configuration
    // ─────────────────────────────────────────────────────────
    /// Enable sync for a page URL, creating its configuration on first use
    EnablePage { url: String },
    DisablePage { url: String },
    SetDirection { url: String, direction: Direction },
    /// Pin (`Some`) or unpin (`None`) a browser file's editor counterpart
    SetUserMapping {
        url: String,
        browser: String,
        editor: Option<String>,
    },
    /// Allocate the next `lsus-N` synthetic stylesheet id for a page
    AddUserStylesheet { url: String },
    RemoveUserStylesheet { url: String, id: String },
    /// Forget a page configuration entirely
    RemovePage { url: String },

    // ─────────────────────────────────────────────────────────
    // Session resources
    // ─────────────────────────────────────────────────────────
    SetCssomStylesheets {
        tab: TabId,
        stylesheets: Option<Vec<String>>,
    },
    SetDevtoolsStylesheets {
        tab: TabId,
        stylesheets: Option<Vec<String>>,
    },
    /// A resource appeared in the developer-tools resource model
    AddDevtoolsStylesheet { tab: TabId, url: String },
    SetUserStylesheets {
        tab: TabId,
        stylesheets: BTreeMap<String, String>,
    },
    /// Derived: union of the raw stylesheet lists
    SetStylesheets { tab: TabId, stylesheets: Vec<String> },
    SetAutoMapping { tab: TabId, mapping: Mapping },
    SetMapping { tab: TabId, mapping: Mapping },

    // ─────────────────────────────────────────────────────────
    // Patch queue
    // ─────────────────────────────────────────────────────────
    /// Append patches to a resource's queue
    QueuePatches {
        tab: TabId,
        uri: String,
        patches: Vec<Patch>,
    },
    /// Put patches back in front of a resource's queue after a failed write
    RequeuePatches {
        tab: TabId,
        uri: String,
        patches: Vec<Patch>,
    },
    /// Drop a resource's queue once its content was committed
    ClearPatches { tab: TabId, uri: String },

    AddRequestedUnsavedFiles { tab: TabId, files: Vec<String> },

    // ─────────────────────────────────────────────────────────
    // Editor
    // ─────────────────────────────────────────────────────────
    SetEditorFiles(Vec<String>),

    // ─────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────
    /// Merge restored pages; pages already present win
    LoadPersisted(PageMap),
}

impl Action {
    /// Tab targeted by a session-scoped action
    pub fn session_tab(&self) -> Option<TabId> {
        match self {
            Action::SetCssomStylesheets { tab, .. }
            | Action::SetDevtoolsStylesheets { tab, .. }
            | Action::AddDevtoolsStylesheet { tab, .. }
            | Action::SetUserStylesheets { tab, .. }
            | Action::SetStylesheets { tab, .. }
            | Action::SetAutoMapping { tab, .. }
            | Action::SetMapping { tab, .. }
            | Action::QueuePatches { tab, .. }
            | Action::RequeuePatches { tab, .. }
            | Action::ClearPatches { tab, .. }
            | Action::AddRequestedUnsavedFiles { tab, .. } => Some(*tab),
            _ => None,
        }
    }
}
